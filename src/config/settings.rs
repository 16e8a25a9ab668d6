//! Engine settings from the environment (`.env` is honoured).

use crate::error::ConfigError;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://erp.db";

#[derive(Clone, Debug)]
pub struct EngineSettings {
    /// `ERP_DATABASE_URL`, default `sqlite://erp.db`.
    pub database_url: String,
    /// `ERP_CREATE_IF_MISSING`, default true. When false the database must already exist
    /// and contain the `Company` table.
    pub create_if_missing: bool,
    /// `ERP_USER`: user id stamped on new sessions.
    pub default_user: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            database_url: DEFAULT_DATABASE_URL.into(),
            create_if_missing: true,
            default_user: None,
        }
    }
}

impl EngineSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let defaults = EngineSettings::default();
        let create_if_missing = match std::env::var("ERP_CREATE_IF_MISSING") {
            Ok(v) => parse_bool(&v)
                .ok_or_else(|| ConfigError::Env(format!("ERP_CREATE_IF_MISSING: expected true or false, got '{}'", v)))?,
            Err(_) => defaults.create_if_missing,
        };
        Ok(EngineSettings {
            database_url: std::env::var("ERP_DATABASE_URL").unwrap_or(defaults.database_url),
            create_if_missing,
            default_user: std::env::var("ERP_USER").ok().filter(|s| !s.is_empty()),
        })
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
