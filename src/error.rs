//! Typed errors for the engine. Every fallible operation returns `AppError`.

use crate::config::ObjectKind;
use crate::migration::MigrationReport;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid descriptor {id} ({name}): {reason}")]
    InvalidDescriptor { id: u32, name: String, reason: String },
    #[error("duplicate column '{column}' in table {table}")]
    DuplicateColumn { table: String, column: String },
    #[error("table {0} declares no primary key column")]
    MissingPrimaryKey(String),
    #[error("schema text, definition {index}: {message}")]
    SchemaText { index: usize, message: String },
    #[error("environment: {0}")]
    Env(String),
    #[error("descriptor json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Transaction state violations. The session never leaves a handle dangling, so
/// these only report caller misuse.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStateError {
    #[error("transaction already active")]
    AlreadyActive,
    #[error("no active transaction")]
    NoActiveTransaction,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database not open")]
    NotOpen,
    #[error("invalid name: {0}")]
    InvalidName(String),
    #[error("company '{0}' already exists")]
    DuplicateCompany(String),
    #[error("{kind} id {id} already registered")]
    DuplicateId { kind: ObjectKind, id: u32 },
    #[error("{kind} id {id} is outside every valid object range")]
    OutOfRange { kind: ObjectKind, id: u32 },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("no company context set; enter a company first")]
    NoCompanyContext,
    #[error("already in company '{0}'; exit it before entering another")]
    AlreadyInCompany(String),
    #[error("no company session active")]
    NotInCompany,
    #[error("{0}")]
    MigrationFailed(MigrationReport),
    #[error(transparent)]
    TransactionState(#[from] TransactionStateError),
    #[error("filter syntax: {0}")]
    FilterSyntax(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("{hook} hook failed: {source}")]
    Hook {
        hook: &'static str,
        #[source]
        source: Box<AppError>,
    },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

impl AppError {
    pub(crate) fn hook(hook: &'static str, source: AppError) -> Self {
        AppError::Hook {
            hook,
            source: Box::new(source),
        }
    }

    /// True when the engine rejected a write because the key already exists.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            AppError::Db(sqlx::Error::Database(e)) => e.is_unique_violation(),
            _ => false,
        }
    }
}
