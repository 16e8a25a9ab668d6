//! Company namespace: physical table names are `<Company>$<Base>`.
//!
//! Tables without `$` are global and shared by every company. Company tables are never
//! joined across companies implicitly; every name is built from exactly one company.

use crate::error::AppError;

/// Separator between company and base table name. Reserved in both.
pub const SEPARATOR: char = '$';

/// Characters that would break quoting or the naming scheme. Hyphens are excluded too.
const FORBIDDEN: &[char] = &[' ', '$', '"', '\'', '`', '\\', ';', '-'];

pub const MAX_COMPANY_NAME_LEN: usize = 50;

pub fn validate_company_name(name: &str) -> Result<(), AppError> {
    if name.is_empty() {
        return Err(AppError::InvalidName("company name cannot be empty".into()));
    }
    if name.chars().count() > MAX_COMPANY_NAME_LEN {
        return Err(AppError::InvalidName(format!(
            "company name exceeds {} characters",
            MAX_COMPANY_NAME_LEN
        )));
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN.contains(c) || c.is_control()) {
        return Err(AppError::InvalidName(format!(
            "company name '{}' contains forbidden character {:?} (spaces, $, quotes, backslashes, semicolons and hyphens are not allowed)",
            name, c
        )));
    }
    Ok(())
}

/// `"<company>$<base>"`.
pub fn full_table_name(company: &str, base: &str) -> Result<String, AppError> {
    if company.is_empty() {
        return Err(AppError::NoCompanyContext);
    }
    if base.contains(SEPARATOR) {
        return Err(AppError::InvalidName(format!(
            "table name '{}' must not contain '{}'",
            base, SEPARATOR
        )));
    }
    Ok(format!("{}{}{}", company, SEPARATOR, base))
}

/// A physical table name split into its parts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableName<'a> {
    /// None for global tables.
    pub company: Option<&'a str>,
    pub base: &'a str,
}

/// Split on the first `$`.
pub fn parse_table_name(full: &str) -> TableName<'_> {
    match full.split_once(SEPARATOR) {
        Some((company, base)) => TableName {
            company: Some(company),
            base,
        },
        None => TableName {
            company: None,
            base: full,
        },
    }
}

/// SQLite resolves table names without regard to ASCII case, so company prefixes do too.
pub fn belongs_to_company(full: &str, company: &str) -> bool {
    parse_table_name(full)
        .company
        .is_some_and(|c| c.eq_ignore_ascii_case(company))
}
