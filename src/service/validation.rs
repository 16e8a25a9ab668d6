//! Column-level checks on record values, derived from the table's column specs.

use crate::config::ColumnSpec;
use crate::error::AppError;
use crate::sql::SqlValue;

pub struct RecordValidator;

impl RecordValidator {
    /// `values` follow `columns`. Keys must be present and non-blank, NOT NULL columns
    /// without a default must be set, and text must fit `CHAR(n)`/`VARCHAR(n)`.
    pub fn validate(columns: &[ColumnSpec], values: &[SqlValue]) -> Result<(), AppError> {
        for (col, v) in columns.iter().zip(values) {
            validate_field(col, v)?;
        }
        Ok(())
    }

    /// Check a key tuple against the key columns, e.g. before a rename or a lookup.
    pub fn validate_key(columns: &[ColumnSpec], key: &[SqlValue]) -> Result<(), AppError> {
        let keys: Vec<&ColumnSpec> = columns.iter().filter(|c| c.primary_key).collect();
        if keys.len() != key.len() {
            return Err(AppError::Validation(format!(
                "expected {} key values, got {}",
                keys.len(),
                key.len()
            )));
        }
        for (col, v) in keys.into_iter().zip(key) {
            validate_field(col, v)?;
        }
        Ok(())
    }
}

fn validate_field(col: &ColumnSpec, v: &SqlValue) -> Result<(), AppError> {
    if col.primary_key && is_blank(v) {
        return Err(AppError::Validation(format!("{} is required", col.name)));
    }
    if !col.nullable && col.default.is_none() && v.is_null() {
        return Err(AppError::Validation(format!("{} is required", col.name)));
    }
    if let (Some(max), SqlValue::Text(s)) = (col.max_length(), v) {
        if s.chars().count() > max {
            return Err(AppError::Validation(format!(
                "{} must be at most {} characters",
                col.name, max
            )));
        }
    }
    Ok(())
}

fn is_blank(v: &SqlValue) -> bool {
    match v {
        SqlValue::Null => true,
        SqlValue::Text(s) => s.trim().is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::key("no", "VARCHAR(5)"),
            ColumnSpec::new("name", "VARCHAR(10)"),
            ColumnSpec::new("balance", "REAL").not_null(),
        ]
    }

    #[test]
    fn accepts_valid_values() {
        let values = vec!["C1".into(), SqlValue::Null, SqlValue::Real(0.0)];
        assert!(RecordValidator::validate(&columns(), &values).is_ok());
    }

    #[test]
    fn rejects_blank_key_and_missing_not_null() {
        let blank_key = vec![" ".into(), "x".into(), SqlValue::Real(0.0)];
        assert!(matches!(
            RecordValidator::validate(&columns(), &blank_key),
            Err(AppError::Validation(m)) if m == "no is required"
        ));
        let missing = vec!["C1".into(), "x".into(), SqlValue::Null];
        assert!(RecordValidator::validate(&columns(), &missing).is_err());
    }

    #[test]
    fn enforces_declared_length() {
        let long = vec!["C1".into(), "abcdefghijk".into(), SqlValue::Real(0.0)];
        assert!(matches!(
            RecordValidator::validate(&columns(), &long),
            Err(AppError::Validation(m)) if m.contains("at most 10")
        ));
    }

    #[test]
    fn key_arity_is_checked() {
        assert!(RecordValidator::validate_key(&columns(), &["C1".into()]).is_ok());
        assert!(RecordValidator::validate_key(&columns(), &[]).is_err());
        assert!(RecordValidator::validate_key(&columns(), &["TOOLONG".into()]).is_err());
    }
}
