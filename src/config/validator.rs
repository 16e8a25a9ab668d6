//! Descriptor validation: names, unique columns and primary keys.

use crate::config::{ObjectDescriptor, ObjectKind};
use crate::error::ConfigError;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"))
}

/// Column names must be plain identifiers: they are quoted in generated SQL but also
/// reach the filter compiler, which only accepts `[A-Za-z0-9_.]`.
pub fn is_identifier(name: &str) -> bool {
    identifier_re().is_match(name)
}

pub fn validate(descriptor: &ObjectDescriptor) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidDescriptor {
        id: descriptor.id,
        name: descriptor.name.clone(),
        reason,
    };

    let name = descriptor.name.trim();
    if name.is_empty() {
        return Err(invalid("name is empty".into()));
    }
    if descriptor.name.contains('$') || descriptor.name.contains('"') {
        return Err(invalid("name must not contain '$' or '\"'".into()));
    }

    if descriptor.kind != ObjectKind::Table {
        if !descriptor.columns.is_empty() {
            return Err(invalid(format!("a {} carries no columns", descriptor.kind)));
        }
        return Ok(());
    }

    if descriptor.columns.is_empty() {
        return Err(invalid("table declares no columns".into()));
    }

    let mut seen = HashSet::new();
    for c in &descriptor.columns {
        if !is_identifier(&c.name) {
            return Err(invalid(format!("column name '{}' is not an identifier", c.name)));
        }
        if c.sql_type.trim().is_empty() {
            return Err(invalid(format!("column '{}' has no type", c.name)));
        }
        if !seen.insert(c.name.to_ascii_lowercase()) {
            return Err(ConfigError::DuplicateColumn {
                table: descriptor.name.clone(),
                column: c.name.clone(),
            });
        }
    }

    if descriptor.key_columns().next().is_none() {
        return Err(ConfigError::MissingPrimaryKey(descriptor.name.clone()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnSpec;

    fn table(columns: Vec<ColumnSpec>) -> ObjectDescriptor {
        ObjectDescriptor::table(18, "Customer", columns)
    }

    #[test]
    fn accepts_keyed_table() {
        let d = table(vec![ColumnSpec::key("no", "VARCHAR(20)"), ColumnSpec::new("name", "TEXT")]);
        assert!(validate(&d).is_ok());
    }

    #[test]
    fn rejects_missing_key_and_duplicates() {
        let d = table(vec![ColumnSpec::new("no", "TEXT")]);
        assert!(matches!(validate(&d), Err(ConfigError::MissingPrimaryKey(_))));

        let d = table(vec![ColumnSpec::key("no", "TEXT"), ColumnSpec::new("NO", "TEXT")]);
        assert!(matches!(validate(&d), Err(ConfigError::DuplicateColumn { .. })));
    }

    #[test]
    fn rejects_reserved_characters() {
        let mut d = table(vec![ColumnSpec::key("no", "TEXT")]);
        d.name = "Cust$omer".into();
        assert!(validate(&d).is_err());

        let d = table(vec![ColumnSpec::key("no; DROP", "TEXT")]);
        assert!(validate(&d).is_err());
    }

    #[test]
    fn non_table_objects_have_no_columns() {
        let d = ObjectDescriptor::object(ObjectKind::Codeunit, 50013, "Transaction Demo");
        assert!(validate(&d).is_ok());
    }
}
