//! Object descriptor types: the registered definition of every business object.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a registered object. Ids are unique per kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Table,
    Page,
    Report,
    Codeunit,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectKind::Table => "table",
            ObjectKind::Page => "page",
            ObjectKind::Report => "report",
            ObjectKind::Codeunit => "codeunit",
        };
        f.write_str(s)
    }
}

/// Default value family of a column, derived from SQLite type affinity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeDefault {
    /// `''`
    Text,
    /// `0`
    Integer,
}

impl TypeDefault {
    pub fn literal(self) -> &'static str {
        match self {
            TypeDefault::Text => "''",
            TypeDefault::Integer => "0",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub sql_type: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    /// SQL default expression, emitted verbatim after `DEFAULT`.
    #[serde(default)]
    pub default: Option<String>,
    /// CHECK expression without the surrounding `CHECK (...)`.
    #[serde(default)]
    pub check: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        ColumnSpec {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable: true,
            primary_key: false,
            default: None,
            check: None,
        }
    }

    /// Primary-key column; keys are always NOT NULL.
    pub fn key(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        ColumnSpec {
            nullable: false,
            primary_key: true,
            ..ColumnSpec::new(name, sql_type)
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, expression: impl Into<String>) -> Self {
        self.default = Some(expression.into());
        self
    }

    pub fn with_check(mut self, expression: impl Into<String>) -> Self {
        self.check = Some(expression.into());
        self
    }

    /// Type default following SQLite affinity rules: INT → integer; CHAR, CLOB, TEXT → text.
    /// REAL, NUMERIC, BLOB and everything else have none.
    pub fn type_default(&self) -> Option<TypeDefault> {
        let t = self.sql_type.to_ascii_uppercase();
        if t.contains("INT") {
            Some(TypeDefault::Integer)
        } else if t.contains("CHAR") || t.contains("CLOB") || t.contains("TEXT") {
            Some(TypeDefault::Text)
        } else {
            None
        }
    }

    /// Maximum length declared as `VARCHAR(n)` / `CHAR(n)`, if any.
    pub fn max_length(&self) -> Option<usize> {
        let t = self.sql_type.to_ascii_uppercase();
        if !t.contains("CHAR") {
            return None;
        }
        let open = t.find('(')?;
        let close = t[open..].find(')')? + open;
        t[open + 1..close].trim().parse().ok()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    pub id: u32,
    pub kind: ObjectKind,
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
}

impl ObjectDescriptor {
    pub fn table(id: u32, name: impl Into<String>, columns: Vec<ColumnSpec>) -> Self {
        ObjectDescriptor {
            id,
            kind: ObjectKind::Table,
            name: name.into(),
            columns,
        }
    }

    /// Descriptor for a page, report or codeunit; these carry no schema.
    pub fn object(kind: ObjectKind, id: u32, name: impl Into<String>) -> Self {
        ObjectDescriptor {
            id,
            kind,
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn has_schema(&self) -> bool {
        self.kind == ObjectKind::Table && !self.columns.is_empty()
    }

    pub fn key_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(|c| c.primary_key)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_default_follows_affinity() {
        assert_eq!(ColumnSpec::new("a", "VARCHAR(20)").type_default(), Some(TypeDefault::Text));
        assert_eq!(ColumnSpec::new("a", "text").type_default(), Some(TypeDefault::Text));
        assert_eq!(ColumnSpec::new("a", "BIGINT").type_default(), Some(TypeDefault::Integer));
        assert_eq!(ColumnSpec::new("a", "REAL").type_default(), None);
        assert_eq!(ColumnSpec::new("a", "DECIMAL(5,2)").type_default(), None);
    }

    #[test]
    fn max_length_reads_char_width() {
        assert_eq!(ColumnSpec::new("a", "VARCHAR(20)").max_length(), Some(20));
        assert_eq!(ColumnSpec::new("a", "char ( 4 )").max_length(), Some(4));
        assert_eq!(ColumnSpec::new("a", "TEXT").max_length(), None);
        assert_eq!(ColumnSpec::new("a", "DECIMAL(5,2)").max_length(), None);
    }

    #[test]
    fn descriptor_json_defaults() {
        let json = r#"{"id": 3, "kind": "table", "name": "Payment Terms",
            "columns": [{"name": "code", "type": "VARCHAR(10)", "primary_key": true, "nullable": false},
                        {"name": "description", "type": "VARCHAR(100)"}]}"#;
        let d: ObjectDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(d.kind, ObjectKind::Table);
        assert!(d.columns[1].nullable);
        assert!(!d.columns[1].primary_key);
        assert_eq!(d.key_columns().count(), 1);
    }
}
