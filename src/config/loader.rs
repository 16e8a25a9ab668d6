//! Load descriptors from JSON, or parse the column-definition text format into `ColumnSpec`s.
//!
//! The text format is the body of a CREATE TABLE statement:
//!
//! ```text
//! code VARCHAR(10) NOT NULL,
//! description VARCHAR(100),
//! discount_pct DECIMAL(5,2) CHECK (discount_pct >= 0 AND discount_pct <= 100),
//! PRIMARY KEY (code)
//! ```
//!
//! Definitions are split on top-level commas and newlines, so several columns may share a
//! line and a definition may span lines as long as its parentheses stay open.

use crate::config::types::{ColumnSpec, ObjectDescriptor};
use crate::error::ConfigError;

/// Leading tokens of table constraints. Such definitions are never columns.
const CONSTRAINT_KEYWORDS: &[&str] = &["PRIMARY", "UNIQUE", "CONSTRAINT", "CHECK", "FOREIGN"];

/// Keywords that end the type part of a column definition.
const CLAUSE_KEYWORDS: &[&str] = &[
    "NOT", "NULL", "PRIMARY", "DEFAULT", "CHECK", "UNIQUE", "REFERENCES", "COLLATE",
    "CONSTRAINT", "GENERATED", "AUTOINCREMENT",
];

/// Load descriptors from a JSON array.
pub fn load_descriptors_json(json: &str) -> Result<Vec<ObjectDescriptor>, ConfigError> {
    Ok(serde_json::from_str(json)?)
}

/// Parse column definitions into an ordered column list. Composite `PRIMARY KEY (a, b)`
/// constraints mark the named columns as keys; other table constraints are skipped.
pub fn parse_column_definitions(text: &str) -> Result<Vec<ColumnSpec>, ConfigError> {
    let mut columns: Vec<ColumnSpec> = Vec::new();
    let mut table_keys: Vec<String> = Vec::new();

    for (index, def) in split_definitions(text).into_iter().enumerate() {
        let tokens = tokenize(&def);
        let Some(first) = tokens.first() else { continue };
        let first_upper = first.to_ascii_uppercase();

        if CONSTRAINT_KEYWORDS.contains(&first_upper.as_str()) {
            if first_upper == "PRIMARY" {
                table_keys.extend(parse_key_list(&tokens, index)?);
            }
            continue;
        }

        let column = parse_column(&tokens, index)?;
        if columns.iter().any(|c| c.name.eq_ignore_ascii_case(&column.name)) {
            return Err(ConfigError::SchemaText {
                index,
                message: format!("column '{}' defined twice", column.name),
            });
        }
        columns.push(column);
    }

    for key in table_keys {
        let Some(col) = columns.iter_mut().find(|c| c.name.eq_ignore_ascii_case(&key)) else {
            return Err(ConfigError::SchemaText {
                index: 0,
                message: format!("primary key names unknown column '{}'", key),
            });
        };
        col.primary_key = true;
        col.nullable = false;
    }

    Ok(columns)
}

fn parse_column(tokens: &[String], index: usize) -> Result<ColumnSpec, ConfigError> {
    let name = unquote(&tokens[0]);
    if tokens.len() < 2 {
        return Err(ConfigError::SchemaText {
            index,
            message: format!("column '{}' has no type", name),
        });
    }

    let mut pos = 1;
    let mut sql_type = String::new();
    while pos < tokens.len() && !is_clause(&tokens[pos]) {
        if !sql_type.is_empty() && !tokens[pos].starts_with('(') {
            sql_type.push(' ');
        }
        sql_type.push_str(&tokens[pos]);
        pos += 1;
    }
    if sql_type.is_empty() {
        return Err(ConfigError::SchemaText {
            index,
            message: format!("column '{}' has no type", name),
        });
    }

    let mut column = ColumnSpec::new(name, sql_type);
    while pos < tokens.len() {
        let kw = tokens[pos].to_ascii_uppercase();
        match kw.as_str() {
            "NOT" if next_is(tokens, pos, "NULL") => {
                column.nullable = false;
                pos += 2;
            }
            "NULL" => pos += 1,
            "PRIMARY" if next_is(tokens, pos, "KEY") => {
                column.primary_key = true;
                column.nullable = false;
                pos += 2;
            }
            "DEFAULT" => {
                let value = tokens.get(pos + 1).ok_or_else(|| ConfigError::SchemaText {
                    index,
                    message: format!("column '{}': DEFAULT without value", column.name),
                })?;
                column.default = Some(value.clone());
                pos += 2;
            }
            "CHECK" => {
                let expr = tokens.get(pos + 1).filter(|t| t.starts_with('(')).ok_or_else(|| {
                    ConfigError::SchemaText {
                        index,
                        message: format!("column '{}': CHECK without expression", column.name),
                    }
                })?;
                column.check = Some(strip_parens(expr).to_string());
                pos += 2;
            }
            _ => {
                return Err(ConfigError::SchemaText {
                    index,
                    message: format!("column '{}': unsupported clause '{}'", column.name, tokens[pos]),
                });
            }
        }
    }
    Ok(column)
}

fn parse_key_list(tokens: &[String], index: usize) -> Result<Vec<String>, ConfigError> {
    let list = tokens
        .iter()
        .find_map(|t| t.find('(').map(|at| &t[at..]))
        .ok_or_else(|| ConfigError::SchemaText {
            index,
            message: "PRIMARY KEY constraint without column list".into(),
        })?;
    Ok(strip_parens(list)
        .split(',')
        .map(|s| unquote(s.trim()))
        .filter(|s| !s.is_empty())
        .collect())
}

fn next_is(tokens: &[String], pos: usize, kw: &str) -> bool {
    tokens.get(pos + 1).map(|t| t.eq_ignore_ascii_case(kw)).unwrap_or(false)
}

fn is_clause(token: &str) -> bool {
    CLAUSE_KEYWORDS.contains(&token.to_ascii_uppercase().as_str())
}

fn strip_parens(s: &str) -> &str {
    s.strip_prefix('(').and_then(|s| s.strip_suffix(')')).unwrap_or(s).trim()
}

fn unquote(s: &str) -> String {
    s.trim_matches(|c| c == '"' || c == '`' || c == '[' || c == ']').to_string()
}

/// Split on commas and newlines that are outside parentheses and quotes.
fn split_definitions(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for c in text.chars() {
        if let Some(q) = quote {
            current.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' | '\n' if depth == 0 => {
                let def = current.trim();
                if !def.is_empty() {
                    out.push(def.to_string());
                }
                current.clear();
            }
            '\n' => current.push(' '),
            _ => current.push(c),
        }
    }
    let def = current.trim();
    if !def.is_empty() {
        out.push(def.to_string());
    }
    out
}

/// Whitespace tokenizer that keeps parenthesized groups and quoted strings whole.
/// `DECIMAL(5,2)` stays one token; `DECIMAL (5, 2)` yields `DECIMAL` and `(5, 2)`.
fn tokenize(def: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for c in def.chars() {
        if let Some(q) = quote {
            current.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            '(' => {
                if depth == 0 && current.eq_ignore_ascii_case("CHECK") {
                    tokens.push(std::mem::take(&mut current));
                }
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            c if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_line_per_column_with_trailing_commas() {
        let cols = parse_column_definitions(
            "
            code VARCHAR(10) PRIMARY KEY,
            description VARCHAR(100),
            discount_pct DECIMAL(5,2) CHECK (discount_pct >= 0 AND discount_pct <= 100),
            calc_pmt_disc_on_cr_memos BOOLEAN DEFAULT FALSE,
            last_modified TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            ",
        )
        .unwrap();
        let names: Vec<_> = cols.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            ["code", "description", "discount_pct", "calc_pmt_disc_on_cr_memos", "last_modified"]
        );
        assert!(cols[0].primary_key && !cols[0].nullable);
        assert_eq!(cols[2].sql_type, "DECIMAL(5,2)");
        assert_eq!(cols[2].check.as_deref(), Some("discount_pct >= 0 AND discount_pct <= 100"));
        assert_eq!(cols[3].default.as_deref(), Some("FALSE"));
        assert!(!cols[4].nullable);
        assert_eq!(cols[4].default.as_deref(), Some("CURRENT_TIMESTAMP"));
    }

    #[test]
    fn composite_key_line_marks_columns_instead_of_adding_one() {
        let cols = parse_column_definitions(
            "customer_no TEXT, entry_no INTEGER, amount REAL,\nPRIMARY KEY (customer_no, entry_no)",
        )
        .unwrap();
        assert_eq!(cols.len(), 3);
        assert!(cols[0].primary_key && cols[1].primary_key && !cols[2].primary_key);
    }

    #[test]
    fn spaced_type_parameters_join_the_type() {
        let cols = parse_column_definitions("amount DECIMAL (18, 2) NOT NULL DEFAULT 0").unwrap();
        assert_eq!(cols[0].sql_type, "DECIMAL(18, 2)");
        assert_eq!(cols[0].default.as_deref(), Some("0"));
    }

    #[test]
    fn rejects_column_without_type_and_unknown_key() {
        assert!(parse_column_definitions("code").is_err());
        assert!(parse_column_definitions("code TEXT, PRIMARY KEY (nope)").is_err());
    }
}
