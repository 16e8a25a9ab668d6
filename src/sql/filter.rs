//! Filter expressions: the compact per-field query language used by record search.
//!
//! Grammar, outermost first:
//! - `A|B|C` any branch matches (empty branches are ignored)
//! - `A..B` inclusive range, `..B` upper bound only, `A..` lower bound only
//! - `>=A`, `<=A`, `<>A`, `>A`, `<A` comparisons
//! - `*` any run of characters, `?` exactly one character
//! - anything else is an equality
//!
//! Values are trimmed and always bound as parameters. The field name is reduced to
//! `[A-Za-z0-9_.]` and each dotted part is quoted before it is spliced into SQL.
//!
//! A `..` anywhere makes the branch a range, so `>1..5` is the range from `>1` to `5`.

use crate::error::AppError;
use crate::sql::builder::quoted;
use crate::sql::params::SqlValue;

/// A filter on one field, as supplied by a caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterExpression {
    pub field: String,
    pub expression: String,
}

impl FilterExpression {
    pub fn new(field: impl Into<String>, expression: impl Into<String>) -> Self {
        FilterExpression {
            field: field.into(),
            expression: expression.into(),
        }
    }
}

/// A WHERE fragment and its parameters, in placeholder order.
#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

const COMPARISONS: [&str; 5] = [">=", "<=", "<>", ">", "<"];

pub fn sanitize_field_name(field: &str) -> String {
    field
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
        .collect()
}

/// Sanitized field name with every dotted part quoted: `t.code` becomes `"t"."code"`.
fn field_identifier(field: &str) -> Result<String, AppError> {
    let field = sanitize_field_name(field);
    if field.is_empty() {
        return Err(AppError::FilterSyntax("field name is empty".into()));
    }
    let parts: Vec<&str> = field.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(AppError::FilterSyntax(format!(
            "field name '{}' has an empty part",
            field
        )));
    }
    Ok(parts.into_iter().map(quoted).collect::<Vec<_>>().join("."))
}

/// Compile one expression against one field. Blank expressions yield None.
pub fn compile(field: &str, expression: &str) -> Result<Option<Predicate>, AppError> {
    let field = field_identifier(field)?;
    let expression = expression.trim();
    if expression.is_empty() {
        return Ok(None);
    }

    if expression.contains('|') {
        let mut parts = Vec::new();
        let mut params = Vec::new();
        for branch in expression.split('|') {
            if let Some(p) = compile_branch(&field, branch.trim())? {
                parts.push(p.sql);
                params.extend(p.params);
            }
        }
        return Ok(match parts.len() {
            0 => None,
            1 => Some(Predicate {
                sql: parts.remove(0),
                params,
            }),
            _ => Some(Predicate {
                sql: format!("({})", parts.join(" OR ")),
                params,
            }),
        });
    }

    compile_branch(&field, expression)
}

fn compile_branch(field: &str, expr: &str) -> Result<Option<Predicate>, AppError> {
    if expr.is_empty() {
        return Ok(None);
    }

    if expr.contains("..") {
        return compile_range(field, expr).map(Some);
    }

    for op in COMPARISONS {
        if let Some(rest) = expr.strip_prefix(op) {
            let value = rest.trim();
            if value.is_empty() {
                return Err(AppError::FilterSyntax(format!(
                    "operator '{}' needs a value",
                    op
                )));
            }
            return Ok(Some(Predicate {
                sql: format!("{} {} ?", field, op),
                params: vec![value.into()],
            }));
        }
    }

    if expr.contains('*') || expr.contains('?') {
        return Ok(Some(like_predicate(field, expr)));
    }

    Ok(Some(Predicate {
        sql: format!("{} = ?", field),
        params: vec![expr.into()],
    }))
}

fn compile_range(field: &str, expr: &str) -> Result<Predicate, AppError> {
    if expr.matches("..").count() > 1 {
        return Err(AppError::FilterSyntax(format!(
            "'{}' has more than one range operator",
            expr
        )));
    }
    let (lo, hi) = expr
        .split_once("..")
        .map(|(a, b)| (a.trim(), b.trim()))
        .unwrap_or((expr, ""));
    match (lo.is_empty(), hi.is_empty()) {
        (false, false) => Ok(Predicate {
            sql: format!("{} BETWEEN ? AND ?", field),
            params: vec![lo.into(), hi.into()],
        }),
        (true, false) => Ok(Predicate {
            sql: format!("{} <= ?", field),
            params: vec![hi.into()],
        }),
        (false, true) => Ok(Predicate {
            sql: format!("{} >= ?", field),
            params: vec![lo.into()],
        }),
        (true, true) => Err(AppError::FilterSyntax(
            "range needs at least one bound".into(),
        )),
    }
}

/// `*` and `?` become `%` and `_`. Literal `%`, `_` and `\` are escaped and an ESCAPE
/// clause is added only when one occurs.
fn like_predicate(field: &str, expr: &str) -> Predicate {
    let needs_escape = expr.contains(['%', '_', '\\']);
    let mut pattern = String::with_capacity(expr.len() + 4);
    for c in expr.chars() {
        match c {
            '*' => pattern.push('%'),
            '?' => pattern.push('_'),
            '%' | '_' | '\\' => {
                pattern.push('\\');
                pattern.push(c);
            }
            _ => pattern.push(c),
        }
    }
    let sql = if needs_escape {
        format!("{} LIKE ? ESCAPE '\\'", field)
    } else {
        format!("{} LIKE ?", field)
    };
    Predicate {
        sql,
        params: vec![pattern.into()],
    }
}

/// AND together every non-blank filter. None when nothing constrains the query.
pub fn build_filter_clause(filters: &[FilterExpression]) -> Result<Option<Predicate>, AppError> {
    let mut parts = Vec::new();
    let mut params = Vec::new();
    for f in filters {
        if let Some(p) = compile(&f.field, &f.expression)? {
            parts.push(p.sql);
            params.extend(p.params);
        }
    }
    if parts.is_empty() {
        return Ok(None);
    }
    Ok(Some(Predicate {
        sql: parts.join(" AND "),
        params,
    }))
}
