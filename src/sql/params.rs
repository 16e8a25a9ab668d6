//! Bind values: one enum covering SQLite's storage classes, bindable through sqlx and
//! convertible to and from record field types and JSON.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::sqlite::{Sqlite, SqliteRow, SqliteTypeInfo};
use sqlx::Database;

#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Text value; NULL reads as the empty string, numbers are formatted.
    pub fn into_text(self) -> Result<String, AppError> {
        match self {
            SqlValue::Null => Ok(String::new()),
            SqlValue::Text(s) => Ok(s),
            SqlValue::Integer(n) => Ok(n.to_string()),
            SqlValue::Real(n) => Ok(n.to_string()),
            SqlValue::Blob(_) => Err(AppError::Validation("expected text, got blob".into())),
        }
    }

    /// Integer value; NULL reads as 0, numeric text is parsed.
    pub fn into_i64(self) -> Result<i64, AppError> {
        match self {
            SqlValue::Null => Ok(0),
            SqlValue::Integer(n) => Ok(n),
            SqlValue::Real(n) if n.fract() == 0.0 => Ok(n as i64),
            SqlValue::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| AppError::Validation(format!("'{}' is not an integer", s))),
            other => Err(AppError::Validation(format!("expected integer, got {:?}", other))),
        }
    }

    /// Real value; NULL reads as 0.0.
    pub fn into_f64(self) -> Result<f64, AppError> {
        match self {
            SqlValue::Null => Ok(0.0),
            SqlValue::Integer(n) => Ok(n as f64),
            SqlValue::Real(n) => Ok(n),
            SqlValue::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| AppError::Validation(format!("'{}' is not a number", s))),
            SqlValue::Blob(_) => Err(AppError::Validation("expected number, got blob".into())),
        }
    }

    /// Booleans are stored as 0/1.
    pub fn into_bool(self) -> Result<bool, AppError> {
        Ok(self.into_i64()? != 0)
    }

    /// Timestamps are stored as RFC 3339 text. NULL and empty text read as None.
    pub fn into_datetime(self) -> Result<Option<DateTime<Utc>>, AppError> {
        match self {
            SqlValue::Null => Ok(None),
            SqlValue::Text(s) if s.is_empty() => Ok(None),
            SqlValue::Text(s) => DateTime::parse_from_rfc3339(&s)
                .map(|d| Some(d.with_timezone(&Utc)))
                .map_err(|_| AppError::Validation(format!("'{}' is not an RFC 3339 timestamp", s))),
            other => Err(AppError::Validation(format!("expected timestamp, got {:?}", other))),
        }
    }

    pub fn from_json(v: &Value) -> Result<Self, AppError> {
        Ok(match v {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Integer(*b as i64),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlValue::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    SqlValue::Real(f)
                } else {
                    return Err(AppError::Validation(format!("number {} out of range", n)));
                }
            }
            Value::String(s) => SqlValue::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => SqlValue::Text(v.to_string()),
        })
    }

    pub fn to_json(&self) -> Value {
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(n) => Value::Number((*n).into()),
            SqlValue::Real(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            SqlValue::Text(s) => Value::String(s.clone()),
            SqlValue::Blob(b) => Value::Array(b.iter().map(|x| Value::Number((*x).into())).collect()),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl From<&String> for SqlValue {
    fn from(s: &String) -> Self {
        SqlValue::Text(s.clone())
    }
}

impl From<i64> for SqlValue {
    fn from(n: i64) -> Self {
        SqlValue::Integer(n)
    }
}

impl From<i32> for SqlValue {
    fn from(n: i32) -> Self {
        SqlValue::Integer(n as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(n: f64) -> Self {
        SqlValue::Real(n)
    }
}

impl From<bool> for SqlValue {
    fn from(b: bool) -> Self {
        SqlValue::Integer(b as i64)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(d: DateTime<Utc>) -> Self {
        SqlValue::Text(d.to_rfc3339())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

impl<'q> Encode<'q, Sqlite> for SqlValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        match self {
            SqlValue::Null => <Option<i64> as Encode<Sqlite>>::encode_by_ref(&None, buf),
            SqlValue::Integer(n) => <i64 as Encode<Sqlite>>::encode_by_ref(n, buf),
            SqlValue::Real(n) => <f64 as Encode<Sqlite>>::encode_by_ref(n, buf),
            SqlValue::Text(s) => <String as Encode<Sqlite>>::encode_by_ref(s, buf),
            SqlValue::Blob(b) => <Vec<u8> as Encode<Sqlite>>::encode_by_ref(b, buf),
        }
    }
}

impl sqlx::Type<Sqlite> for SqlValue {
    fn type_info() -> SqliteTypeInfo {
        <String as sqlx::Type<Sqlite>>::type_info()
    }

    fn compatible(_ty: &SqliteTypeInfo) -> bool {
        true
    }
}

/// Read one column by name, whatever its storage class.
pub fn cell_to_value(row: &SqliteRow, name: &str) -> SqlValue {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return SqlValue::Integer(n);
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        return SqlValue::Real(n);
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return SqlValue::Text(s);
    }
    if let Ok(Some(b)) = row.try_get::<Option<Vec<u8>>, _>(name) {
        return SqlValue::Blob(b);
    }
    SqlValue::Null
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_reads_as_type_default() {
        assert_eq!(SqlValue::Null.into_text().unwrap(), "");
        assert_eq!(SqlValue::Null.into_i64().unwrap(), 0);
        assert!(!SqlValue::Null.into_bool().unwrap());
        assert_eq!(SqlValue::Null.into_datetime().unwrap(), None);
    }

    #[test]
    fn lenient_numeric_conversions() {
        assert_eq!(SqlValue::from("42").into_i64().unwrap(), 42);
        assert_eq!(SqlValue::Real(3.0).into_i64().unwrap(), 3);
        assert!(SqlValue::Real(3.5).into_i64().is_err());
        assert_eq!(SqlValue::Integer(2).into_f64().unwrap(), 2.0);
        assert!(SqlValue::from("abc").into_f64().is_err());
    }

    #[test]
    fn json_conversions() {
        let v = SqlValue::from_json(&serde_json::json!(true)).unwrap();
        assert_eq!(v, SqlValue::Integer(1));
        assert_eq!(SqlValue::from("x").to_json(), serde_json::json!("x"));
        assert_eq!(SqlValue::from(None::<String>), SqlValue::Null);
    }

    #[test]
    fn datetime_round_trip() {
        let now = Utc::now();
        let back = SqlValue::from(now).into_datetime().unwrap().unwrap();
        assert_eq!(back, now);
    }
}
