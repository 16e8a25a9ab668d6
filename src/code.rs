//! `Code`: trimmed, upper-cased text, the usual type of user-defined primary keys.

use crate::error::AppError;
use crate::sql::SqlValue;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::ops::Deref;

/// Normalized on every construction, so `" 30d "` and `"30D"` name the same record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Code(String);

impl Code {
    pub fn new(s: &str) -> Self {
        Code(s.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Deref for Code {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Code {
    fn from(s: &str) -> Self {
        Code::new(s)
    }
}

impl From<String> for Code {
    fn from(s: String) -> Self {
        Code::new(&s)
    }
}

impl PartialEq<str> for Code {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Code {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl<'de> Deserialize<'de> for Code {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Code::from)
    }
}

impl From<Code> for SqlValue {
    fn from(c: Code) -> Self {
        SqlValue::Text(c.0)
    }
}

impl From<&Code> for SqlValue {
    fn from(c: &Code) -> Self {
        SqlValue::Text(c.0.clone())
    }
}

impl SqlValue {
    /// Text value normalized as a [`Code`]; NULL reads as the empty code.
    pub fn into_code(self) -> Result<Code, AppError> {
        self.into_text().map(Code::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_on_construction() {
        assert_eq!(Code::new("  net30 "), "NET30");
        assert_eq!(Code::from("30d".to_string()).as_str(), "30D");
        assert!(Code::new("   ").is_empty());
    }

    #[test]
    fn reads_from_any_cell() {
        assert_eq!(SqlValue::from("abc").into_code().unwrap(), "ABC");
        assert_eq!(SqlValue::Null.into_code().unwrap(), Code::default());
        assert_eq!(SqlValue::Integer(10).into_code().unwrap(), "10");
        assert_eq!(SqlValue::from(Code::new("x1")), SqlValue::from("X1"));
    }

    #[test]
    fn serde_normalizes_input() {
        let c: Code = serde_json::from_str("\" eur \"").unwrap();
        assert_eq!(c, "EUR");
        assert_eq!(serde_json::to_string(&c).unwrap(), "\"EUR\"");
    }
}
