use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Values that can be bound as statement arguments or read back from a row.
///
/// The same enum is used by every backend so statement builders never branch on driver types:
/// ```rust
/// use sqlkit::prelude::*;
///
/// let params = args![1, "alice", true, vec![3, 4]];
/// assert_eq!(params[1], Value::Text("alice".into()));
/// assert!(matches!(params[3], Value::List(_)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    Json(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
    /// A sequence bound to a single `?`; expanded to one placeholder per element.
    List(Vec<Value>),
}

impl Value {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let Value::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let Value::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let Value::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let Value::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            // "YYYY-MM-DD HH:MM:SS[.SSS]" or the ISO "T" separator
            for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
                if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
                    return Some(dt);
                }
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            Value::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let Value::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        if let Value::List(items) = self {
            Some(items)
        } else {
            None
        }
    }

    /// JSON view of the value, used when rows are handed to serde.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Int(i) => JsonValue::from(*i),
            Value::Float(f) => JsonValue::from(*f),
            Value::Text(s) => JsonValue::String(s.clone()),
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Timestamp(dt) => JsonValue::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            Value::Null => JsonValue::Null,
            Value::Json(json) => json.clone(),
            Value::Blob(bytes) => JsonValue::Array(bytes.iter().map(|b| JsonValue::from(*b)).collect()),
            Value::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
        }
    }

    /// Inverse of [`Value::to_json`] for values produced by serde serialization.
    #[must_use]
    pub fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Value::Text(s),
            other => Value::Json(other),
        }
    }
}

macro_rules! value_from {
    ($variant:ident: $($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value.into())
                }
            }
        )+
    };
}

value_from!(Int: i8, i16, i32, i64, u8, u16, u32);
value_from!(Float: f32, f64);
value_from!(Text: String, &str, &String);
value_from!(Bool: bool);
value_from!(Timestamp: NaiveDateTime);
value_from!(Json: JsonValue);

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Blob(value.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(value: [T; N]) -> Self {
        Value::List(value.into_iter().map(Into::into).collect())
    }
}

/// Build a `Vec<Value>` from heterogeneous expressions.
///
/// ```rust
/// use sqlkit::prelude::*;
///
/// let none = args![];
/// assert!(none.is_empty());
/// assert_eq!(args!["a", 2], vec![Value::from("a"), Value::Int(2)]);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::Value::from($value)),+]
    };
}

/// Placeholder syntax a dialect expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindStyle {
    /// `?`
    Question,
    /// `$1`, `$2`, ...
    Dollar,
    /// `:arg1`, `:arg2`, ...
    Named,
}

/// SQL dialect, selected when a [`Db`](crate::Db) is opened or via
/// [`DbOptions::with_dialect`](crate::DbOptions::with_dialect).
///
/// Dialects currently differ only in placeholder syntax.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Driver-neutral `?` placeholders.
    #[default]
    Generic,
    /// `PostgreSQL`, `$N` placeholders.
    Postgres,
    /// `MySQL`, `?` placeholders.
    #[value(name = "mysql")]
    #[serde(rename = "mysql")]
    MySql,
    /// `SQLite`, `?` placeholders.
    Sqlite,
    /// Oracle-style `:argN` placeholders.
    Oracle,
}

impl Dialect {
    #[must_use]
    pub fn bind_style(self) -> BindStyle {
        match self {
            Dialect::Generic | Dialect::MySql | Dialect::Sqlite => BindStyle::Question,
            Dialect::Postgres => BindStyle::Dollar,
            Dialect::Oracle => BindStyle::Named,
        }
    }

    #[must_use]
    pub fn savepoint(self, name: &str) -> String {
        format!("SAVEPOINT {name}")
    }

    #[must_use]
    pub fn release_savepoint(self, name: &str) -> String {
        format!("RELEASE SAVEPOINT {name}")
    }

    #[must_use]
    pub fn rollback_to_savepoint(self, name: &str) -> String {
        format!("ROLLBACK TO SAVEPOINT {name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_and_vec_conversions() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".into()));
        assert_eq!(
            Value::from(vec![1, 2]),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn bool_reads_from_integers() {
        assert_eq!(Value::Int(1).as_bool(), Some(&true));
        assert_eq!(Value::Int(0).as_bool(), Some(&false));
        assert_eq!(Value::Int(7).as_bool(), None);
    }

    #[test]
    fn timestamps_parse_from_either_separator() {
        let expected = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_milli_opt(3, 4, 5, 250)
            .unwrap();
        assert_eq!(Value::from("2024-01-02 03:04:05.250").as_timestamp(), Some(expected));
        assert_eq!(Value::from("2024-01-02T03:04:05.250").as_timestamp(), Some(expected));
        assert_eq!(Value::from("yesterday").as_timestamp(), None);
    }

    #[test]
    fn json_round_trip_keeps_scalars() {
        for value in [Value::Int(3), Value::Text("a".into()), Value::Bool(false), Value::Null] {
            assert_eq!(Value::from_json(value.to_json()), value);
        }
    }

    #[test]
    fn dialect_parses_from_cli_names() {
        assert_eq!(Dialect::from_str("postgres", true), Ok(Dialect::Postgres));
        assert_eq!(Dialect::from_str("mysql", true), Ok(Dialect::MySql));
        assert_eq!(Dialect::Postgres.bind_style(), BindStyle::Dollar);
    }
}
