use rusqlite::types::Value as SqliteValue;

use crate::error::SqlKitError;
use crate::types::Value;

/// ISO-8601 text, which `SQLite` date functions and chrono's parser both accept.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Convert a single [`Value`] to a rusqlite value.
///
/// # Errors
/// Sequences must be expanded into one placeholder per element before they reach the driver.
pub fn value_to_sqlite(value: &Value) -> Result<SqliteValue, SqlKitError> {
    Ok(match value {
        Value::Int(i) => SqliteValue::Integer(*i),
        Value::Float(f) => SqliteValue::Real(*f),
        Value::Text(s) => SqliteValue::Text(s.clone()),
        Value::Bool(b) => SqliteValue::Integer(i64::from(*b)),
        Value::Timestamp(dt) => SqliteValue::Text(dt.format(TIMESTAMP_FORMAT).to_string()),
        Value::Null => SqliteValue::Null,
        Value::Json(json) => SqliteValue::Text(json.to_string()),
        Value::Blob(bytes) => SqliteValue::Blob(bytes.clone()),
        Value::List(_) => {
            return Err(SqlKitError::ExecutionError(
                "sequence argument reached the sqlite driver unexpanded".into(),
            ));
        }
    })
}

/// Owned `SQLite` parameters, ready to move into a blocking task.
#[derive(Debug, Clone)]
pub struct Params(pub Vec<SqliteValue>);

impl Params {
    /// # Errors
    /// See [`value_to_sqlite`].
    pub fn convert(params: &[Value]) -> Result<Self, SqlKitError> {
        params.iter().map(value_to_sqlite).collect::<Result<_, _>>().map(Params)
    }

    /// Build a borrowed params slice suitable for rusqlite execution.
    #[must_use]
    pub fn as_refs(&self) -> Vec<&dyn rusqlite::ToSql> {
        self.0.iter().map(|v| v as &dyn rusqlite::ToSql).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn booleans_and_timestamps_become_sqlite_natives() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        let params = Params::convert(&[Value::Bool(true), Value::Timestamp(ts)]).unwrap();
        assert_eq!(
            params.0,
            vec![
                SqliteValue::Integer(1),
                SqliteValue::Text("2024-01-02T03:04:05".into())
            ]
        );
    }

    #[test]
    fn unexpanded_lists_are_rejected() {
        assert!(Params::convert(&[Value::List(vec![Value::Int(1)])]).is_err());
    }
}
