use rusqlite::Statement;
use rusqlite::types::Value as SqliteValue;

use crate::error::SqlKitError;
use crate::results::ResultSet;
use crate::types::Value;

use super::params::Params;

/// Extract a [`Value`] from a `SQLite` row.
///
/// # Errors
/// Returns the rusqlite error if the column cannot be read.
pub fn sqlite_extract_value(row: &rusqlite::Row, idx: usize) -> Result<Value, SqlKitError> {
    let value: SqliteValue = row.get(idx)?;
    Ok(match value {
        SqliteValue::Null => Value::Null,
        SqliteValue::Integer(i) => Value::Int(i),
        SqliteValue::Real(f) => Value::Float(f),
        SqliteValue::Text(s) => Value::Text(s),
        SqliteValue::Blob(b) => Value::Blob(b),
    })
}

/// Run a prepared statement and collect its rows.
///
/// # Errors
/// Returns the rusqlite error from execution or value extraction.
pub fn build_result_set(stmt: &mut Statement<'_>, params: &Params) -> Result<ResultSet, SqlKitError> {
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let col_count = column_names.len();
    let mut result_set = ResultSet::new(column_names);

    let mut rows = stmt.query(&params.as_refs()[..])?;
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            values.push(sqlite_extract_value(row, i)?);
        }
        result_set.add_row_values(values);
    }

    Ok(result_set)
}
