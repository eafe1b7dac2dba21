use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tokio_postgres::Statement;

use crate::error::SqlKitError;
use crate::results::ResultSet;
use crate::types::Value;

/// Extracts a [`Value`] from a `tokio_postgres` row at the given index.
///
/// # Errors
/// Returns the driver error if the column cannot be read as the mapped Rust type.
pub fn postgres_extract_value(row: &tokio_postgres::Row, idx: usize) -> Result<Value, SqlKitError> {
    let type_info = row.columns()[idx].type_();

    Ok(match type_info.name() {
        "int2" => row.try_get::<_, Option<i16>>(idx)?.map_or(Value::Null, |v| Value::Int(i64::from(v))),
        "int4" => row.try_get::<_, Option<i32>>(idx)?.map_or(Value::Null, |v| Value::Int(i64::from(v))),
        "int8" => row.try_get::<_, Option<i64>>(idx)?.map_or(Value::Null, Value::Int),
        "float4" => row
            .try_get::<_, Option<f32>>(idx)?
            .map_or(Value::Null, |v| Value::Float(f64::from(v))),
        "float8" => row.try_get::<_, Option<f64>>(idx)?.map_or(Value::Null, Value::Float),
        "bool" => row.try_get::<_, Option<bool>>(idx)?.map_or(Value::Null, Value::Bool),
        "timestamp" => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map_or(Value::Null, Value::Timestamp),
        "timestamptz" => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map_or(Value::Null, |v| Value::Timestamp(v.naive_utc())),
        "date" => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map_or(Value::Null, |d| Value::Timestamp(d.and_time(chrono::NaiveTime::MIN))),
        "json" | "jsonb" => row
            .try_get::<_, Option<serde_json::Value>>(idx)?
            .map_or(Value::Null, Value::Json),
        "bytea" => row.try_get::<_, Option<Vec<u8>>>(idx)?.map_or(Value::Null, Value::Blob),
        _ => row.try_get::<_, Option<String>>(idx)?.map_or(Value::Null, Value::Text),
    })
}

/// Build a result set using statement metadata for column names.
///
/// # Errors
/// Returns errors from row value extraction.
pub fn build_result_set(
    stmt: &Statement,
    rows: &[tokio_postgres::Row],
) -> Result<ResultSet, SqlKitError> {
    let column_names: Vec<String> = stmt
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();
    let column_count = column_names.len();

    let mut result_set = ResultSet::with_capacity(column_names, rows.len());
    for row in rows {
        let mut values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            values.push(postgres_extract_value(row, idx)?);
        }
        result_set.add_row_values(values);
    }

    Ok(result_set)
}
