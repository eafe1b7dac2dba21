use serde::Serialize;

use crate::encoding::Encoder;
use crate::error::{SqlKitError, StatementError};
use crate::translation::rebind;
use crate::types::{Dialect, Value};

use super::{Sql, questions, reject_lists};

/// Start an `INSERT`.
pub fn insert() -> Insert {
    Insert::default()
}

/// Immutable `INSERT INTO t (cols) VALUES (...), (...)` builder.
///
/// Rows added through [`Insert::row`], [`Insert::value`] or [`Insert::record`] must all carry
/// the same column set (in any order); values are reordered to the first row's column order.
/// The first validation failure is kept and reported by `render`.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct Insert {
    dialect: Dialect,
    table: String,
    columns: Option<Vec<String>>,
    rows: Vec<Vec<Value>>,
    error: Option<StatementError>,
    encoder: Encoder,
}

impl Insert {
    /// Set the target table.
    ///
    /// Takes `self` by value so the call resolves here rather than to [`Into::into`]; clone
    /// the builder first to keep the original.
    pub fn into(mut self, table: &str) -> Self {
        self.table = table.to_owned();
        self
    }

    /// Set the column list explicitly, for use with [`Insert::values`].
    pub fn columns<I, S>(&self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut next = self.clone();
        next.columns = Some(columns.into_iter().map(Into::into).collect());
        next
    }

    /// Append a row positionally matching the column list.
    pub fn values(&self, values: Vec<Value>) -> Self {
        let mut next = self.clone();
        next.rows.push(values);
        next
    }

    /// Append a one-column row.
    pub fn value(&self, column: &str, value: impl Into<Value>) -> Self {
        self.row(vec![column.to_owned()], vec![value.into()])
    }

    /// Append a row given as parallel column and value lists.
    pub fn row(&self, columns: Vec<String>, values: Vec<Value>) -> Self {
        let mut next = self.clone();
        if next.error.is_some() {
            return next;
        }
        if columns.len() != values.len() {
            next.error = Some(StatementError::invalid(format!(
                "{} columns but {} values",
                columns.len(),
                values.len()
            )));
            return next;
        }
        let established = next.columns.get_or_insert_with(|| columns.clone());
        match reorder(established, columns, values) {
            Ok(row) => next.rows.push(row),
            Err(err) => next.error = Some(err),
        }
        next
    }

    /// Append a row produced by the encoder from a serializable record.
    ///
    /// With a non-empty `fields` list only those fields are written.
    pub fn record<T: Serialize + ?Sized>(&self, record: &T, fields: &[&str]) -> Self {
        match self.encoder.encode(record, fields) {
            Ok((columns, values)) => self.row(columns, values),
            Err(err) => {
                let mut next = self.clone();
                next.error.get_or_insert(StatementError::Encode(err));
                next
            }
        }
    }

    pub fn dialect(&self, dialect: Dialect) -> Self {
        let mut next = self.clone();
        next.dialect = dialect;
        next
    }

    pub fn encoder(&self, encoder: Encoder) -> Self {
        let mut next = self.clone();
        next.encoder = encoder;
        next
    }
}

fn reorder(
    established: &[String],
    columns: Vec<String>,
    values: Vec<Value>,
) -> Result<Vec<Value>, StatementError> {
    let mismatch = || {
        StatementError::invalid(format!(
            "row columns {columns:?} do not match insert columns {established:?}"
        ))
    };
    if established.len() != columns.len() {
        return Err(mismatch());
    }
    let mut slots: Vec<Option<Value>> = vec![None; established.len()];
    for (column, value) in columns.iter().zip(values) {
        let Some(at) = established.iter().position(|c| c == column) else {
            return Err(mismatch());
        };
        if slots[at].replace(value).is_some() {
            return Err(mismatch());
        }
    }
    Ok(slots.into_iter().flatten().collect())
}

impl Sql for Insert {
    fn render(&self) -> Result<(String, Vec<Value>), SqlKitError> {
        if let Some(err) = &self.error {
            return Err(err.clone().into());
        }
        if self.table.is_empty() {
            return Err(StatementError::invalid("insert requires a table").into());
        }
        let columns = match &self.columns {
            Some(columns) if !columns.is_empty() => columns,
            _ => return Err(StatementError::invalid("insert requires columns").into()),
        };
        if self.rows.is_empty() {
            return Err(StatementError::invalid("insert requires at least one row").into());
        }

        let mut sql = format!("INSERT INTO {} ({}) VALUES ", self.table, columns.join(", "));
        let mut values = Vec::with_capacity(columns.len() * self.rows.len());
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(StatementError::invalid(format!(
                    "row {i} has {} values for {} columns",
                    row.len(),
                    columns.len()
                ))
                .into());
            }
            reject_lists(row, "insert")?;
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&questions(row.len()));
            values.extend(row.iter().cloned());
        }
        Ok((rebind(self.dialect, &sql).into_owned(), values))
    }
}
