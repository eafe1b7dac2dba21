use serde::Serialize;

use crate::encoding::Encoder;
use crate::error::{SqlKitError, StatementError};
use crate::translation::rebind;
use crate::types::{Dialect, Value};

use super::expr::Operator;
use super::filter::{Filter, WhereClause};
use super::{Raw, Sql, reject_lists};

/// Start an `UPDATE` of `table`.
pub fn update(table: &str) -> Update {
    Update::default().table(table)
}

/// Immutable `UPDATE t SET c1=?, c2=? [WHERE ...]` builder.
///
/// Bound values are the SET values followed by the WHERE values.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct Update {
    dialect: Dialect,
    table: String,
    columns: Vec<String>,
    values: Vec<Value>,
    filter: WhereClause,
    error: Option<StatementError>,
    encoder: Encoder,
}

impl Update {
    pub fn table(&self, table: &str) -> Self {
        let mut next = self.clone();
        next.table = table.to_owned();
        next
    }

    /// Replace the SET column list; pair with [`Update::values`].
    pub fn columns<I, S>(&self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut next = self.clone();
        next.columns = columns.into_iter().map(Into::into).collect();
        next
    }

    /// Replace the SET value list.
    pub fn values(&self, values: Vec<Value>) -> Self {
        let mut next = self.clone();
        next.values = values;
        next
    }

    /// Append one `column=?` assignment.
    pub fn set(&self, column: &str, value: impl Into<Value>) -> Self {
        let mut next = self.clone();
        next.columns.push(column.to_owned());
        next.values.push(value.into());
        next
    }

    /// Append the assignments produced by the encoder from a serializable record.
    pub fn record<T: Serialize + ?Sized>(&self, record: &T, fields: &[&str]) -> Self {
        let mut next = self.clone();
        match self.encoder.encode(record, fields) {
            Ok((columns, values)) => {
                next.columns.extend(columns);
                next.values.extend(values);
            }
            Err(err) => {
                next.error.get_or_insert(StatementError::Encode(err));
            }
        }
        next
    }

    pub fn where_(&self, filter: impl Into<Filter>) -> Self {
        let mut next = self.clone();
        next.filter = self.filter.push(Operator::And, filter.into());
        next
    }

    pub fn where_raw(&self, sql: &str, args: Vec<Value>) -> Self {
        self.where_(Raw::new(sql.to_owned()).bind(args))
    }

    pub fn or_where(&self, filter: impl Into<Filter>) -> Self {
        let mut next = self.clone();
        next.filter = self.filter.push(Operator::Or, filter.into());
        next
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

impl Sql for Update {
    fn render(&self) -> Result<(String, Vec<Value>), SqlKitError> {
        if let Some(err) = &self.error {
            return Err(err.clone().into());
        }
        if self.columns.len() != self.values.len() {
            return Err(StatementError::invalid(format!(
                "{} columns but {} values",
                self.columns.len(),
                self.values.len()
            ))
            .into());
        }
        if self.table.is_empty() || self.columns.is_empty() {
            return Err(StatementError::invalid("update requires a table and assignments").into());
        }

        reject_lists(&self.values, "update")?;

        let assignments: Vec<String> = self.columns.iter().map(|c| format!("{c}=?")).collect();
        let mut sql = format!("UPDATE {} SET {}", self.table, assignments.join(", "));
        let mut values = self.values.clone();
        self.filter.render_into(&mut sql, &mut values)?;
        Ok((rebind(self.dialect, &sql).into_owned(), values))
    }
}
