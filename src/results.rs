use std::collections::HashMap;
use std::sync::Arc;

use crate::types::Value;

/// A row from a query result.
///
/// Column names and the name-to-index map are shared by every row of the same [`ResultSet`].
#[derive(Debug, Clone)]
pub struct Row {
    column_names: Arc<Vec<String>>,
    column_index: Arc<HashMap<String, usize>>,
    values: Vec<Value>,
}

impl Row {
    /// Column names, in select-list order.
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Values, positionally aligned with [`Row::column_names`].
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        self.column_index.get(column_name).copied()
    }

    /// Get a value from the row by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&Value> {
        self.get_column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value from the row by column index
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Rows returned by a query, in the order the driver produced them.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    rows: Vec<Row>,
    column_names: Arc<Vec<String>>,
    column_index: Arc<HashMap<String, usize>>,
}

impl ResultSet {
    /// Create an empty result set for the given columns.
    #[must_use]
    pub fn new(column_names: Vec<String>) -> Self {
        Self::with_capacity(column_names, 0)
    }

    /// Same as [`ResultSet::new`] with room for `capacity` rows.
    #[must_use]
    pub fn with_capacity(column_names: Vec<String>, capacity: usize) -> Self {
        // First occurrence wins for duplicate column names.
        let mut index = HashMap::with_capacity(column_names.len());
        for (i, name) in column_names.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }
        ResultSet {
            rows: Vec::with_capacity(capacity),
            column_names: Arc::new(column_names),
            column_index: Arc::new(index),
        }
    }

    /// Append a row; values must be aligned with the column names.
    pub fn add_row_values(&mut self, values: Vec<Value>) {
        self.rows.push(Row {
            column_names: Arc::clone(&self.column_names),
            column_index: Arc::clone(&self.column_index),
            values,
        });
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl IntoIterator for ResultSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
