use crate::error::{SqlKitError, StatementError};
use crate::translation::rebind;
use crate::types::{Dialect, Value};

use super::expr::Operator;
use super::filter::{Filter, WhereClause};
use super::{Raw, Sql, expand_lists};

/// One `KIND JOIN table ON condition` clause.
#[derive(Debug, Clone)]
pub struct Join {
    kind: String,
    table: String,
    on: Raw,
}

impl Join {
    #[must_use]
    pub fn new(kind: &str, table: &str, on: Raw) -> Self {
        Join {
            kind: kind.to_owned(),
            table: table.to_owned(),
            on,
        }
    }

    fn render_into(&self, sql: &mut String, values: &mut Vec<Value>) -> Result<(), SqlKitError> {
        let (on, args) = expand_lists(self.on.sql().to_owned(), self.on.args().to_vec())?;
        sql.push(' ');
        if !self.kind.is_empty() {
            sql.push_str(&self.kind);
            sql.push(' ');
        }
        sql.push_str("JOIN ");
        sql.push_str(&self.table);
        sql.push_str(" ON ");
        sql.push_str(&on);
        values.extend(args);
        Ok(())
    }
}

pub(crate) fn render_joins(
    joins: &[Join],
    sql: &mut String,
    values: &mut Vec<Value>,
) -> Result<(), SqlKitError> {
    for join in joins {
        join.render_into(sql, values)?;
    }
    Ok(())
}

/// Start a `SELECT` over the given columns.
pub fn select<I, S>(columns: I) -> Select
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Select::default().columns(columns)
}

/// Immutable `SELECT` builder.
///
/// Clauses render in a fixed order:
/// `SELECT cols FROM table [JOIN ...] [WHERE ...] [GROUP BY ...] [ORDER BY ...] [LIMIT n] [OFFSET n]`.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct Select {
    dialect: Dialect,
    columns: Vec<String>,
    table: String,
    joins: Vec<Join>,
    filter: WhereClause,
    group_by: Vec<String>,
    order_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Select {
    /// Replace the selected columns.
    pub fn columns<I, S>(&self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut next = self.clone();
        next.columns = columns.into_iter().map(Into::into).collect();
        next
    }

    pub fn from(&self, table: &str) -> Self {
        let mut next = self.clone();
        next.table = table.to_owned();
        next
    }

    /// Add a filter, combined with earlier ones under AND.
    pub fn where_(&self, filter: impl Into<Filter>) -> Self {
        let mut next = self.clone();
        next.filter = self.filter.push(Operator::And, filter.into());
        next
    }

    /// Add a raw `?` fragment, combined with earlier filters under AND.
    ///
    /// A sequence argument expands its placeholder into `(?, ?, ...)`.
    pub fn where_raw(&self, sql: &str, args: Vec<Value>) -> Self {
        self.where_(Raw::new(sql.to_owned()).bind(args))
    }

    /// Add a filter, combined with earlier ones under OR.
    pub fn or_where(&self, filter: impl Into<Filter>) -> Self {
        let mut next = self.clone();
        next.filter = self.filter.push(Operator::Or, filter.into());
        next
    }

    /// Add a join of an arbitrary kind; `on` may carry `?` arguments.
    pub fn join(&self, kind: &str, table: &str, on: impl Into<Raw>) -> Self {
        let mut next = self.clone();
        next.joins.push(Join::new(kind, table, on.into()));
        next
    }

    pub fn inner_join(&self, table: &str, on: impl Into<Raw>) -> Self {
        self.join("INNER", table, on)
    }

    pub fn left_join(&self, table: &str, on: impl Into<Raw>) -> Self {
        self.join("LEFT", table, on)
    }

    pub fn right_join(&self, table: &str, on: impl Into<Raw>) -> Self {
        self.join("RIGHT", table, on)
    }

    pub fn group_by<I, S>(&self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut next = self.clone();
        next.group_by = columns.into_iter().map(Into::into).collect();
        next
    }

    pub fn order_by<I, S>(&self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut next = self.clone();
        next.order_by = columns.into_iter().map(Into::into).collect();
        next
    }

    pub fn limit(&self, limit: u64) -> Self {
        let mut next = self.clone();
        next.limit = Some(limit);
        next
    }

    pub fn offset(&self, offset: u64) -> Self {
        let mut next = self.clone();
        next.offset = Some(offset);
        next
    }

    pub fn dialect(&self, dialect: Dialect) -> Self {
        let mut next = self.clone();
        next.dialect = dialect;
        next
    }

    #[must_use]
    pub fn get_dialect(&self) -> Dialect {
        self.dialect
    }

    pub(crate) fn render_generic(&self) -> Result<(String, Vec<Value>), SqlKitError> {
        if self.columns.is_empty() {
            return Err(StatementError::invalid("select requires at least one column").into());
        }
        let mut sql = String::from("SELECT ");
        let mut values = Vec::new();
        sql.push_str(&self.columns.join(", "));
        if !self.table.is_empty() {
            sql.push_str(" FROM ");
            sql.push_str(&self.table);
        }
        render_joins(&self.joins, &mut sql, &mut values)?;
        self.filter.render_into(&mut sql, &mut values)?;
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        Ok((sql, values))
    }
}

impl Sql for Select {
    fn render(&self) -> Result<(String, Vec<Value>), SqlKitError> {
        let (sql, values) = self.render_generic()?;
        Ok((rebind(self.dialect, &sql).into_owned(), values))
    }
}
