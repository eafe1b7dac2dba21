use crate::error::{SqlKitError, StatementError};
use crate::translation::rebind;
use crate::types::{Dialect, Value};

use super::expr::Operator;
use super::filter::{Filter, WhereClause};
use super::select::{Join, render_joins};
use super::{Raw, Sql};

/// Start a `DELETE`.
pub fn delete() -> Delete {
    Delete::default()
}

/// Immutable `DELETE FROM t [JOIN ...] [WHERE ...]` builder.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct Delete {
    dialect: Dialect,
    table: String,
    joins: Vec<Join>,
    filter: WhereClause,
}

impl Delete {
    pub fn from(&self, table: &str) -> Self {
        let mut next = self.clone();
        next.table = table.to_owned();
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

    pub fn dialect(&self, dialect: Dialect) -> Self {
        let mut next = self.clone();
        next.dialect = dialect;
        next
    }
}

impl Sql for Delete {
    fn render(&self) -> Result<(String, Vec<Value>), SqlKitError> {
        if self.table.is_empty() {
            return Err(StatementError::invalid("delete requires a table").into());
        }
        let mut sql = format!("DELETE FROM {}", self.table);
        let mut values = Vec::new();
        render_joins(&self.joins, &mut sql, &mut values)?;
        self.filter.render_into(&mut sql, &mut values)?;
        Ok((rebind(self.dialect, &sql).into_owned(), values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::query_builder::{eq, lt};

    #[test]
    fn delete_with_where() {
        let (sql, values) = delete()
            .from("users")
            .where_(eq("id", 1))
            .dialect(Dialect::Postgres)
            .render()
            .unwrap();
        assert_eq!(sql, "DELETE FROM users WHERE (id = $1)");
        assert_eq!(values, args![1]);
    }

    #[test]
    fn delete_everything() {
        assert_eq!(delete().from("t").render().unwrap(), ("DELETE FROM t".into(), args![]));
    }

    #[test]
    fn join_values_precede_where_values() {
        let (sql, values) = delete()
            .from("a")
            .inner_join("b", Raw::new("b.a_id = a.id AND b.kind = ?").bind(args!["x"]))
            .where_(lt("a.created", 5))
            .render()
            .unwrap();
        assert_eq!(
            sql,
            "DELETE FROM a INNER JOIN b ON b.a_id = a.id AND b.kind = ? WHERE (a.created < ?)"
        );
        assert_eq!(values, args!["x", 5]);
    }

    #[test]
    fn missing_table_is_invalid() {
        assert!(delete().where_(eq("a", 1)).render().is_err());
    }
}
