use std::sync::Arc;

use crate::error::SqlKitError;
use crate::types::Value;

use super::expr::{Condition, Operator};
use super::{Raw, Sql, expand_lists};

/// A single WHERE filter: either a raw fragment or a [`Condition`] tree.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Rendered inside parentheses so it composes with neighbouring filters.
    Fragment(Raw),
    Condition(Condition),
}

impl From<Raw> for Filter {
    fn from(raw: Raw) -> Self {
        Filter::Fragment(raw)
    }
}

impl From<Condition> for Filter {
    fn from(cond: Condition) -> Self {
        Filter::Condition(cond)
    }
}

impl From<&str> for Filter {
    fn from(sql: &str) -> Self {
        Filter::Fragment(Raw::new(sql.to_owned()))
    }
}

impl From<String> for Filter {
    fn from(sql: String) -> Self {
        Filter::Fragment(Raw::new(sql))
    }
}

impl Sql for Filter {
    fn render(&self) -> Result<(String, Vec<Value>), SqlKitError> {
        match self {
            Filter::Fragment(raw) => Ok((format!("({})", raw.sql()), raw.args().to_vec())),
            Filter::Condition(cond) => cond.render(),
        }
    }
}

/// Accumulated WHERE predicate shared by the SELECT/UPDATE/DELETE builders.
///
/// The first filter becomes the root; each later one is combined with the root under AND or OR.
#[derive(Clone, Default)]
pub(crate) struct WhereClause {
    root: Option<Arc<dyn Sql>>,
}

impl WhereClause {
    pub(crate) fn push(&self, operator: Operator, filter: Filter) -> Self {
        let filter: Arc<dyn Sql> = Arc::new(filter);
        let root = match &self.root {
            None => filter,
            Some(root) => Arc::new(Condition::new(Arc::clone(root), operator, filter)),
        };
        WhereClause { root: Some(root) }
    }

    /// ` WHERE <predicate>` with sequence arguments expanded, or nothing when no filter was set.
    pub(crate) fn render_into(
        &self,
        sql: &mut String,
        values: &mut Vec<Value>,
    ) -> Result<(), SqlKitError> {
        let Some(root) = &self.root else {
            return Ok(());
        };
        let (text, args) = root.render()?;
        let (text, args) = expand_lists(text, args)?;
        sql.push_str(" WHERE ");
        sql.push_str(&text);
        values.extend(args);
        Ok(())
    }
}

impl std::fmt::Debug for WhereClause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.root {
            None => f.write_str("WhereClause(None)"),
            Some(root) => f
                .debug_tuple("WhereClause")
                .field(&super::debug_sql(&**root))
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::query_builder::{eq, in_, raw};

    fn render(clause: &WhereClause) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut values = Vec::new();
        clause.render_into(&mut sql, &mut values).unwrap();
        (sql, values)
    }

    #[test]
    fn empty_clause_renders_nothing() {
        assert_eq!(render(&WhereClause::default()), (String::new(), vec![]));
    }

    #[test]
    fn raw_fragments_are_wrapped() {
        let clause = WhereClause::default().push(Operator::And, raw("name = ?", args!["a"]).into());
        assert_eq!(render(&clause), (" WHERE (name = ?)".into(), args!["a"]));
    }

    #[test]
    fn later_filters_combine_with_root() {
        let clause = WhereClause::default()
            .push(Operator::And, eq("a", 1).into())
            .push(Operator::And, "b IS NULL".into())
            .push(Operator::Or, eq("c", 3).into());
        assert_eq!(
            render(&clause),
            (
                " WHERE (((a = ?) AND (b IS NULL)) OR (c = ?))".into(),
                args![1, 3]
            )
        );
    }

    #[test]
    fn sequences_expand_on_render() {
        let clause = WhereClause::default()
            .push(Operator::And, in_("id", vec![1, 2, 3]).into())
            .push(Operator::And, eq("name", "x").into());
        assert_eq!(
            render(&clause),
            (
                " WHERE ((id IN (?, ?, ?)) AND (name = ?))".into(),
                args![1, 2, 3, "x"]
            )
        );
    }
}
