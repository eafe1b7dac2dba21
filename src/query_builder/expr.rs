use std::fmt;
use std::sync::Arc;

use crate::error::{SqlKitError, StatementError};
use crate::types::{Dialect, Value};

use super::select::Select;
use super::{Parens, Raw, Sql, debug_sql};

/// Binary operators used by [`Condition`] nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
    In,
    Eq,
    Ne,
    Is,
    Gt,
    Lt,
    Lte,
    Gte,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::In => "IN",
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Is => "IS",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gte => ">=",
        })
    }
}

/// Right-hand side of a leaf predicate: a bound value or another SQL node.
pub enum Operand {
    Value(Value),
    Sql(Arc<dyn Sql>),
}

impl<T: Into<Value>> From<T> for Operand {
    fn from(value: T) -> Self {
        Operand::Value(value.into())
    }
}

impl From<Raw> for Operand {
    fn from(raw: Raw) -> Self {
        Operand::Sql(Arc::new(raw))
    }
}

impl From<Condition> for Operand {
    fn from(cond: Condition) -> Self {
        Operand::Sql(Arc::new(cond))
    }
}

/// A `Select` operand becomes a parenthesised subquery. It renders with `?` placeholders so
/// the enclosing statement numbers them.
impl From<Select> for Operand {
    fn from(query: Select) -> Self {
        Operand::Sql(Arc::new(Parens::new(query.dialect(Dialect::Generic))))
    }
}

impl Operand {
    fn into_sql(self) -> Arc<dyn Sql> {
        match self {
            Operand::Value(value) => Arc::new(Raw::new("?").bind(vec![value])),
            Operand::Sql(sql) => sql,
        }
    }
}

/// Boolean expression tree for WHERE clauses.
///
/// Leaves render as `(col OP ?)` and combinators as `(left OP right)`, so precedence never
/// depends on nesting depth.
/// ```rust
/// use sqlkit::prelude::*;
///
/// let (sql, values) = eq("a", 1).and(not_eq("b", 2)).or(is("c", NULL)).render().unwrap();
/// assert_eq!(sql, "(((a = ?) AND (b != ?)) OR (c IS NULL))");
/// assert_eq!(values, args![1, 2]);
/// ```
#[derive(Clone)]
pub struct Condition {
    left: Arc<dyn Sql>,
    operator: Operator,
    right: Arc<dyn Sql>,
}

impl Condition {
    pub(crate) fn new(left: Arc<dyn Sql>, operator: Operator, right: Arc<dyn Sql>) -> Self {
        Condition {
            left,
            operator,
            right,
        }
    }

    #[must_use]
    pub fn and(&self, other: Condition) -> Condition {
        Condition::new(Arc::new(self.clone()), Operator::And, Arc::new(other))
    }

    #[must_use]
    pub fn or(&self, other: Condition) -> Condition {
        Condition::new(Arc::new(self.clone()), Operator::Or, Arc::new(other))
    }

    #[must_use]
    pub fn operator(&self) -> Operator {
        self.operator
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Condition").field(&debug_sql(self)).finish()
    }
}

impl Sql for Condition {
    fn render(&self) -> Result<(String, Vec<Value>), SqlKitError> {
        let (left, mut values) = self.left.render()?;
        let (right, right_values) = self.right.render()?;
        if left.is_empty() || right.is_empty() {
            return Err(StatementError::invalid(format!(
                "empty operand for operator {}",
                self.operator
            ))
            .into());
        }
        values.extend(right_values);
        Ok((format!("({left} {} {right})", self.operator), values))
    }
}

fn leaf(operator: Operator, column: &str, operand: Operand) -> Condition {
    Condition::new(
        Arc::new(Raw::new(column.to_owned())),
        operator,
        operand.into_sql(),
    )
}

/// `column = value`
pub fn eq(column: &str, value: impl Into<Operand>) -> Condition {
    leaf(Operator::Eq, column, value.into())
}

/// `column != value`
pub fn not_eq(column: &str, value: impl Into<Operand>) -> Condition {
    leaf(Operator::Ne, column, value.into())
}

/// `column > value`
pub fn gt(column: &str, value: impl Into<Operand>) -> Condition {
    leaf(Operator::Gt, column, value.into())
}

/// `column >= value`
pub fn gt_eq(column: &str, value: impl Into<Operand>) -> Condition {
    leaf(Operator::Gte, column, value.into())
}

/// `column < value`
pub fn lt(column: &str, value: impl Into<Operand>) -> Condition {
    leaf(Operator::Lt, column, value.into())
}

/// `column <= value`
pub fn lt_eq(column: &str, value: impl Into<Operand>) -> Condition {
    leaf(Operator::Lte, column, value.into())
}

/// `column IN value`; a sequence value is expanded when the WHERE clause renders.
pub fn in_(column: &str, value: impl Into<Operand>) -> Condition {
    leaf(Operator::In, column, value.into())
}

/// `column IS value`
pub fn is(column: &str, value: impl Into<Operand>) -> Condition {
    leaf(Operator::Is, column, value.into())
}

/// `(k1 = ?) AND (k2 = ?) ...` over the pairs, sorted by column name.
///
/// Returns `None` for an empty input.
pub fn eq_all<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Option<Condition>
where
    K: AsRef<str>,
    V: Into<Value>,
{
    fold_sorted(pairs, Condition::and)
}

/// `(k1 = ?) OR (k2 = ?) ...` over the pairs, sorted by column name.
///
/// Returns `None` for an empty input.
pub fn eq_any<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Option<Condition>
where
    K: AsRef<str>,
    V: Into<Value>,
{
    fold_sorted(pairs, Condition::or)
}

fn fold_sorted<K, V>(
    pairs: impl IntoIterator<Item = (K, V)>,
    join: fn(&Condition, Condition) -> Condition,
) -> Option<Condition>
where
    K: AsRef<str>,
    V: Into<Value>,
{
    let mut pairs: Vec<(K, V)> = pairs.into_iter().collect();
    pairs.sort_by(|a, b| a.0.as_ref().cmp(b.0.as_ref()));
    pairs.into_iter().fold(None, |acc, (column, value)| {
        let next = eq(column.as_ref(), Operand::Value(value.into()));
        Some(match acc {
            None => next,
            Some(cond) => join(&cond, next),
        })
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::args;
    use crate::query_builder::{NULL, select};

    fn check(cond: &Condition, sql: &str, values: Vec<Value>) {
        let (rendered, bound) = cond.render().unwrap();
        assert_eq!(rendered, sql);
        assert_eq!(bound, values);
    }

    #[test]
    fn leaf_operators() {
        check(&eq("a", "b"), "(a = ?)", args!["b"]);
        check(&not_eq("a", "b"), "(a != ?)", args!["b"]);
        check(&gt("a", "b"), "(a > ?)", args!["b"]);
        check(&gt_eq("a", "b"), "(a >= ?)", args!["b"]);
        check(&lt("a", "b"), "(a < ?)", args!["b"]);
        check(&lt_eq("a", "b"), "(a <= ?)", args!["b"]);
    }

    #[test]
    fn in_keeps_sequence_until_where_renders() {
        check(&in_("col", vec![1, 2]), "(col IN ?)", args![vec![1, 2]]);
    }

    #[test]
    fn is_null_binds_nothing() {
        check(&is("col", NULL), "(col IS NULL)", args![]);
    }

    #[test]
    fn and_or_parenthesise() {
        check(&eq("a", 1).and(not_eq("b", 2)), "((a = ?) AND (b != ?))", args![1, 2]);
        check(&eq("a", 1).or(not_eq("b", 2)), "((a = ?) OR (b != ?))", args![1, 2]);
    }

    #[test]
    fn deep_nesting_keeps_left_to_right_values() {
        let cond = eq("a", 1).and(eq("b", 2).or(eq("c", 3))).and(lt("d", 4));
        check(
            &cond,
            "(((a = ?) AND ((b = ?) OR (c = ?))) AND (d < ?))",
            args![1, 2, 3, 4],
        );
    }

    #[test]
    fn map_helpers_sort_keys() {
        let map: HashMap<&str, i64> = HashMap::from([("y", 2), ("x", 1)]);
        check(&eq_all(map.clone()).unwrap(), "((x = ?) AND (y = ?))", args![1, 2]);
        check(&eq_any(map).unwrap(), "((x = ?) OR (y = ?))", args![1, 2]);
        assert!(eq_all(Vec::<(&str, i64)>::new()).is_none());
    }

    #[test]
    fn subquery_operand_is_parenthesised() {
        let sub = select(["user_id"])
            .from("admins")
            .where_(eq("active", true))
            .dialect(Dialect::Postgres);
        check(
            &in_("id", sub).and(eq("name", "x")),
            "((id IN (SELECT user_id FROM admins WHERE (active = ?))) AND (name = ?))",
            args![true, "x"],
        );
    }

    #[test]
    fn empty_operand_is_invalid() {
        let cond = eq("", 1);
        assert!(matches!(
            cond.render(),
            Err(SqlKitError::Statement(StatementError::Invalid(_)))
        ));
    }
}
