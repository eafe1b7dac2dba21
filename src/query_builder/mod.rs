//! Immutable SQL statement builders.
//!
//! Every builder method borrows the receiver and returns a new value, so a partially built
//! statement can be forked and reused:
//! ```rust
//! use sqlkit::prelude::*;
//!
//! let users = select(["*"]).from("users");
//! let alice = users.where_raw("name = ?", args!["alice"]);
//! let adults = users.where_(gt_eq("age", 18));
//!
//! assert_eq!(users.render().unwrap().0, "SELECT * FROM users");
//! assert_eq!(alice.render().unwrap().0, "SELECT * FROM users WHERE (name = ?)");
//! assert_eq!(adults.render().unwrap().0, "SELECT * FROM users WHERE (age >= ?)");
//! ```

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::error::{SqlKitError, StatementError};
use crate::translation::placeholder_positions;
use crate::types::Value;

mod delete;
mod expr;
mod filter;
mod insert;
mod select;
mod update;

pub use delete::{Delete, delete};
pub use expr::{
    Condition, Operand, Operator, eq, eq_all, eq_any, gt, gt_eq, in_, is, lt, lt_eq, not_eq,
};
pub use filter::Filter;
pub use insert::{Insert, insert};
pub use select::{Join, Select, select};
pub use update::{Update, update};

/// Anything that renders to SQL text plus its positional arguments.
///
/// Rendering is a pure function of the value; argument order follows the left-to-right order
/// of placeholders in the text. Build errors recorded while chaining surface here.
pub trait Sql: Send + Sync {
    /// Produce the SQL text and its bound values.
    ///
    /// # Errors
    /// Returns [`SqlKitError::Statement`] when the statement was built from invalid input.
    fn render(&self) -> Result<(String, Vec<Value>), SqlKitError>;
}

impl<T: Sql + ?Sized> Sql for &T {
    fn render(&self) -> Result<(String, Vec<Value>), SqlKitError> {
        (**self).render()
    }
}

impl<T: Sql + ?Sized> Sql for Arc<T> {
    fn render(&self) -> Result<(String, Vec<Value>), SqlKitError> {
        (**self).render()
    }
}

impl<T: Sql + ?Sized> Sql for Box<T> {
    fn render(&self) -> Result<(String, Vec<Value>), SqlKitError> {
        (**self).render()
    }
}

/// A literal SQL fragment with optional positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Raw {
    sql: Cow<'static, str>,
    args: Vec<Value>,
}

/// `NULL`, for use as an operand such as `is("deleted_at", NULL)`.
pub const NULL: Raw = Raw {
    sql: Cow::Borrowed("NULL"),
    args: Vec::new(),
};

impl Raw {
    #[must_use]
    pub fn new(sql: impl Into<Cow<'static, str>>) -> Self {
        Raw {
            sql: sql.into(),
            args: Vec::new(),
        }
    }

    /// Attach positional arguments for the fragment's `?` placeholders.
    #[must_use]
    pub fn bind(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }
}

impl Sql for Raw {
    fn render(&self) -> Result<(String, Vec<Value>), SqlKitError> {
        expand_lists(self.sql.to_string(), self.args.clone()).map_err(Into::into)
    }
}

impl From<&str> for Raw {
    fn from(sql: &str) -> Self {
        Raw::new(sql.to_owned())
    }
}

impl From<String> for Raw {
    fn from(sql: String) -> Self {
        Raw::new(sql)
    }
}

/// Shorthand for `Raw::new(sql).bind(args)`.
///
/// A sequence argument expands its placeholder into `(?, ?, ...)` when rendered.
#[must_use]
pub fn raw(sql: impl Into<Cow<'static, str>>, args: Vec<Value>) -> Raw {
    Raw::new(sql).bind(args)
}

/// Wraps another node in parentheses.
#[derive(Clone)]
pub struct Parens(Arc<dyn Sql>);

impl Parens {
    pub fn new(inner: impl Sql + 'static) -> Self {
        Parens(Arc::new(inner))
    }
}

impl fmt::Debug for Parens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Parens").field(&debug_sql(&*self.0)).finish()
    }
}

impl Sql for Parens {
    fn render(&self) -> Result<(String, Vec<Value>), SqlKitError> {
        let (sql, values) = self.0.render()?;
        Ok((format!("({sql})"), values))
    }
}

/// Rendered text for `Debug` output of nodes that hold trait objects.
pub(crate) fn debug_sql(node: &dyn Sql) -> String {
    match node.render() {
        Ok((sql, _)) => sql,
        Err(err) => format!("<{err}>"),
    }
}

/// `(?, ?, ?)` with `count` placeholders.
pub(crate) fn questions(count: usize) -> String {
    let mut out = String::with_capacity(count * 3 + 2);
    out.push('(');
    for i in 0..count {
        if i > 0 {
            out.push_str(", ");
        }
        out.push('?');
    }
    out.push(')');
    out
}

/// Sequences only make sense as IN operands; reject them as column values.
pub(crate) fn reject_lists(values: &[Value], clause: &str) -> Result<(), StatementError> {
    match values.iter().position(|v| matches!(v, Value::List(_))) {
        Some(index) => Err(StatementError::invalid(format!(
            "{clause} value at index {index} is a sequence"
        ))),
        None => Ok(()),
    }
}

/// Expand every [`Value::List`] argument into one placeholder per element.
///
/// The list bound at argument index `i` replaces the `i`-th `?` of `sql` with `(?, ?, ...)`
/// and its elements are spliced into the flat value list at the same position.
pub(crate) fn expand_lists(
    sql: String,
    values: Vec<Value>,
) -> Result<(String, Vec<Value>), StatementError> {
    if !values.iter().any(|v| matches!(v, Value::List(_))) {
        return Ok((sql, values));
    }

    let positions = placeholder_positions(&sql);
    let mut out = String::with_capacity(sql.len() + 16);
    let mut flat = Vec::with_capacity(values.len());
    let mut last = 0;

    for (index, value) in values.into_iter().enumerate() {
        let Value::List(items) = value else {
            flat.push(value);
            continue;
        };
        let Some(&pos) = positions.get(index) else {
            return Err(StatementError::PlaceholderNotFound { index });
        };
        if items.is_empty() {
            return Err(StatementError::EmptyList { index });
        }
        out.push_str(&sql[last..pos]);
        out.push_str(&questions(items.len()));
        last = pos + 1;
        flat.extend(items);
    }
    out.push_str(&sql[last..]);

    Ok((out, flat))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;

    #[test]
    fn raw_expands_its_own_sequences() {
        let (sql, values) = raw("id IN ? AND a = ?", args![vec![1, 2], "x"]).render().unwrap();
        assert_eq!(sql, "id IN (?, ?) AND a = ?");
        assert_eq!(values, args![1, 2, "x"]);
    }

    #[test]
    fn raw_renders_verbatim() {
        let (sql, values) = raw("a = ?", args![1]).render().unwrap();
        assert_eq!(sql, "a = ?");
        assert_eq!(values, args![1]);
    }

    #[test]
    fn expands_sequence_in_place() {
        let (sql, values) =
            expand_lists("a = ? and x in ? and b = ?".into(), args!["s", vec![1, 2, 3], 9])
                .unwrap();
        assert_eq!(sql, "a = ? and x in (?, ?, ?) and b = ?");
        assert_eq!(values, args!["s", 1, 2, 3, 9]);
    }

    #[test]
    fn expands_several_sequences() {
        let (sql, values) =
            expand_lists("x in ? and y in ?".into(), args![vec![1, 2], vec!["a"]]).unwrap();
        assert_eq!(sql, "x in (?, ?) and y in (?)");
        assert_eq!(values, args![1, 2, "a"]);
    }

    #[test]
    fn missing_placeholder_is_reported() {
        let err = expand_lists("a = ?".into(), args![1, vec![1, 2]]).unwrap_err();
        assert_eq!(err, StatementError::PlaceholderNotFound { index: 1 });
        assert_eq!(
            err.to_string(),
            "sqlkit: could not find matching placeholder at index 1"
        );
    }

    #[test]
    fn placeholder_at_start_of_text() {
        let (sql, _) = expand_lists("? in (1, 2)".into(), args![vec![5]]).unwrap();
        assert_eq!(sql, "(?) in (1, 2)");
    }

    #[test]
    fn empty_sequence_is_rejected() {
        let err = expand_lists("x in ?".into(), args![Vec::<i64>::new()]).unwrap_err();
        assert_eq!(err, StatementError::EmptyList { index: 0 });
    }

    #[test]
    fn parens_wrap() {
        let (sql, _) = Parens::new(raw("select 1", args![])).render().unwrap();
        assert_eq!(sql, "(select 1)");
    }
}
