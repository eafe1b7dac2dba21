use std::borrow::Cow;
use std::fmt::Write;

mod scanner;

pub(crate) use scanner::placeholder_positions;

use crate::types::{BindStyle, Dialect};

/// Rewrite driver-neutral `?` placeholders into the dialect's native syntax.
///
/// `?`-style dialects get the input back unchanged (borrowed). Ordinal dialects get `$1..$N`,
/// named dialects `:arg1..:argN`, numbered left to right. A `?` inside a quoted literal, a
/// comment or a dollar-quoted body is left alone.
///
/// ```rust
/// use sqlkit::prelude::*;
///
/// let sql = rebind(Dialect::Postgres, "SELECT * FROM users WHERE (name = ?) AND (age > ?)");
/// assert_eq!(sql, "SELECT * FROM users WHERE (name = $1) AND (age > $2)");
/// ```
#[must_use]
pub fn rebind(dialect: Dialect, sql: &str) -> Cow<'_, str> {
    rebind_with_style(dialect.bind_style(), sql)
}

/// Same as [`rebind`] but keyed on the placeholder style directly.
#[must_use]
pub fn rebind_with_style(style: BindStyle, sql: &str) -> Cow<'_, str> {
    let prefix = match style {
        BindStyle::Question => return Cow::Borrowed(sql),
        BindStyle::Dollar => "$",
        BindStyle::Named => ":arg",
    };

    let positions = placeholder_positions(sql);
    if positions.is_empty() {
        return Cow::Borrowed(sql);
    }

    // Room for up to two digits per placeholder before reallocating.
    let mut out = String::with_capacity(sql.len() + positions.len() * (prefix.len() + 1));
    let mut last = 0;
    for (ordinal, pos) in (1..).zip(positions) {
        out.push_str(&sql[last..pos]);
        out.push_str(prefix);
        let _ = write!(out, "{ordinal}");
        last = pos + 1;
    }
    out.push_str(&sql[last..]);
    Cow::Owned(out)
}
