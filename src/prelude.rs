//! Convenient imports for common functionality.
//!
//! This module re-exports the builders, condition constructors and the types most calls
//! touch, so `use sqlkit::prelude::*;` is enough to get started.

pub use crate::args;
pub use crate::db::{Db, DbOptions, QueryResult};
pub use crate::encoding::{Encoder, FieldMapper, NameConvention};
pub use crate::error::{CodecError, SqlKitError, StatementError};
pub use crate::logging::{Logger, NoopLogger, TracingLogger};
pub use crate::query_builder::{
    Condition, Delete, Filter, Insert, NULL, Operand, Operator, Parens, Raw, Select, Sql, Update,
    delete, eq, eq_all, eq_any, gt, gt_eq, in_, insert, is, lt, lt_eq, not_eq, raw, select,
    update,
};
pub use crate::results::{ResultSet, Row};
pub use crate::transaction::{Scope, Transaction, TxState};
pub use crate::translation::rebind;
pub use crate::types::{BindStyle, Dialect, Value};

pub use tokio_util::sync::CancellationToken;

#[cfg(feature = "postgres")]
pub use crate::postgres::PostgresConnector;
#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteConnector, SqliteOptions};
