//! SQL access layer: immutable statement builders, dialect-aware placeholder rebinding,
//! prepared-statement caching, nested transactions over savepoints and a serde row codec.
//!
//! ```rust
//! use sqlkit::prelude::*;
//!
//! let stmt = select(["*"])
//!     .from("users")
//!     .where_(eq("name", "alice"))
//!     .dialect(Dialect::Postgres);
//! let (sql, args) = stmt.render().unwrap();
//! assert_eq!(sql, "SELECT * FROM users WHERE (name = $1)");
//! assert_eq!(args, vec![Value::Text("alice".into())]);
//! ```
//!
//! Backends implement the [`driver`] traits; `rusqlite` and `tokio-postgres` backends ship
//! behind the `sqlite` and `postgres` features.

pub mod cache;
pub mod db;
pub mod driver;
pub mod encoding;
pub mod error;
pub mod logging;
pub mod migrate;
pub mod prelude;
pub mod query_builder;
pub mod results;
pub mod transaction;
pub mod translation;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use cache::StatementCache;
pub use db::{Db, DbOptions, QueryResult};
pub use driver::{Connector, DriverTransaction, ExecOutcome, PreparedStatement, Preparer};
pub use encoding::{Encoder, FieldMapper, NameConvention};
pub use error::{CodecError, SqlKitError, StatementError};
pub use logging::{Logger, NoopLogger, TracingLogger};
pub use migrate::{Direction, Migrator};
pub use query_builder::Sql;
pub use results::{ResultSet, Row};
pub use transaction::{Scope, Transaction, TxState};
pub use translation::rebind;
pub use types::{BindStyle, Dialect, Value};

#[cfg(feature = "postgres")]
pub use postgres::PostgresConnector;
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteConnector, SqliteOptions};
