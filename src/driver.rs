//! Driver seam: the operations the engine needs from a database backend.
//!
//! The bundled `sqlite` and `postgres` modules implement these traits; any other backend can
//! be plugged in through [`Db::new`](crate::Db::new).

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SqlKitError;
use crate::results::ResultSet;
use crate::types::Value;

/// Outcome of a statement executed for its side effects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    /// Driver-reported id of the last inserted row, when the backend exposes one.
    pub last_insert_id: Option<i64>,
}

/// A statement prepared against a connection or transaction.
#[async_trait]
pub trait PreparedStatement: Send + Sync {
    /// Run the statement and collect its rows.
    async fn query(&self, args: &[Value]) -> Result<ResultSet, SqlKitError>;

    /// Run the statement for its side effects.
    async fn execute(&self, args: &[Value]) -> Result<ExecOutcome, SqlKitError>;

    /// Release driver resources held by the statement.
    async fn close(&self) -> Result<(), SqlKitError>;
}

/// Anything statements can be prepared against.
#[async_trait]
pub trait Preparer: Send + Sync {
    async fn prepare(&self, sql: &str) -> Result<Arc<dyn PreparedStatement>, SqlKitError>;
}

/// A physical database connection.
#[async_trait]
pub trait Connector: Preparer {
    /// Start a physical transaction.
    async fn begin(&self) -> Result<Arc<dyn DriverTransaction>, SqlKitError>;

    /// Check the connection is usable.
    async fn ping(&self) -> Result<(), SqlKitError>;

    async fn close(&self) -> Result<(), SqlKitError>;
}

/// A physical transaction handle shared by a root transaction and all of its savepoints.
#[async_trait]
pub trait DriverTransaction: Preparer {
    /// Run parameterless SQL inside the transaction (used for savepoint statements).
    async fn execute_batch(&self, sql: &str) -> Result<(), SqlKitError>;

    async fn commit(&self) -> Result<(), SqlKitError>;

    async fn rollback(&self) -> Result<(), SqlKitError>;
}
