use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::driver::{Connector, DriverTransaction, PreparedStatement};
use crate::error::SqlKitError;

#[derive(Clone)]
enum PrepareTarget {
    Connection(Arc<dyn Connector>),
    Transaction(Arc<dyn DriverTransaction>),
}

impl PrepareTarget {
    async fn prepare(&self, sql: &str) -> Result<Arc<dyn PreparedStatement>, SqlKitError> {
        match self {
            PrepareTarget::Connection(conn) => conn.prepare(sql).await,
            PrepareTarget::Transaction(tx) => tx.prepare(sql).await,
        }
    }
}

/// Prepared statements keyed by their final SQL text, scoped to one connection or one
/// physical transaction.
///
/// Hits only take the shared lock. A miss takes the exclusive lock and re-checks before
/// preparing, so concurrent misses on the same text prepare once.
pub struct StatementCache {
    target: PrepareTarget,
    statements: RwLock<HashMap<String, Arc<dyn PreparedStatement>>>,
}

impl StatementCache {
    #[must_use]
    pub fn for_connection(conn: Arc<dyn Connector>) -> Self {
        Self::new(PrepareTarget::Connection(conn))
    }

    #[must_use]
    pub fn for_transaction(tx: Arc<dyn DriverTransaction>) -> Self {
        Self::new(PrepareTarget::Transaction(tx))
    }

    fn new(target: PrepareTarget) -> Self {
        StatementCache {
            target,
            statements: RwLock::new(HashMap::new()),
        }
    }

    /// Cached handle for `sql`, preparing it on first use.
    ///
    /// # Errors
    /// Propagates the driver's prepare error; nothing is cached in that case.
    pub async fn get(&self, sql: &str) -> Result<Arc<dyn PreparedStatement>, SqlKitError> {
        if let Some(stmt) = self.statements.read().await.get(sql) {
            return Ok(Arc::clone(stmt));
        }

        let mut statements = self.statements.write().await;
        if let Some(stmt) = statements.get(sql) {
            return Ok(Arc::clone(stmt));
        }
        let stmt = self.target.prepare(sql).await?;
        statements.insert(sql.to_owned(), Arc::clone(&stmt));
        Ok(stmt)
    }

    /// Close every cached statement and empty the cache.
    ///
    /// All entries are attempted; the last error seen is returned.
    ///
    /// # Errors
    /// The last per-statement close error, if any.
    pub async fn close(&self) -> Result<(), SqlKitError> {
        let drained: Vec<_> = self.statements.write().await.drain().collect();
        let mut result = Ok(());
        for (sql, stmt) in drained {
            if let Err(err) = stmt.close().await {
                tracing::debug!(target: "sqlkit", sql = %sql, error = %err, "closing cached statement failed");
                result = Err(err);
            }
        }
        result
    }

    pub async fn len(&self) -> usize {
        self.statements.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.statements.read().await.is_empty()
    }
}

impl fmt::Debug for StatementCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = match self.target {
            PrepareTarget::Connection(_) => "connection",
            PrepareTarget::Transaction(_) => "transaction",
        };
        f.debug_struct("StatementCache").field("target", &target).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::driver::{ExecOutcome, Preparer};
    use crate::results::ResultSet;
    use crate::types::Value;

    struct Stmt {
        fail_close: bool,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PreparedStatement for Stmt {
        async fn query(&self, _args: &[Value]) -> Result<ResultSet, SqlKitError> {
            Ok(ResultSet::default())
        }

        async fn execute(&self, _args: &[Value]) -> Result<ExecOutcome, SqlKitError> {
            Ok(ExecOutcome::default())
        }

        async fn close(&self) -> Result<(), SqlKitError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                Err(SqlKitError::Driver("close failed".into()))
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct Conn {
        prepared: AtomicUsize,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Preparer for Conn {
        async fn prepare(&self, sql: &str) -> Result<Arc<dyn PreparedStatement>, SqlKitError> {
            if sql == "bad" {
                return Err(SqlKitError::Driver("syntax error".into()));
            }
            self.prepared.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(Arc::new(Stmt {
                fail_close: sql.starts_with("fail"),
                closed: Arc::clone(&self.closed),
            }))
        }
    }

    #[async_trait]
    impl Connector for Conn {
        async fn begin(&self) -> Result<Arc<dyn DriverTransaction>, SqlKitError> {
            Err(SqlKitError::Driver("unsupported".into()))
        }

        async fn ping(&self) -> Result<(), SqlKitError> {
            Ok(())
        }

        async fn close(&self) -> Result<(), SqlKitError> {
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_prepare_once() {
        let conn = Arc::new(Conn::default());
        let cache = Arc::new(StatementCache::for_connection(conn.clone()));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move { cache.get("select 1").await.map(|_| ()) }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(conn.prepared.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn prepare_errors_are_not_cached() {
        let conn = Arc::new(Conn::default());
        let cache = StatementCache::for_connection(conn.clone());
        assert!(cache.get("bad").await.is_err());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn close_attempts_every_entry_and_keeps_an_error() {
        let conn = Arc::new(Conn::default());
        let cache = StatementCache::for_connection(conn.clone());
        for sql in ["a", "fail b", "c", "fail d"] {
            cache.get(sql).await.unwrap();
        }

        let err = cache.close().await.unwrap_err();
        assert!(matches!(err, SqlKitError::Driver(msg) if msg == "close failed"));
        assert_eq!(conn.closed.load(Ordering::SeqCst), 4);
        assert!(cache.is_empty().await);
        cache.close().await.unwrap();
    }
}
