use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio_postgres::Client;

use crate::driver::{DriverTransaction, PreparedStatement, Preparer};
use crate::error::SqlKitError;

use super::prepared::PostgresPreparedStatement;

/// Physical transaction on the connector's client, opened with `BEGIN`.
pub struct PostgresTransaction {
    client: Arc<Client>,
    done: Arc<AtomicBool>,
}

impl PostgresTransaction {
    pub(crate) async fn begin(client: Arc<Client>) -> Result<Self, SqlKitError> {
        client.batch_execute("BEGIN").await?;
        Ok(PostgresTransaction {
            client,
            done: Arc::new(AtomicBool::new(false)),
        })
    }

    async fn finish(&self, sql: &str) -> Result<(), SqlKitError> {
        if self.done.swap(true, Ordering::AcqRel) {
            return Err(SqlKitError::TransactionDone);
        }
        self.client.batch_execute(sql).await?;
        Ok(())
    }
}

impl fmt::Debug for PostgresTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresTransaction")
            .field("done", &self.done.load(Ordering::Relaxed))
            .finish()
    }
}

#[async_trait]
impl Preparer for PostgresTransaction {
    async fn prepare(&self, sql: &str) -> Result<Arc<dyn PreparedStatement>, SqlKitError> {
        if self.done.load(Ordering::Acquire) {
            return Err(SqlKitError::TransactionDone);
        }
        let stmt = PostgresPreparedStatement::prepare(
            Arc::clone(&self.client),
            sql,
            Some(Arc::clone(&self.done)),
        )
        .await?;
        Ok(Arc::new(stmt))
    }
}

#[async_trait]
impl DriverTransaction for PostgresTransaction {
    async fn execute_batch(&self, sql: &str) -> Result<(), SqlKitError> {
        if self.done.load(Ordering::Acquire) {
            return Err(SqlKitError::TransactionDone);
        }
        self.client.batch_execute(sql).await?;
        Ok(())
    }

    async fn commit(&self) -> Result<(), SqlKitError> {
        self.finish("COMMIT").await
    }

    async fn rollback(&self) -> Result<(), SqlKitError> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::warn!(target: "sqlkit", "postgres transaction dropped while active; rolling back");
        let client = Arc::clone(&self.client);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = client.batch_execute("ROLLBACK").await {
                    tracing::warn!(target: "sqlkit", error = %e, "rollback on drop failed");
                }
            });
        }
    }
}
