use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::driver::{DriverTransaction, PreparedStatement, Preparer};
use crate::error::SqlKitError;

use super::connection::{SharedSqliteConnection, run_blocking};
use super::prepared::SqlitePreparedStatement;

/// Physical `SQLite` transaction opened with `BEGIN`.
pub struct SqliteTransaction {
    conn: SharedSqliteConnection,
    done: Arc<AtomicBool>,
}

impl SqliteTransaction {
    pub(crate) async fn begin(conn: SharedSqliteConnection) -> Result<Self, SqlKitError> {
        run_blocking(Arc::clone(&conn), |c| {
            c.execute_batch("BEGIN")?;
            Ok(())
        })
        .await?;
        Ok(SqliteTransaction {
            conn,
            done: Arc::new(AtomicBool::new(false)),
        })
    }

    async fn finish(&self, sql: &'static str) -> Result<(), SqlKitError> {
        if self.done.swap(true, Ordering::AcqRel) {
            return Err(SqlKitError::TransactionDone);
        }
        run_blocking(Arc::clone(&self.conn), move |c| {
            c.execute_batch(sql)?;
            Ok(())
        })
        .await
    }

    fn ensure_active(&self) -> Result<(), SqlKitError> {
        if self.done.load(Ordering::Acquire) {
            Err(SqlKitError::TransactionDone)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for SqliteTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteTransaction")
            .field("done", &self.done.load(Ordering::Relaxed))
            .finish()
    }
}

#[async_trait]
impl Preparer for SqliteTransaction {
    async fn prepare(&self, sql: &str) -> Result<Arc<dyn PreparedStatement>, SqlKitError> {
        self.ensure_active()?;
        let stmt = SqlitePreparedStatement::prepare(
            Arc::clone(&self.conn),
            sql,
            Some(Arc::clone(&self.done)),
        )
        .await?;
        Ok(Arc::new(stmt))
    }
}

#[async_trait]
impl DriverTransaction for SqliteTransaction {
    async fn execute_batch(&self, sql: &str) -> Result<(), SqlKitError> {
        self.ensure_active()?;
        let sql = sql.to_owned();
        run_blocking(Arc::clone(&self.conn), move |c| {
            c.execute_batch(&sql)?;
            Ok(())
        })
        .await
    }

    async fn commit(&self) -> Result<(), SqlKitError> {
        self.finish("COMMIT").await
    }

    async fn rollback(&self) -> Result<(), SqlKitError> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::warn!(target: "sqlkit", "sqlite transaction dropped while active; rolling back");
        let conn = Arc::clone(&self.conn);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || {
                    let guard = conn.blocking_lock();
                    if let Err(e) = guard.execute_batch("ROLLBACK") {
                        tracing::warn!(target: "sqlkit", error = %e, "rollback on drop failed");
                    }
                });
            }
            Err(_) => {
                if let Ok(guard) = conn.try_lock() {
                    let _ = guard.execute_batch("ROLLBACK");
                }
            }
        }
    }
}
