use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::driver::{ExecOutcome, PreparedStatement};
use crate::error::SqlKitError;
use crate::results::ResultSet;
use crate::types::Value;

use super::connection::{SharedSqliteConnection, run_blocking};
use super::params::Params;
use super::query::build_result_set;

/// Handle to a statement compiled once into rusqlite's per-connection cache.
///
/// Each run re-fetches the compiled statement through `prepare_cached`, so the handle itself
/// is cheap to keep around and holds no borrow of the connection.
pub struct SqlitePreparedStatement {
    conn: SharedSqliteConnection,
    sql: Arc<String>,
    is_insert: bool,
    // Set when the owning transaction finished.
    tx_done: Option<Arc<AtomicBool>>,
}

impl SqlitePreparedStatement {
    pub(crate) async fn prepare(
        conn: SharedSqliteConnection,
        sql: &str,
        tx_done: Option<Arc<AtomicBool>>,
    ) -> Result<Self, SqlKitError> {
        let sql = Arc::new(sql.to_owned());
        let sql_for_cache = Arc::clone(&sql);
        run_blocking(Arc::clone(&conn), move |c| {
            let _ = c.prepare_cached(&sql_for_cache)?;
            Ok(())
        })
        .await?;

        let is_insert = sql
            .trim_start()
            .get(..6)
            .is_some_and(|head| head.eq_ignore_ascii_case("insert"));
        Ok(SqlitePreparedStatement {
            conn,
            sql,
            is_insert,
            tx_done,
        })
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    fn ensure_usable(&self) -> Result<(), SqlKitError> {
        match &self.tx_done {
            Some(done) if done.load(Ordering::Acquire) => Err(SqlKitError::TransactionDone),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for SqlitePreparedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlitePreparedStatement")
            .field("sql", &self.sql)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PreparedStatement for SqlitePreparedStatement {
    async fn query(&self, args: &[Value]) -> Result<ResultSet, SqlKitError> {
        self.ensure_usable()?;
        let params = Params::convert(args)?;
        let sql = Arc::clone(&self.sql);
        run_blocking(Arc::clone(&self.conn), move |c| {
            let mut stmt = c.prepare_cached(&sql)?;
            build_result_set(&mut stmt, &params)
        })
        .await
    }

    async fn execute(&self, args: &[Value]) -> Result<ExecOutcome, SqlKitError> {
        self.ensure_usable()?;
        let params = Params::convert(args)?;
        let sql = Arc::clone(&self.sql);
        let is_insert = self.is_insert;
        run_blocking(Arc::clone(&self.conn), move |c| {
            let affected = {
                let mut stmt = c.prepare_cached(&sql)?;
                stmt.execute(&params.as_refs()[..])?
            };
            Ok(ExecOutcome {
                rows_affected: affected as u64,
                last_insert_id: is_insert.then(|| c.last_insert_rowid()),
            })
        })
        .await
    }

    async fn close(&self) -> Result<(), SqlKitError> {
        let sql = Arc::clone(&self.sql);
        run_blocking(Arc::clone(&self.conn), move |c| {
            // A statement that no longer compiles has nothing cached to finalize.
            if let Ok(stmt) = c.prepare_cached(&sql) {
                stmt.discard();
            }
            Ok(())
        })
        .await
    }
}
