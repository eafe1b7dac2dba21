use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio_postgres::{Client, Statement};

use crate::driver::{ExecOutcome, PreparedStatement};
use crate::error::SqlKitError;
use crate::results::ResultSet;
use crate::types::Value;

use super::params::Params;
use super::query::build_result_set;

/// Server-side prepared statement. The server copy is deallocated when the last handle drops.
pub struct PostgresPreparedStatement {
    client: Arc<Client>,
    stmt: Statement,
    sql: String,
    tx_done: Option<Arc<AtomicBool>>,
}

impl PostgresPreparedStatement {
    pub(crate) async fn prepare(
        client: Arc<Client>,
        sql: &str,
        tx_done: Option<Arc<AtomicBool>>,
    ) -> Result<Self, SqlKitError> {
        let stmt = client.prepare(sql).await?;
        Ok(PostgresPreparedStatement {
            client,
            stmt,
            sql: sql.to_owned(),
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

impl fmt::Debug for PostgresPreparedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresPreparedStatement")
            .field("sql", &self.sql)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PreparedStatement for PostgresPreparedStatement {
    async fn query(&self, args: &[Value]) -> Result<ResultSet, SqlKitError> {
        self.ensure_usable()?;
        let params = Params::convert(args)?;
        let rows = self.client.query(&self.stmt, params.as_refs()).await?;
        build_result_set(&self.stmt, &rows)
    }

    async fn execute(&self, args: &[Value]) -> Result<ExecOutcome, SqlKitError> {
        self.ensure_usable()?;
        let params = Params::convert(args)?;
        let rows_affected = self.client.execute(&self.stmt, params.as_refs()).await?;
        // Postgres has no last-insert id; use RETURNING with `query` instead.
        Ok(ExecOutcome {
            rows_affected,
            last_insert_id: None,
        })
    }

    async fn close(&self) -> Result<(), SqlKitError> {
        Ok(())
    }
}
