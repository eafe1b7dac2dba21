use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};

use crate::db::{Db, DbOptions};
use crate::driver::{Connector, DriverTransaction, PreparedStatement, Preparer};
use crate::error::SqlKitError;
use crate::types::Dialect;

use super::prepared::PostgresPreparedStatement;
use super::transaction::PostgresTransaction;

/// A single `tokio_postgres` client plus the task driving its connection.
pub struct PostgresConnector {
    client: Arc<Client>,
    driver: JoinHandle<()>,
    closed: AtomicBool,
}

impl PostgresConnector {
    /// Connect with a libpq-style or URL connection string, without TLS.
    ///
    /// # Errors
    /// Returns `ConfigError` for an unparsable string, or the driver error if the connection fails.
    pub async fn connect(conn_str: &str) -> Result<Self, SqlKitError> {
        let config: tokio_postgres::Config = conn_str
            .parse()
            .map_err(|e| SqlKitError::ConfigError(format!("invalid postgres connection string: {e}")))?;
        Self::connect_with(&config).await
    }

    /// # Errors
    /// Returns the driver error if the connection fails.
    pub async fn connect_with(config: &tokio_postgres::Config) -> Result<Self, SqlKitError> {
        let (client, connection) = config.connect(NoTls).await?;
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(target: "sqlkit", error = %e, "postgres connection terminated");
            }
        });
        tracing::debug!(target: "sqlkit", "postgres connection opened");
        Ok(PostgresConnector {
            client: Arc::new(client),
            driver,
            closed: AtomicBool::new(false),
        })
    }

    /// The underlying client, for driver-specific calls.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn ensure_open(&self) -> Result<(), SqlKitError> {
        if self.closed.load(Ordering::Acquire) || self.client.is_closed() {
            Err(SqlKitError::ConnectionError("postgres connection closed".into()))
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for PostgresConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConnector")
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Preparer for PostgresConnector {
    async fn prepare(&self, sql: &str) -> Result<Arc<dyn PreparedStatement>, SqlKitError> {
        self.ensure_open()?;
        let stmt = PostgresPreparedStatement::prepare(Arc::clone(&self.client), sql, None).await?;
        Ok(Arc::new(stmt))
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    async fn begin(&self) -> Result<Arc<dyn DriverTransaction>, SqlKitError> {
        self.ensure_open()?;
        let tx = PostgresTransaction::begin(Arc::clone(&self.client)).await?;
        Ok(Arc::new(tx))
    }

    async fn ping(&self) -> Result<(), SqlKitError> {
        self.ensure_open()?;
        self.client.simple_query("SELECT 1").await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), SqlKitError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.driver.abort();
        }
        Ok(())
    }
}

impl Drop for PostgresConnector {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

impl Db {
    /// Connect to Postgres with the [`Dialect::Postgres`] dialect (unless overridden).
    ///
    /// # Errors
    /// Returns the connection error, or the ping error if the server does not answer in time.
    pub async fn connect_postgres(conn_str: &str, options: DbOptions) -> Result<Self, SqlKitError> {
        let connector = PostgresConnector::connect(conn_str).await?;
        Self::open_with(Arc::new(connector), options, Dialect::Postgres).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_connection_strings_are_config_errors() {
        let err = PostgresConnector::connect("host=localhost port=notaport")
            .await
            .unwrap_err();
        assert!(matches!(err, SqlKitError::ConfigError(_)));
    }
}
