use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::spawn_blocking;

use crate::db::{Db, DbOptions};
use crate::driver::{Connector, DriverTransaction, PreparedStatement, Preparer};
use crate::error::SqlKitError;
use crate::types::Dialect;

use super::config::SqliteOptions;
use super::prepared::SqlitePreparedStatement;
use super::transaction::SqliteTransaction;

pub(crate) type SharedSqliteConnection = Arc<Mutex<rusqlite::Connection>>;

/// A single `SQLite` connection driven from async code through blocking tasks.
pub struct SqliteConnector {
    conn: SharedSqliteConnection,
    path: String,
    closed: AtomicBool,
}

impl SqliteConnector {
    /// Open (or create) a database file with default options.
    ///
    /// # Errors
    /// Returns the rusqlite error if the file cannot be opened or configured.
    pub async fn open(path: impl Into<String>) -> Result<Self, SqlKitError> {
        Self::open_with(SqliteOptions::new(path)).await
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns the rusqlite error if the database cannot be created.
    pub async fn open_in_memory() -> Result<Self, SqlKitError> {
        Self::open_with(SqliteOptions::in_memory()).await
    }

    /// # Errors
    /// Returns the rusqlite error if the database cannot be opened or configured.
    pub async fn open_with(options: SqliteOptions) -> Result<Self, SqlKitError> {
        let path = options.db_path.clone();
        let conn = spawn_blocking(move || -> Result<rusqlite::Connection, SqlKitError> {
            let conn = if options.is_memory() {
                rusqlite::Connection::open_in_memory()?
            } else {
                rusqlite::Connection::open(&options.db_path)?
            };
            conn.busy_timeout(options.busy_timeout)?;
            conn.set_prepared_statement_cache_capacity(options.statement_cache_capacity);
            if options.wal && !options.is_memory() {
                conn.pragma_update(None, "journal_mode", "WAL")?;
            }
            Ok(conn)
        })
        .await??;
        tracing::debug!(target: "sqlkit", path = %path, "sqlite connection opened");
        Ok(Self::from_connection_at(conn, path))
    }

    /// Wrap an already configured rusqlite connection.
    #[must_use]
    pub fn from_connection(conn: rusqlite::Connection) -> Self {
        let path = conn.path().unwrap_or(":memory:").to_owned();
        Self::from_connection_at(conn, path)
    }

    fn from_connection_at(conn: rusqlite::Connection, path: String) -> Self {
        SqliteConnector {
            conn: Arc::new(Mutex::new(conn)),
            path,
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Run synchronous rusqlite logic against the connection.
    ///
    /// # Errors
    /// Whatever `func` returns, or a join error if the blocking task panicked.
    pub async fn with_connection<F, R>(&self, func: F) -> Result<R, SqlKitError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlKitError> + Send + 'static,
        R: Send + 'static,
    {
        self.ensure_open()?;
        run_blocking(Arc::clone(&self.conn), func).await
    }

    fn ensure_open(&self) -> Result<(), SqlKitError> {
        if self.closed.load(Ordering::Acquire) {
            Err(SqlKitError::ConnectionError("sqlite connection closed".into()))
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for SqliteConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnector")
            .field("path", &self.path)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

#[async_trait]
impl Preparer for SqliteConnector {
    async fn prepare(&self, sql: &str) -> Result<Arc<dyn PreparedStatement>, SqlKitError> {
        self.ensure_open()?;
        let stmt = SqlitePreparedStatement::prepare(Arc::clone(&self.conn), sql, None).await?;
        Ok(Arc::new(stmt))
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    async fn begin(&self) -> Result<Arc<dyn DriverTransaction>, SqlKitError> {
        self.ensure_open()?;
        let tx = SqliteTransaction::begin(Arc::clone(&self.conn)).await?;
        Ok(Arc::new(tx))
    }

    async fn ping(&self) -> Result<(), SqlKitError> {
        self.with_connection(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }

    async fn close(&self) -> Result<(), SqlKitError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        run_blocking(Arc::clone(&self.conn), |conn| {
            conn.flush_prepared_statement_cache();
            Ok(())
        })
        .await
    }
}

impl Db {
    /// Open a `SQLite` database file with the [`Dialect::Sqlite`] dialect (unless overridden).
    ///
    /// # Errors
    /// Returns the open error, or the ping error if the connection is not usable.
    pub async fn open_sqlite(path: impl Into<String>, options: DbOptions) -> Result<Self, SqlKitError> {
        Self::open_sqlite_with(SqliteOptions::new(path), options).await
    }

    /// Same as [`Db::open_sqlite`] with explicit connection options.
    ///
    /// # Errors
    /// Returns the open error, or the ping error if the connection is not usable.
    pub async fn open_sqlite_with(
        sqlite: SqliteOptions,
        options: DbOptions,
    ) -> Result<Self, SqlKitError> {
        let connector = SqliteConnector::open_with(sqlite).await?;
        Self::open_with(Arc::new(connector), options, Dialect::Sqlite).await
    }
}

pub(crate) async fn run_blocking<F, R>(
    conn: SharedSqliteConnection,
    func: F,
) -> Result<R, SqlKitError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlKitError> + Send + 'static,
    R: Send + 'static,
{
    spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| SqlKitError::ExecutionError(format!("sqlite spawn_blocking join error: {e}")))?
}
