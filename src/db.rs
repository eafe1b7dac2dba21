use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::cache::StatementCache;
use crate::driver::Connector;
use crate::encoding::Encoder;
use crate::error::SqlKitError;
use crate::logging::{Logger, NoopLogger};
use crate::query_builder::{Delete, Insert, Raw, Select, Sql, Update};
use crate::results::ResultSet;
use crate::transaction::{Physical, Scope, Transaction, savepoint_name};
use crate::translation::rebind;
use crate::types::Dialect;

const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Options applied when a [`Db`] is created.
///
/// ```rust
/// use sqlkit::prelude::*;
///
/// let options = DbOptions::default()
///     .with_dialect(Dialect::Postgres)
///     .with_logger(TracingLogger)
///     .with_disabled_savepoints();
/// assert_eq!(options.dialect(), Some(Dialect::Postgres));
/// ```
#[derive(Clone)]
pub struct DbOptions {
    logger: Arc<dyn Logger>,
    dialect: Option<Dialect>,
    encoder: Encoder,
    savepoints: bool,
}

impl Default for DbOptions {
    fn default() -> Self {
        DbOptions {
            logger: Arc::new(NoopLogger),
            dialect: None,
            encoder: Encoder::default(),
            savepoints: true,
        }
    }
}

impl DbOptions {
    /// Install a statement logging hook.
    #[must_use]
    pub fn with_logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    /// Override the dialect inferred from the backend.
    #[must_use]
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// Override the row codec.
    #[must_use]
    pub fn with_encoder(mut self, encoder: Encoder) -> Self {
        self.encoder = encoder;
        self
    }

    /// Reject `begin` inside a transaction instead of creating a savepoint.
    #[must_use]
    pub fn with_disabled_savepoints(mut self) -> Self {
        self.savepoints = false;
        self
    }

    #[must_use]
    pub fn dialect(&self) -> Option<Dialect> {
        self.dialect
    }
}

impl fmt::Debug for DbOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbOptions")
            .field("dialect", &self.dialect)
            .field("encoder", &self.encoder)
            .field("savepoints", &self.savepoints)
            .finish_non_exhaustive()
    }
}

/// Result of [`Db::query`] or [`Db::exec`].
#[derive(Debug, Clone)]
pub struct QueryResult {
    rows: Option<ResultSet>,
    rows_affected: u64,
    last_insert_id: Option<i64>,
    encoder: Encoder,
}

impl QueryResult {
    /// Rows of a query; `None` for an `exec` result.
    #[must_use]
    pub fn rows(&self) -> Option<&ResultSet> {
        self.rows.as_ref()
    }

    /// # Errors
    /// [`SqlKitError::NotAQuery`] for an `exec` result.
    pub fn into_rows(self) -> Result<ResultSet, SqlKitError> {
        self.rows.ok_or(SqlKitError::NotAQuery)
    }

    #[must_use]
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    #[must_use]
    pub fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }

    /// Decode the first row with the database's encoder.
    ///
    /// # Errors
    /// [`SqlKitError::NotAQuery`] for an `exec` result, [`CodecError::NoRows`](crate::CodecError::NoRows)
    /// when the query returned nothing, or another codec error.
    pub fn decode_one<T: DeserializeOwned>(&self) -> Result<T, SqlKitError> {
        let rows = self.rows.as_ref().ok_or(SqlKitError::NotAQuery)?;
        Ok(self.encoder.decode_one(rows)?)
    }

    /// Decode every row with the database's encoder.
    ///
    /// # Errors
    /// [`SqlKitError::NotAQuery`] for an `exec` result, or a codec error.
    pub fn decode_all<T: DeserializeOwned>(&self) -> Result<Vec<T>, SqlKitError> {
        let rows = self.rows.as_ref().ok_or(SqlKitError::NotAQuery)?;
        Ok(self.encoder.decode_all(rows)?)
    }
}

struct DbInner {
    connector: Arc<dyn Connector>,
    cache: StatementCache,
    dialect: Dialect,
    logger: Arc<dyn Logger>,
    encoder: Encoder,
    savepoints: bool,
    closed: AtomicBool,
    close_lock: Mutex<()>,
}

/// Execution facade over one connection.
///
/// Cloning is cheap; clones share the connection and its statement cache.
#[derive(Clone)]
pub struct Db {
    inner: Arc<DbInner>,
}

impl Db {
    /// Wrap a connector without contacting the database. The dialect defaults to
    /// [`Dialect::Generic`] unless set in `options`.
    pub fn new<C: Connector + 'static>(connector: C, options: DbOptions) -> Self {
        Self::from_parts(Arc::new(connector), options, Dialect::Generic)
    }

    /// Wrap a connector after checking it answers a ping within five seconds.
    ///
    /// # Errors
    /// [`SqlKitError::ConnectionError`] on timeout, or the driver's ping error.
    pub async fn connect<C: Connector + 'static>(
        connector: C,
        options: DbOptions,
    ) -> Result<Self, SqlKitError> {
        Self::open_with(Arc::new(connector), options, Dialect::Generic).await
    }

    pub(crate) async fn open_with(
        connector: Arc<dyn Connector>,
        options: DbOptions,
        inferred: Dialect,
    ) -> Result<Self, SqlKitError> {
        tokio::time::timeout(PING_TIMEOUT, connector.ping())
            .await
            .map_err(|_| {
                SqlKitError::ConnectionError(format!("ping timed out after {PING_TIMEOUT:?}"))
            })??;
        Ok(Self::from_parts(connector, options, inferred))
    }

    fn from_parts(connector: Arc<dyn Connector>, options: DbOptions, inferred: Dialect) -> Self {
        let dialect = options.dialect.unwrap_or(inferred);
        tracing::debug!(target: "sqlkit", ?dialect, savepoints = options.savepoints, "database opened");
        Db {
            inner: Arc::new(DbInner {
                cache: StatementCache::for_connection(Arc::clone(&connector)),
                connector,
                dialect,
                logger: options.logger,
                encoder: options.encoder,
                savepoints: options.savepoints,
                closed: AtomicBool::new(false),
                close_lock: Mutex::new(()),
            }),
        }
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.inner.dialect
    }

    #[must_use]
    pub fn encoder(&self) -> Encoder {
        self.inner.encoder
    }

    /// Statement cache of the connection (transactions have their own).
    #[must_use]
    pub fn cache(&self) -> &StatementCache {
        &self.inner.cache
    }

    /// `SELECT` builder bound to this database's dialect.
    pub fn select<I, S>(&self, columns: I) -> Select
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        crate::query_builder::select(columns).dialect(self.inner.dialect)
    }

    /// `INSERT` builder bound to this database's dialect and encoder.
    pub fn insert(&self) -> Insert {
        crate::query_builder::insert()
            .dialect(self.inner.dialect)
            .encoder(self.inner.encoder)
    }

    /// `UPDATE` builder bound to this database's dialect and encoder.
    pub fn update(&self, table: &str) -> Update {
        crate::query_builder::update(table)
            .dialect(self.inner.dialect)
            .encoder(self.inner.encoder)
    }

    /// `DELETE` builder bound to this database's dialect.
    pub fn delete(&self) -> Delete {
        crate::query_builder::delete().dialect(self.inner.dialect)
    }

    /// Run a statement that returns rows.
    ///
    /// The statement is rendered once and its `?` placeholders are rebound to the database's
    /// dialect; sequence arguments were already expanded by the statement itself. The prepared handle comes from the scope's
    /// transaction cache, or the connection cache outside a transaction. The logger sees the
    /// statement once, whether or not it succeeded.
    ///
    /// # Errors
    /// Render errors, [`SqlKitError::Cancelled`] if the scope was cancelled,
    /// [`SqlKitError::TransactionDone`] if the scope's transaction already finished, or the
    /// driver's error.
    pub async fn query<S: Sql + ?Sized>(
        &self,
        scope: impl Into<Scope>,
        stmt: &S,
    ) -> Result<QueryResult, SqlKitError> {
        let result = self.run(&scope.into(), stmt, true).await;
        self.inner.logger.log(&stmt);
        result
    }

    /// Run a statement for its side effects.
    ///
    /// # Errors
    /// As [`Db::query`].
    pub async fn exec<S: Sql + ?Sized>(
        &self,
        scope: impl Into<Scope>,
        stmt: &S,
    ) -> Result<QueryResult, SqlKitError> {
        let result = self.run(&scope.into(), stmt, false).await;
        self.inner.logger.log(&stmt);
        result
    }

    async fn run<S: Sql + ?Sized>(
        &self,
        scope: &Scope,
        stmt: &S,
        is_query: bool,
    ) -> Result<QueryResult, SqlKitError> {
        let (sql, args) = stmt.render()?;
        let sql = rebind(self.inner.dialect, &sql);

        self.ensure_open()?;
        if scope.is_cancelled() {
            return Err(SqlKitError::Cancelled);
        }
        let cache = match scope.transaction() {
            Some(tx) if tx.is_done() => return Err(SqlKitError::TransactionDone),
            Some(tx) => tx.cache(),
            None => &self.inner.cache,
        };

        let prepared = cache.get(&sql).await?;
        let encoder = self.inner.encoder;
        if is_query {
            let rows = prepared.query(&args).await?;
            Ok(QueryResult {
                rows: Some(rows),
                rows_affected: 0,
                last_insert_id: None,
                encoder,
            })
        } else {
            let outcome = prepared.execute(&args).await?;
            Ok(QueryResult {
                rows: None,
                rows_affected: outcome.rows_affected,
                last_insert_id: outcome.last_insert_id,
                encoder,
            })
        }
    }

    /// Begin a transaction.
    ///
    /// From a scope without a transaction this starts a physical transaction (`BEGIN`) with a
    /// fresh statement cache. From a scope holding an active transaction it creates a
    /// savepoint on the same physical transaction, sharing its cache. When the scope carries a
    /// cancellation token, the transaction rolls back once if the token fires first.
    ///
    /// # Errors
    /// [`SqlKitError::NestedTransactionsDisabled`] when nesting is turned off,
    /// [`SqlKitError::TransactionDone`] when the parent already finished,
    /// [`SqlKitError::Cancelled`] when the scope was already cancelled, or the driver's error.
    pub async fn begin(&self, scope: impl Into<Scope>) -> Result<Transaction, SqlKitError> {
        let scope = scope.into();
        self.ensure_open()?;
        if scope.is_cancelled() {
            return Err(SqlKitError::Cancelled);
        }
        let cancel = scope.cancellation().cloned();
        let inner = &self.inner;

        if let Some(parent) = scope.transaction() {
            if !inner.savepoints {
                return Err(SqlKitError::NestedTransactionsDisabled);
            }
            if parent.is_done() {
                return Err(SqlKitError::TransactionDone);
            }
            let name = savepoint_name();
            let sql = inner.dialect.savepoint(&name);
            let physical = Arc::clone(parent.physical());
            let result = physical.driver.execute_batch(&sql).await;
            inner.logger.log(&Raw::new(sql));
            result?;
            return Ok(Transaction::start(
                physical,
                Some(name),
                cancel,
                inner.dialect,
                Arc::clone(&inner.logger),
            ));
        }

        let result = inner.connector.begin().await;
        inner.logger.log(&Raw::new("BEGIN"));
        let driver = result?;
        let physical = Arc::new(Physical {
            cache: StatementCache::for_transaction(Arc::clone(&driver)),
            driver,
        });
        Ok(Transaction::start(
            physical,
            None,
            cancel,
            inner.dialect,
            Arc::clone(&inner.logger),
        ))
    }

    /// Run `work` inside a transaction begun from `scope`.
    ///
    /// Commits when `work` succeeds. When it fails the transaction is rolled back and the
    /// original error returned; if the rollback fails too, both come back in
    /// [`SqlKitError::Rollback`].
    ///
    /// ```rust,no_run
    /// # async fn demo(db: sqlkit::Db) -> Result<(), sqlkit::SqlKitError> {
    /// use sqlkit::prelude::*;
    ///
    /// let id: i64 = db
    ///     .transact(Scope::background(), |tx| {
    ///         let db = db.clone();
    ///         async move {
    ///             db.exec(&tx, &db.insert().into("users").value("name", "alice")).await?;
    ///             db.query(&tx, &db.select(["max(id)"]).from("users")).await?.decode_one()
    ///         }
    ///     })
    ///     .await?;
    /// # let _ = id;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// Begin and commit errors, or the error returned by `work`.
    pub async fn transact<T, F, Fut>(&self, scope: impl Into<Scope>, work: F) -> Result<T, SqlKitError>
    where
        F: FnOnce(Transaction) -> Fut,
        Fut: Future<Output = Result<T, SqlKitError>>,
    {
        let tx = self.begin(scope).await?;
        match work(tx.clone()).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => match tx.rollback().await {
                Ok(()) => Err(err),
                Err(rollback) => Err(SqlKitError::Rollback {
                    source: Box::new(err),
                    rollback: Box::new(rollback),
                }),
            },
        }
    }

    /// Check the connection is usable.
    ///
    /// # Errors
    /// The driver's ping error.
    pub async fn ping(&self) -> Result<(), SqlKitError> {
        self.ensure_open()?;
        self.inner.connector.ping().await
    }

    /// Close cached statements and then the connection, once.
    ///
    /// Every close is attempted; the last error is returned. Later calls return `Ok(())`.
    ///
    /// # Errors
    /// The last statement or connection close error.
    pub async fn close(&self) -> Result<(), SqlKitError> {
        let _guard = self.inner.close_lock.lock().await;
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut result = self.inner.cache.close().await;
        if let Err(err) = self.inner.connector.close().await {
            result = Err(err);
        }
        result
    }

    fn ensure_open(&self) -> Result<(), SqlKitError> {
        if self.inner.closed.load(Ordering::Acquire) {
            Err(SqlKitError::ConnectionError("database is closed".into()))
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("dialect", &self.inner.dialect)
            .field("savepoints", &self.inner.savepoints)
            .field("closed", &self.inner.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
