//! Transactions, savepoints and execution scopes.
//!
//! A [`Scope`] is passed explicitly to every [`Db`](crate::Db) call. It optionally carries a
//! [`Transaction`] (statements are routed to that transaction) and a cancellation token.
//! Beginning a transaction from a scope that already holds one creates a savepoint on the
//! same physical transaction.

use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;

use crate::cache::StatementCache;
use crate::driver::DriverTransaction;
use crate::error::SqlKitError;
use crate::logging::Logger;
use crate::query_builder::Raw;
use crate::types::Dialect;

const ACTIVE: u8 = 0;
const COMMITTED: u8 = 1;
const ROLLED_BACK: u8 = 2;

static SAVEPOINT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Terminal state of a [`Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Active,
    Committed,
    RolledBack,
}

/// Execution scope for a call: where statements go and when to give up.
#[derive(Clone, Default)]
pub struct Scope {
    cancel: Option<CancellationToken>,
    tx: Option<Transaction>,
}

impl Scope {
    /// No transaction, no cancellation.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// No transaction; transactions begun from this scope roll back when `token` fires.
    #[must_use]
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Scope {
            cancel: Some(token),
            tx: None,
        }
    }

    /// Replace the cancellation token, keeping the transaction.
    #[must_use]
    pub fn cancelled_by(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    #[must_use]
    pub fn transaction(&self) -> Option<&Transaction> {
        self.tx.as_ref()
    }

    #[must_use]
    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

impl From<&Transaction> for Scope {
    fn from(tx: &Transaction) -> Self {
        Scope {
            cancel: tx.inner.cancel.clone(),
            tx: Some(tx.clone()),
        }
    }
}

impl From<Transaction> for Scope {
    fn from(tx: Transaction) -> Self {
        Scope::from(&tx)
    }
}

impl From<&Scope> for Scope {
    fn from(scope: &Scope) -> Self {
        scope.clone()
    }
}

impl From<CancellationToken> for Scope {
    fn from(token: CancellationToken) -> Self {
        Scope::with_cancellation(token)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("cancelled", &self.is_cancelled())
            .field("tx", &self.tx)
            .finish()
    }
}

/// Physical transaction state shared by a root transaction and its savepoints.
pub(crate) struct Physical {
    pub(crate) driver: Arc<dyn DriverTransaction>,
    pub(crate) cache: StatementCache,
}

struct TxInner {
    physical: Arc<Physical>,
    savepoint: Option<String>,
    state: AtomicU8,
    cancel: Option<CancellationToken>,
    // Fired on completion or drop; stops the cancellation observer.
    finished: CancellationToken,
    dialect: Dialect,
    logger: Arc<dyn Logger>,
}

impl Drop for TxInner {
    fn drop(&mut self) {
        self.finished.cancel();
        if self.state.load(Ordering::Acquire) == ACTIVE {
            tracing::warn!(
                target: "sqlkit",
                savepoint = ?self.savepoint,
                "transaction dropped without commit or rollback"
            );
        }
    }
}

/// A root transaction or a savepoint inside one.
///
/// Cloning is cheap and clones share state. Once committed or rolled back, further
/// `commit`/`rollback` calls return `Ok(())` without touching the database.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<TxInner>,
}

impl Transaction {
    pub(crate) fn start(
        physical: Arc<Physical>,
        savepoint: Option<String>,
        cancel: Option<CancellationToken>,
        dialect: Dialect,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let tx = Transaction {
            inner: Arc::new(TxInner {
                physical,
                savepoint,
                state: AtomicU8::new(ACTIVE),
                cancel,
                finished: CancellationToken::new(),
                dialect,
                logger,
            }),
        };
        if let Some(token) = tx.inner.cancel.clone() {
            spawn_observer(Arc::downgrade(&tx.inner), token, tx.inner.finished.clone());
        }
        tx
    }

    pub(crate) fn physical(&self) -> &Arc<Physical> {
        &self.inner.physical
    }

    pub(crate) fn cache(&self) -> &StatementCache {
        &self.inner.physical.cache
    }

    /// Savepoint name for nested transactions, `None` for a root transaction.
    #[must_use]
    pub fn savepoint_name(&self) -> Option<&str> {
        self.inner.savepoint.as_deref()
    }

    #[must_use]
    pub fn state(&self) -> TxState {
        match self.inner.state.load(Ordering::Acquire) {
            ACTIVE => TxState::Active,
            COMMITTED => TxState::Committed,
            _ => TxState::RolledBack,
        }
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state() != TxState::Active
    }

    /// Run parameterless, possibly multi-statement SQL (such as a migration script) inside
    /// the transaction, bypassing the statement cache.
    ///
    /// # Errors
    /// [`SqlKitError::TransactionDone`], [`SqlKitError::Cancelled`], or the driver's error.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), SqlKitError> {
        if self.is_done() {
            return Err(SqlKitError::TransactionDone);
        }
        if self.inner.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(SqlKitError::Cancelled);
        }
        let result = self.inner.physical.driver.execute_batch(sql).await;
        self.inner.logger.log(&Raw::new(sql.to_owned()));
        result
    }

    /// Commit the transaction, or release its savepoint.
    ///
    /// # Errors
    /// [`SqlKitError::Cancelled`] if the scope's token fired first (nothing is sent to the
    /// database); otherwise the driver's error.
    pub async fn commit(&self) -> Result<(), SqlKitError> {
        let inner = &self.inner;
        if self.state() == TxState::Committed {
            return Ok(());
        }
        if inner.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(SqlKitError::Cancelled);
        }
        if !self.finish(COMMITTED) {
            // The cancellation observer may have rolled back after the check above.
            let cancelled = inner.cancel.as_ref().is_some_and(CancellationToken::is_cancelled);
            if cancelled && self.state() == TxState::RolledBack {
                return Err(SqlKitError::Cancelled);
            }
            return Ok(());
        }

        let physical = &inner.physical;
        let (sql, result) = match &inner.savepoint {
            Some(name) => {
                let sql = inner.dialect.release_savepoint(name);
                let result = physical.driver.execute_batch(&sql).await;
                (sql, result)
            }
            None => {
                let result = physical.driver.commit().await;
                ("COMMIT".to_owned(), result)
            }
        };
        inner.logger.log(&Raw::new(sql));
        if inner.savepoint.is_none() {
            release_cache(physical).await;
        }
        result
    }

    /// Roll back the transaction, or roll back to its savepoint.
    ///
    /// # Errors
    /// The driver's error.
    pub async fn rollback(&self) -> Result<(), SqlKitError> {
        if !self.finish(ROLLED_BACK) {
            return Ok(());
        }

        let inner = &self.inner;
        let physical = &inner.physical;
        let (sql, result) = match &inner.savepoint {
            Some(name) => {
                let sql = inner.dialect.rollback_to_savepoint(name);
                let result = physical.driver.execute_batch(&sql).await;
                (sql, result)
            }
            None => {
                let result = physical.driver.rollback().await;
                ("ROLLBACK".to_owned(), result)
            }
        };
        inner.logger.log(&Raw::new(sql));
        if inner.savepoint.is_none() {
            release_cache(physical).await;
        }
        result
    }

    /// Move from active to `terminal`; false if another call got there first.
    fn finish(&self, terminal: u8) -> bool {
        let won = self
            .inner
            .state
            .compare_exchange(ACTIVE, terminal, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.inner.finished.cancel();
        }
        won
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("savepoint", &self.inner.savepoint)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

async fn release_cache(physical: &Physical) {
    if let Err(err) = physical.cache.close().await {
        tracing::debug!(target: "sqlkit", error = %err, "closing transaction statements failed");
    }
}

/// Roll back once when `token` fires, unless the transaction finishes or is dropped first.
fn spawn_observer(tx: Weak<TxInner>, token: CancellationToken, finished: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            biased;
            () = finished.cancelled() => {}
            () = token.cancelled() => {
                let Some(inner) = tx.upgrade() else {
                    return;
                };
                let tx = Transaction { inner };
                if let Err(err) = tx.rollback().await {
                    tracing::warn!(
                        target: "sqlkit",
                        savepoint = ?tx.savepoint_name(),
                        error = %err,
                        "rollback after cancellation failed"
                    );
                }
            }
        }
    });
}

/// Unique savepoint name: wall-clock nanoseconds plus a process-wide sequence number.
pub(crate) fn savepoint_name() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    let seq = SAVEPOINT_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("sp_{nanos}_{seq}")
}
