#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlkit::driver::{
    Connector, DriverTransaction, ExecOutcome, PreparedStatement, Preparer,
};
use sqlkit::{ResultSet, SqlKitError, Value};

/// Everything the engine sends to the driver, in order.
#[derive(Debug, Default)]
pub struct Journal {
    entries: Mutex<Vec<String>>,
    prepares: AtomicUsize,
    fail_rollback: AtomicBool,
}

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    /// Entries with generated savepoint names replaced by `sp`.
    pub fn normalized(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .map(|entry| match entry.find("sp_") {
                Some(at) => format!("{}sp", &entry[..at]),
                None => entry,
            })
            .collect()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.normalized().iter().filter(|e| e.as_str() == entry).count()
    }

    pub fn prepares(&self) -> usize {
        self.prepares.load(Ordering::SeqCst)
    }

    pub fn fail_rollbacks(&self) {
        self.fail_rollback.store(true, Ordering::SeqCst);
    }
}

/// Connector that records statements instead of running them.
///
/// Queries return one row `n = 1`; statements containing `FAIL` return a driver error.
#[derive(Debug, Clone, Default)]
pub struct RecordingConnector {
    pub journal: Arc<Journal>,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }
}

struct RecordingStatement {
    sql: String,
    journal: Arc<Journal>,
}

#[async_trait]
impl PreparedStatement for RecordingStatement {
    async fn query(&self, _args: &[Value]) -> Result<ResultSet, SqlKitError> {
        self.journal.push(self.sql.clone());
        let mut rs = ResultSet::new(vec!["n".to_owned()]);
        rs.add_row_values(vec![Value::Int(1)]);
        Ok(rs)
    }

    async fn execute(&self, _args: &[Value]) -> Result<ExecOutcome, SqlKitError> {
        self.journal.push(self.sql.clone());
        if self.sql.contains("FAIL") {
            return Err(SqlKitError::Driver("forced failure".into()));
        }
        Ok(ExecOutcome {
            rows_affected: 1,
            last_insert_id: None,
        })
    }

    async fn close(&self) -> Result<(), SqlKitError> {
        Ok(())
    }
}

fn prepare_recording(journal: &Arc<Journal>, sql: &str) -> Arc<dyn PreparedStatement> {
    journal.prepares.fetch_add(1, Ordering::SeqCst);
    Arc::new(RecordingStatement {
        sql: sql.to_owned(),
        journal: Arc::clone(journal),
    })
}

#[async_trait]
impl Preparer for RecordingConnector {
    async fn prepare(&self, sql: &str) -> Result<Arc<dyn PreparedStatement>, SqlKitError> {
        Ok(prepare_recording(&self.journal, sql))
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    async fn begin(&self) -> Result<Arc<dyn DriverTransaction>, SqlKitError> {
        self.journal.push("BEGIN");
        Ok(Arc::new(RecordingTransaction {
            journal: Arc::clone(&self.journal),
        }))
    }

    async fn ping(&self) -> Result<(), SqlKitError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), SqlKitError> {
        self.journal.push("CLOSE");
        Ok(())
    }
}

struct RecordingTransaction {
    journal: Arc<Journal>,
}

#[async_trait]
impl Preparer for RecordingTransaction {
    async fn prepare(&self, sql: &str) -> Result<Arc<dyn PreparedStatement>, SqlKitError> {
        Ok(prepare_recording(&self.journal, sql))
    }
}

#[async_trait]
impl DriverTransaction for RecordingTransaction {
    async fn execute_batch(&self, sql: &str) -> Result<(), SqlKitError> {
        self.journal.push(sql);
        if sql.starts_with("ROLLBACK") && self.journal.fail_rollback.load(Ordering::SeqCst) {
            return Err(SqlKitError::Driver("rollback refused".into()));
        }
        Ok(())
    }

    async fn commit(&self) -> Result<(), SqlKitError> {
        self.journal.push("COMMIT");
        Ok(())
    }

    async fn rollback(&self) -> Result<(), SqlKitError> {
        self.journal.push("ROLLBACK");
        if self.journal.fail_rollback.load(Ordering::SeqCst) {
            return Err(SqlKitError::Driver("rollback refused".into()));
        }
        Ok(())
    }
}
