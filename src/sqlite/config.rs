use std::time::Duration;

/// Options for opening a `SQLite` connection.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub db_path: String,
    /// Switch file databases to `journal_mode = WAL`.
    pub wal: bool,
    pub busy_timeout: Duration,
    /// Capacity of rusqlite's per-connection prepared statement cache.
    pub statement_cache_capacity: usize,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            wal: true,
            busy_timeout: Duration::from_secs(5),
            statement_cache_capacity: 64,
        }
    }

    /// An in-memory database; WAL does not apply.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(":memory:").with_wal(false)
    }

    #[must_use]
    pub fn with_wal(mut self, wal: bool) -> Self {
        self.wal = wal;
        self
    }

    #[must_use]
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    #[must_use]
    pub fn with_statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.statement_cache_capacity = capacity;
        self
    }

    pub(crate) fn is_memory(&self) -> bool {
        self.db_path == ":memory:"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_disables_wal() {
        let opts = SqliteOptions::in_memory();
        assert!(opts.is_memory());
        assert!(!opts.wal);
        assert!(SqliteOptions::new("x.db").wal);
    }
}
