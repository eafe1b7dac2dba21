use crate::query_builder::Sql;

/// Hook invoked once for every statement the engine runs, including the synthetic
/// `BEGIN`/`COMMIT`/`ROLLBACK`/`SAVEPOINT` statements, after it has run.
///
/// Closures taking `&dyn Sql` implement this trait:
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use sqlkit::prelude::*;
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&seen);
/// let options = DbOptions::default().with_logger(move |stmt: &dyn Sql| {
///     if let Ok((sql, _)) = stmt.render() {
///         sink.lock().unwrap().push(sql);
///     }
/// });
/// # let _ = options;
/// ```
pub trait Logger: Send + Sync {
    fn log(&self, stmt: &dyn Sql);
}

impl<F> Logger for F
where
    F: Fn(&dyn Sql) + Send + Sync,
{
    fn log(&self, stmt: &dyn Sql) {
        self(stmt);
    }
}

/// Discards everything. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _stmt: &dyn Sql) {}
}

/// Renders each statement and emits it as a `tracing` event under the `sqlkit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, stmt: &dyn Sql) {
        match stmt.render() {
            Ok((sql, args)) => {
                tracing::info!(target: "sqlkit", args = ?args, "{sql}");
            }
            Err(err) => {
                tracing::warn!(target: "sqlkit", error = %err, "statement could not be rendered");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::args;
    use crate::query_builder::raw;

    #[test]
    fn closures_receive_statements() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let logger = move |stmt: &dyn Sql| {
            sink.lock().unwrap().push(stmt.render().unwrap());
        };
        logger.log(&raw("SELECT ?", args![1]));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("SELECT ?".to_owned(), args![1])]
        );
    }

    #[test]
    fn builtin_loggers_accept_any_statement() {
        NoopLogger.log(&raw("BEGIN", args![]));
        TracingLogger.log(&raw("BEGIN", args![]));
    }
}
