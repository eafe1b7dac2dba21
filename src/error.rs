use thiserror::Error;

/// Crate-wide error type returned by every fallible operation.
#[derive(Debug, Error)]
pub enum SqlKitError {
    /// A builder was given malformed input; observed when the statement is rendered.
    #[error(transparent)]
    Statement(#[from] StatementError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    /// Error reported by a custom driver implementation.
    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Migration files or history are inconsistent with the requested version.
    #[error("migrate: {0}")]
    Migration(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    /// `decode_*` was called on the result of an `exec`.
    #[error("sqlkit: query was not issued")]
    NotAQuery,

    #[error("sqlkit: nested transactions not allowed")]
    NestedTransactionsDisabled,

    /// A statement was routed to a transaction that already committed or rolled back.
    #[error("sqlkit: transaction already completed")]
    TransactionDone,

    /// The scope's cancellation token fired before the transaction could commit.
    #[error("sqlkit: transaction scope cancelled")]
    Cancelled,

    /// The unit of work failed and so did the rollback issued on its behalf.
    #[error("sqlkit: rollback failed ({rollback}) after error: {source}")]
    Rollback {
        source: Box<SqlKitError>,
        rollback: Box<SqlKitError>,
    },
}

/// Build-time statement errors carried inertly through builder chains.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatementError {
    #[error("sqlkit: statement invalid: {0}")]
    Invalid(String),

    #[error("sqlkit: could not find matching placeholder at index {index}")]
    PlaceholderNotFound { index: usize },

    #[error("sqlkit: empty list bound at index {index}")]
    EmptyList { index: usize },

    #[error(transparent)]
    Encode(#[from] CodecError),
}

impl StatementError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        StatementError::Invalid(reason.into())
    }
}

/// Errors raised while converting between rows and Rust values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    #[error("sqlkit/encoding: no rows in result set")]
    NoRows,

    #[error("sqlkit/encoding: too many columns to scan ({found})")]
    TooManyColumns { found: usize },

    #[error("sqlkit/encoding: missing destination for column {column}")]
    MissingDestination { column: String },

    #[error("sqlkit/encoding: record must serialize to a map of fields")]
    NotARecord,

    #[error("sqlkit/encoding: unknown field {0}")]
    UnknownField(String),

    #[error("sqlkit/encoding: {0}")]
    Message(String),
}

impl serde::de::Error for CodecError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        CodecError::Message(msg.to_string())
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError::Message(err.to_string())
    }
}

impl From<tokio::task::JoinError> for SqlKitError {
    fn from(err: tokio::task::JoinError) -> Self {
        SqlKitError::ExecutionError(format!("blocking task join error: {err}"))
    }
}
