// SQLite backend
//
// - config: connection options
// - connection: connector, blocking-task bridge and `Db::open_sqlite`
// - transaction: physical BEGIN/COMMIT/ROLLBACK handle
// - prepared: statement handles backed by rusqlite's statement cache
// - params / query: value conversion in both directions

pub mod config;
pub mod connection;
pub mod params;
pub mod prepared;
pub mod query;
pub mod transaction;

pub use config::SqliteOptions;
pub use connection::SqliteConnector;
pub use prepared::SqlitePreparedStatement;
pub use transaction::SqliteTransaction;
