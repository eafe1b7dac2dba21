// PostgreSQL backend
//
// - connection: connector over a single tokio-postgres client and `Db::connect_postgres`
// - transaction: physical BEGIN/COMMIT/ROLLBACK handle on the shared client
// - prepared: server-side prepared statements
// - params / query: value conversion in both directions

pub mod connection;
pub mod params;
pub mod prepared;
pub mod query;
pub mod transaction;

pub use connection::PostgresConnector;
pub use params::Params;
pub use prepared::PostgresPreparedStatement;
pub use query::{build_result_set, postgres_extract_value};
pub use transaction::PostgresTransaction;
