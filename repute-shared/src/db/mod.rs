/// Database connection and schema management
///
/// - [`pool`]: Postgres connection pool construction and health checks
/// - [`migrations`]: embedded schema migrations

pub mod migrations;
pub mod pool;

pub use pool::{create_pool, DatabaseConfig};
