//! PostgreSQL database layer for Federa

pub mod pool;
pub mod repositories;

pub use pool::{create_pool, ping, run_migrations, DatabaseConfig};
pub use repositories::*;

use federa_core::BrokerError;

pub(crate) fn db_err(e: sqlx::Error) -> BrokerError {
    BrokerError::database_error(e.to_string())
}
