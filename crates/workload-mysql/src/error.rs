//! Error types for the MySQL provider.

use thiserror::Error;
use workload_core::DbError;

/// Errors raised while building the pool or preparing the schema.
#[derive(Error, Debug)]
pub enum MySqlProviderError {
    /// MySQL connection or query error.
    #[error("MySQL error: {0}")]
    MySQL(#[from] mysql_async::Error),

    /// The connection string could not be parsed.
    #[error("Connection string error: {0}")]
    Url(#[from] mysql_async::UrlError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Flatten a driver error into the value the classifier inspects. Server
/// errors keep their code; everything else is text only.
pub fn to_db_error(error: &mysql_async::Error) -> DbError {
    match error {
        mysql_async::Error::Server(server) => {
            DbError::new(server.message.clone()).with_code(server.code)
        }
        other => DbError::new(other.to_string()),
    }
}
