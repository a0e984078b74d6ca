//! MySQL backend for the workload engine.
//!
//! [`MySqlProvider`] implements the engine's `ConnectionProvider` over a
//! bounded `mysql_async` pool, and [`schema`] creates the `test_NNNN` tables
//! the write workers target.

pub mod error;
pub mod provider;
pub mod schema;

pub use error::{to_db_error, MySqlProviderError};
pub use provider::{endpoint, insert_sql, MySqlProvider};
pub use schema::{create_tables, generate_create_table, generate_drop_table};
