//! DDL for the `test_NNNN` tables the write workers insert into.

use crate::error::MySqlProviderError;
use mysql_async::prelude::*;
use mysql_async::Pool;
use tracing::info;
use workload_core::WorkloadConfig;

/// Tables created between progress lines.
const PROGRESS_EVERY: u32 = 500;

/// Generate CREATE TABLE statement for one workload table.
pub fn generate_create_table(table_name: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS `{table_name}` (\
         `id` BIGINT NOT NULL AUTO_INCREMENT, \
         `col1` VARCHAR(255), \
         `col2` INT, \
         `col3` VARCHAR(64), \
         `col4` BIGINT, \
         `col5` VARCHAR(255), \
         PRIMARY KEY (`id`)\
         ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"
    )
}

/// Generate DROP TABLE statement.
pub fn generate_drop_table(table_name: &str) -> String {
    format!("DROP TABLE IF EXISTS `{table_name}`")
}

/// Create `test_0001..=test_<count>`, optionally dropping them first.
/// Returns the number of tables processed.
pub async fn create_tables(
    pool: &Pool,
    count: u32,
    drop_existing: bool,
) -> Result<u32, MySqlProviderError> {
    if count == 0 {
        return Err(MySqlProviderError::Config(
            "table count must be at least 1".to_string(),
        ));
    }

    let mut conn = pool.get_conn().await?;
    for id in 1..=count {
        let table = WorkloadConfig::table_name(id);
        if drop_existing {
            conn.query_drop(generate_drop_table(&table)).await?;
        }
        conn.query_drop(generate_create_table(&table)).await?;
        if id % PROGRESS_EVERY == 0 {
            info!("Created {id}/{count} tables");
        }
    }
    info!("All {count} test tables ready");
    Ok(count)
}
