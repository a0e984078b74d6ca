//! The `setup` subcommand: create the table universe.

use crate::args::SetupArgs;
use crate::logging::mask_connection_password;
use anyhow::Context;
use tracing::{info, warn};
use workload_mysql::{create_tables, MySqlProvider};

pub async fn run_setup(args: SetupArgs) -> anyhow::Result<()> {
    let url = &args.connection.mysql_connection_string;
    info!(
        "Creating {} tables on {}{}",
        args.table_count,
        mask_connection_password(url),
        if args.drop_existing {
            " (dropping existing)"
        } else {
            ""
        }
    );

    let provider = MySqlProvider::new(url, args.connection.password.as_deref(), 1)
        .context("Failed to create MySQL connection pool")?;
    provider
        .test_connectivity()
        .await
        .context("Connectivity test failed")?;

    let created = create_tables(provider.pool(), args.table_count, args.drop_existing)
        .await
        .context("Failed to create tables")?;
    info!("Setup complete: {created} tables ready");

    if let Err(e) = provider.disconnect().await {
        warn!("Failed to close MySQL pool cleanly: {e}");
    }
    Ok(())
}
