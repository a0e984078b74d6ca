//! The `run` subcommand: wire the engine, the reporter and the MySQL pool
//! together and keep them going until shutdown.

use crate::args::RunArgs;
use crate::logging::mask_connection_password;
use anyhow::Context;
use chrono::Utc;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use workload_core::ConsoleFormat;
use workload_engine::{ConnectionProvider, WorkloadEngine};
use workload_mysql::{endpoint, MySqlProvider};
use workload_report::{formatter_for, Reporter, RunInfo, RunSummary};

/// Run the workload until ctrl-c or `--run-for` elapses.
pub async fn run_workload(args: RunArgs) -> anyhow::Result<()> {
    let config = args.workload_config();
    let url = &args.connection.mysql_connection_string;
    info!("Connecting to {}", mask_connection_password(url));

    let provider = Arc::new(
        MySqlProvider::new(
            url,
            args.connection.password.as_deref(),
            config.connection_pool_size,
        )
        .context("Failed to create MySQL connection pool")?,
    );
    let engine = WorkloadEngine::new(config.clone(), provider.clone())
        .context("Invalid workload configuration")?;
    engine
        .check_connectivity()
        .await
        .context("Connectivity test failed")?;

    let run_info = RunInfo::from_config(&config).with_endpoint(
        endpoint(url).context("Failed to parse MySQL connection string")?,
    );
    let hosts = engine.hosts();
    let pool_provider = provider.clone();
    let reporter = Reporter::new(
        formatter_for(config.console_format),
        run_info,
        engine.stats(),
        engine.phase(),
    )
    .with_writer_probe(move || hosts.current_writer())
    .with_pool_probe(move || pool_provider.pool_status())
    .with_clear_between_ticks(
        config.console_format == ConsoleFormat::Dashboard && std::io::stdout().is_terminal(),
    );

    let started_at = Utc::now();
    // Subscribe before the workers start so the first writer sighting is seen.
    // The reporter outlives the workers' grace period and is stopped on its
    // own token once the pool has drained.
    let reporter_stop = CancellationToken::new();
    let reporter_task = tokio::spawn(
        reporter.run(engine.events().subscribe(), reporter_stop.clone()),
    );
    let pool = engine.start();

    wait_for_shutdown(args.run_for).await?;
    info!(
        "Shutdown requested, waiting up to {:?} for in-flight operations",
        config.shutdown_grace
    );
    let shutdown = pool.shutdown().await;
    reporter_stop.cancel();
    let mut reporter = reporter_task.await.context("Reporter task failed")?;
    let history = engine.phase().history();
    let stats = reporter.finish(&history);

    if let Some(path) = &args.metrics_output {
        let summary = RunSummary {
            started_at,
            ended_at: Utc::now(),
            config,
            final_phase: engine.phase().current(),
            final_writer: engine.hosts().current_writer(),
            stats,
            phase_history: history,
            abandoned_workers: shutdown.abandoned,
        };
        summary
            .write_to(path)
            .with_context(|| format!("Failed to write run summary to {path:?}"))?;
        info!("Run summary written to {path:?}");
    }

    if let Err(e) = provider.disconnect().await {
        warn!("Failed to close MySQL pool cleanly: {e}");
    }
    Ok(())
}

async fn wait_for_shutdown(run_for: Option<Duration>) -> anyhow::Result<()> {
    match run_for {
        Some(limit) => {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    signal.context("Failed to listen for ctrl-c")?;
                }
                _ = tokio::time::sleep(limit) => {
                    info!("Run time of {limit:?} reached");
                }
            }
        }
        None => tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for ctrl-c")?,
    }
    Ok(())
}
