//! Command-line interface for cutover-workload

use clap::Parser;
use cutover_workload::{logging, Cli, Commands};
use workload_core::ConsoleFormat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            logging::init(args.console_format, args.driver_log_level);
            cutover_workload::run::run_workload(args).await
        }
        Commands::Setup(args) => {
            logging::init(ConsoleFormat::Verbose, args.driver_log_level);
            cutover_workload::setup::run_setup(args).await
        }
    }
}
