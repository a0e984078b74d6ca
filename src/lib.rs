//! cutover-workload
//!
//! Drives a continuous insert/read workload against a MySQL cluster and
//! reports, while it runs, how the cluster behaves during a blue/green
//! cutover: failure windows, writer host switches and the inferred cutover
//! phase.
//!
//! # CLI Usage
//!
//! ```bash
//! # Create the test tables once
//! cutover-workload setup \
//!   --mysql-connection-string mysql://admin@cluster:3306/testdb \
//!   --table-count 12000
//!
//! # Run 10 writers and 2 readers with the dashboard until ctrl-c
//! cutover-workload run \
//!   --mysql-connection-string mysql://admin@cluster:3306/testdb \
//!   --write-workers 10 --read-workers 2 \
//!   --blue-green-deployment-id bgd-abc123
//! ```

pub mod args;
pub mod config;
pub mod logging;
pub mod run;
pub mod setup;

pub use args::{Cli, Commands, ConnectionArgs, DriverLogLevel, RunArgs, SetupArgs};
