//! Concurrent workload engine.
//!
//! A pool of independent, rate-limited worker tasks issues inserts and
//! identity reads through a [`ConnectionProvider`], retries failures with
//! per-kind backoff, and feeds every outcome into the shared statistics and
//! the phase tracker from `workload-core`.
//!
//! ```ignore
//! let engine = WorkloadEngine::new(config, provider)?;
//! engine.check_connectivity().await?;
//! let pool = engine.start();
//! tokio::signal::ctrl_c().await?;
//! let report = pool.shutdown().await;
//! ```

pub mod executor;
pub mod host;
pub mod pool;
pub mod provider;
pub mod testing;
pub mod worker;

pub use executor::OperationExecutor;
pub use host::{HostTracker, WorkerHost};
pub use pool::{RunningPool, ShutdownReport, WorkloadEngine};
pub use provider::{Connection, ConnectionProvider, Statement, StatementOutcome};
pub use worker::{pacing_delay, Worker, WorkerContext, WorkerSummary};
