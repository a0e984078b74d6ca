//! Worker pool: wires the shared components together, spawns one task per
//! worker and brings them down within a bounded grace period.

use crate::executor::OperationExecutor;
use crate::host::HostTracker;
use crate::provider::{ConnectionProvider, Statement, StatementOutcome};
use crate::worker::{Worker, WorkerContext, WorkerSummary};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use workload_core::{
    EventBus, OperationKind, PhaseTracker, ServerInfo, StatsAggregator,
    WorkloadConfig, WorkloadError,
};

/// The assembled engine. Build it once, then [`WorkloadEngine::start`].
pub struct WorkloadEngine {
    config: WorkloadConfig,
    provider: Arc<dyn ConnectionProvider>,
    stats: Arc<StatsAggregator>,
    phase: Arc<PhaseTracker>,
    hosts: Arc<HostTracker>,
    events: EventBus,
    cancel: CancellationToken,
}

impl WorkloadEngine {
    /// Validate `config` and build the shared components. A supplied
    /// deployment id is fed to the phase tracker right away.
    pub fn new(
        config: WorkloadConfig,
        provider: Arc<dyn ConnectionProvider>,
    ) -> Result<Self, WorkloadError> {
        config.validate()?;

        let events = EventBus::new();
        let phase = Arc::new(PhaseTracker::with_timers(
            events.clone(),
            config.timers.clone(),
        ));
        let hosts = Arc::new(HostTracker::new(phase.clone(), events.clone()));
        if let Some(id) = config.deployment_id.as_deref() {
            phase.note_deployment(id);
        }

        Ok(Self {
            config,
            provider,
            stats: Arc::new(StatsAggregator::new()),
            phase,
            hosts,
            events,
            cancel: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    pub fn stats(&self) -> Arc<StatsAggregator> {
        self.stats.clone()
    }

    pub fn phase(&self) -> Arc<PhaseTracker> {
        self.phase.clone()
    }

    pub fn hosts(&self) -> Arc<HostTracker> {
        self.hosts.clone()
    }

    pub fn events(&self) -> EventBus {
        self.events.clone()
    }

    /// One query on one connection, no retry. Failure here is fatal for the
    /// run.
    pub async fn check_connectivity(&self) -> Result<ServerInfo, WorkloadError> {
        let mut conn = self
            .provider
            .acquire()
            .await
            .map_err(|e| WorkloadError::Connectivity(e.to_string()))?;
        match conn.execute(&Statement::ServerInfo).await {
            Ok(StatementOutcome::Server(info)) => {
                info!("Connected to {info}");
                Ok(info)
            }
            Ok(other) => Err(WorkloadError::Connectivity(format!(
                "unexpected probe outcome: {other:?}"
            ))),
            Err(e) => Err(WorkloadError::Connectivity(e.to_string())),
        }
    }

    /// Spawn every worker on the current runtime.
    pub fn start(&self) -> RunningPool {
        let executor = Arc::new(OperationExecutor::new(
            self.provider.clone(),
            self.config.retry.clone(),
            self.phase.clone(),
            self.cancel.clone(),
        ));
        let ctx = Arc::new(WorkerContext {
            executor,
            stats: self.stats.clone(),
            hosts: self.hosts.clone(),
            cancel: self.cancel.clone(),
            table_count: self.config.table_count,
        });

        let mut tasks = JoinSet::new();
        let groups = [
            (
                OperationKind::Write,
                self.config.write_workers,
                self.config.write_rate,
            ),
            (
                OperationKind::Read,
                self.config.read_workers,
                self.config.read_rate,
            ),
        ];
        for (kind, count, rate) in groups {
            for id in 1..=count {
                let worker = Worker::new(id, kind, rate, self.config.seed);
                tasks.spawn(worker.run(ctx.clone()));
            }
        }

        info!(
            "Started {} write worker(s) at {}/sec and {} read worker(s) at {}/sec",
            self.config.write_workers,
            self.config.write_rate,
            self.config.read_workers,
            self.config.read_rate
        );

        RunningPool {
            tasks,
            cancel: self.cancel.clone(),
            grace: self.config.shutdown_grace,
        }
    }
}

/// Outcome of a pool shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub workers: Vec<WorkerSummary>,
    /// Workers still busy when the grace period ran out.
    pub abandoned: usize,
}

impl ShutdownReport {
    pub fn operations(&self) -> u64 {
        self.workers.iter().map(|w| w.operations).sum()
    }
}

/// Handle to the spawned workers.
pub struct RunningPool {
    tasks: JoinSet<WorkerSummary>,
    cancel: CancellationToken,
    grace: Duration,
}

impl RunningPool {
    pub fn worker_count(&self) -> usize {
        self.tasks.len()
    }

    /// Signal shutdown, wait up to the grace period for in-flight operations
    /// and abort whatever is left.
    pub async fn shutdown(self) -> ShutdownReport {
        let RunningPool {
            mut tasks,
            cancel,
            grace,
        } = self;
        info!("Shutting down {} worker(s)...", tasks.len());
        cancel.cancel();

        let mut report = ShutdownReport::default();
        let drain = async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(summary) => report.workers.push(summary),
                    Err(e) => warn!("Worker task failed: {e}"),
                }
            }
        };

        if tokio::time::timeout(grace, drain).await.is_err() {
            report.abandoned = tasks.len();
            warn!(
                "Shutdown grace of {:?} elapsed, abandoning {} worker(s)",
                grace, report.abandoned
            );
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }

        report.workers.sort_by_key(|w| (w.kind == OperationKind::Read, w.id));
        info!(
            "Worker pool stopped: {} operations issued",
            report.operations()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Script, ScriptedProvider};
    use workload_core::{DbError, Phase};

    fn healthy() -> Arc<ScriptedProvider> {
        Arc::new(ScriptedProvider::new(Script::Healthy {
            host: "blue-1".to_string(),
        }))
    }

    #[test]
    fn test_rejects_zero_write_workers() {
        let config = WorkloadConfig::new().with_write_workers(0, 10);
        let err = WorkloadEngine::new(config, healthy()).err().unwrap();
        assert!(matches!(err, WorkloadError::Config(_)));
    }

    #[test]
    fn test_deployment_id_seeds_phase() {
        let config = WorkloadConfig::new().with_deployment_id(Some("bgd-42".to_string()));
        let engine = WorkloadEngine::new(config, healthy()).unwrap();
        assert_eq!(engine.phase().current(), Phase::Created);
    }

    #[tokio::test]
    async fn test_connectivity_check() {
        let engine = WorkloadEngine::new(WorkloadConfig::new(), healthy()).unwrap();
        let info = engine.check_connectivity().await.unwrap();
        assert_eq!(info.hostname, "blue-1");

        let down = Arc::new(ScriptedProvider::new(Script::Failing {
            error: DbError::new("Can't connect to MySQL server on 'db:3306'").with_code(2003),
        }));
        let engine = WorkloadEngine::new(WorkloadConfig::new(), down).unwrap();
        let err = engine.check_connectivity().await.unwrap_err();
        assert!(matches!(err, WorkloadError::Connectivity(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_shutdown() {
        let provider = healthy();
        let config = WorkloadConfig::new()
            .with_write_workers(3, 10)
            .with_read_workers(2, 10)
            .with_seed(Some(1));
        let engine = WorkloadEngine::new(config, provider.clone()).unwrap();
        let pool = engine.start();
        assert_eq!(pool.worker_count(), 5);

        tokio::time::sleep(Duration::from_millis(950)).await;
        let report = pool.shutdown().await;

        assert_eq!(report.workers.len(), 5);
        assert_eq!(report.abandoned, 0);
        assert_eq!(report.workers[0].kind, OperationKind::Write);
        assert_eq!(report.workers[4].kind, OperationKind::Read);
        let snap = engine.stats().snapshot();
        assert_eq!(snap.combined().total, report.operations());
        assert_eq!(provider.acquired(), provider.released());
        assert_eq!(engine.hosts().current_writer().as_deref(), Some("blue-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_abandons_stuck_workers() {
        let provider = Arc::new(ScriptedProvider::with_latency(
            Script::Healthy {
                host: "blue-1".to_string(),
            },
            Duration::from_secs(120),
        ));
        let config = WorkloadConfig::new()
            .with_write_workers(2, 10)
            .with_shutdown_grace(Duration::from_secs(1));
        let engine = WorkloadEngine::new(config, provider.clone()).unwrap();
        let pool = engine.start();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let report = pool.shutdown().await;
        assert_eq!(report.abandoned, 2);
        assert!(report.workers.is_empty());
        assert_eq!(provider.acquired(), provider.released());
    }
}
