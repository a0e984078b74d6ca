//! One rate-limited worker loop.

use crate::executor::OperationExecutor;
use crate::host::{HostTracker, WorkerHost};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use workload_core::{
    ErrorClass, Operation, OperationKind, OperationResult, StatsAggregator, WorkloadConfig,
    WriteRow,
};

/// Pause needed after an iteration that took `elapsed` to hold `rate`
/// operations per second. A rate of zero never pauses.
pub fn pacing_delay(rate: u32, elapsed: Duration) -> Duration {
    if rate == 0 {
        return Duration::ZERO;
    }
    (Duration::from_secs(1) / rate).saturating_sub(elapsed)
}

/// Shared handles every worker needs.
pub struct WorkerContext {
    pub executor: Arc<OperationExecutor>,
    pub stats: Arc<StatsAggregator>,
    pub hosts: Arc<HostTracker>,
    pub cancel: CancellationToken,
    pub table_count: u32,
}

/// What a worker did before it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSummary {
    pub id: usize,
    pub kind: OperationKind,
    pub operations: u64,
    pub failures: u64,
}

pub struct Worker {
    id: usize,
    kind: OperationKind,
    rate: u32,
    label: String,
    rng: StdRng,
    host: WorkerHost,
}

impl Worker {
    /// `id` is 1-based within its kind. With a seed, table selection is
    /// reproducible per worker.
    pub fn new(id: usize, kind: OperationKind, rate: u32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => {
                let salt = ((id as u64) << 1) | u64::from(kind == OperationKind::Read);
                StdRng::seed_from_u64(seed.wrapping_add(salt))
            }
            None => StdRng::from_os_rng(),
        };
        Self {
            id,
            kind,
            rate,
            label: format!("{}-{}", kind.worker_label(), id),
            rng,
            host: WorkerHost::default(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn next_operation(&mut self, table_count: u32) -> Operation {
        match self.kind {
            OperationKind::Write => {
                let table = self.rng.random_range(1..=table_count.max(1));
                let value = self.rng.random_range(0..1000);
                Operation::write(
                    WorkloadConfig::table_name(table),
                    WriteRow::new(self.id, value),
                )
            }
            OperationKind::Read => Operation::read(),
        }
    }

    /// Loop until `ctx.cancel` fires. The operation in flight when it fires
    /// runs to completion; a backoff wait inside it is cut short.
    pub async fn run(mut self, ctx: Arc<WorkerContext>) -> WorkerSummary {
        let mut summary = WorkerSummary {
            id: self.id,
            kind: self.kind,
            operations: 0,
            failures: 0,
        };
        info!("{} started (rate: {}/sec)", self.label, self.rate);

        while !ctx.cancel.is_cancelled() {
            let started = Instant::now();
            let operation = self.next_operation(ctx.table_count);
            let result = ctx.executor.execute(&operation, &self.label).await;

            ctx.stats.record(&result);
            summary.operations += 1;
            if !result.success {
                summary.failures += 1;
            }
            self.observe_host(&ctx, &result);
            self.log_result(&operation, &result);

            let pause = pacing_delay(self.rate, started.elapsed());
            if pause.is_zero() {
                tokio::task::yield_now().await;
                continue;
            }
            tokio::select! {
                _ = ctx.cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        info!(
            "{} stopped after {} operations ({} failed)",
            self.label, summary.operations, summary.failures
        );
        summary
    }

    fn observe_host(&mut self, ctx: &WorkerContext, result: &OperationResult) {
        let Some(host) = result.observed_host.as_deref() else {
            return;
        };
        if let Some(previous) = self.host.observe(host) {
            info!("{} | Switched to new host: {host} (from: {previous})", self.label);
        }
        if self.kind == OperationKind::Write {
            ctx.hosts.observe_writer(host);
        }
    }

    fn log_result(&self, operation: &Operation, result: &OperationResult) {
        let latency_ms = result.latency.as_millis();
        if result.success {
            let host = match &result.server {
                Some(server) => server.to_string(),
                None => result
                    .observed_host
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
            };
            info!(
                target: "operations",
                "SUCCESS: {} | Host: {} | {}: {} | {} completed | Latency: {}ms",
                self.label,
                host,
                operation.kind.target_label(),
                operation.target,
                operation.kind.verb(),
                latency_ms
            );
            return;
        }

        let class = result.error_class.unwrap_or(ErrorClass::Terminal);
        let detail = result
            .error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_default();
        if class == ErrorClass::Terminal {
            error!(
                target: "operations",
                "FAILED: {} | {}: {} | {} | Attempts: {} | Latency: {}ms | Error: {}",
                self.label,
                operation.kind.target_label(),
                operation.target,
                class,
                result.attempts,
                latency_ms,
                detail
            );
        } else {
            warn!(
                target: "operations",
                "FAILED: {} | {}: {} | {} | Attempts: {} | Latency: {}ms | Error: {}",
                self.label,
                operation.kind.target_label(),
                operation.target,
                class,
                result.attempts,
                latency_ms,
                detail
            );
        }
    }
}
