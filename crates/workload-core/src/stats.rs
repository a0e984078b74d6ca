//! Lock-free statistics shared by every worker.
//!
//! Counters are independent atomics. A snapshot reads them one by one, so two
//! counters are not captured as a group, but each kind's `total` is derived
//! from its own `success + failed` and therefore always adds up exactly.

use crate::classify::ErrorClass;
use crate::types::{OperationKind, OperationResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;

/// Connection pool occupancy, when the provider can report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolStatus {
    /// Connections currently lent out to workers.
    pub active: usize,
    /// Configured upper bound.
    pub max: usize,
}

#[derive(Debug, Default)]
struct KindCounters {
    success: AtomicU64,
    failed: AtomicU64,
    attempts: AtomicU64,
    /// Sum of successful operation latencies, in microseconds.
    latency_sum_us: AtomicU64,
    latency_max_us: AtomicU64,
    hosts: RwLock<HashMap<String, AtomicU64>>,
}

impl KindCounters {
    fn record(&self, result: &OperationResult) {
        self.attempts
            .fetch_add(u64::from(result.attempts), Ordering::Relaxed);

        if result.success {
            let micros = u64::try_from(result.latency.as_micros()).unwrap_or(u64::MAX);
            self.latency_sum_us.fetch_add(micros, Ordering::Relaxed);
            self.latency_max_us.fetch_max(micros, Ordering::Relaxed);
            self.success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }

        if let Some(host) = result.observed_host.as_deref().filter(|_| result.success) {
            self.bump_host(host);
        }
    }

    fn bump_host(&self, host: &str) {
        {
            let hosts = self.hosts.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(counter) = hosts.get(host) {
                counter.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        let mut hosts = self.hosts.write().unwrap_or_else(PoisonError::into_inner);
        hosts
            .entry(host.to_string())
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> KindSnapshot {
        let success = self.success.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let hosts = self
            .hosts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(host, count)| (host.clone(), count.load(Ordering::Relaxed)))
            .collect();
        KindSnapshot {
            total: success + failed,
            success,
            failed,
            attempts: self.attempts.load(Ordering::Relaxed),
            latency_sum_us: self.latency_sum_us.load(Ordering::Relaxed),
            latency_max_us: self.latency_max_us.load(Ordering::Relaxed),
            hosts,
        }
    }
}

/// Point-in-time counters for one operation kind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KindSnapshot {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    /// Attempts issued, retries included.
    pub attempts: u64,
    pub latency_sum_us: u64,
    /// Slowest successful operation since start.
    pub latency_max_us: u64,
    /// Successful operations per serving host.
    pub hosts: BTreeMap<String, u64>,
}

impl KindSnapshot {
    pub fn success_rate(&self) -> f64 {
        percent(self.success, self.total)
    }

    pub fn failure_rate(&self) -> f64 {
        percent(self.failed, self.total)
    }

    /// Mean latency of successful operations.
    pub fn avg_latency_ms(&self) -> f64 {
        if self.success == 0 {
            return 0.0;
        }
        self.latency_sum_us as f64 / self.success as f64 / 1000.0
    }

    pub fn max_latency_ms(&self) -> f64 {
        self.latency_max_us as f64 / 1000.0
    }

    /// Share of successful operations served by `host`.
    pub fn host_share(&self, host: &str) -> f64 {
        percent(self.hosts.get(host).copied().unwrap_or(0), self.success)
    }

    fn since(&self, prev: &KindSnapshot) -> KindSnapshot {
        let success = self.success.saturating_sub(prev.success);
        let failed = self.failed.saturating_sub(prev.failed);
        let hosts = self
            .hosts
            .iter()
            .filter_map(|(host, count)| {
                let before = prev.hosts.get(host).copied().unwrap_or(0);
                let diff = count.saturating_sub(before);
                (diff > 0).then(|| (host.clone(), diff))
            })
            .collect();
        KindSnapshot {
            total: success + failed,
            success,
            failed,
            attempts: self.attempts.saturating_sub(prev.attempts),
            latency_sum_us: self.latency_sum_us.saturating_sub(prev.latency_sum_us),
            latency_max_us: self.latency_max_us,
            hosts,
        }
    }

    fn merged(&self, other: &KindSnapshot) -> KindSnapshot {
        let mut hosts = self.hosts.clone();
        for (host, count) in &other.hosts {
            *hosts.entry(host.clone()).or_default() += count;
        }
        KindSnapshot {
            total: self.total + other.total,
            success: self.success + other.success,
            failed: self.failed + other.failed,
            attempts: self.attempts + other.attempts,
            latency_sum_us: self.latency_sum_us + other.latency_sum_us,
            latency_max_us: self.latency_max_us.max(other.latency_max_us),
            hosts,
        }
    }
}

/// Final failures per error class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClassCounts {
    pub transient_connection: u64,
    pub topology_signal: u64,
    pub terminal: u64,
}

impl ClassCounts {
    pub fn get(&self, class: ErrorClass) -> u64 {
        match class {
            ErrorClass::TransientConnection => self.transient_connection,
            ErrorClass::TopologySignal => self.topology_signal,
            ErrorClass::Terminal => self.terminal,
        }
    }

    pub fn total(&self) -> u64 {
        self.transient_connection + self.topology_signal + self.terminal
    }

    fn since(&self, prev: &ClassCounts) -> ClassCounts {
        ClassCounts {
            transient_connection: self
                .transient_connection
                .saturating_sub(prev.transient_connection),
            topology_signal: self.topology_signal.saturating_sub(prev.topology_signal),
            terminal: self.terminal.saturating_sub(prev.terminal),
        }
    }
}

/// Everything the reporter renders for one tick.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Time since the aggregator was created.
    pub elapsed: Duration,
    pub writes: KindSnapshot,
    pub reads: KindSnapshot,
    pub failures_by_class: ClassCounts,
    /// Attempts rejected by a read-only server.
    pub read_only_rejections: u64,
}

impl StatsSnapshot {
    pub fn kind(&self, kind: OperationKind) -> &KindSnapshot {
        match kind {
            OperationKind::Write => &self.writes,
            OperationKind::Read => &self.reads,
        }
    }

    /// Writes and reads together.
    pub fn combined(&self) -> KindSnapshot {
        self.writes.merged(&self.reads)
    }

    /// Counters accumulated between `prev` and `self`. Latency maxima stay
    /// cumulative.
    pub fn since(&self, prev: &StatsSnapshot) -> StatsSnapshot {
        StatsSnapshot {
            elapsed: self.elapsed.saturating_sub(prev.elapsed),
            writes: self.writes.since(&prev.writes),
            reads: self.reads.since(&prev.reads),
            failures_by_class: self.failures_by_class.since(&prev.failures_by_class),
            read_only_rejections: self
                .read_only_rejections
                .saturating_sub(prev.read_only_rejections),
        }
    }
}

/// Shared aggregator. Pass it to every worker behind an `Arc`.
#[derive(Debug)]
pub struct StatsAggregator {
    started_at: Instant,
    writes: KindCounters,
    reads: KindCounters,
    failures_by_class: [AtomicU64; 3],
    read_only_rejections: AtomicU64,
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            writes: KindCounters::default(),
            reads: KindCounters::default(),
            failures_by_class: Default::default(),
            read_only_rejections: AtomicU64::new(0),
        }
    }

    fn counters(&self, kind: OperationKind) -> &KindCounters {
        match kind {
            OperationKind::Write => &self.writes,
            OperationKind::Read => &self.reads,
        }
    }

    /// Fold one final operation result into the counters.
    pub fn record(&self, result: &OperationResult) {
        self.counters(result.kind).record(result);

        if result.read_only_rejections > 0 {
            self.read_only_rejections
                .fetch_add(u64::from(result.read_only_rejections), Ordering::Relaxed);
        }

        if let Some(class) = result.error_class.filter(|_| !result.success) {
            self.failures_by_class[class.index()].fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let class = |c: ErrorClass| self.failures_by_class[c.index()].load(Ordering::Relaxed);
        StatsSnapshot {
            elapsed: self.elapsed(),
            writes: self.writes.snapshot(),
            reads: self.reads.snapshot(),
            failures_by_class: ClassCounts {
                transient_connection: class(ErrorClass::TransientConnection),
                topology_signal: class(ErrorClass::TopologySignal),
                terminal: class(ErrorClass::Terminal),
            },
            read_only_rejections: self.read_only_rejections.load(Ordering::Relaxed),
        }
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 * 100.0 / whole as f64
}
