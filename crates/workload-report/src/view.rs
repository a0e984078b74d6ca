//! The immutable input every formatter renders from.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use workload_core::{Phase, PoolStatus, StatsSnapshot, WorkloadConfig};

/// Static facts about the run, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInfo {
    pub write_workers: usize,
    pub write_rate: u32,
    pub read_workers: usize,
    pub read_rate: u32,
    pub pool_size: usize,
    pub deployment_id: Option<String>,
    pub log_interval: Duration,
    /// `host:port` the workload is pointed at, password never included.
    pub endpoint: Option<String>,
}

impl RunInfo {
    pub fn from_config(config: &WorkloadConfig) -> Self {
        Self {
            write_workers: config.write_workers,
            write_rate: config.write_rate,
            read_workers: config.read_workers,
            read_rate: config.read_rate,
            pool_size: config.connection_pool_size,
            deployment_id: config.deployment_id.clone(),
            log_interval: config.log_interval,
            endpoint: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn total_workers(&self) -> usize {
        self.write_workers + self.read_workers
    }
}

/// One tick's worth of data.
#[derive(Debug, Clone)]
pub struct ReportView {
    pub now: DateTime<Local>,
    pub runtime: Duration,
    /// Counters since start.
    pub cumulative: StatsSnapshot,
    /// Counters since the previous tick.
    pub interval: StatsSnapshot,
    pub phase: Phase,
    pub writer: Option<String>,
    pub pool: Option<PoolStatus>,
}

impl ReportView {
    /// `HH:MM:SS` since start.
    pub fn runtime_hms(&self) -> String {
        let secs = self.runtime.as_secs();
        format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    }

    pub fn clock(&self) -> String {
        self.now.format("%H:%M:%S").to_string()
    }

    pub fn timestamp(&self) -> String {
        self.now.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    pub fn writer_or_unknown(&self) -> &str {
        self.writer.as_deref().unwrap_or("unknown")
    }
}
