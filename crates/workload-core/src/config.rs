//! Configuration types for the workload engine.

use crate::error::WorkloadError;
use crate::types::OperationKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Console presentation style. Only affects rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleFormat {
    /// Raw counters through the logger, plus per-operation lines.
    Verbose,
    /// State-change events and periodic one-line summaries.
    EventDriven,
    /// Fixed-width table redrawn every interval.
    #[default]
    Dashboard,
}

impl FromStr for ConsoleFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "verbose" => Ok(ConsoleFormat::Verbose),
            "event_driven" | "event-driven" => Ok(ConsoleFormat::EventDriven),
            "dashboard" => Ok(ConsoleFormat::Dashboard),
            other => Err(format!(
                "Invalid console format: {other} (valid formats: verbose, event_driven, dashboard)"
            )),
        }
    }
}

impl fmt::Display for ConsoleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleFormat::Verbose => write!(f, "verbose"),
            ConsoleFormat::EventDriven => write!(f, "event_driven"),
            ConsoleFormat::Dashboard => write!(f, "dashboard"),
        }
    }
}

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base * attempt
    Linear,
    /// delay = base * 2^(attempt-1)
    Exponential,
}

impl BackoffStrategy {
    /// Delay to wait after failed attempt number `attempt` (1-indexed).
    /// Saturates at `Duration::MAX`.
    pub fn delay(&self, base: Duration, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match self {
            BackoffStrategy::Linear => base.saturating_mul(attempt),
            BackoffStrategy::Exponential => base.saturating_mul(1u32 << (attempt - 1).min(16)),
        }
    }
}

/// Bounded retry with per-kind backoff.
///
/// Writes back off linearly and reads double their delay. The asymmetry is
/// part of the observed behaviour being measured and must not be unified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts per operation, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    pub fn strategy_for(&self, kind: OperationKind) -> BackoffStrategy {
        match kind {
            OperationKind::Write => BackoffStrategy::Linear,
            OperationKind::Read => BackoffStrategy::Exponential,
        }
    }

    pub fn delay_for(&self, kind: OperationKind, attempt: u32) -> Duration {
        self.strategy_for(kind).delay(self.base_delay, attempt)
    }
}

/// Grace periods for the time-based phase heuristics. `None` disables one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTimers {
    /// `Created` -> `Preparation` after this long without another signal.
    pub preparation_grace: Option<Duration>,
    /// `Post` -> `Completed` after this long without a topology signal.
    pub post_settle: Option<Duration>,
}

impl Default for PhaseTimers {
    fn default() -> Self {
        Self {
            preparation_grace: Some(Duration::from_secs(30)),
            post_settle: Some(Duration::from_secs(60)),
        }
    }
}

impl PhaseTimers {
    pub fn disabled() -> Self {
        Self {
            preparation_grace: None,
            post_settle: None,
        }
    }
}

/// Engine-level configuration for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    pub write_workers: usize,
    /// Writes per second per worker; 0 = unthrottled.
    pub write_rate: u32,
    pub read_workers: usize,
    /// Reads per second per worker; 0 = unthrottled.
    pub read_rate: u32,
    pub connection_pool_size: usize,
    pub log_interval: Duration,
    pub deployment_id: Option<String>,
    pub console_format: ConsoleFormat,
    /// Size of the write target universe (`test_0001` ..= `test_NNNN`).
    pub table_count: u32,
    pub retry: RetryPolicy,
    pub timers: PhaseTimers,
    /// Bounded wait for in-flight operations at shutdown.
    pub shutdown_grace: Duration,
    /// Seed for table selection; random when absent.
    pub seed: Option<u64>,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            write_workers: 10,
            write_rate: 100,
            read_workers: 0,
            read_rate: 100,
            connection_pool_size: 100,
            log_interval: Duration::from_secs(10),
            deployment_id: None,
            console_format: ConsoleFormat::default(),
            table_count: 12_000,
            retry: RetryPolicy::default(),
            timers: PhaseTimers::default(),
            shutdown_grace: Duration::from_secs(30),
            seed: None,
        }
    }
}

impl WorkloadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_write_workers(mut self, count: usize, rate: u32) -> Self {
        self.write_workers = count;
        self.write_rate = rate;
        self
    }

    pub fn with_read_workers(mut self, count: usize, rate: u32) -> Self {
        self.read_workers = count;
        self.read_rate = rate;
        self
    }

    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.connection_pool_size = size;
        self
    }

    pub fn with_log_interval(mut self, interval: Duration) -> Self {
        self.log_interval = interval;
        self
    }

    pub fn with_deployment_id(mut self, id: Option<String>) -> Self {
        self.deployment_id = id.filter(|s| !s.is_empty());
        self
    }

    pub fn with_console_format(mut self, format: ConsoleFormat) -> Self {
        self.console_format = format;
        self
    }

    pub fn with_table_count(mut self, count: u32) -> Self {
        self.table_count = count;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timers(mut self, timers: PhaseTimers) -> Self {
        self.timers = timers;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn total_workers(&self) -> usize {
        self.write_workers + self.read_workers
    }

    /// Table name for a 1-based table id.
    pub fn table_name(id: u32) -> String {
        format!("test_{id:04}")
    }

    /// Reject configurations the engine cannot run.
    pub fn validate(&self) -> Result<(), WorkloadError> {
        if self.write_workers < 1 {
            return Err(WorkloadError::Config(
                "write_workers must be at least 1".to_string(),
            ));
        }
        if self.connection_pool_size < 1 {
            return Err(WorkloadError::Config(
                "connection_pool_size must be at least 1".to_string(),
            ));
        }
        if self.log_interval.is_zero() {
            return Err(WorkloadError::Config(
                "log_interval must be greater than zero".to_string(),
            ));
        }
        if self.table_count < 1 {
            return Err(WorkloadError::Config(
                "table_count must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts < 1 {
            return Err(WorkloadError::Config(
                "max_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
