//! Machine-readable record of a finished run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use workload_core::{Phase, PhaseTransition, StatsSnapshot, WorkloadConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub config: WorkloadConfig,
    pub final_phase: Phase,
    pub final_writer: Option<String>,
    pub stats: StatsSnapshot,
    pub phase_history: Vec<PhaseTransition>,
    /// Workers still running when the shutdown grace ran out.
    pub abandoned_workers: usize,
}

impl RunSummary {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}
