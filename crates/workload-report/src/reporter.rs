//! The reporting task.
//!
//! Runs beside the worker pool on its own interval. It reads the aggregator,
//! the phase tracker and the writer host, never writes to them, and hands the
//! result to the selected formatter. A one-second heartbeat also drives the
//! phase tracker's time-based heuristics.

use crate::format::ReportFormatter;
use crate::view::{ReportView, RunInfo};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use workload_core::{
    EngineEvent, PhaseTracker, PhaseTransition, PoolStatus, StatsAggregator, StatsSnapshot,
};

const HEARTBEAT: Duration = Duration::from_secs(1);

/// Clears the terminal and homes the cursor.
const CLEAR_SCREEN: &str = "\x1B[2J\x1B[H";

type WriterProbe = Box<dyn Fn() -> Option<String> + Send + Sync>;
type PoolProbe = Box<dyn Fn() -> Option<PoolStatus> + Send + Sync>;

pub struct Reporter {
    formatter: Box<dyn ReportFormatter>,
    sink: Box<dyn Write + Send>,
    run: RunInfo,
    stats: Arc<StatsAggregator>,
    phase: Arc<PhaseTracker>,
    writer: WriterProbe,
    pool: PoolProbe,
    clear_between_ticks: bool,
    previous: StatsSnapshot,
}

impl Reporter {
    /// Reporter writing to stdout with no writer or pool information.
    pub fn new(
        formatter: Box<dyn ReportFormatter>,
        run: RunInfo,
        stats: Arc<StatsAggregator>,
        phase: Arc<PhaseTracker>,
    ) -> Self {
        Self {
            formatter,
            sink: Box::new(std::io::stdout()),
            run,
            stats,
            phase,
            writer: Box::new(|| None),
            pool: Box::new(|| None),
            clear_between_ticks: false,
            previous: StatsSnapshot::default(),
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn Write + Send>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_writer_probe(
        mut self,
        probe: impl Fn() -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.writer = Box::new(probe);
        self
    }

    pub fn with_pool_probe(
        mut self,
        probe: impl Fn() -> Option<PoolStatus> + Send + Sync + 'static,
    ) -> Self {
        self.pool = Box::new(probe);
        self
    }

    /// Redraw from the top of the screen on every tick.
    pub fn with_clear_between_ticks(mut self, clear: bool) -> Self {
        self.clear_between_ticks = clear;
        self
    }

    /// Report until `cancel` fires. Cancel it after the worker pool has
    /// drained, so events published by in-flight operations are rendered.
    /// Returns `self` so the caller can render the final report.
    pub async fn run(
        mut self,
        mut events: broadcast::Receiver<EngineEvent>,
        cancel: CancellationToken,
    ) -> Self {
        if let Some(text) = self.formatter.start(&self.run, self.phase.current()) {
            self.emit(&text);
        }

        let period = self.run.log_interval;
        let mut report = interval_at(Instant::now() + period, period);
        report.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut heartbeat = interval_at(Instant::now() + HEARTBEAT, HEARTBEAT);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut events_open = true;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = report.tick() => self.tick(),
                _ = heartbeat.tick() => {
                    self.phase.evaluate_timers();
                }
                received = events.recv(), if events_open => match received {
                    Ok(event) => self.on_event(&event),
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Reporter fell behind, {missed} event(s) dropped");
                    }
                    Err(RecvError::Closed) => events_open = false,
                },
            }
        }

        while let Ok(event) = events.try_recv() {
            self.on_event(&event);
        }
        debug!("Reporter stopped");
        self
    }

    /// Render the closing report and return the final counters.
    pub fn finish(&mut self, history: &[PhaseTransition]) -> StatsSnapshot {
        let view = self.advance();
        let text = self.formatter.finish(&self.run, &view, history);
        self.emit(&text);
        view.cumulative
    }

    fn tick(&mut self) {
        let view = self.advance();
        let text = self.formatter.tick(&self.run, &view);
        if self.clear_between_ticks {
            self.emit(CLEAR_SCREEN);
        }
        self.emit(&text);
    }

    fn on_event(&mut self, event: &EngineEvent) {
        let cumulative = self.stats.snapshot();
        let view = self.view(cumulative, StatsSnapshot::default());
        if let Some(text) = self.formatter.event(&self.run, event, &view) {
            self.emit(&text);
        }
    }

    /// Snapshot the counters and move the interval baseline forward.
    fn advance(&mut self) -> ReportView {
        let cumulative = self.stats.snapshot();
        let interval = cumulative.since(&self.previous);
        self.previous = cumulative.clone();
        self.view(cumulative, interval)
    }

    fn view(&self, cumulative: StatsSnapshot, interval: StatsSnapshot) -> ReportView {
        ReportView {
            now: chrono::Local::now(),
            runtime: cumulative.elapsed,
            cumulative,
            interval,
            phase: self.phase.current(),
            writer: (self.writer)(),
            pool: (self.pool)(),
        }
    }

    fn emit(&mut self, text: &str) {
        let written = self
            .sink
            .write_all(text.as_bytes())
            .and_then(|_| self.sink.flush());
        if let Err(e) = written {
            warn!("Failed to write report output: {e}");
        }
    }
}
