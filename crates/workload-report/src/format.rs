//! Console formats.
//!
//! A formatter is picked once at startup and fed the same [`ReportView`] each
//! tick. It turns engine events and views into text and never touches the
//! counters or the phase tracker.

use crate::view::{ReportView, RunInfo};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, Table};
use workload_core::{
    ConsoleFormat, EngineEvent, ErrorClass, KindSnapshot, Phase, PhaseTransition,
    TransitionReason,
};

pub trait ReportFormatter: Send {
    /// Rendered once before the first tick.
    fn start(&mut self, _run: &RunInfo, _phase: Phase) -> Option<String> {
        None
    }

    /// Rendered as an event happens; `None` if this format ignores it.
    fn event(&mut self, _run: &RunInfo, _event: &EngineEvent, _view: &ReportView) -> Option<String> {
        None
    }

    /// Rendered on every reporting interval.
    fn tick(&mut self, run: &RunInfo, view: &ReportView) -> String;

    /// Rendered once at shutdown, after the workers have stopped.
    fn finish(&mut self, run: &RunInfo, view: &ReportView, history: &[PhaseTransition]) -> String {
        let mut out = self.tick(run, view);
        out.push_str(&final_summary(run, view, history));
        out
    }
}

pub fn formatter_for(format: ConsoleFormat) -> Box<dyn ReportFormatter> {
    match format {
        ConsoleFormat::Verbose => Box::new(VerboseFormatter),
        ConsoleFormat::EventDriven => Box::new(EventDrivenFormatter::default()),
        ConsoleFormat::Dashboard => Box::new(DashboardFormatter),
    }
}

fn phase_line(clock: &str, transition: &PhaseTransition) -> String {
    format!(
        "[{clock}] 🔄 BG-PHASE | {} → {} | {}\n",
        transition.from.display_name(),
        transition.to.display_name(),
        transition.reason
    )
}

/// Raw counters, one block per tick.
#[derive(Debug, Default)]
pub struct VerboseFormatter;

impl ReportFormatter for VerboseFormatter {
    fn event(&mut self, _run: &RunInfo, event: &EngineEvent, view: &ReportView) -> Option<String> {
        match event {
            EngineEvent::PhaseChanged(t) => Some(phase_line(&view.clock(), t)),
            EngineEvent::WriterHostChanged { .. } => None,
        }
    }

    fn tick(&mut self, run: &RunInfo, view: &ReportView) -> String {
        let mut out = String::new();
        let rule = "========================================";
        out.push_str(&format!("{rule}\n"));

        let w = &view.cumulative.writes;
        if run.write_workers > 0 {
            out.push_str(&format!(
                "WRITE STATS: Total: {} | Success: {} | Failed: {} | Success Rate: {:.2}%\n",
                w.total,
                w.success,
                w.failed,
                w.success_rate()
            ));
        }

        let r = &view.cumulative.reads;
        if run.read_workers > 0 {
            out.push_str(&format!(
                "READ STATS: Total: {} | Success: {} | Failed: {} | Success Rate: {:.2}% | Avg Latency: {:.1}ms\n",
                r.total,
                r.success,
                r.failed,
                r.success_rate(),
                r.avg_latency_ms()
            ));
            if !r.hosts.is_empty() {
                out.push_str("READ HOST DISTRIBUTION:\n");
                for (host, count) in &r.hosts {
                    out.push_str(&format!(
                        "  {host} : {count} queries ({:.2}%)\n",
                        r.host_share(host)
                    ));
                }
            }
        }

        let classes = &view.cumulative.failures_by_class;
        out.push_str(&format!(
            "FAILURES: {} | {}\n",
            classes.total(),
            class_breakdown(|c| classes.get(c))
        ));
        if view.cumulative.read_only_rejections > 0 {
            out.push_str(&format!(
                "READ-ONLY REJECTIONS: {}\n",
                view.cumulative.read_only_rejections
            ));
        }
        out.push_str(&format!(
            "PHASE: {} | Writer: {}\n",
            view.phase.display_name(),
            view.writer_or_unknown()
        ));
        out.push_str(&format!("{rule}\n"));
        out
    }
}

fn class_breakdown(count: impl Fn(ErrorClass) -> u64) -> String {
    ErrorClass::ALL
        .iter()
        .map(|c| format!("{c}: {}", count(*c)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// State changes as they happen plus a one-line summary per tick.
#[derive(Debug, Default)]
pub struct EventDrivenFormatter {
    announced_deployment: bool,
}

impl ReportFormatter for EventDrivenFormatter {
    fn start(&mut self, run: &RunInfo, phase: Phase) -> Option<String> {
        let id = run.deployment_id.as_deref()?;
        if phase != Phase::Created || self.announced_deployment {
            return None;
        }
        self.announced_deployment = true;
        Some(format!(
            "[{}] 🔄 DETECTED | Blue-Green deployment: {id} | Phase: {}\n",
            chrono::Local::now().format("%H:%M:%S"),
            phase.display_name()
        ))
    }

    fn event(&mut self, run: &RunInfo, event: &EngineEvent, view: &ReportView) -> Option<String> {
        let clock = view.clock();
        match event {
            EngineEvent::WriterHostChanged { from: None, to } => Some(format!(
                "[{clock}] 🚀 STARTED  | Writers: {} | Rate: {}/sec | Pool: {} | Target: {}\n",
                run.write_workers,
                run.write_rate,
                run.pool_size,
                run.endpoint.as_deref().unwrap_or(to)
            )),
            EngineEvent::WriterHostChanged { from: Some(_), to } => Some(format!(
                "[{clock}] ✅ RECOVERY| New writer: {to} | Reconnection successful\n"
            )),
            EngineEvent::PhaseChanged(t) => {
                let mut out = String::new();
                if let TransitionReason::DeploymentIdentified { deployment_id } = &t.reason {
                    if !self.announced_deployment {
                        self.announced_deployment = true;
                        out.push_str(&format!(
                            "[{clock}] 🔄 DETECTED | Blue-Green deployment: {deployment_id} | Phase: {}\n",
                            t.to.display_name()
                        ));
                    }
                }
                out.push_str(&phase_line(&clock, t));
                Some(out)
            }
        }
    }

    fn tick(&mut self, run: &RunInfo, view: &ReportView) -> String {
        let last = view.interval.combined();
        let mut out = format!(
            "[{}] 📈 SUMMARY  | {}s | Total: {} | Success: {} ({:.1}%) | Failed: {} | Avg: {:.0}ms\n",
            view.clock(),
            run.log_interval.as_secs(),
            last.total,
            last.success,
            last.success_rate(),
            last.failed,
            last.avg_latency_ms()
        );
        if last.failed > 0 {
            let classes = &view.interval.failures_by_class;
            out.push_str(&format!(
                "[{}] ⚠️  ERRORS   | {}\n",
                view.clock(),
                class_breakdown(|c| classes.get(c))
            ));
        }
        out
    }
}

/// Fixed-width table redrawn every interval.
#[derive(Debug, Default)]
pub struct DashboardFormatter;

impl DashboardFormatter {
    fn kind_row(label: &str, kind: &KindSnapshot) -> Vec<Cell> {
        vec![
            Cell::new(format!("{label}: {}", kind.total)),
            Cell::new(format!(
                "Success: {} ({:.1}%)",
                kind.success,
                kind.success_rate()
            )),
            Cell::new(format!(
                "Failed: {} | Avg: {:.0}ms",
                kind.failed,
                kind.avg_latency_ms()
            )),
        ]
    }

    fn banner(view: &ReportView) -> Cell {
        let failed = view.interval.combined().failed;
        let (text, color) = match view.phase {
            Phase::InProgress => ("⚠️  BLUE-GREEN SWITCHOVER IN PROGRESS".to_string(), Color::Red),
            Phase::Preparation => (
                "🟡 PREPARING: Green cluster syncing data".to_string(),
                Color::Yellow,
            ),
            Phase::Post => (
                "🟠 FINALIZING: Switchover completed, stabilizing".to_string(),
                Color::Yellow,
            ),
            Phase::Created => (
                "🟡 CREATED: Green cluster ready, awaiting switchover".to_string(),
                Color::Yellow,
            ),
            Phase::Completed => (
                "✅ COMPLETED: Blue-Green deployment finished".to_string(),
                Color::Green,
            ),
            Phase::NotCreated if failed > 5 => (
                format!("💔 HIGH ERROR RATE: {failed} failures detected"),
                Color::Red,
            ),
            Phase::NotCreated => ("✅ STABLE: All systems operational".to_string(), Color::Green),
        };
        Cell::new(text).fg(color)
    }
}

impl ReportFormatter for DashboardFormatter {
    fn tick(&mut self, run: &RunInfo, view: &ReportView) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec![
            Cell::new("Cutover Workload Monitor").fg(Color::Cyan),
            Cell::new(view.timestamp()),
            Cell::new(format!("Runtime: {}", view.runtime_hms())),
        ]);

        table.add_row(vec![
            Cell::new(format!("Current Writer: {}", view.writer_or_unknown())),
            Cell::new(format!("BG Phase: {}", view.phase.display_name())),
            Cell::new(format!(
                "Deployment: {}",
                run.deployment_id.as_deref().unwrap_or("none")
            )),
        ]);

        let pool = view
            .pool
            .map(|p| format!("Pool: {}/{}", p.active, p.max))
            .unwrap_or_else(|| "Pool: n/a".to_string());
        table.add_row(vec![
            Cell::new(format!(
                "Workers: {}/{} Active",
                run.total_workers(),
                run.total_workers()
            )),
            Cell::new(pool),
            Cell::new(format!(
                "Read-only rejections: {}",
                view.cumulative.read_only_rejections
            )),
        ]);

        let last = view.interval.combined();
        table.add_row(vec![
            Cell::new(format!(
                "LAST {}s: {} ops",
                view.interval.elapsed.as_secs(),
                last.total
            )),
            Cell::new(format!(
                "Success: {} ({:.1}%)",
                last.success,
                last.success_rate()
            )),
            Cell::new(format!(
                "Failed: {} ({:.1}%)",
                last.failed,
                last.failure_rate()
            )),
        ]);

        if run.write_workers > 0 && run.read_workers > 0 {
            table.add_row(Self::kind_row("Writes", &view.interval.writes));
            table.add_row(Self::kind_row("Reads", &view.interval.reads));
        } else {
            table.add_row(vec![
                Cell::new(format!("Avg Latency: {:.0}ms", last.avg_latency_ms())),
                Cell::new(format!("Max: {:.0}ms", last.max_latency_ms())),
                Cell::new(format!("Attempts: {}", last.attempts)),
            ]);
        }

        let classes = &view.interval.failures_by_class;
        if classes.total() > 0 {
            table.add_row(vec![
                Cell::new("Recent Errors").fg(Color::Red),
                Cell::new(format!(
                    "Topology: {} | Connection: {}",
                    classes.topology_signal, classes.transient_connection
                )),
                Cell::new(format!("Terminal: {}", classes.terminal)),
            ]);
        } else {
            table.add_row(vec![
                Cell::new(format!(
                    "No errors in last {}s",
                    view.interval.elapsed.as_secs()
                )),
                Cell::new(""),
                Cell::new(""),
            ]);
        }

        let total = view.cumulative.combined();
        table.add_row(vec![
            Cell::new(format!("Since start: {} ops", total.total)),
            Cell::new(format!("Success: {}", total.success)),
            Cell::new(format!("Failed: {}", total.failed)),
        ]);

        table.add_row(vec![Cell::new(view.clock()), Self::banner(view), Cell::new("")]);

        format!("{table}\n")
    }
}

/// Shared closing section: cumulative table per kind and the phase history.
pub fn final_summary(run: &RunInfo, view: &ReportView, history: &[PhaseTransition]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Kind", "Total", "Success", "Failed", "Success %", "Avg ms", "Max ms",
    ]);

    let mut kinds = Vec::new();
    if run.write_workers > 0 {
        kinds.push(("Writes", &view.cumulative.writes));
    }
    if run.read_workers > 0 {
        kinds.push(("Reads", &view.cumulative.reads));
    }
    for (label, kind) in kinds {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(kind.total),
            Cell::new(kind.success),
            Cell::new(kind.failed),
            Cell::new(format!("{:.2}", kind.success_rate())),
            Cell::new(format!("{:.1}", kind.avg_latency_ms())),
            Cell::new(format!("{:.1}", kind.max_latency_ms())),
        ]);
    }

    let mut out = String::new();
    out.push_str(&format!("\nFINAL STATISTICS (runtime {})\n", view.runtime_hms()));
    out.push_str(&format!("{table}\n"));
    let classes = &view.cumulative.failures_by_class;
    out.push_str(&format!(
        "Failures by class: {}\n",
        class_breakdown(|c| classes.get(c))
    ));
    out.push_str(&format!(
        "Read-only rejections: {}\n",
        view.cumulative.read_only_rejections
    ));
    out.push_str(&format!(
        "Final phase: {} | Writer: {}\n",
        view.phase.display_name(),
        view.writer_or_unknown()
    ));
    if history.is_empty() {
        out.push_str("Phase transitions: none\n");
    } else {
        out.push_str("Phase transitions:\n");
        for t in history {
            out.push_str(&format!("  {} {t}\n", t.at.format("%H:%M:%S")));
        }
    }
    out
}
