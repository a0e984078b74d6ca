//! The dashboard banner follows the tracker through a whole cutover.

use std::time::Duration;
use workload_core::{
    DbError, ErrorClass, EventBus, OperationKind, OperationResult, Phase, PhaseTimers,
    PhaseTracker, StatsAggregator, WorkloadConfig,
};
use workload_report::{DashboardFormatter, ReportFormatter, ReportView, RunInfo};

fn render(run: &RunInfo, stats: &StatsAggregator, tracker: &PhaseTracker, writer: &str) -> String {
    let snapshot = stats.snapshot();
    let view = ReportView {
        now: chrono::Local::now(),
        runtime: snapshot.elapsed,
        cumulative: snapshot.clone(),
        interval: snapshot,
        phase: tracker.current(),
        writer: Some(writer.to_string()),
        pool: None,
    };
    DashboardFormatter.tick(run, &view)
}

#[tokio::test(start_paused = true)]
async fn test_banner_tracks_phase() {
    let config = WorkloadConfig::new()
        .with_write_workers(4, 10)
        .with_deployment_id(Some("bgd-e2e".to_string()));
    let run = RunInfo::from_config(&config);
    let stats = StatsAggregator::new();
    let tracker = PhaseTracker::with_timers(
        EventBus::new(),
        PhaseTimers {
            preparation_grace: Some(Duration::from_secs(30)),
            post_settle: Some(Duration::from_secs(60)),
        },
    );
    tracker.note_deployment("bgd-e2e");

    let out = render(&run, &stats, &tracker, "blue-1");
    assert!(out.contains("CREATED: Green cluster ready"));
    assert!(out.contains("Deployment: bgd-e2e"));

    tokio::time::sleep(Duration::from_secs(31)).await;
    tracker.evaluate_timers();
    assert_eq!(tracker.current(), Phase::Preparation);
    assert!(render(&run, &stats, &tracker, "blue-1").contains("PREPARING"));

    let error = DbError::new("The active SQL connection has changed");
    tracker.observe_failure(ErrorClass::TopologySignal, &error);
    stats.record(&OperationResult::failed(
        OperationKind::Write,
        Duration::from_millis(12),
        5,
        ErrorClass::TopologySignal,
        error,
    ));
    let out = render(&run, &stats, &tracker, "blue-1");
    assert!(out.contains("SWITCHOVER IN PROGRESS"));
    assert!(out.contains("Topology: 1"));

    tracker.observe_host_change("blue-1", "green-1");
    let out = render(&run, &stats, &tracker, "green-1");
    assert!(out.contains("FINALIZING"));
    assert!(out.contains("Current Writer: green-1"));

    tokio::time::sleep(Duration::from_secs(61)).await;
    tracker.evaluate_timers();
    let out = render(&run, &stats, &tracker, "green-1");
    assert!(out.contains("COMPLETED: Blue-Green deployment finished"));
}
