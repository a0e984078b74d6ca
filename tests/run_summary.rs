//! Engine, reporter and run summary wired together the way `run` does it,
//! against a scripted backend that cuts over from blue-1 to green-1.

use chrono::Utc;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use workload_core::{ConsoleFormat, DbError, PhaseTimers, RetryPolicy, WorkloadConfig};
use workload_engine::testing::{Script, ScriptedProvider};
use workload_engine::{ConnectionProvider, WorkloadEngine};
use workload_report::{formatter_for, Reporter, RunInfo, RunSummary};

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_event_driven_run_writes_summary() {
    let provider = Arc::new(ScriptedProvider::new(Script::Cutover {
        before: "blue-1".to_string(),
        after: "green-1".to_string(),
        error: DbError::new("Communications link failure"),
        fail_after: Duration::from_secs(3),
        fail_for: Duration::from_secs(3),
    }));
    let config = WorkloadConfig::new()
        .with_write_workers(3, 20)
        .with_read_workers(1, 10)
        .with_log_interval(Duration::from_secs(5))
        .with_console_format(ConsoleFormat::EventDriven)
        .with_retry(RetryPolicy::new(3, Duration::from_millis(100)))
        .with_timers(PhaseTimers::disabled())
        .with_seed(Some(11));

    let engine = WorkloadEngine::new(config.clone(), provider.clone()).unwrap();
    engine.check_connectivity().await.unwrap();

    let output = Captured::default();
    let hosts = engine.hosts();
    let pool_provider = provider.clone();
    let reporter = Reporter::new(
        formatter_for(config.console_format),
        RunInfo::from_config(&config).with_endpoint("cluster.local:3306"),
        engine.stats(),
        engine.phase(),
    )
    .with_sink(Box::new(output.clone()))
    .with_writer_probe(move || hosts.current_writer())
    .with_pool_probe(move || pool_provider.pool_status());

    let started_at = Utc::now();
    let reporter_stop = CancellationToken::new();
    let reporter_task = tokio::spawn(reporter.run(engine.events().subscribe(), reporter_stop.clone()));
    let pool = engine.start();

    tokio::time::sleep(Duration::from_secs(12)).await;
    let shutdown = pool.shutdown().await;
    reporter_stop.cancel();
    let mut reporter = reporter_task.await.unwrap();
    let history = engine.phase().history();
    let stats = reporter.finish(&history);

    let text = String::from_utf8(output.0.lock().unwrap().clone()).unwrap();
    assert!(text.contains("🚀 STARTED  | Writers: 3 | Rate: 20/sec | Pool: 100 | Target: cluster.local:3306"));
    assert!(text.contains("🔄 BG-PHASE | 🔵 NOT_CREATED → 🔴 IN_PROGRESS"));
    assert!(text.contains("✅ RECOVERY| New writer: green-1"));
    assert!(text.contains("🔄 BG-PHASE | 🔴 IN_PROGRESS → 🟠 POST | host switched: blue-1 → green-1"));
    assert_eq!(text.matches("📈 SUMMARY").count(), 3);
    assert!(text.contains("FINAL STATISTICS"));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("summary.json");
    RunSummary {
        started_at,
        ended_at: Utc::now(),
        config,
        final_phase: engine.phase().current(),
        final_writer: engine.hosts().current_writer(),
        stats,
        phase_history: history,
        abandoned_workers: shutdown.abandoned,
    }
    .write_to(&path)
    .unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["final_phase"], "POST");
    assert_eq!(json["final_writer"], "green-1");
    assert_eq!(json["abandoned_workers"], 0);
    assert_eq!(json["phase_history"].as_array().unwrap().len(), 2);
    assert_eq!(json["config"]["console_format"], "event_driven");
    assert!(json["stats"]["writes"]["success"].as_u64().unwrap() > 0);
    assert!(json["stats"]["failures_by_class"]["topology_signal"].as_u64().unwrap() > 0);
    assert_eq!(provider.acquired(), provider.released());
}

#[tokio::test(start_paused = true)]
async fn test_events_from_in_flight_operations_are_reported() {
    // Every statement takes 3s, so the first writer sighting lands at 6s,
    // well after shutdown was requested.
    let provider = Arc::new(ScriptedProvider::with_latency(
        Script::Healthy {
            host: "blue-1".to_string(),
        },
        Duration::from_secs(3),
    ));
    let config = WorkloadConfig::new()
        .with_write_workers(1, 1)
        .with_read_workers(0, 0)
        .with_log_interval(Duration::from_secs(60))
        .with_console_format(ConsoleFormat::EventDriven)
        .with_timers(PhaseTimers::disabled());
    let engine = WorkloadEngine::new(config.clone(), provider.clone()).unwrap();

    let output = Captured::default();
    let reporter = Reporter::new(
        formatter_for(config.console_format),
        RunInfo::from_config(&config),
        engine.stats(),
        engine.phase(),
    )
    .with_sink(Box::new(output.clone()));

    let reporter_stop = CancellationToken::new();
    let reporter_task = tokio::spawn(reporter.run(engine.events().subscribe(), reporter_stop.clone()));
    let pool = engine.start();

    tokio::time::sleep(Duration::from_secs(1)).await;
    let shutdown = pool.shutdown().await;
    assert_eq!(shutdown.abandoned, 0);
    assert_eq!(engine.hosts().current_writer().as_deref(), Some("blue-1"));
    reporter_stop.cancel();
    let mut reporter = reporter_task.await.unwrap();
    let stats = reporter.finish(&engine.phase().history());

    assert_eq!(stats.writes.success, 1);
    let text = String::from_utf8(output.0.lock().unwrap().clone()).unwrap();
    assert!(text.contains("🚀 STARTED  | Writers: 1 | Rate: 1/sec"));
}
