//! Per-worker pacing and pool-wide counter consistency.

use std::sync::Arc;
use std::time::Duration;
use workload_core::{PhaseTimers, WorkloadConfig};
use workload_engine::testing::{Script, ScriptedProvider};
use workload_engine::WorkloadEngine;

fn healthy() -> Arc<ScriptedProvider> {
    Arc::new(ScriptedProvider::new(Script::Healthy {
        host: "blue-1".to_string(),
    }))
}

#[tokio::test(start_paused = true)]
async fn test_rate_of_ten_for_one_second() {
    let provider = healthy();
    let config = WorkloadConfig::new().with_write_workers(1, 10);
    let engine = WorkloadEngine::new(config, provider.clone()).unwrap();

    let pool = engine.start();
    tokio::time::sleep(Duration::from_secs(1)).await;
    let report = pool.shutdown().await;

    let issued = report.operations();
    assert!((9..=11).contains(&issued), "issued {issued}");
    assert_eq!(engine.stats().snapshot().writes.total, issued);
}

#[tokio::test(start_paused = true)]
async fn test_rate_holds_with_slow_backend() {
    let provider = Arc::new(ScriptedProvider::with_latency(
        Script::Healthy {
            host: "blue-1".to_string(),
        },
        Duration::from_millis(30),
    ));
    let config = WorkloadConfig::new().with_write_workers(1, 10);
    let engine = WorkloadEngine::new(config, provider).unwrap();

    let pool = engine.start();
    tokio::time::sleep(Duration::from_secs(2)).await;
    let issued = pool.shutdown().await.operations();

    // Latency is absorbed by the pacing sleep.
    assert!((19..=21).contains(&issued), "issued {issued}");
}

#[tokio::test]
async fn test_zero_rate_is_unthrottled() {
    let provider = healthy();
    let config = WorkloadConfig::new().with_write_workers(1, 0);
    let engine = WorkloadEngine::new(config, provider).unwrap();

    let pool = engine.start();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let issued = pool.shutdown().await.operations();

    assert!(issued > 100, "issued {issued}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_workers_keep_counters_consistent() {
    let provider = healthy();
    let config = WorkloadConfig::new()
        .with_write_workers(48, 0)
        .with_read_workers(16, 0)
        .with_timers(PhaseTimers::disabled());
    let engine = WorkloadEngine::new(config, provider.clone()).unwrap();
    let stats = engine.stats();

    let pool = engine.start();
    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let snap = stats.snapshot();
        assert_eq!(snap.writes.total, snap.writes.success + snap.writes.failed);
        assert_eq!(snap.reads.total, snap.reads.success + snap.reads.failed);
    }
    let report = pool.shutdown().await;

    let snap = stats.snapshot();
    assert_eq!(report.workers.len(), 64);
    assert_eq!(snap.combined().total, report.operations());
    assert_eq!(snap.combined().failed, 0);
    assert_eq!(provider.acquired(), provider.released());
}
