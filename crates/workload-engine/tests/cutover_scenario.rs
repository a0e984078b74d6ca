//! Full engine run against a backend that goes dark for five seconds and
//! comes back on a different writer.

use std::sync::Arc;
use std::time::Duration;
use workload_core::{
    DbError, EngineEvent, Phase, PhaseTimers, RetryPolicy, TransitionReason, WorkloadConfig,
};
use workload_engine::testing::{Script, ScriptedProvider};
use workload_engine::WorkloadEngine;

const FAIL_AFTER: Duration = Duration::from_secs(2);
const FAIL_FOR: Duration = Duration::from_secs(5);

fn cutover_provider() -> Arc<ScriptedProvider> {
    Arc::new(ScriptedProvider::new(Script::Cutover {
        before: "blue-1".to_string(),
        after: "green-1".to_string(),
        error: DbError::new("Communications link failure\n\nThe last packet sent successfully to the server was 0 milliseconds ago."),
        fail_after: FAIL_AFTER,
        fail_for: FAIL_FOR,
    }))
}

fn config() -> WorkloadConfig {
    WorkloadConfig::new()
        .with_write_workers(4, 10)
        .with_read_workers(1, 5)
        .with_retry(RetryPolicy::new(5, Duration::from_millis(100)))
        .with_timers(PhaseTimers::disabled())
        .with_seed(Some(7))
}

#[tokio::test(start_paused = true)]
async fn test_cutover_phase_trajectory() {
    let provider = cutover_provider();
    let engine = WorkloadEngine::new(config(), provider.clone()).unwrap();
    let mut events = engine.events().subscribe();
    let stats = engine.stats();
    let phase = engine.phase();

    let pool = engine.start();

    // Healthy on blue.
    tokio::time::sleep(Duration::from_millis(1900)).await;
    let before = stats.snapshot();
    assert_eq!(before.combined().failed, 0);
    assert!(before.writes.success > 0);
    assert_eq!(phase.current(), Phase::NotCreated);
    assert_eq!(engine.hosts().current_writer().as_deref(), Some("blue-1"));

    // Inside the outage.
    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert_eq!(phase.current(), Phase::InProgress);
    assert!(stats.snapshot().combined().failed > 0);

    // Recovered on green.
    tokio::time::sleep(Duration::from_millis(4000)).await;
    let recovered = stats.snapshot();
    assert_eq!(phase.current(), Phase::Post);
    assert_eq!(engine.hosts().current_writer().as_deref(), Some("green-1"));

    tokio::time::sleep(Duration::from_secs(4)).await;
    let settled = stats.snapshot();
    assert_eq!(settled.combined().failed, recovered.combined().failed);
    assert!(settled.writes.success > recovered.writes.success);
    assert!(settled.writes.hosts.contains_key("green-1"));
    assert!(settled.failures_by_class.topology_signal > 0);
    assert_eq!(settled.failures_by_class.terminal, 0);

    let report = pool.shutdown().await;
    assert_eq!(report.abandoned, 0);
    assert_eq!(provider.acquired(), provider.released());

    let history = phase.history();
    let trajectory: Vec<(Phase, Phase)> = history.iter().map(|t| (t.from, t.to)).collect();
    assert_eq!(
        trajectory,
        vec![
            (Phase::NotCreated, Phase::InProgress),
            (Phase::InProgress, Phase::Post),
        ]
    );
    assert!(matches!(
        history[0].reason,
        TransitionReason::ErrorDetected { .. }
    ));
    assert_eq!(
        history[1].reason,
        TransitionReason::HostSwitched {
            from: "blue-1".to_string(),
            to: "green-1".to_string(),
        }
    );

    // The move to Post is made by the same write that first saw green-1.
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    let switch = seen
        .iter()
        .position(|e| {
            matches!(e, EngineEvent::WriterHostChanged { to, .. } if to == "green-1")
        })
        .unwrap();
    assert!(matches!(
        &seen[switch - 1],
        EngineEvent::PhaseChanged(t) if t.to == Phase::Post
    ));
}

#[tokio::test(start_paused = true)]
async fn test_silent_cutover_with_deployment_id() {
    let provider = Arc::new(ScriptedProvider::new(Script::Healthy {
        host: "blue-1".to_string(),
    }));
    let config = config().with_deployment_id(Some("bgd-abc123".to_string()));
    let engine = WorkloadEngine::new(config, provider.clone()).unwrap();
    let phase = engine.phase();
    assert_eq!(phase.current(), Phase::Created);

    let pool = engine.start();
    tokio::time::sleep(Duration::from_secs(1)).await;
    provider.set_script(Script::Healthy {
        host: "green-1".to_string(),
    });
    tokio::time::sleep(Duration::from_secs(1)).await;
    pool.shutdown().await;

    assert_eq!(phase.current(), Phase::Post);
    let last = phase.history().pop().unwrap();
    assert!(matches!(
        last.reason,
        TransitionReason::UnexpectedHostChange { .. }
    ));
    assert_eq!(engine.stats().snapshot().combined().failed, 0);
}

#[tokio::test(start_paused = true)]
async fn test_leftover_error_after_switch_still_settles() {
    let provider = Arc::new(ScriptedProvider::new(Script::Healthy {
        host: "blue-1".to_string(),
    }));
    let config = WorkloadConfig::new()
        .with_write_workers(2, 10)
        .with_read_workers(0, 0)
        .with_retry(RetryPolicy::new(5, Duration::from_millis(100)))
        .with_timers(PhaseTimers {
            preparation_grace: None,
            post_settle: Some(Duration::from_secs(60)),
        })
        .with_seed(Some(3));
    let engine = WorkloadEngine::new(config, provider.clone()).unwrap();
    let phase = engine.phase();
    let pool = engine.start();

    tokio::time::sleep(Duration::from_secs(1)).await;
    provider.set_script(Script::Failing {
        error: DbError::new("Communications link failure"),
    });
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(phase.current(), Phase::InProgress);

    provider.set_script(Script::Healthy {
        host: "green-1".to_string(),
    });
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(phase.current(), Phase::Post);

    // a stale pooled connection fails once more on the new writer
    provider.set_script(Script::Failing {
        error: DbError::new("Connection is closed"),
    });
    tokio::time::sleep(Duration::from_millis(300)).await;
    provider.set_script(Script::Healthy {
        host: "green-1".to_string(),
    });
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(phase.current(), Phase::Post);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(phase.evaluate_timers().is_none());

    for _ in 0..3 {
        tokio::time::sleep(Duration::from_secs(60)).await;
        phase.evaluate_timers();
    }
    pool.shutdown().await;

    assert_eq!(phase.current(), Phase::Completed);
    let trajectory: Vec<(Phase, Phase)> =
        phase.history().iter().map(|t| (t.from, t.to)).collect();
    assert_eq!(
        trajectory,
        vec![
            (Phase::NotCreated, Phase::InProgress),
            (Phase::InProgress, Phase::Post),
            (Phase::Post, Phase::Completed),
        ]
    );
    assert_eq!(engine.hosts().current_writer().as_deref(), Some("green-1"));
    assert_eq!(provider.acquired(), provider.released());
}
