//! Best-effort inference of the cutover phase.
//!
//! The tracker never sees an authoritative event feed. It advances from side
//! channels only: topology-signal errors, writer host changes, an operator
//! supplied deployment id, and two documented time heuristics. It is allowed
//! to be wrong and never returns an error.
//!
//! Every rule is evaluated and applied under one mutex, so a read of the
//! current phase and the write that follows cannot interleave with another
//! worker's transition.

use crate::classify::ErrorClass;
use crate::config::PhaseTimers;
use crate::error::DbError;
use crate::events::{EngineEvent, EventBus};
use crate::phase::{Phase, PhaseTransition, TransitionReason};
use chrono::Utc;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;
use tracing::info;

#[derive(Debug)]
struct TrackerState {
    phase: Phase,
    entered_at: Instant,
    switchover_in_progress: bool,
    last_signal_at: Option<Instant>,
    history: Vec<PhaseTransition>,
}

#[derive(Debug)]
pub struct PhaseTracker {
    state: Mutex<TrackerState>,
    timers: PhaseTimers,
    events: EventBus,
}

impl PhaseTracker {
    pub fn new(events: EventBus) -> Self {
        Self::with_timers(events, PhaseTimers::default())
    }

    pub fn with_timers(events: EventBus, timers: PhaseTimers) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                phase: Phase::NotCreated,
                entered_at: Instant::now(),
                switchover_in_progress: false,
                last_signal_at: None,
                history: Vec::new(),
            }),
            timers,
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current(&self) -> Phase {
        self.lock().phase
    }

    pub fn switchover_in_progress(&self) -> bool {
        self.lock().switchover_in_progress
    }

    /// All executed transitions, oldest first.
    pub fn history(&self) -> Vec<PhaseTransition> {
        self.lock().history.clone()
    }

    /// Feed one classified failure. Once the switchover has started, a
    /// topology signal only restarts the `Post` quiet period.
    pub fn observe_failure(&self, class: ErrorClass, error: &DbError) -> Option<PhaseTransition> {
        if class != ErrorClass::TopologySignal {
            return None;
        }
        self.apply(|state, now| {
            state.last_signal_at = Some(now);
            if state.phase >= Phase::InProgress {
                return None;
            }
            Some((
                Phase::InProgress,
                TransitionReason::ErrorDetected {
                    error: first_line(&error.message),
                },
            ))
        })
    }

    /// Feed a change of the globally observed writer host.
    pub fn observe_host_change(&self, from: &str, to: &str) -> Option<PhaseTransition> {
        self.apply(|state, _| {
            if state.switchover_in_progress || state.phase == Phase::InProgress {
                return Some((
                    Phase::Post,
                    TransitionReason::HostSwitched {
                        from: from.to_string(),
                        to: to.to_string(),
                    },
                ));
            }
            if matches!(state.phase, Phase::Created | Phase::Preparation) {
                return Some((
                    Phase::Post,
                    TransitionReason::UnexpectedHostChange {
                        from: from.to_string(),
                        to: to.to_string(),
                    },
                ));
            }
            None
        })
    }

    /// An operator supplied deployment id means a deployment exists.
    pub fn note_deployment(&self, deployment_id: &str) -> Option<PhaseTransition> {
        if deployment_id.is_empty() {
            return None;
        }
        self.apply(|state, _| {
            (state.phase == Phase::NotCreated).then(|| {
                (
                    Phase::Created,
                    TransitionReason::DeploymentIdentified {
                        deployment_id: deployment_id.to_string(),
                    },
                )
            })
        })
    }

    /// Run the time-based heuristics against the current clock.
    pub fn evaluate_timers(&self) -> Option<PhaseTransition> {
        let timers = &self.timers;
        self.apply(|state, now| match state.phase {
            Phase::Created => {
                let grace = timers.preparation_grace?;
                let waited = now.saturating_duration_since(state.entered_at);
                (waited > grace).then(|| {
                    (
                        Phase::Preparation,
                        TransitionReason::PreparationAssumed {
                            after_secs: waited.as_secs(),
                        },
                    )
                })
            }
            Phase::Post => {
                let settle = timers.post_settle?;
                let quiet_since = match state.last_signal_at {
                    Some(signal) if signal > state.entered_at => signal,
                    _ => state.entered_at,
                };
                let quiet = now.saturating_duration_since(quiet_since);
                (quiet > settle).then(|| {
                    (
                        Phase::Completed,
                        TransitionReason::Settled {
                            after_secs: quiet.as_secs(),
                        },
                    )
                })
            }
            _ => None,
        })
    }

    /// The single serialized transition point. `decide` runs under the lock
    /// and names the target phase; setting the current phase again, or any
    /// edge [`Phase::can_transition_to`] rejects, is a silent no-op.
    fn apply<F>(&self, decide: F) -> Option<PhaseTransition>
    where
        F: FnOnce(&mut TrackerState, Instant) -> Option<(Phase, TransitionReason)>,
    {
        let mut state = self.lock();
        let now = Instant::now();
        let (to, reason) = decide(&mut state, now)?;
        let from = state.phase;
        if !from.can_transition_to(to) {
            return None;
        }

        state.phase = to;
        state.entered_at = now;
        match to {
            Phase::InProgress => state.switchover_in_progress = true,
            Phase::Post | Phase::Completed => state.switchover_in_progress = false,
            _ => {}
        }

        let transition = PhaseTransition {
            from,
            to,
            reason,
            at: Utc::now(),
        };
        info!(
            "Blue-Green phase transition: {} → {} ({})",
            from.name(),
            to.name(),
            transition.reason
        );
        state.history.push(transition.clone());
        self.events
            .publish(EngineEvent::PhaseChanged(transition.clone()));
        Some(transition)
    }
}

fn first_line(message: &str) -> String {
    message.lines().next().unwrap_or_default().trim().to_string()
}
