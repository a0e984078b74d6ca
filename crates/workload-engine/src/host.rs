//! Host identity tracking.
//!
//! Each worker keeps its own last-seen host to log when it individually gets
//! migrated. The global writer host, fed by write workers only, is what the
//! phase tracker watches: readers are spread across replicas and would flap.

use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;
use workload_core::{EngineEvent, EventBus, PhaseTracker};

/// Global writer identity.
#[derive(Debug)]
pub struct HostTracker {
    writer: Mutex<Option<String>>,
    phase: Arc<PhaseTracker>,
    events: EventBus,
}

impl HostTracker {
    pub fn new(phase: Arc<PhaseTracker>, events: EventBus) -> Self {
        Self {
            writer: Mutex::new(None),
            phase,
            events,
        }
    }

    pub fn current_writer(&self) -> Option<String> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Record the host that served a successful write. Returns the previous
    /// host when this is a change. The first sighting is not a change.
    pub fn observe_writer(&self, host: &str) -> Option<String> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        match writer.as_deref() {
            Some(current) if current == host => None,
            Some(current) => {
                let previous = current.to_string();
                info!("Writer host changed: {previous} → {host}");
                // Lock order is writer then phase; the tracker never calls back.
                self.phase.observe_host_change(&previous, host);
                *writer = Some(host.to_string());
                self.events.publish(EngineEvent::WriterHostChanged {
                    from: Some(previous.clone()),
                    to: host.to_string(),
                });
                Some(previous)
            }
            None => {
                info!("Writer host: {host}");
                *writer = Some(host.to_string());
                self.events.publish(EngineEvent::WriterHostChanged {
                    from: None,
                    to: host.to_string(),
                });
                None
            }
        }
    }
}

/// One worker's view of the host serving it. Never shared.
#[derive(Debug, Default)]
pub struct WorkerHost {
    last: Option<String>,
}

impl WorkerHost {
    pub fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }

    /// Returns the previous host when `host` differs from it.
    pub fn observe(&mut self, host: &str) -> Option<String> {
        if self.last.as_deref() == Some(host) {
            return None;
        }
        self.last.replace(host.to_string())
    }
}
