//! State-change events published by the engine.
//!
//! The event-driven console format subscribes to these instead of diffing
//! snapshots, so transitions show up as they happen.

use crate::phase::PhaseTransition;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The phase tracker executed a transition.
    PhaseChanged(PhaseTransition),
    /// The writer host identity changed. `from` is `None` on first sight.
    WriterHostChanged { from: Option<String>, to: String },
}

/// Cloneable handle to the engine's broadcast channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Publish an event. Having no subscriber is not an error.
    pub fn publish(&self, event: EngineEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
