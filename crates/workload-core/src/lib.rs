//! Core types for the cutover workload engine.
//!
//! This crate holds everything the engine needs that does not touch a
//! connection: the operation and result types, the error classifier, the
//! phase tracker that infers where a blue/green cutover currently is, and the
//! lock-free statistics aggregator shared by every worker.
//!
//! # Example
//!
//! ```ignore
//! use workload_core::{classify, DbError, EventBus, PhaseTracker};
//!
//! let events = EventBus::default();
//! let tracker = PhaseTracker::new(events.clone());
//!
//! let err = DbError::new("Communications link failure");
//! tracker.observe_failure(classify(&err), &err);
//! assert_eq!(tracker.current(), workload_core::Phase::InProgress);
//! ```

pub mod classify;
pub mod config;
pub mod error;
pub mod events;
pub mod phase;
pub mod stats;
pub mod tracker;
pub mod types;

pub use classify::{classify, is_read_only, ErrorClass};
pub use config::{BackoffStrategy, ConsoleFormat, PhaseTimers, RetryPolicy, WorkloadConfig};
pub use error::{DbError, WorkloadError};
pub use events::{EngineEvent, EventBus};
pub use phase::{Phase, PhaseTransition, TransitionReason};
pub use stats::{ClassCounts, KindSnapshot, PoolStatus, StatsAggregator, StatsSnapshot};
pub use tracker::PhaseTracker;
pub use types::{Operation, OperationKind, OperationResult, ServerInfo, WriteRow};
