//! Blue/green cutover phases and transition records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inferred stage of a topology change, in progression order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    #[default]
    NotCreated,
    Created,
    Preparation,
    InProgress,
    Post,
    Completed,
}

/// Presentation metadata for a phase.
#[derive(Debug, Clone, Copy)]
pub struct PhaseInfo {
    pub name: &'static str,
    pub emoji: &'static str,
    pub description: &'static str,
}

const PHASE_INFO: [PhaseInfo; 6] = [
    PhaseInfo {
        name: "NOT_CREATED",
        emoji: "🔵",
        description: "No deployment",
    },
    PhaseInfo {
        name: "CREATED",
        emoji: "🟡",
        description: "Green cluster created",
    },
    PhaseInfo {
        name: "PREPARATION",
        emoji: "🟡",
        description: "Syncing data",
    },
    PhaseInfo {
        name: "IN_PROGRESS",
        emoji: "🔴",
        description: "SWITCHING OVER",
    },
    PhaseInfo {
        name: "POST",
        emoji: "🟠",
        description: "Finalizing",
    },
    PhaseInfo {
        name: "COMPLETED",
        emoji: "🟢",
        description: "Complete",
    },
];

impl Phase {
    pub fn info(&self) -> &'static PhaseInfo {
        &PHASE_INFO[*self as usize]
    }

    pub fn name(&self) -> &'static str {
        self.info().name
    }

    /// `🔴 IN_PROGRESS`
    pub fn display_name(&self) -> String {
        let info = self.info();
        format!("{} {}", info.emoji, info.name)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed)
    }

    /// Whether `self -> to` is a legal executed transition. Only forward
    /// moves are legal, and nothing leaves `Completed`.
    pub fn can_transition_to(&self, to: Phase) -> bool {
        !self.is_terminal() && to > *self
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a transition was executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionReason {
    /// A topology-signal error was observed.
    ErrorDetected { error: String },
    /// The writer host changed while a switchover was in progress.
    HostSwitched { from: String, to: String },
    /// The writer host changed without any error seen first.
    UnexpectedHostChange { from: String, to: String },
    /// A deployment identifier was supplied by the operator.
    DeploymentIdentified { deployment_id: String },
    /// Approximate: the phase sat in `Created` past the grace period.
    PreparationAssumed { after_secs: u64 },
    /// Approximate: the phase sat in `Post` with no new signal.
    Settled { after_secs: u64 },
}

impl fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionReason::ErrorDetected { error } => write!(f, "error-detected: {error}"),
            TransitionReason::HostSwitched { from, to } => {
                write!(f, "host switched: {from} → {to}")
            }
            TransitionReason::UnexpectedHostChange { from, to } => {
                write!(f, "unexpected host change: {from} → {to}")
            }
            TransitionReason::DeploymentIdentified { deployment_id } => {
                write!(f, "deployment id specified: {deployment_id}")
            }
            TransitionReason::PreparationAssumed { after_secs } => {
                write!(f, "simulated: green cluster syncing (no signal for {after_secs}s)")
            }
            TransitionReason::Settled { after_secs } => {
                write!(f, "simulated: no topology signal for {after_secs}s after switch")
            }
        }
    }
}

/// One executed phase transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: Phase,
    pub to: Phase,
    pub reason: TransitionReason,
    pub at: DateTime<Utc>,
}

impl fmt::Display for PhaseTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} → {} | {}",
            self.from.display_name(),
            self.to.display_name(),
            self.reason
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        assert!(Phase::NotCreated < Phase::Created);
        assert!(Phase::Created < Phase::Preparation);
        assert!(Phase::Preparation < Phase::InProgress);
        assert!(Phase::InProgress < Phase::Post);
        assert!(Phase::Post < Phase::Completed);
    }

    #[test]
    fn test_display_lookup() {
        assert_eq!(Phase::InProgress.display_name(), "🔴 IN_PROGRESS");
        assert_eq!(Phase::NotCreated.info().description, "No deployment");
        assert_eq!(Phase::Completed.to_string(), "COMPLETED");
    }

    #[test]
    fn test_allowed_edges() {
        assert!(Phase::NotCreated.can_transition_to(Phase::InProgress));
        assert!(Phase::InProgress.can_transition_to(Phase::Post));
        assert!(Phase::Post.can_transition_to(Phase::Completed));
        assert!(!Phase::Post.can_transition_to(Phase::InProgress));
        assert!(!Phase::InProgress.can_transition_to(Phase::InProgress));
        assert!(!Phase::Post.can_transition_to(Phase::Created));
        assert!(!Phase::Preparation.can_transition_to(Phase::Created));
        assert!(!Phase::Completed.can_transition_to(Phase::InProgress));
    }

    #[test]
    fn test_reason_display() {
        let reason = TransitionReason::HostSwitched {
            from: "blue-1".to_string(),
            to: "green-1".to_string(),
        };
        assert_eq!(reason.to_string(), "host switched: blue-1 → green-1");
    }

    #[test]
    fn test_phase_serializes_as_name() {
        let json = serde_json::to_string(&Phase::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
    }
}
