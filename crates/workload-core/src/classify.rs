//! Error classification.
//!
//! Maps a raw backend failure onto the three classes the engine reacts to.
//! The mapping is a pure function of the error's text and server code.

use crate::error::DbError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Connection-level failure unrelated to a topology change. Retried.
    TransientConnection,
    /// Failure that is a plausible side effect of a cutover in progress.
    /// Retried, and advances the phase tracker.
    TopologySignal,
    /// Application-level failure. Not retried, never influences the phase.
    Terminal,
}

impl ErrorClass {
    pub const ALL: [ErrorClass; 3] = [
        ErrorClass::TransientConnection,
        ErrorClass::TopologySignal,
        ErrorClass::Terminal,
    ];

    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorClass::Terminal)
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            ErrorClass::TransientConnection => 0,
            ErrorClass::TopologySignal => 1,
            ErrorClass::Terminal => 2,
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::TransientConnection => write!(f, "transient_connection"),
            ErrorClass::TopologySignal => write!(f, "topology_signal"),
            ErrorClass::Terminal => write!(f, "terminal"),
        }
    }
}

/// Messages that indicate the connection was swapped, cut or closed under us.
const TOPOLOGY_MARKERS: &[&str] = &[
    "the active sql connection has changed",
    "communications link failure",
    "connection is closed",
    "connection to the server is closed",
    "connection closed",
];

/// Messages of driver/socket level failures.
const CONNECTION_MARKERS: &[&str] = &[
    "timed out",
    "timeout",
    "connection reset",
    "connection refused",
    "broken pipe",
    "lost connection",
    "server has gone away",
    "can't connect",
    "too many connections",
    "i/o error",
    "io error",
    "unexpected eof",
    "pool was disconnected",
];

/// MySQL server codes that are connection-level rather than application-level.
const CONNECTION_CODES: &[u16] = &[
    1040, // too many connections
    1053, // server shutdown in progress
    1152, // aborted connection
    1158, // network read error
    1159, // network read timeout
    1160, // network write error
    1161, // network write timeout
    1205, // lock wait timeout
    1290, // running with --read-only
    1836, // running in read-only mode
    2002, // can't connect (socket)
    2003, // can't connect (tcp)
    2006, // server has gone away
    2013, // lost connection during query
];

const READ_ONLY_CODES: &[u16] = &[1290, 1836];

/// Classify a raw failure.
///
/// Errors that carry a server code outside [`CONNECTION_CODES`] and match no
/// marker are application errors. Errors without any server code come from
/// the driver or the socket and are treated as connection-level.
pub fn classify(error: &DbError) -> ErrorClass {
    let message = error.message.to_lowercase();

    if TOPOLOGY_MARKERS.iter().any(|m| message.contains(m)) {
        return ErrorClass::TopologySignal;
    }

    if CONNECTION_MARKERS.iter().any(|m| message.contains(m)) || is_read_only(error) {
        return ErrorClass::TransientConnection;
    }

    match error.code {
        Some(code) if CONNECTION_CODES.contains(&code) => ErrorClass::TransientConnection,
        Some(_) => ErrorClass::Terminal,
        None => ErrorClass::TransientConnection,
    }
}

/// Whether the failure is a write rejected by a read-only server, which is
/// what a client still pinned to the old writer sees after a cutover.
pub fn is_read_only(error: &DbError) -> bool {
    if error.code.is_some_and(|c| READ_ONLY_CODES.contains(&c)) {
        return true;
    }
    let message = error.message.to_lowercase();
    message.contains("read-only") || message.contains("read_only") || message.contains("read only")
}
