//! Operation and result types exchanged between workers, the executor and
//! the statistics aggregator.

use crate::classify::ErrorClass;
use crate::error::DbError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Target label used for the read workers' introspection query.
pub const READ_TARGET: &str = "system_vars";

/// The two kinds of operation a worker can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Write,
    Read,
}

impl OperationKind {
    /// Worker label used in log lines (`Worker-3`, `Reader-1`).
    pub fn worker_label(&self) -> &'static str {
        match self {
            OperationKind::Write => "Worker",
            OperationKind::Read => "Reader",
        }
    }

    /// Label for the operation's target in log lines.
    pub fn target_label(&self) -> &'static str {
        match self {
            OperationKind::Write => "Table",
            OperationKind::Read => "Query",
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            OperationKind::Write => "INSERT",
            OperationKind::Read => "READ",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Write => write!(f, "write"),
            OperationKind::Read => write!(f, "read"),
        }
    }
}

/// Values inserted by one write operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRow {
    /// `col1`: `data-<epoch ms>`
    pub data: String,
    /// `col2`: random value in `0..1000`
    pub value: i32,
    /// `col3`: `worker-<id>`
    pub worker: String,
    /// `col4`: epoch milliseconds
    pub timestamp_ms: i64,
    /// `col5`: constant payload
    pub payload: String,
}

impl WriteRow {
    pub fn new(worker_id: usize, value: i32) -> Self {
        let now_ms = chrono::Utc::now().timestamp_millis();
        Self {
            data: format!("data-{now_ms}"),
            value,
            worker: format!("worker-{worker_id}"),
            timestamp_ms: now_ms,
            payload: "test-data".to_string(),
        }
    }
}

/// One logical operation built by a worker for a single loop iteration.
#[derive(Debug, Clone)]
pub struct Operation {
    pub kind: OperationKind,
    /// Table name for writes, [`READ_TARGET`] for reads.
    pub target: String,
    pub issued_at: Instant,
    /// Row to insert; present for writes only.
    pub row: Option<WriteRow>,
}

impl Operation {
    pub fn write(table: impl Into<String>, row: WriteRow) -> Self {
        Self {
            kind: OperationKind::Write,
            target: table.into(),
            issued_at: Instant::now(),
            row: Some(row),
        }
    }

    pub fn read() -> Self {
        Self {
            kind: OperationKind::Read,
            target: READ_TARGET.to_string(),
            issued_at: Instant::now(),
            row: None,
        }
    }
}

/// Server identity returned by the read query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub hostname: String,
    pub server_id: u64,
    pub version: String,
    pub read_only: bool,
}

impl fmt::Display for ServerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (server_id={}, version={}, read_only={})",
            self.hostname, self.server_id, self.version, self.read_only as u8
        )
    }
}

/// Final outcome of one operation, after all retries.
#[derive(Debug, Clone)]
pub struct OperationResult {
    pub kind: OperationKind,
    pub success: bool,
    pub latency: Duration,
    /// Classification of the last failure; `None` on success.
    pub error_class: Option<ErrorClass>,
    /// The last failure itself; `None` on success.
    pub error: Option<DbError>,
    /// Host that served the operation, when it could be determined.
    pub observed_host: Option<String>,
    /// Full server identity (reads only).
    pub server: Option<ServerInfo>,
    /// Number of attempts issued, including the successful one.
    pub attempts: u32,
    /// Attempts rejected because the server was in read-only mode.
    pub read_only_rejections: u32,
}

impl OperationResult {
    pub fn succeeded(kind: OperationKind, latency: Duration, attempts: u32) -> Self {
        Self {
            kind,
            success: true,
            latency,
            error_class: None,
            error: None,
            observed_host: None,
            server: None,
            attempts,
            read_only_rejections: 0,
        }
    }

    pub fn failed(
        kind: OperationKind,
        latency: Duration,
        attempts: u32,
        class: ErrorClass,
        error: DbError,
    ) -> Self {
        Self {
            kind,
            success: false,
            latency,
            error_class: Some(class),
            error: Some(error),
            observed_host: None,
            server: None,
            attempts,
            read_only_rejections: 0,
        }
    }

    pub fn with_host(mut self, host: Option<String>) -> Self {
        self.observed_host = host;
        self
    }

    pub fn with_server(mut self, server: ServerInfo) -> Self {
        self.observed_host = Some(server.hostname.clone());
        self.server = Some(server);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_info_display() {
        let info = ServerInfo {
            hostname: "ip-10-0-1-12".to_string(),
            server_id: 1834,
            version: "8.0.mysql_aurora.3.05.2".to_string(),
            read_only: false,
        };
        assert_eq!(
            info.to_string(),
            "ip-10-0-1-12 (server_id=1834, version=8.0.mysql_aurora.3.05.2, read_only=0)"
        );
    }

    #[test]
    fn test_write_row_contents() {
        let row = WriteRow::new(7, 123);
        assert!(row.data.starts_with("data-"));
        assert_eq!(row.worker, "worker-7");
        assert_eq!(row.value, 123);
        assert_eq!(row.payload, "test-data");
        assert_eq!(row.data, format!("data-{}", row.timestamp_ms));
    }

    #[test]
    fn test_with_server_sets_observed_host() {
        let info = ServerInfo {
            hostname: "replica-2".to_string(),
            server_id: 2,
            version: "8.0.36".to_string(),
            read_only: true,
        };
        let result = OperationResult::succeeded(OperationKind::Read, Duration::from_millis(3), 1)
            .with_server(info);
        assert_eq!(result.observed_host.as_deref(), Some("replica-2"));
        assert!(result.server.is_some());
    }

    #[test]
    fn test_operation_constructors() {
        let write = Operation::write("test_0001", WriteRow::new(1, 5));
        assert_eq!(write.kind, OperationKind::Write);
        assert!(write.row.is_some());

        let read = Operation::read();
        assert_eq!(read.kind, OperationKind::Read);
        assert_eq!(read.target, READ_TARGET);
        assert!(read.row.is_none());
    }
}
