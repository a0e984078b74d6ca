//! In-memory connection provider for exercising the engine without a server.
//!
//! [`ScriptedProvider`] answers statements according to a [`Script`] and
//! counts every lease it hands out and gets back, so tests can assert the
//! acquire/release pairing and the number of attempts.

use crate::provider::{Connection, ConnectionProvider, Statement, StatementOutcome};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use workload_core::{DbError, PoolStatus, ServerInfo};

/// How the stub backend behaves.
#[derive(Debug, Clone)]
pub enum Script {
    /// Every statement succeeds against `host`.
    Healthy { host: String },
    /// Every statement fails with `error`.
    Failing { error: DbError },
    /// Inserts succeed but report zero affected rows.
    NoRows,
    /// Inserts succeed, the follow-up host lookup fails.
    HostLookupFails,
    /// Serve `before`, then fail everything with `error` for `fail_for`
    /// starting `fail_after` into the run, then serve `after`.
    Cutover {
        before: String,
        after: String,
        error: DbError,
        fail_after: Duration,
        fail_for: Duration,
    },
}

#[derive(Debug)]
struct Shared {
    script: Mutex<Script>,
    started: Instant,
    latency: Duration,
    acquired: AtomicU64,
    released: AtomicU64,
    statements: AtomicU64,
    max: usize,
}

impl Shared {
    fn respond(&self, statement: &Statement) -> Result<StatementOutcome, DbError> {
        self.statements.fetch_add(1, Ordering::Relaxed);
        let script = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match script {
            Script::Healthy { host } => Ok(healthy(statement, &host)),
            Script::Failing { error } => Err(error),
            Script::NoRows => match statement {
                Statement::Insert { .. } => Ok(StatementOutcome::RowsAffected(0)),
                other => Ok(healthy(other, "stub")),
            },
            Script::HostLookupFails => match statement {
                Statement::CurrentHost => Err(DbError::new("Connection reset by peer")),
                other => Ok(healthy(other, "stub")),
            },
            Script::Cutover {
                before,
                after,
                error,
                fail_after,
                fail_for,
            } => {
                let elapsed = self.started.elapsed();
                if elapsed < fail_after {
                    Ok(healthy(statement, &before))
                } else if elapsed < fail_after + fail_for {
                    Err(error)
                } else {
                    Ok(healthy(statement, &after))
                }
            }
        }
    }
}

fn healthy(statement: &Statement, host: &str) -> StatementOutcome {
    match statement {
        Statement::Insert { .. } => StatementOutcome::RowsAffected(1),
        Statement::CurrentHost => StatementOutcome::Host(host.to_string()),
        Statement::ServerInfo => StatementOutcome::Server(ServerInfo {
            hostname: host.to_string(),
            server_id: 1,
            version: "8.0.36-stub".to_string(),
            read_only: false,
        }),
    }
}

/// Stub provider. Cheap to clone; clones share counters and script.
#[derive(Debug, Clone)]
pub struct ScriptedProvider {
    shared: Arc<Shared>,
}

impl ScriptedProvider {
    pub fn new(script: Script) -> Self {
        Self::with_latency(script, Duration::ZERO)
    }

    /// Every statement sleeps `latency` before answering.
    pub fn with_latency(script: Script, latency: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                script: Mutex::new(script),
                started: Instant::now(),
                latency,
                acquired: AtomicU64::new(0),
                released: AtomicU64::new(0),
                statements: AtomicU64::new(0),
                max: 100,
            }),
        }
    }

    /// Swap the script for every lease, including ones already handed out.
    pub fn set_script(&self, script: Script) {
        *self
            .shared
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = script;
    }

    pub fn acquired(&self) -> u64 {
        self.shared.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> u64 {
        self.shared.released.load(Ordering::SeqCst)
    }

    pub fn statements(&self) -> u64 {
        self.shared.statements.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionProvider for ScriptedProvider {
    async fn acquire(&self) -> Result<Box<dyn Connection>, DbError> {
        self.shared.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedConnection {
            shared: self.shared.clone(),
        }))
    }

    fn pool_status(&self) -> Option<PoolStatus> {
        let active = self.acquired().saturating_sub(self.released());
        Some(PoolStatus {
            active: usize::try_from(active).unwrap_or(usize::MAX),
            max: self.shared.max,
        })
    }
}

struct ScriptedConnection {
    shared: Arc<Shared>,
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn execute(&mut self, statement: &Statement) -> Result<StatementOutcome, DbError> {
        if !self.shared.latency.is_zero() {
            tokio::time::sleep(self.shared.latency).await;
        }
        self.shared.respond(statement)
    }
}

impl Drop for ScriptedConnection {
    fn drop(&mut self) {
        self.shared.released.fetch_add(1, Ordering::SeqCst);
    }
}
