//! Runs one logical operation with bounded retry.
//!
//! Callers only ever see the final [`OperationResult`]. Every failed attempt
//! is classified and fed to the phase tracker as it happens, so a cutover is
//! noticed on the first topology signal rather than after retries run out.

use crate::provider::{Connection, ConnectionProvider, Statement, StatementOutcome};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use workload_core::{
    classify, is_read_only, DbError, ErrorClass, Operation, OperationKind, OperationResult,
    PhaseTracker, RetryPolicy, ServerInfo,
};

/// Host identity gathered by a successful attempt.
#[derive(Debug)]
enum Served {
    Write(Option<String>),
    Read(ServerInfo),
}

pub struct OperationExecutor {
    provider: Arc<dyn ConnectionProvider>,
    retry: RetryPolicy,
    phase: Arc<PhaseTracker>,
    cancel: CancellationToken,
}

impl OperationExecutor {
    pub fn new(
        provider: Arc<dyn ConnectionProvider>,
        retry: RetryPolicy,
        phase: Arc<PhaseTracker>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            provider,
            retry,
            phase,
            cancel,
        }
    }

    /// Execute `operation`, retrying retryable failures up to the policy's
    /// attempt limit. Shutdown during a backoff wait ends the operation as
    /// failed with the last error.
    pub async fn execute(&self, operation: &Operation, worker: &str) -> OperationResult {
        let started = Instant::now();
        let max_attempts = self.retry.max_attempts.max(1);
        let mut read_only_rejections = 0u32;

        for attempt in 1..=max_attempts {
            let error = match self.attempt(operation).await {
                Ok(served) => {
                    let result =
                        OperationResult::succeeded(operation.kind, started.elapsed(), attempt);
                    let mut result = match served {
                        Served::Write(host) => result.with_host(host),
                        Served::Read(server) => result.with_server(server),
                    };
                    result.read_only_rejections = read_only_rejections;
                    return result;
                }
                Err(e) => e,
            };

            let class = classify(&error);
            if is_read_only(&error) {
                read_only_rejections += 1;
            }
            self.phase.observe_failure(class, &error);

            let exhausted = attempt == max_attempts;
            if !class.is_retryable() || exhausted {
                let mut result = OperationResult::failed(
                    operation.kind,
                    started.elapsed(),
                    attempt,
                    class,
                    error,
                );
                result.read_only_rejections = read_only_rejections;
                return result;
            }

            let delay = self.retry.delay_for(operation.kind, attempt);
            warn!(
                target: "operations",
                "{} | {}: {} | {} | Retry {}/{} in {}ms | Error: {}",
                worker,
                operation.kind.target_label(),
                operation.target,
                class,
                attempt,
                max_attempts,
                delay.as_millis(),
                error
            );

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("{worker} abandoning retry of {} on shutdown", operation.target);
                    let mut result = OperationResult::failed(
                        operation.kind,
                        started.elapsed(),
                        attempt,
                        class,
                        error,
                    );
                    result.read_only_rejections = read_only_rejections;
                    return result;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        // The loop always returns on its last attempt.
        OperationResult::failed(
            operation.kind,
            started.elapsed(),
            max_attempts,
            ErrorClass::Terminal,
            DbError::new("retry loop ended without a result"),
        )
    }

    /// One attempt on one leased connection. The lease drops on every path.
    async fn attempt(&self, operation: &Operation) -> Result<Served, DbError> {
        let mut conn = self.provider.acquire().await?;
        match operation.kind {
            OperationKind::Write => {
                let row = operation
                    .row
                    .clone()
                    .ok_or_else(|| DbError::new("write operation without a row"))?;
                let statement = Statement::Insert {
                    table: operation.target.clone(),
                    row,
                };
                match conn.execute(&statement).await? {
                    StatementOutcome::RowsAffected(n) if n > 0 => {}
                    StatementOutcome::RowsAffected(_) => {
                        return Err(DbError::new(format!(
                            "insert into {} affected no rows",
                            operation.target
                        )));
                    }
                    other => return Err(unexpected(&statement, &other)),
                }
                Ok(Served::Write(current_host(conn.as_mut()).await))
            }
            OperationKind::Read => {
                let statement = Statement::ServerInfo;
                match conn.execute(&statement).await? {
                    StatementOutcome::Server(info) => Ok(Served::Read(info)),
                    other => Err(unexpected(&statement, &other)),
                }
            }
        }
    }
}

/// Best-effort host lookup after a successful write. A failure here does
/// not fail the write that already committed.
async fn current_host(conn: &mut dyn Connection) -> Option<String> {
    match conn.execute(&Statement::CurrentHost).await {
        Ok(StatementOutcome::Host(host)) => Some(host),
        Ok(StatementOutcome::Server(info)) => Some(info.hostname),
        Ok(_) => None,
        Err(e) => {
            debug!("Host lookup after write failed: {e}");
            None
        }
    }
}

fn unexpected(statement: &Statement, outcome: &StatementOutcome) -> DbError {
    DbError::new(format!(
        "unexpected outcome for {} statement: {:?}",
        statement.describe(),
        outcome
    ))
}
