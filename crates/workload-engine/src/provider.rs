//! The connection capability the engine consumes.
//!
//! Pooling, sizing and eviction live behind [`ConnectionProvider`]. The engine
//! only acquires a connection, runs statements on it and lets it go. Release
//! is tied to `Drop`, so every exit path of a caller releases exactly once.

use async_trait::async_trait;
use workload_core::{DbError, PoolStatus, ServerInfo, WriteRow};

/// Statements the engine issues. The provider decides the concrete SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Insert one row into a `test_NNNN` table.
    Insert { table: String, row: WriteRow },
    /// Full identity of the serving instance.
    ServerInfo,
    /// Host name of the serving instance only.
    CurrentHost,
}

impl Statement {
    pub fn describe(&self) -> &'static str {
        match self {
            Statement::Insert { .. } => "insert",
            Statement::ServerInfo => "server info",
            Statement::CurrentHost => "current host",
        }
    }
}

/// What a statement produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementOutcome {
    RowsAffected(u64),
    Server(ServerInfo),
    Host(String),
}

/// A leased connection. Dropping it hands it back to the provider.
#[async_trait]
pub trait Connection: Send {
    async fn execute(&mut self, statement: &Statement) -> Result<StatementOutcome, DbError>;
}

/// A bounded source of connections, shared by every worker.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Lease a connection. May wait while the pool is saturated.
    async fn acquire(&self) -> Result<Box<dyn Connection>, DbError>;

    /// Pool occupancy, if the provider tracks it.
    fn pool_status(&self) -> Option<PoolStatus> {
        None
    }
}
