//! Connection provider over a `mysql_async` pool.

use crate::error::{to_db_error, MySqlProviderError};
use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Params, Pool, PoolConstraints, PoolOpts, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use workload_core::{DbError, PoolStatus, ServerInfo, WriteRow};
use workload_engine::{Connection, ConnectionProvider, Statement, StatementOutcome};

const SERVER_INFO_QUERY: &str = "SELECT @@hostname, @@server_id, @@version, @@read_only";
const CURRENT_HOST_QUERY: &str = "SELECT @@hostname";
const CONNECTIVITY_QUERY: &str = "SELECT @@version, @@hostname";

/// Build the parameterized insert for one `test_NNNN` table.
pub fn insert_sql(table: &str) -> String {
    format!("INSERT INTO `{table}` (col1, col2, col3, col4, col5) VALUES (?, ?, ?, ?, ?)")
}

fn insert_params(row: &WriteRow) -> Params {
    Params::Positional(vec![
        Value::from(row.data.as_str()),
        Value::from(row.value),
        Value::from(row.worker.as_str()),
        Value::from(row.timestamp_ms),
        Value::from(row.payload.as_str()),
    ])
}

/// Host and port of a connection string, for display. Never includes
/// credentials.
pub fn endpoint(connection_string: &str) -> Result<String, MySqlProviderError> {
    let opts = Opts::from_url(connection_string)?;
    Ok(format!("{}:{}", opts.ip_or_hostname(), opts.tcp_port()))
}

/// Pooled MySQL connections for the worker pool.
pub struct MySqlProvider {
    pool: Pool,
    leased: Arc<AtomicUsize>,
    max: usize,
}

impl MySqlProvider {
    /// Build a pool of at most `pool_size` connections. `password`, when
    /// given, replaces any password embedded in the URL.
    pub fn new(
        connection_string: &str,
        password: Option<&str>,
        pool_size: usize,
    ) -> Result<Self, MySqlProviderError> {
        let constraints = PoolConstraints::new(0, pool_size)
            .filter(|_| pool_size > 0)
            .ok_or_else(|| MySqlProviderError::Config(format!("invalid pool size {pool_size}")))?;
        let mut builder = OptsBuilder::from_opts(Opts::from_url(connection_string)?)
            .pool_opts(PoolOpts::default().with_constraints(constraints));
        if let Some(password) = password {
            builder = builder.pass(Some(password));
        }

        debug!("Creating MySQL pool with up to {pool_size} connection(s)");
        Ok(Self {
            pool: Pool::new(builder),
            leased: Arc::new(AtomicUsize::new(0)),
            max: pool_size,
        })
    }

    /// Underlying pool, for setup statements outside the worker pool.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Run the startup connectivity probe on a fresh connection.
    pub async fn test_connectivity(&self) -> Result<(String, String), MySqlProviderError> {
        let mut conn = self.pool.get_conn().await?;
        let row: Option<(String, String)> = conn.query_first(CONNECTIVITY_QUERY).await?;
        let (version, hostname) = row.ok_or_else(|| {
            MySqlProviderError::Config("connectivity query returned no row".to_string())
        })?;
        info!("Connectivity test passed: host {hostname}, version {version}");
        Ok((version, hostname))
    }

    /// Close every pooled connection.
    pub async fn disconnect(&self) -> Result<(), MySqlProviderError> {
        self.pool.clone().disconnect().await?;
        Ok(())
    }
}

#[async_trait]
impl ConnectionProvider for MySqlProvider {
    async fn acquire(&self) -> Result<Box<dyn Connection>, DbError> {
        let conn = self.pool.get_conn().await.map_err(|e| to_db_error(&e))?;
        Ok(Box::new(MySqlConnection {
            conn,
            _lease: Lease::new(self.leased.clone()),
        }))
    }

    fn pool_status(&self) -> Option<PoolStatus> {
        Some(PoolStatus {
            active: self.leased.load(Ordering::Relaxed),
            max: self.max,
        })
    }
}

/// Counts a connection as active until dropped.
struct Lease(Arc<AtomicUsize>);

impl Lease {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

struct MySqlConnection {
    conn: Conn,
    _lease: Lease,
}

impl MySqlConnection {
    async fn insert(&mut self, table: &str, row: &WriteRow) -> Result<u64, mysql_async::Error> {
        self.conn.exec_drop(insert_sql(table), insert_params(row)).await?;
        Ok(self.conn.affected_rows())
    }

    async fn server_info(&mut self) -> Result<ServerInfo, DbError> {
        let row: Option<(String, u64, String, u8)> = self
            .conn
            .query_first(SERVER_INFO_QUERY)
            .await
            .map_err(|e| to_db_error(&e))?;
        let (hostname, server_id, version, read_only) =
            row.ok_or_else(|| DbError::new("server info query returned no row"))?;
        Ok(ServerInfo {
            hostname,
            server_id,
            version,
            read_only: read_only != 0,
        })
    }

    async fn current_host(&mut self) -> Result<String, DbError> {
        let host: Option<String> = self
            .conn
            .query_first(CURRENT_HOST_QUERY)
            .await
            .map_err(|e| to_db_error(&e))?;
        host.ok_or_else(|| DbError::new("host query returned no row"))
    }
}

#[async_trait]
impl Connection for MySqlConnection {
    async fn execute(&mut self, statement: &Statement) -> Result<StatementOutcome, DbError> {
        match statement {
            Statement::Insert { table, row } => self
                .insert(table, row)
                .await
                .map(StatementOutcome::RowsAffected)
                .map_err(|e| to_db_error(&e)),
            Statement::ServerInfo => self.server_info().await.map(StatementOutcome::Server),
            Statement::CurrentHost => self.current_host().await.map(StatementOutcome::Host),
        }
    }
}
