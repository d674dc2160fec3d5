//! PostgreSQL executor on `tokio-postgres` with a `bb8` pool
//!
//! Query text is split into statements, and each one is prepared and run in
//! order on a single connection so later statements see earlier effects.
//! Cells come back in binary format and are handed to the conversion
//! pipeline untouched. Scripts that ran commands get their session state
//! reset before the connection returns to the pool.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bb8::{ManageConnection, Pool, RunError};
use std::time::Duration;
use tokio_postgres::types::{FromSql, Type};
use tokio_postgres::{Client, Config as PgConfig, NoTls};

use super::executor::{CommandTag, ExecutionError, RawRow, SqlExecutor, StatementResult};
use super::script::{leading_keyword, split_statements};
use crate::config::PostgresConfig;
use crate::convert::{ColumnDescriptor, WireFormat};

pub type PgPool = Pool<PgConnectionManager>;

/// Build the pool and check connectivity once
pub async fn connect_pool(config: &PostgresConfig) -> Result<PgPool> {
    let manager = PgConnectionManager::new(&config.url)?;
    let pool = Pool::builder()
        .max_size(config.max_pool_size)
        .connection_timeout(Duration::from_secs(config.connect_timeout_secs))
        .build(manager)
        .await
        .context("failed to build PostgreSQL connection pool")?;

    match pool.get().await {
        Ok(_) => tracing::info!("database connectivity check succeeded"),
        Err(err) => tracing::error!(error = ?err, "initial database connectivity check failed"),
    }

    Ok(pool)
}

/// Opens plain `tokio-postgres` clients
#[derive(Clone)]
pub struct PgConnectionManager {
    config: PgConfig,
}

impl PgConnectionManager {
    pub fn new(database_url: &str) -> Result<Self> {
        let config = database_url
            .parse::<PgConfig>()
            .context("invalid PostgreSQL connection string")?;
        Ok(Self { config })
    }
}

#[async_trait]
impl ManageConnection for PgConnectionManager {
    type Connection = Client;
    type Error = anyhow::Error;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let (client, connection) = self.config.connect(NoTls).await?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::error!(error = %err, "PostgreSQL connection closed with error");
            }
        });
        Ok(client)
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?;
        Ok(())
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_closed()
    }
}

/// Any cell as raw bytes
struct RawCell(Option<Vec<u8>>);

impl<'a> FromSql<'a> for RawCell {
    fn from_sql(
        _ty: &Type,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(RawCell(Some(raw.to_vec())))
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(RawCell(None))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// [`SqlExecutor`] backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PostgresExecutor {
    pool: PgPool,
}

impl PostgresExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SqlExecutor for PostgresExecutor {
    async fn execute(&self, sql: &str) -> Result<Vec<StatementResult>, ExecutionError> {
        let conn = self.pool.get().await.map_err(|err| match err {
            RunError::TimedOut => {
                tracing::error!("timed out acquiring database connection");
                ExecutionError::PoolTimeout
            }
            RunError::User(cause) => {
                tracing::error!(error = ?cause, "failed to acquire database connection");
                ExecutionError::Connection(format!("{:#}", cause))
            }
        })?;

        let mut results = Vec::new();
        let outcome = run_script(&conn, sql, &mut results).await;
        if results.iter().any(|r| !r.command_tag.is_select()) {
            reset_session(&conn).await;
        }
        outcome.map(|()| results)
    }
}

/// Run statements in order, stopping at the first failure
async fn run_script(
    conn: &Client,
    sql: &str,
    results: &mut Vec<StatementResult>,
) -> Result<(), ExecutionError> {
    for text in split_statements(sql) {
        results.push(run_statement(conn, text).await?);
    }
    Ok(())
}

/// Prepare and run one statement
async fn run_statement(conn: &Client, text: &str) -> Result<StatementResult, ExecutionError> {
    let statement = conn.prepare(text).await.map_err(query_error)?;
    let columns: Vec<ColumnDescriptor> = statement
        .columns()
        .iter()
        .map(|c| ColumnDescriptor::new(c.name(), c.type_().oid(), WireFormat::Binary))
        .collect();

    if columns.is_empty() {
        let affected = conn.execute(&statement, &[]).await.map_err(query_error)?;
        return Ok(StatementResult::command(command_tag(text, affected)));
    }

    let rows = conn.query(&statement, &[]).await.map_err(query_error)?;
    let raw_rows = rows
        .iter()
        .map(|row| {
            (0..row.len())
                .map(|i| row.try_get::<_, RawCell>(i).map(|c| c.0))
                .collect::<Result<RawRow, _>>()
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(query_error)?;

    Ok(StatementResult {
        command_tag: CommandTag::select(raw_rows.len()),
        columns,
        rows: raw_rows,
    })
}

/// Undo settings and temporary tables a script left on a pooled connection
async fn reset_session(conn: &Client) {
    if let Err(err) = conn.batch_execute("RESET ALL; DISCARD TEMP").await {
        tracing::warn!(error = %err, "failed to reset database session");
    }
}

fn query_error(err: tokio_postgres::Error) -> ExecutionError {
    if let Some(db) = err.as_db_error() {
        return ExecutionError::Query(db.message().to_string());
    }
    if err.is_closed() {
        tracing::error!(error = %err, "database connection lost");
        return ExecutionError::Connection(err.to_string());
    }
    ExecutionError::Query(err.to_string())
}

/// Tag for a statement without a result set: its leading keyword and row count
fn command_tag(statement: &str, affected: u64) -> String {
    format!("{} {}", leading_keyword(statement).to_ascii_uppercase(), affected)
}
