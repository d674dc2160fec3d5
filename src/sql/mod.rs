//! SQL datasource driver
//!
//! - **Executor**: the [`SqlExecutor`] seam and statement result types
//! - **Script**: splitting query text into statements
//! - **Postgres**: the `tokio-postgres` executor behind a `bb8` pool
//! - **Handler**: interpolation, execution and shaping for one query

mod executor;
mod handler;
mod postgres;
pub mod script;

pub use executor::{CommandTag, ExecutionError, RawRow, SqlExecutor, StatementResult};
pub use handler::SqlQueryHandler;
pub use postgres::{connect_pool, PgConnectionManager, PgPool, PostgresExecutor};
