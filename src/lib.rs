//! # pgflux
//!
//! Query core for PostgreSQL and InfluxDB time-series data sources: macro
//! interpolation, wire-type conversion and frame shaping behind a
//! concurrent batch entry point.
//!
//! ## Modules
//!
//! - [`frame`]: Columnar frames, fields and the long-to-wide pivot
//! - [`macros`]: `$__timeFilter`-style macro interpolation
//! - [`convert`]: PostgreSQL wire values to typed field values
//! - [`results`]: Frame assembly, time normalization and gap-fill
//! - [`query`]: Request model and the `query_data` fan-out
//! - [`sql`]: PostgreSQL driver
//! - [`flux`]: InfluxDB driver
//! - [`api`]: REST API server with Axum
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pgflux::macros::{MacroInterpolator, SqlDialect, SqlMacroEngine};
//! use pgflux::query::DataSource;
//! use pgflux::sql::{connect_pool, PostgresExecutor, SqlQueryHandler};
//! use std::sync::Arc;
//!
//! let pool = connect_pool(&config.postgres).await?;
//! let engine = Arc::new(SqlMacroEngine::new(SqlDialect::Postgres));
//! let handler = SqlQueryHandler::new(
//!     Arc::new(PostgresExecutor::new(pool)),
//!     Arc::new(MacroInterpolator::new(engine)),
//! );
//!
//! let response = DataSource::new(Arc::new(handler)).query_data(request).await;
//! ```

pub mod api;
pub mod config;
pub mod convert;
pub mod flux;
pub mod frame;
pub mod macros;
pub mod query;
pub mod results;
pub mod sql;

// Re-export top-level types for convenience
pub use frame::{Field, FieldType, Frame, FrameError, Notice, Value};

pub use macros::{MacroEngine, MacroError, SqlDialect, SqlMacroEngine};

pub use query::{
    DataQuery, DataResponse, DataSource, ErrorSource, QueryDataRequest, QueryDataResponse,
    QueryError, QueryHandler, TimeRange,
};

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{Config, ConfigError, DatasourceKind};
