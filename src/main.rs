//! pgflux API Server
//!
//! Run with: cargo run --bin pgflux
//!
//! Configuration is read from `config.toml` in the usual locations with
//! `PGFLUX_*` environment overrides; `RUST_LOG` overrides the log level.

use pgflux::api::{serve, AppState};
use pgflux::config::{Config, DatasourceKind, LoggingConfig};
use pgflux::convert::ConversionPipeline;
use pgflux::flux::{FluxQueryHandler, FluxVariables, InfluxClient};
use pgflux::macros::{MacroInterpolator, SqlMacroEngine};
use pgflux::query::{DataSource, QueryHandler};
use pgflux::sql::{connect_pool, PostgresExecutor, SqlQueryHandler};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_default();
    init_tracing(&config.logging)?;

    tracing::info!("Starting pgflux v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Datasource: {}", config.datasource.kind);

    let handler = build_handler(&config).await?;
    let datasource = DataSource::new(handler);
    let state = AppState::new(datasource, config.datasource.kind, config.api.request_timeout());

    serve(state, &config.api).await?;

    tracing::info!("pgflux stopped");
    Ok(())
}

/// Query handler for the configured backend
async fn build_handler(config: &Config) -> Result<Arc<dyn QueryHandler>, Box<dyn std::error::Error>> {
    let ds = &config.datasource;
    match ds.kind {
        DatasourceKind::Postgres => {
            let pool = connect_pool(&config.postgres).await?;
            let engine = Arc::new(SqlMacroEngine::new(ds.dialect()));
            tracing::info!("Macro dialect: {:?}", engine.dialect());

            let handler = SqlQueryHandler::new(
                Arc::new(PostgresExecutor::new(pool)),
                Arc::new(MacroInterpolator::new(engine)),
            )
            .pipeline(Arc::new(ConversionPipeline::new(ds.decode_mode)))
            .row_limit(ds.row_limit)
            .timeout(ds.query_timeout())
            .time_column_names(ds.time_column_names.clone());
            Ok(Arc::new(handler))
        }
        DatasourceKind::Influxdb => {
            let client = InfluxClient::new(&config.influx)?;
            let variables = FluxVariables {
                organization: config.influx.organization.clone(),
                default_bucket: config.influx.default_bucket.clone(),
            };
            tracing::info!("InfluxDB: {} (org {:?})", config.influx.url, variables.organization);
            Ok(Arc::new(FluxQueryHandler::new(Arc::new(client), variables, ds.row_limit)))
        }
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("pgflux={},tower_http=debug", logging.level).into());

    let json = logging.format.eq_ignore_ascii_case("json");
    let layer = match &logging.file {
        Some(path) => {
            let file = std::sync::Mutex::new(
                std::fs::OpenOptions::new().create(true).append(true).open(path)?,
            );
            let fmt = tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file);
            if json {
                fmt.json().boxed()
            } else {
                fmt.boxed()
            }
        }
        None if json => tracing_subscriber::fmt::layer().json().boxed(),
        None => tracing_subscriber::fmt::layer().pretty().boxed(),
    };

    tracing_subscriber::registry().with(filter).with(layer).init();
    Ok(())
}
