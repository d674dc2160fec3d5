//! pgflux CLI
//!
//! Command-line interface for pgflux:
//! - Expand macros in a query offline
//! - Send a query to a running server
//! - Print the default configuration

use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use pgflux::macros::{Interpolator, MacroInterpolator, SqlDialect, SqlMacroEngine};
use pgflux::query::{DataQuery, QueryDataRequest, QueryModel, TimeRange};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pgflux-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Macro interpolation and query tool for pgflux")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:8090", global = true)]
    pub api_url: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Expand global variables and macros in a SQL query
    Interpolate {
        /// Query text
        sql: String,
        /// Range start, RFC 3339 (default: one hour ago)
        #[arg(long)]
        from: Option<String>,
        /// Range end, RFC 3339 (default: now)
        #[arg(long)]
        to: Option<String>,
        /// Suggested interval in milliseconds
        #[arg(long, default_value = "60000")]
        interval_ms: u64,
        /// Use time_bucket() for $__timeGroup
        #[arg(long)]
        timescaledb: bool,
    },

    /// Run a query on a pgflux server
    Query {
        /// Query text
        sql: String,
        /// Reference ID of the query
        #[arg(long, default_value = "A")]
        ref_id: String,
        /// Output format: table or time_series
        #[arg(long, default_value = "time_series")]
        format: String,
        /// Time range ending now (e.g. 30m, 6h, 7d)
        #[arg(short, long, default_value = "1h")]
        last: String,
        /// Suggested interval in milliseconds
        #[arg(long, default_value = "60000")]
        interval_ms: u64,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pgflux=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Interpolate {
            sql,
            from,
            to,
            interval_ms,
            timescaledb,
        } => {
            let to = match to.as_deref() {
                Some(s) => parse_time(s)?,
                None => Utc::now(),
            };
            let from = match from.as_deref() {
                Some(s) => parse_time(s)?,
                None => to - Duration::hours(1),
            };

            let dialect = if timescaledb {
                SqlDialect::TimescaleDb
            } else {
                SqlDialect::Postgres
            };
            let interpolator = MacroInterpolator::new(Arc::new(SqlMacroEngine::new(dialect)));

            let query = data_query("A", TimeRange::new(from, to), interval_ms, &sql, None);
            let mut model = QueryModel::parse(&query.json)?;
            match interpolator.interpolate(&query, &mut model) {
                Ok(out) => {
                    println!("{}", out);
                    if let Some(fill) = model.fill {
                        eprintln!("fill: {:?} every {:?}", fill.missing, fill.interval);
                    }
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Query {
            sql,
            ref_id,
            format,
            last,
            interval_ms,
        } => {
            let to = Utc::now();
            let from = to - parse_last(&last)?;
            let request = QueryDataRequest {
                queries: vec![data_query(
                    &ref_id,
                    TimeRange::new(from, to),
                    interval_ms,
                    &sql,
                    Some(&format),
                )],
            };

            let client = reqwest::Client::new();
            let resp = client
                .post(format!("{}/api/v1/query", cli.api_url))
                .json(&request)
                .send()
                .await?;

            let status = resp.status();
            let body: serde_json::Value = resp.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
            if !status.is_success() {
                std::process::exit(1);
            }
        }

        Commands::Config { output } => {
            let config = pgflux::config::generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, config)?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", config),
            }
        }
    }

    Ok(())
}

fn data_query(ref_id: &str, time_range: TimeRange, interval_ms: u64, sql: &str, format: Option<&str>) -> DataQuery {
    let mut payload = serde_json::json!({ "rawSql": sql });
    if let Some(format) = format {
        payload["format"] = serde_json::Value::String(format.to_string());
    }
    DataQuery {
        ref_id: ref_id.to_string(),
        time_range,
        interval_ms,
        max_data_points: 1000,
        json: payload,
    }
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, Box<dyn std::error::Error>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

fn parse_last(s: &str) -> Result<Duration, Box<dyn std::error::Error>> {
    let parsed = pgflux::macros::interval::parse_interval(s)
        .ok_or_else(|| format!("Invalid time range: {}", s))?;
    Ok(Duration::from_std(parsed)?)
}
