//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and `PGFLUX_*` environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::convert::DecodeMode;
use crate::macros::SqlDialect;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub datasource: DatasourceConfig,

    #[serde(default)]
    pub postgres: PostgresConfig,

    #[serde(default)]
    pub influx: InfluxConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which backend the service queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasourceKind {
    #[default]
    Postgres,
    Influxdb,
}

impl std::fmt::Display for DatasourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasourceKind::Postgres => write!(f, "postgres"),
            DatasourceKind::Influxdb => write!(f, "influxdb"),
        }
    }
}

impl std::str::FromStr for DatasourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(DatasourceKind::Postgres),
            "influxdb" => Ok(DatasourceKind::Influxdb),
            other => Err(format!("unknown datasource kind: {}", other)),
        }
    }
}

/// Query pipeline settings shared by both backends
#[derive(Debug, Clone, Deserialize)]
pub struct DatasourceConfig {
    #[serde(default)]
    pub kind: DatasourceKind,

    #[serde(default = "default_row_limit")]
    pub row_limit: usize,

    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    #[serde(default = "default_time_column_names")]
    pub time_column_names: Vec<String>,

    #[serde(default)]
    pub timescaledb: bool,

    #[serde(default)]
    pub decode_mode: DecodeMode,
}

fn default_row_limit() -> usize {
    1_000_000
}

fn default_query_timeout() -> u64 {
    30
}

fn default_time_column_names() -> Vec<String> {
    vec!["time".to_string()]
}

impl DatasourceConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn dialect(&self) -> SqlDialect {
        if self.timescaledb {
            SqlDialect::TimescaleDb
        } else {
            SqlDialect::Postgres
        }
    }
}

impl Default for DatasourceConfig {
    fn default() -> Self {
        Self {
            kind: DatasourceKind::default(),
            row_limit: default_row_limit(),
            query_timeout_secs: default_query_timeout(),
            time_column_names: default_time_column_names(),
            timescaledb: false,
            decode_mode: DecodeMode::default(),
        }
    }
}

/// PostgreSQL connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct PostgresConfig {
    #[serde(default = "default_postgres_url")]
    pub url: String,

    #[serde(default = "default_pool_size")]
    pub max_pool_size: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_postgres_url() -> String {
    "postgres://postgres@localhost:5432/postgres".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: default_postgres_url(),
            max_pool_size: default_pool_size(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// InfluxDB v2 connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct InfluxConfig {
    #[serde(default = "default_influx_url")]
    pub url: String,

    #[serde(default)]
    pub token: String,

    #[serde(default)]
    pub organization: String,

    #[serde(default)]
    pub default_bucket: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_influx_url() -> String {
    "http://localhost:8086".to_string()
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: default_influx_url(),
            token: String::new(),
            organization: String::new(),
            default_bucket: String::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_request_timeout() -> u64 {
    30
}

impl ApiConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Defaults with environment variable overrides
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("pgflux").join("config.toml")),
            Some(PathBuf::from("/etc/pgflux/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `PGFLUX_*` overrides read through `lookup`
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Datasource overrides
        if let Some(kind) = lookup("PGFLUX_DATASOURCE_KIND") {
            match kind.parse() {
                Ok(k) => self.datasource.kind = k,
                Err(e) => tracing::warn!("Ignoring PGFLUX_DATASOURCE_KIND: {}", e),
            }
        }
        if let Some(limit) = lookup("PGFLUX_ROW_LIMIT").and_then(|v| v.parse().ok()) {
            self.datasource.row_limit = limit;
        }
        if let Some(secs) = lookup("PGFLUX_QUERY_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.datasource.query_timeout_secs = secs;
        }
        if let Some(names) = lookup("PGFLUX_TIME_COLUMN_NAMES") {
            self.datasource.time_column_names = names
                .split(',')
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect();
        }
        if let Some(flag) = lookup("PGFLUX_TIMESCALEDB").and_then(|v| v.parse().ok()) {
            self.datasource.timescaledb = flag;
        }
        if let Some(mode) = lookup("PGFLUX_DECODE_MODE") {
            match mode.to_ascii_lowercase().as_str() {
                "strict" => self.datasource.decode_mode = DecodeMode::Strict,
                "lenient" => self.datasource.decode_mode = DecodeMode::Lenient,
                other => tracing::warn!("Ignoring PGFLUX_DECODE_MODE: {}", other),
            }
        }

        // Backend overrides
        if let Some(url) = lookup("PGFLUX_POSTGRES_URL") {
            self.postgres.url = url;
        }
        if let Some(url) = lookup("PGFLUX_INFLUX_URL") {
            self.influx.url = url;
        }
        if let Some(token) = lookup("PGFLUX_INFLUX_TOKEN") {
            self.influx.token = token;
        }
        if let Some(org) = lookup("PGFLUX_INFLUX_ORG") {
            self.influx.organization = org;
        }
        if let Some(bucket) = lookup("PGFLUX_INFLUX_BUCKET") {
            self.influx.default_bucket = bucket;
        }

        // API overrides
        if let Some(host) = lookup("PGFLUX_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = lookup("PGFLUX_API_PORT").and_then(|v| v.parse().ok()) {
            self.api.port = port;
        }

        // Logging overrides
        if let Some(level) = lookup("PGFLUX_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("PGFLUX_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# pgflux Configuration
#
# Environment variables override these settings:
# - PGFLUX_DATASOURCE_KIND, PGFLUX_ROW_LIMIT, PGFLUX_QUERY_TIMEOUT_SECS
# - PGFLUX_TIME_COLUMN_NAMES, PGFLUX_TIMESCALEDB, PGFLUX_DECODE_MODE
# - PGFLUX_POSTGRES_URL
# - PGFLUX_INFLUX_URL, PGFLUX_INFLUX_TOKEN, PGFLUX_INFLUX_ORG, PGFLUX_INFLUX_BUCKET
# - PGFLUX_API_HOST, PGFLUX_API_PORT
# - PGFLUX_LOG_LEVEL, PGFLUX_LOG_FORMAT

[datasource]
# Backend to query: postgres or influxdb
kind = "postgres"

# Maximum rows returned per query
row_limit = 1000000

# Per-query execution timeout in seconds
query_timeout_secs = 30

# Column names treated as the time column
time_column_names = ["time"]

# Use time_bucket() for $__timeGroup
timescaledb = false

# Unknown column types: lenient (decode as text) or strict (error)
decode_mode = "lenient"

[postgres]
# Connection string
url = "postgres://postgres@localhost:5432/postgres"

# Maximum pooled connections
max_pool_size = 10

# Seconds to wait for a pooled connection
connect_timeout_secs = 10

[influx]
# InfluxDB v2 server URL
url = "http://localhost:8086"

# API token
token = ""

# Organization and default bucket
organization = ""
default_bucket = ""

# HTTP request timeout in seconds
request_timeout_secs = 30

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8090

# Allowed CORS origins (empty allows any)
cors_origins = []

# Request timeout in seconds
request_timeout_secs = 30

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/pgflux/pgflux.log"
"#
    .to_string()
}
