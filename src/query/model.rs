//! Query request and response types
//!
//! - [`DataQuery`]: one query of a batch as it arrives over the wire
//! - [`QueryModel`]: the parsed per-query JSON payload
//! - [`DataResponse`]: frames or an error for one `refId`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::error::{QueryError, QueryResult};
use crate::frame::{FillMissing, Frame};

/// Requested time range, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }
}

/// One query of a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuery {
    pub ref_id: String,
    pub time_range: TimeRange,
    /// Suggested group interval in milliseconds
    #[serde(default)]
    pub interval_ms: u64,
    #[serde(default)]
    pub max_data_points: i64,
    /// Datasource-specific payload, parsed into a [`QueryModel`]
    #[serde(rename = "query", default)]
    pub json: serde_json::Value,
}

impl DataQuery {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Batch request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryDataRequest {
    pub queries: Vec<DataQuery>,
}

/// Output shape requested by the query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    Table,
    #[default]
    TimeSeries,
}

/// Gap-fill settings, only ever set by a group macro's fill argument
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillOptions {
    pub missing: FillMissing,
    /// Resample step; the interval of the macro that set the fill
    pub interval: Duration,
}

/// Parsed per-query payload
#[derive(Debug, Clone, PartialEq)]
pub struct QueryModel {
    pub raw_query: String,
    pub format: Format,
    pub fill: Option<FillOptions>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryPayload {
    #[serde(default, alias = "query")]
    raw_sql: Option<String>,
    #[serde(default)]
    format: Option<String>,
}

/// Payload keys that would set fill directly
const FILL_KEYS: [&str; 4] = ["fill", "fillInterval", "fillMode", "fillValue"];

impl QueryModel {
    /// Parse the JSON payload of a query
    ///
    /// Fill parameters supplied in the payload are rejected; fill is only
    /// configured through a group macro.
    pub fn parse(json: &serde_json::Value) -> QueryResult<Self> {
        let payload: QueryPayload = if json.is_null() {
            serde_json::from_value(serde_json::json!({}))
        } else {
            serde_json::from_value(json.clone())
        }
        .map_err(|e| QueryError::Payload(e.to_string()))?;

        if FILL_KEYS.iter().any(|key| json.get(key).is_some()) {
            return Err(QueryError::FillParameters);
        }

        let format = match payload.format.as_deref() {
            Some("table") => Format::Table,
            _ => Format::TimeSeries,
        };

        Ok(Self {
            raw_query: payload.raw_sql.unwrap_or_default(),
            format,
            fill: None,
        })
    }
}

/// Which side of the system an error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSource {
    Plugin,
    Downstream,
}

/// Result for one `refId`
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataResponse {
    pub frames: Vec<Frame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_source: Option<ErrorSource>,
}

impl DataResponse {
    pub fn with_frames(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            ..Default::default()
        }
    }

    /// Error response, keeping any frames that carry useful metadata
    pub fn from_error(err: &QueryError, frames: Vec<Frame>) -> Self {
        Self {
            frames,
            error: Some(err.to_string()),
            error_source: Some(err.source_kind()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Batch response keyed by `refId`
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryDataResponse {
    pub results: BTreeMap<String, DataResponse>,
}
