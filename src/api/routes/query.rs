//! Query Routes
//!
//! - POST /api/v1/query - Run a batch of queries

use axum::{extract::State, Json};
use std::collections::HashSet;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::query::{QueryDataRequest, QueryDataResponse};

/// POST /api/v1/query
///
/// Per-query failures, including queries that outlive the request timeout,
/// come back inside the response under their `refId`; only malformed
/// batches fail the request.
pub async fn query_data(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryDataRequest>,
) -> ApiResult<Json<QueryDataResponse>> {
    validate(&req)?;

    let count = req.queries.len();
    let response = state
        .datasource
        .query_data_within(req, state.request_timeout)
        .await;

    let failed = response.results.values().filter(|r| r.is_error()).count();
    tracing::info!(queries = count, failed, "Query batch completed");

    Ok(Json(response))
}

fn validate(req: &QueryDataRequest) -> ApiResult<()> {
    if req.queries.is_empty() {
        return Err(ApiError::Validation("queries cannot be empty".to_string()));
    }

    let mut seen = HashSet::new();
    for query in &req.queries {
        if query.ref_id.is_empty() {
            return Err(ApiError::Validation("refId cannot be empty".to_string()));
        }
        if query.time_range.from > query.time_range.to {
            return Err(ApiError::Validation(format!(
                "time range of {} ends before it starts",
                query.ref_id
            )));
        }
        if !seen.insert(query.ref_id.as_str()) {
            tracing::warn!(ref_id = %query.ref_id, "Duplicate refId in request");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{DataQuery, TimeRange};
    use chrono::{TimeZone, Utc};

    fn query(ref_id: &str, from_hour: u32, to_hour: u32) -> DataQuery {
        DataQuery {
            ref_id: ref_id.into(),
            time_range: TimeRange::new(
                Utc.with_ymd_and_hms(2024, 1, 1, from_hour, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 1, to_hour, 0, 0).unwrap(),
            ),
            interval_ms: 1000,
            max_data_points: 100,
            json: serde_json::json!({"rawSql": "SELECT 1"}),
        }
    }

    #[test]
    fn test_validate() {
        assert!(validate(&QueryDataRequest::default()).is_err());
        assert!(validate(&QueryDataRequest { queries: vec![query("", 0, 1)] }).is_err());
        assert!(validate(&QueryDataRequest { queries: vec![query("A", 2, 1)] }).is_err());
        assert!(validate(&QueryDataRequest {
            queries: vec![query("A", 0, 1), query("A", 0, 1)]
        })
        .is_ok());
    }
}
