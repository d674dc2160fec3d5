//! Batch fan-out and fan-in
//!
//! Every query of a batch is validated up front, then run on its own task.
//! The batch returns once all tasks have finished or the deadline passed; a
//! task that panics or misses the deadline becomes an error for its own
//! `refId` only, and late tasks are aborted.

use async_trait::async_trait;
use futures_util::future::join_all;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::error::{QueryError, QueryResult};
use super::model::{DataQuery, DataResponse, QueryDataRequest, QueryDataResponse, QueryModel};

/// A driver's per-query pipeline
#[async_trait]
pub trait QueryHandler: Send + Sync + 'static {
    /// Validate a query before it is dispatched
    fn prepare(&self, query: &DataQuery) -> QueryResult<QueryModel> {
        let model = QueryModel::parse(&query.json)?;
        if model.raw_query.trim().is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        Ok(model)
    }

    /// Run a prepared query; failures are reported in the response
    async fn execute(&self, query: DataQuery, model: QueryModel) -> DataResponse;
}

/// Results keyed by `refId`, each written at most once
#[derive(Debug, Default)]
pub struct ResponseCollector {
    results: BTreeMap<String, DataResponse>,
}

impl ResponseCollector {
    /// Store a response; a second write for the same `refId` is dropped
    pub fn insert(&mut self, ref_id: String, response: DataResponse) -> bool {
        if self.results.contains_key(&ref_id) {
            tracing::warn!(ref_id = %ref_id, "Duplicate refId in batch, keeping first result");
            return false;
        }
        self.results.insert(ref_id, response);
        true
    }

    pub fn finish(self) -> QueryDataResponse {
        QueryDataResponse {
            results: self.results,
        }
    }
}

/// Entry point for batch queries against one datasource instance
#[derive(Clone)]
pub struct DataSource {
    handler: Arc<dyn QueryHandler>,
}

impl DataSource {
    pub fn new(handler: Arc<dyn QueryHandler>) -> Self {
        Self { handler }
    }

    /// Run every query of the batch concurrently
    pub async fn query_data(&self, request: QueryDataRequest) -> QueryDataResponse {
        self.run_batch(request, None).await
    }

    /// Like [`query_data`](Self::query_data), but queries still running
    /// after `timeout` fail with a timeout error while finished ones keep
    /// their results
    pub async fn query_data_within(
        &self,
        request: QueryDataRequest,
        timeout: Duration,
    ) -> QueryDataResponse {
        self.run_batch(request, Some(timeout)).await
    }

    async fn run_batch(
        &self,
        request: QueryDataRequest,
        timeout: Option<Duration>,
    ) -> QueryDataResponse {
        let deadline = timeout.map(|t| (Instant::now() + t, t));
        let mut collector = ResponseCollector::default();
        let mut tasks = Vec::with_capacity(request.queries.len());

        for query in request.queries {
            let ref_id = query.ref_id.clone();
            match self.handler.prepare(&query) {
                Ok(model) => {
                    let handler = Arc::clone(&self.handler);
                    tracing::debug!(ref_id = %ref_id, "Dispatching query");
                    let handle = tokio::spawn(async move { handler.execute(query, model).await });
                    tasks.push((ref_id, handle));
                }
                Err(e) => {
                    tracing::debug!(ref_id = %ref_id, error = %e, "Query rejected before dispatch");
                    collector.insert(ref_id, DataResponse::from_error(&e, Vec::new()));
                }
            }
        }

        let (ref_ids, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
        let joined = join_all(handles.into_iter().map(|handle| join_by(handle, deadline))).await;

        for (ref_id, result) in ref_ids.into_iter().zip(joined) {
            let response = match result {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    tracing::warn!(ref_id = %ref_id, error = %e, "Query missed the batch deadline");
                    DataResponse::from_error(&e, Vec::new())
                }
                Err(e) => {
                    let message = if e.is_panic() {
                        panic_message(e.into_panic())
                    } else {
                        "task cancelled".to_string()
                    };
                    tracing::error!(ref_id = %ref_id, error = %message, "Query task failed");
                    DataResponse::from_error(&QueryError::Panic(message), Vec::new())
                }
            };
            collector.insert(ref_id, response);
        }

        collector.finish()
    }
}

/// Await a query task, aborting it once the deadline passes
async fn join_by(
    mut handle: JoinHandle<DataResponse>,
    deadline: Option<(Instant, Duration)>,
) -> Result<QueryResult<DataResponse>, tokio::task::JoinError> {
    let Some((at, timeout)) = deadline else {
        return handle.await.map(Ok);
    };
    match tokio::time::timeout_at(at, &mut handle).await {
        Ok(joined) => joined.map(Ok),
        Err(_) => {
            handle.abort();
            Ok(Err(QueryError::Timeout(timeout)))
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::query::{ErrorSource, TimeRange};
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::time::Duration;

    /// Echoes the raw query as the frame name; panics on "boom", never
    /// finishes on "hang"
    struct EchoHandler;

    #[async_trait]
    impl QueryHandler for EchoHandler {
        async fn execute(&self, _query: DataQuery, model: QueryModel) -> DataResponse {
            if model.raw_query == "boom" {
                panic!("handler exploded");
            }
            if model.raw_query == "slow" {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            if model.raw_query == "hang" {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            DataResponse::with_frames(vec![Frame::new(model.raw_query)])
        }
    }

    fn query(ref_id: &str, payload: serde_json::Value) -> DataQuery {
        DataQuery {
            ref_id: ref_id.into(),
            time_range: TimeRange::new(
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap(),
            ),
            interval_ms: 1000,
            max_data_points: 100,
            json: payload,
        }
    }

    fn datasource() -> DataSource {
        DataSource::new(Arc::new(EchoHandler))
    }

    #[tokio::test]
    async fn test_each_query_gets_a_result() {
        let request = QueryDataRequest {
            queries: vec![
                query("A", json!({"rawSql": "slow"})),
                query("B", json!({"rawSql": "fast"})),
            ],
        };

        let response = datasource().query_data(request).await;
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results["A"].frames[0].name, "slow");
        assert_eq!(response.results["B"].frames[0].name, "fast");
    }

    #[tokio::test]
    async fn test_panic_is_isolated() {
        let request = QueryDataRequest {
            queries: vec![
                query("A", json!({"rawSql": "boom"})),
                query("B", json!({"rawSql": "ok"})),
            ],
        };

        let response = datasource().query_data(request).await;
        let failed = &response.results["A"];
        assert!(failed.error.as_deref().unwrap_or_default().contains("handler exploded"));
        assert_eq!(failed.error_source, Some(ErrorSource::Plugin));
        assert!(!response.results["B"].is_error());
    }

    #[tokio::test]
    async fn test_invalid_queries_rejected_before_dispatch() {
        let request = QueryDataRequest {
            queries: vec![
                query("A", json!({"rawSql": ""})),
                query("B", json!({"rawSql": "SELECT 1", "fillMode": "null"})),
                query("C", json!({"rawSql": "SELECT 1"})),
            ],
        };

        let response = datasource().query_data(request).await;
        assert_eq!(response.results["A"].error.as_deref(), Some("query is empty"));
        assert_eq!(response.results["A"].error_source, Some(ErrorSource::Plugin));
        assert_eq!(response.results["B"].error_source, Some(ErrorSource::Downstream));
        assert!(!response.results["C"].is_error());
    }

    #[tokio::test]
    async fn test_duplicate_ref_ids_keep_first() {
        let request = QueryDataRequest {
            queries: vec![
                query("A", json!({"rawSql": "first"})),
                query("A", json!({"rawSql": "second"})),
            ],
        };

        let response = datasource().query_data(request).await;
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results["A"].frames[0].name, "first");
    }

    #[tokio::test]
    async fn test_deadline_keeps_finished_siblings() {
        let request = QueryDataRequest {
            queries: vec![
                query("A", json!({"rawSql": "fast"})),
                query("B", json!({"rawSql": "hang"})),
            ],
        };

        let response = datasource()
            .query_data_within(request, Duration::from_millis(50))
            .await;
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results["A"].frames[0].name, "fast");
        assert!(!response.results["A"].is_error());

        let late = &response.results["B"];
        assert!(late.error.as_deref().unwrap_or_default().contains("timed out"));
        assert_eq!(late.error_source, Some(ErrorSource::Downstream));
    }

    #[tokio::test]
    async fn test_deadline_aborts_late_tasks() {
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            DataResponse::default()
        });
        let timeout = Duration::from_millis(10);
        let abort = handle.abort_handle();

        let result = join_by(handle, Some((Instant::now() + timeout, timeout)))
            .await
            .unwrap();
        assert!(matches!(result, Err(QueryError::Timeout(_))));

        let settled = tokio::time::timeout(Duration::from_secs(1), async {
            while !abort.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await;
        assert!(settled.is_ok());
    }

    #[test]
    fn test_collector_writes_once() {
        let mut collector = ResponseCollector::default();
        assert!(collector.insert("A".into(), DataResponse::default()));
        assert!(!collector.insert("A".into(), DataResponse::default()));
        assert_eq!(collector.finish().results.len(), 1);
    }
}
