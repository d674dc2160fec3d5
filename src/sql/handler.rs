//! Per-query pipeline for SQL datasources

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::executor::SqlExecutor;
use crate::convert::ConversionPipeline;
use crate::frame::Frame;
use crate::macros::Interpolator;
use crate::query::{DataQuery, DataResponse, QueryError, QueryHandler, QueryModel, QueryResult};
use crate::results::{assemble_frame, shape_frame, ColumnRoles};

/// Interpolates, executes, assembles and shapes one SQL query
#[derive(Clone)]
pub struct SqlQueryHandler {
    executor: Arc<dyn SqlExecutor>,
    interpolator: Arc<dyn Interpolator>,
    pipeline: Arc<ConversionPipeline>,
    row_limit: usize,
    timeout: Duration,
    time_column_names: Vec<String>,
}

impl SqlQueryHandler {
    pub fn new(executor: Arc<dyn SqlExecutor>, interpolator: Arc<dyn Interpolator>) -> Self {
        Self {
            executor,
            interpolator,
            pipeline: Arc::new(ConversionPipeline::default()),
            row_limit: 1_000_000,
            timeout: Duration::from_secs(30),
            time_column_names: vec!["time".to_string()],
        }
    }

    pub fn pipeline(mut self, pipeline: Arc<ConversionPipeline>) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn row_limit(mut self, row_limit: usize) -> Self {
        self.row_limit = row_limit;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn time_column_names(mut self, names: Vec<String>) -> Self {
        self.time_column_names = names;
        self
    }

    async fn run(&self, query: &DataQuery, model: &QueryModel, sql: &str) -> QueryResult<Frame> {
        let results = tokio::time::timeout(self.timeout, self.executor.execute(sql))
            .await
            .map_err(|_| QueryError::Timeout(self.timeout))??;

        let assembled = assemble_frame(&self.pipeline, &query.ref_id, &results, self.row_limit)?;
        let roles = ColumnRoles::resolve(&assembled.columns, model.format, &self.time_column_names);
        let frame = shape_frame(
            assembled.frame,
            &roles,
            model,
            &query.time_range,
            &self.time_column_names,
        )?;
        Ok(frame)
    }
}

#[async_trait]
impl QueryHandler for SqlQueryHandler {
    async fn execute(&self, query: DataQuery, mut model: QueryModel) -> DataResponse {
        let sql = match self.interpolator.interpolate(&query, &mut model) {
            Ok(sql) => sql,
            Err(e) => {
                tracing::debug!(ref_id = %query.ref_id, error = %e, "Interpolation failed");
                return DataResponse::from_error(&QueryError::from(e), Vec::new());
            }
        };

        match self.run(&query, &model, &sql).await {
            Ok(mut frame) => {
                frame.meta.executed_query_string = Some(sql);
                DataResponse::with_frames(vec![frame])
            }
            Err(e) => {
                tracing::error!(ref_id = %query.ref_id, error = %e, "Query failed");
                let mut frame = Frame::new(query.ref_id.clone());
                frame.meta.executed_query_string = Some(sql);
                DataResponse::from_error(&e, vec![frame])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{oid, ColumnDescriptor};
    use crate::frame::{FieldType, Value};
    use crate::macros::{MacroInterpolator, SqlDialect, SqlMacroEngine, Verbatim};
    use crate::query::{DataSource, ErrorSource, QueryDataRequest, TimeRange};
    use crate::sql::{ExecutionError, StatementResult};
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::sync::Mutex;

    /// Returns canned results and records the SQL it was given
    struct FakeExecutor {
        results: Result<Vec<StatementResult>, String>,
        seen: Mutex<Vec<String>>,
        delay: Option<Duration>,
    }

    impl FakeExecutor {
        fn ok(results: Vec<StatementResult>) -> Self {
            Self {
                results: Ok(results),
                seen: Mutex::new(Vec::new()),
                delay: None,
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                results: Err(message.to_string()),
                seen: Mutex::new(Vec::new()),
                delay: None,
            }
        }
    }

    #[async_trait]
    impl SqlExecutor for FakeExecutor {
        async fn execute(&self, sql: &str) -> Result<Vec<StatementResult>, ExecutionError> {
            self.seen.lock().unwrap().push(sql.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.results {
                Ok(results) => Ok(results.clone()),
                Err(message) => Err(ExecutionError::Query(message.clone())),
            }
        }
    }

    fn int8(v: i64) -> Option<Vec<u8>> {
        Some(v.to_be_bytes().to_vec())
    }

    fn float8(v: f64) -> Option<Vec<u8>> {
        Some(v.to_be_bytes().to_vec())
    }

    fn text(s: &str) -> Option<Vec<u8>> {
        Some(s.as_bytes().to_vec())
    }

    fn range() -> TimeRange {
        TimeRange::new(
            Utc.with_ymd_and_hms(2018, 4, 12, 18, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2018, 4, 12, 18, 5, 0).unwrap(),
        )
    }

    fn data_query(payload: serde_json::Value) -> DataQuery {
        DataQuery {
            ref_id: "A".into(),
            time_range: range(),
            interval_ms: 60_000,
            max_data_points: 100,
            json: payload,
        }
    }

    fn macro_handler(executor: Arc<FakeExecutor>) -> SqlQueryHandler {
        let engine = Arc::new(SqlMacroEngine::new(SqlDialect::Postgres));
        SqlQueryHandler::new(executor, Arc::new(MacroInterpolator::new(engine)))
    }

    fn long_result() -> StatementResult {
        let t0 = 1_523_556_000i64;
        StatementResult::select(
            vec![
                ColumnDescriptor::binary("time", oid::INT8),
                ColumnDescriptor::binary("metric", oid::TEXT),
                ColumnDescriptor::binary("value", oid::FLOAT8),
            ],
            vec![
                vec![int8(t0), text("cpu"), float8(1.0)],
                vec![int8(t0), text("mem"), float8(2.0)],
                vec![int8(t0 + 60), text("cpu"), float8(3.0)],
            ],
        )
    }

    async fn run(handler: SqlQueryHandler, payload: serde_json::Value) -> DataResponse {
        let query = data_query(payload);
        let model = handler.prepare(&query).unwrap();
        handler.execute(query, model).await
    }

    #[tokio::test]
    async fn test_time_series_pivot_with_legacy_names() {
        let executor = Arc::new(FakeExecutor::ok(vec![long_result()]));
        let response = run(
            macro_handler(executor.clone()),
            json!({"rawSql": "SELECT time, metric, value FROM t WHERE $__timeFilter(time)"}),
        )
        .await;

        assert!(!response.is_error(), "{:?}", response.error);
        let frame = &response.frames[0];
        let names: Vec<_> = frame.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Time", "cpu", "mem"]);
        assert!(frame.fields[1].labels.is_empty());
        assert_eq!(frame.fields[0].field_type(), FieldType::Time);
        assert_eq!(frame.fields[2].at(1), Value::Null);

        let sent = executor.seen.lock().unwrap()[0].clone();
        assert!(sent.contains("time BETWEEN '2018-04-12T18:00:00Z' AND '2018-04-12T18:05:00Z'"));
        assert_eq!(frame.meta.executed_query_string.as_deref(), Some(sent.as_str()));
    }

    #[tokio::test]
    async fn test_table_format_keeps_columns() {
        let executor = Arc::new(FakeExecutor::ok(vec![long_result()]));
        let response = run(
            macro_handler(executor),
            json!({"rawSql": "SELECT * FROM t", "format": "table"}),
        )
        .await;

        let frame = &response.frames[0];
        assert_eq!(frame.fields.len(), 3);
        assert_eq!(frame.fields[0].name, "time");
        assert_eq!(frame.rows(), 3);
        assert_eq!(frame.fields[0].field_type(), FieldType::Time);
    }

    #[tokio::test]
    async fn test_macro_error_is_reported() {
        let executor = Arc::new(FakeExecutor::ok(vec![]));
        let response = run(
            macro_handler(executor.clone()),
            json!({"rawSql": "SELECT $__timeFilter() FROM t"}),
        )
        .await;

        assert_eq!(
            response.error.as_deref(),
            Some("missing time column argument for macro __timeFilter")
        );
        assert_eq!(response.error_source, Some(ErrorSource::Downstream));
        assert!(executor.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_execution_error_keeps_executed_query() {
        let executor = Arc::new(FakeExecutor::failing("relation \"t\" does not exist"));
        let response = run(
            SqlQueryHandler::new(executor, Arc::new(Verbatim)),
            json!({"rawSql": "SELECT * FROM t"}),
        )
        .await;

        assert_eq!(response.error.as_deref(), Some("relation \"t\" does not exist"));
        assert_eq!(response.error_source, Some(ErrorSource::Downstream));
        assert_eq!(
            response.frames[0].meta.executed_query_string.as_deref(),
            Some("SELECT * FROM t")
        );
    }

    #[tokio::test]
    async fn test_missing_time_column_fails_time_series() {
        let result = StatementResult::select(
            vec![ColumnDescriptor::binary("value", oid::FLOAT8)],
            vec![vec![float8(1.0)]],
        );
        let executor = Arc::new(FakeExecutor::ok(vec![result]));
        let response = run(
            SqlQueryHandler::new(executor, Arc::new(Verbatim)),
            json!({"rawSql": "SELECT value FROM t"}),
        )
        .await;

        assert_eq!(response.error.as_deref(), Some("found no column named time"));
    }

    #[tokio::test]
    async fn test_row_limit_adds_notice() {
        let executor = Arc::new(FakeExecutor::ok(vec![long_result()]));
        let handler = SqlQueryHandler::new(executor, Arc::new(Verbatim)).row_limit(2);
        let response = run(handler, json!({"rawSql": "SELECT 1", "format": "table"})).await;

        let frame = &response.frames[0];
        assert_eq!(frame.rows(), 2);
        assert_eq!(frame.meta.notices.len(), 1);
    }

    #[tokio::test]
    async fn test_timeout() {
        let executor = Arc::new(FakeExecutor {
            delay: Some(Duration::from_millis(200)),
            ..FakeExecutor::ok(vec![])
        });
        let handler = SqlQueryHandler::new(executor, Arc::new(Verbatim))
            .timeout(Duration::from_millis(10));
        let response = run(handler, json!({"rawSql": "SELECT pg_sleep(1)"})).await;

        assert!(response.error.as_deref().unwrap_or_default().contains("timed out"));
        assert_eq!(response.error_source, Some(ErrorSource::Downstream));
    }

    #[tokio::test]
    async fn test_gap_fill_through_datasource() {
        let t0 = 1_523_556_000i64;
        let result = StatementResult::select(
            vec![
                ColumnDescriptor::binary("time", oid::INT8),
                ColumnDescriptor::binary("value", oid::FLOAT8),
            ],
            vec![vec![int8(t0), float8(1.0)], vec![int8(t0 + 180), float8(4.0)]],
        );
        let executor = Arc::new(FakeExecutor::ok(vec![result]));
        let datasource = DataSource::new(Arc::new(macro_handler(executor)));

        let request = QueryDataRequest {
            queries: vec![data_query(json!({
                "rawSql": "SELECT $__unixEpochGroupAlias(ts, '1m', previous), value FROM t"
            }))],
        };
        let response = datasource.query_data(request).await;

        let frame = &response.results["A"].frames[0];
        assert!(!response.results["A"].is_error());
        assert_eq!(frame.rows(), 6);
        assert_eq!(frame.fields[1].at(1), Value::Float64(1.0));
        assert_eq!(frame.fields[1].at(3), Value::Float64(4.0));
    }
}
