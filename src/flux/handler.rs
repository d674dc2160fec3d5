//! Per-query pipeline for the InfluxDB datasource

use async_trait::async_trait;
use std::sync::Arc;

use super::annotated::read_annotated_csv;
use super::client::FluxRunner;
use super::macros::{interpolate_flux, FluxVariables};
use crate::frame::Frame;
use crate::query::{DataQuery, DataResponse, QueryError, QueryHandler, QueryModel};

/// Interpolates and runs a Flux script, one frame per returned series
#[derive(Clone)]
pub struct FluxQueryHandler {
    runner: Arc<dyn FluxRunner>,
    variables: FluxVariables,
    row_limit: usize,
}

impl FluxQueryHandler {
    pub fn new(runner: Arc<dyn FluxRunner>, variables: FluxVariables, row_limit: usize) -> Self {
        Self {
            runner,
            variables,
            row_limit,
        }
    }
}

#[async_trait]
impl QueryHandler for FluxQueryHandler {
    async fn execute(&self, query: DataQuery, model: QueryModel) -> DataResponse {
        let script = interpolate_flux(&model.raw_query, &query, &self.variables);

        let frames = match self.runner.run(&script).await {
            Ok(body) => read_annotated_csv(&body, &query.ref_id, self.row_limit),
            Err(e) => Err(e),
        };

        match frames {
            Ok(mut frames) => {
                for frame in &mut frames {
                    frame.meta.executed_query_string = Some(script.clone());
                }
                DataResponse::with_frames(frames)
            }
            Err(e) => {
                tracing::error!(ref_id = %query.ref_id, error = %e, "Flux query failed");
                let mut frame = Frame::new(query.ref_id.clone());
                frame.meta.executed_query_string = Some(script);
                DataResponse::from_error(&QueryError::from(e), vec![frame])
            }
        }
    }
}
