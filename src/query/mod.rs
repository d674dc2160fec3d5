//! Query model and batch execution
//!
//! - **Model**: request, per-query payload and response types
//! - **Error**: the per-query error taxonomy and its error source
//! - **DataSource**: concurrent fan-out of a batch over a [`QueryHandler`]
//!
//! # Examples
//!
//! ```rust,ignore
//! use pgflux::query::{DataSource, QueryDataRequest};
//!
//! let datasource = DataSource::new(handler);
//! let response = datasource.query_data(request).await;
//! for (ref_id, result) in &response.results {
//!     println!("{}: {} frames", ref_id, result.frames.len());
//! }
//! ```

mod datasource;
mod error;
mod model;

pub use datasource::{DataSource, QueryHandler, ResponseCollector};
pub use error::{QueryError, QueryResult};
pub use model::{
    DataQuery, DataResponse, ErrorSource, FillOptions, Format, QueryDataRequest,
    QueryDataResponse, QueryModel, TimeRange,
};
