//! Query error types
//!
//! Defines every way a single query of a batch can fail, and which side of
//! the system each failure is attributed to.

use std::time::Duration;

use thiserror::Error;

use super::model::ErrorSource;

/// Errors that can occur while running one query
#[derive(Error, Debug)]
pub enum QueryError {
    /// The per-query JSON payload did not parse
    #[error("error reading query: {0}")]
    Payload(String),

    /// Fill parameters were set directly in the payload
    #[error("query fill parameters are not allowed, use the fill argument of $__timeGroup instead")]
    FillParameters,

    /// An empty query reached dispatch
    #[error("query is empty")]
    EmptyQuery,

    /// Macro interpolation failed
    #[error(transparent)]
    Macro(#[from] crate::macros::MacroError),

    /// The database rejected the query or could not be reached
    #[error(transparent)]
    Execution(#[from] crate::sql::ExecutionError),

    /// The query ran longer than the configured timeout
    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    /// Results could not be assembled or shaped
    #[error(transparent)]
    Shape(#[from] crate::results::ShapeError),

    /// InfluxDB request or response handling failed
    #[error(transparent)]
    Flux(#[from] crate::flux::FluxError),

    /// The task running the query panicked
    #[error("unexpected error while running query: {0}")]
    Panic(String),
}

impl QueryError {
    /// Attribute the error to this service or to the backend
    pub fn source_kind(&self) -> ErrorSource {
        use crate::results::ShapeError;

        match self {
            QueryError::EmptyQuery | QueryError::Panic(_) => ErrorSource::Plugin,
            QueryError::Shape(ShapeError::Pivot(_) | ShapeError::Frame(_)) => ErrorSource::Plugin,
            _ => ErrorSource::Downstream,
        }
    }
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameError;
    use crate::macros::MacroError;
    use crate::results::ShapeError;
    use crate::sql::ExecutionError;

    #[test]
    fn test_error_sources() {
        assert_eq!(QueryError::EmptyQuery.source_kind(), ErrorSource::Plugin);
        assert_eq!(QueryError::Panic("boom".into()).source_kind(), ErrorSource::Plugin);
        assert_eq!(
            QueryError::Shape(ShapeError::Pivot(FrameError::Unsorted)).source_kind(),
            ErrorSource::Plugin
        );
        assert_eq!(
            QueryError::from(MacroError::Unknown("x".into())).source_kind(),
            ErrorSource::Downstream
        );
        assert_eq!(
            QueryError::from(ExecutionError::Query("syntax".into())).source_kind(),
            ErrorSource::Downstream
        );
        assert_eq!(
            QueryError::Shape(ShapeError::NoTimeColumn("time".into())).source_kind(),
            ErrorSource::Downstream
        );
    }

    #[test]
    fn test_connection_error_text_is_generic() {
        let err = QueryError::from(ExecutionError::Connection("password authentication failed".into()));
        assert_eq!(
            err.to_string(),
            "failed to connect to server - please inspect server log for details"
        );
        assert_eq!(err.source_kind(), ErrorSource::Downstream);
    }
}
