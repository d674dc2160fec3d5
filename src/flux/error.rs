//! InfluxDB driver errors

use thiserror::Error;

use crate::frame::FrameError;

/// Errors raised by the Flux client and the annotated CSV reader
#[derive(Error, Debug)]
pub enum FluxError {
    /// The HTTP client could not be built
    #[error("failed to build InfluxDB client: {0}")]
    Http(#[from] reqwest::Error),

    /// Could not reach InfluxDB or read its answer; the cause is logged, not shown
    #[error("failed to connect to server - please inspect server log for details")]
    Connection,

    /// InfluxDB answered with a non-success status
    #[error("InfluxDB returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The query failed while the response was streaming
    #[error("{0}")]
    Query(String),

    /// The response body was not valid annotated CSV
    #[error("invalid annotated CSV: {0}")]
    Csv(#[from] csv::Error),

    /// A data row appeared before its header
    #[error("annotated CSV row {row} has no header")]
    MissingHeader { row: usize },

    /// A cell did not parse as its annotated datatype
    #[error("column {column}: cannot read {value:?} as {datatype}")]
    Cell {
        column: String,
        datatype: String,
        value: String,
    },

    /// The frame rejected a converted value
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Result type for the InfluxDB driver
pub type FluxResult<T> = Result<T, FluxError>;
