//! Result assembly and shaping errors

use thiserror::Error;

use crate::convert::DecodeError;
use crate::frame::{FieldType, FrameError};

/// Errors raised while turning statement results into a response frame
#[derive(Error, Debug)]
pub enum ShapeError {
    /// A later statement returned a different number of columns
    #[error("incompatible result structure: expected {expected} columns, got {found}")]
    IncompatibleStructure { expected: usize, found: usize },

    /// A later statement named a column differently
    #[error("column name mismatch: expected {expected}, got {found}")]
    ColumnNameMismatch { expected: String, found: String },

    /// A later statement returned a column that decodes to another type
    #[error("column type mismatch for {column}: expected {expected}, got {found}")]
    ColumnTypeMismatch {
        column: String,
        expected: FieldType,
        found: FieldType,
    },

    /// Time series format needs a time column
    #[error("found no column named {0}")]
    NoTimeColumn(String),

    /// A time column held values that are not timestamps
    #[error("unable to convert column {0} to a time field")]
    TimeConversion(String),

    /// A value column could not be read as a float
    #[error("failed to convert value column to float: {0}")]
    ValueConversion(FrameError),

    /// Cell decoding failed
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Frame construction failed
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// long_to_wide failed
    #[error("failed to convert long to wide series when converting from dataframe: {0}")]
    Pivot(FrameError),
}

/// Result type alias for result shaping
pub type ShapeResult<T> = Result<T, ShapeError>;
