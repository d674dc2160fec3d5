//! Frame error types

use thiserror::Error;

use super::field::FieldType;
use super::data_frame::TimeSeriesKind;

/// Errors raised while building or reshaping frames
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    /// A value of the wrong type was written into a field
    #[error("field {field} expects {expected} values, got {found}")]
    TypeMismatch {
        field: String,
        expected: FieldType,
        found: &'static str,
    },

    /// Row or cell index outside the field
    #[error("index {index} out of range for field of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A row did not carry one value per field
    #[error("row has {found} values, frame has {expected} fields")]
    RowLength { expected: usize, found: usize },

    /// The cell cannot be read as a number
    #[error("field {field} of type {field_type} can not be read as a float")]
    NotNumeric { field: String, field_type: FieldType },

    /// long_to_wide was given something other than a long frame
    #[error("can not convert to wide series, expected long format series input but got {0} series")]
    NotLong(TimeSeriesKind),

    /// long_to_wide was given an empty frame
    #[error("can not convert to wide series, input fields have no rows")]
    NoRows,

    /// A time cell was null where a timestamp is required
    #[error("can not convert to wide series, input has null time values")]
    NullTime,

    /// Resampling needs a time column and value columns
    #[error("can not fill missing, not timeseries frame")]
    NotTimeSeries,

    /// A resample step too large to add to a timestamp
    #[error("resample interval {0:?} is out of range")]
    IntervalOutOfRange(std::time::Duration),

    /// Time values went backwards
    #[error("long series must be sorted ascending by time to be converted")]
    Unsorted,
}

/// Result type alias for frame operations
pub type FrameResult<T> = Result<T, FrameError>;
