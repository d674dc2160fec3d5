//! Macro error types

use thiserror::Error;

/// Errors raised while evaluating a macro
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MacroError {
    /// A macro that needs a column was called without one
    #[error("missing time column argument for macro {0}")]
    MissingColumn(String),

    /// A group macro was called without an interval
    #[error("macro {0} needs time column and interval and optional fill value")]
    MissingInterval(String),

    /// The interval argument did not parse
    #[error("error parsing interval {0}")]
    Interval(String),

    /// The fill argument was neither `NULL`, `previous` nor a number
    #[error("error parsing fill value {0}")]
    FillValue(String),

    /// No macro with this name exists
    #[error("unknown macro {0}")]
    Unknown(String),
}

/// Result type alias for macro evaluation
pub type MacroResult<T> = Result<T, MacroError>;
