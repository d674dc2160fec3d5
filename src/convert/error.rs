//! Conversion error types

use thiserror::Error;

use super::types::Oid;

/// Boxed cause from a type-specific decoder
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while turning raw cells into frame values
#[derive(Error, Debug)]
pub enum DecodeError {
    /// A non-null cell failed its type-specific decode
    #[error("failed to decode column {column} of type {type_name}: {cause}")]
    Cell {
        column: String,
        type_name: String,
        cause: BoxError,
    },

    /// Strict mode met a type without a decoder
    #[error("unsupported data type {type_name} (oid {oid}) in column {column}")]
    UnsupportedType {
        column: String,
        type_name: String,
        oid: Oid,
    },

    /// A row did not carry one cell per column
    #[error("row has {found} cells, result has {expected} columns")]
    RowWidth { expected: usize, found: usize },
}

/// Result type alias for conversion
pub type DecodeResult<T> = Result<T, DecodeError>;
