//! Frame primitive
//!
//! Column-oriented result tables shared by the SQL and Flux paths:
//! - [`Field`]: a named, typed, nullable column with labels
//! - [`Frame`]: equal-length fields plus metadata and notices
//! - [`long_to_wide`]: pivot of long time series into labelled wide series

pub mod data_frame;
pub mod error;
pub mod field;
pub mod long_to_wide;

pub use data_frame::{Frame, FrameMeta, Notice, Severity, TimeSeriesKind, TimeSeriesSchema};
pub use error::{FrameError, FrameResult};
pub use field::{float_to_value, labels_key, Field, FieldType, FieldValues, Labels, Value};
pub use long_to_wide::{long_to_wide, FillMissing, FillMode};
