//! Result assembly and shaping
//!
//! - **Assembler**: statement results to one frame, with the row limit
//! - **Shape**: time normalization, value coercion, pivot, gap-fill
//! - **Resample**: the gap-fill walk over the time range

mod assembler;
mod error;
mod resample;
mod shape;

pub use assembler::{assemble_frame, row_limit_notice, AssembledFrame};
pub use error::{ShapeError, ShapeResult};
pub use resample::{align_start, resample};
pub use shape::{
    convert_time_column, convert_value_column, epoch_to_millis, shape_frame, ColumnRoles,
    RESAMPLE_FAILED, TIME_FIELD_NAME,
};
