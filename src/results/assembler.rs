//! Statement results to a single frame
//!
//! Only row-returning statements contribute. The first one fixes the
//! column set; every later one must match its names and decoded types.
//! Each statement's rows are decoded against that statement's own
//! descriptors. Rows stop at the row
//! limit, which adds a warning notice instead of failing.

use super::error::{ShapeError, ShapeResult};
use crate::convert::{ColumnDescriptor, ConversionPipeline};
use crate::frame::{Frame, Notice};
use crate::sql::StatementResult;

/// An assembled frame and the descriptors its fields came from
#[derive(Debug, Clone)]
pub struct AssembledFrame {
    pub frame: Frame,
    pub columns: Vec<ColumnDescriptor>,
}

/// Text of the truncation notice
pub fn row_limit_notice(row_limit: usize) -> Notice {
    Notice::warning(format!(
        "Results have been limited to {} because the SQL row limit was reached",
        row_limit
    ))
}

/// Build one frame from all statement results of a query
pub fn assemble_frame(
    pipeline: &ConversionPipeline,
    name: &str,
    results: &[StatementResult],
    row_limit: usize,
) -> ShapeResult<AssembledFrame> {
    let mut selects = results.iter().filter(|r| r.command_tag.is_select());

    let Some(first) = selects.next() else {
        return Ok(AssembledFrame {
            frame: Frame::new(name),
            columns: Vec::new(),
        });
    };

    let columns = first.columns.clone();
    let fields = columns.iter().map(|c| pipeline.new_field(c)).collect();
    let mut frame = Frame::new(name).with_fields(fields);
    let mut limited = false;

    for result in std::iter::once(first).chain(selects) {
        check_structure(pipeline, &columns, &result.columns)?;

        for row in &result.rows {
            if limited {
                break;
            }
            if frame.rows() >= row_limit {
                frame.add_notice(row_limit_notice(row_limit));
                limited = true;
                break;
            }
            let values = pipeline.decode_row(row, &result.columns)?;
            frame.append_row(values)?;
        }
    }

    Ok(AssembledFrame { frame, columns })
}

fn check_structure(
    pipeline: &ConversionPipeline,
    expected: &[ColumnDescriptor],
    found: &[ColumnDescriptor],
) -> ShapeResult<()> {
    if expected.len() != found.len() {
        return Err(ShapeError::IncompatibleStructure {
            expected: expected.len(),
            found: found.len(),
        });
    }
    for (e, f) in expected.iter().zip(found) {
        if e.name != f.name {
            return Err(ShapeError::ColumnNameMismatch {
                expected: e.name.clone(),
                found: f.name.clone(),
            });
        }
        let expected_type = pipeline.field_type(e.type_oid);
        let found_type = pipeline.field_type(f.type_oid);
        if expected_type != found_type {
            return Err(ShapeError::ColumnTypeMismatch {
                column: e.name.clone(),
                expected: expected_type,
                found: found_type,
            });
        }
    }
    Ok(())
}
