//! Post-processing of an assembled frame
//!
//! - epoch normalization of the time column (seconds, milliseconds or
//!   nanoseconds in, timestamps out)
//! - float coercion of value columns for time series
//! - long-to-wide pivot with the legacy single-label naming
//! - gap-fill resampling when a group macro asked for it

use chrono::{DateTime, TimeZone, Utc};

use super::error::{ShapeError, ShapeResult};
use super::resample::{align_start, resample};
use crate::convert::{ColumnDescriptor, METRIC_COLUMN_TYPES};
use crate::frame::{long_to_wide, Field, FieldType, Frame, Notice, TimeSeriesKind, Value};
use crate::query::{Format, QueryModel, TimeRange};

/// Name given to the time field of a time series
pub const TIME_FIELD_NAME: &str = "Time";

/// Notice attached when resampling fails
pub const RESAMPLE_FAILED: &str = "Failed to resample dataframe";

/// Roles of the result columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColumnRoles {
    pub time_index: Option<usize>,
    pub time_end_index: Option<usize>,
    pub metric_index: Option<usize>,
}

impl ColumnRoles {
    /// Resolve roles from column names and wire types
    ///
    /// The time column is the last one whose name is in `time_column_names`.
    /// The metric column is the one named `metric`, else the first
    /// text-typed column.
    pub fn resolve(columns: &[ColumnDescriptor], format: Format, time_column_names: &[String]) -> Self {
        let mut roles = Self::default();
        let mut metric_by_type = None;

        for (i, column) in columns.iter().enumerate() {
            if time_column_names.iter().any(|n| *n == column.name) {
                roles.time_index = Some(i);
                continue;
            }
            if format == Format::Table && column.name.eq_ignore_ascii_case("timeend") {
                roles.time_end_index = Some(i);
                continue;
            }
            if column.name == "metric" {
                roles.metric_index = Some(i);
            } else if metric_by_type.is_none() && METRIC_COLUMN_TYPES.contains(&column.type_oid) {
                metric_by_type = Some(i);
            }
        }

        if roles.metric_index.is_none() {
            roles.metric_index = metric_by_type;
        }
        roles
    }
}

/// Scale an epoch value of unknown precision to milliseconds
///
/// Values printing as `xe9` in scientific notation are seconds, `xe18`
/// nanoseconds; everything else is taken as milliseconds.
pub fn epoch_to_millis(value: f64) -> f64 {
    let sci = format!("{:e}", value);
    if sci.ends_with("e9") {
        value * 1e3
    } else if sci.ends_with("e18") {
        value / 1e6
    } else {
        value
    }
}

/// Replace a numeric epoch column with a time field
pub fn convert_time_column(frame: &mut Frame, index: usize) -> ShapeResult<()> {
    let Some(origin) = frame.fields.get(index) else {
        return Ok(());
    };
    if origin.field_type() == FieldType::Time {
        return Ok(());
    }

    let failed = || ShapeError::TimeConversion(origin.name.clone());
    let mut field = Field::with_capacity(origin.name.clone(), FieldType::Time, origin.len())
        .with_labels(origin.labels.clone());

    for row in 0..origin.len() {
        let value = origin.nullable_float_at(row).map_err(|_| failed())?;
        let cell = match value {
            None => Value::Null,
            Some(v) => Value::Time(millis_to_time(epoch_to_millis(v)).ok_or_else(failed)?),
        };
        field.push(cell)?;
    }

    frame.fields[index] = field;
    Ok(())
}

fn millis_to_time(ms: f64) -> Option<DateTime<Utc>> {
    if !ms.is_finite() {
        return None;
    }
    Utc.timestamp_millis_opt(ms as i64).single()
}

/// Replace a value column with a float field
pub fn convert_value_column(frame: &mut Frame, index: usize) -> ShapeResult<()> {
    let Some(origin) = frame.fields.get(index) else {
        return Ok(());
    };
    if origin.field_type() == FieldType::Float64 {
        return Ok(());
    }

    let mut field = Field::with_capacity(origin.name.clone(), FieldType::Float64, origin.len())
        .with_labels(origin.labels.clone());
    for row in 0..origin.len() {
        let value = origin
            .nullable_float_at(row)
            .map_err(ShapeError::ValueConversion)?;
        field.push(value.into())?;
    }

    frame.fields[index] = field;
    Ok(())
}

/// Shape an assembled frame for the requested format
pub fn shape_frame(
    mut frame: Frame,
    roles: &ColumnRoles,
    model: &QueryModel,
    time_range: &TimeRange,
    time_column_names: &[String],
) -> ShapeResult<Frame> {
    if frame.rows() == 0 {
        frame.fields.clear();
        return Ok(frame);
    }

    if let Some(index) = roles.time_index {
        convert_time_column(&mut frame, index)?;
    }
    if model.format == Format::Table {
        if let Some(index) = roles.time_end_index {
            convert_time_column(&mut frame, index)?;
        }
        return Ok(frame);
    }

    let time_index = roles
        .time_index
        .ok_or_else(|| ShapeError::NoTimeColumn(time_column_names.join(" or ")))?;
    frame.fields[time_index].name = TIME_FIELD_NAME.to_string();

    for index in 0..frame.fields.len() {
        if Some(index) == roles.time_index || Some(index) == roles.metric_index {
            continue;
        }
        if frame.fields[index].field_type() == FieldType::String {
            continue;
        }
        convert_value_column(&mut frame, index)?;
    }

    let fill = model.fill.as_ref();
    if frame.time_series_schema().kind == TimeSeriesKind::Long {
        let original_width = frame.fields.len();
        frame = long_to_wide(&frame, fill.map(|f| &f.missing)).map_err(ShapeError::Pivot)?;

        if original_width == 3 {
            for field in &mut frame.fields {
                if field.labels.len() == 1 {
                    if let Some(name) = field.labels.values().next() {
                        field.name = name.clone();
                    }
                    field.labels.clear();
                }
            }
        }
    }

    if let Some(fill) = fill {
        let aligned = TimeRange::new(align_start(time_range.from, fill.interval), time_range.to);
        match resample(&frame, fill, &aligned) {
            Ok(resampled) => frame = resampled,
            Err(e) => {
                tracing::warn!(error = %e, frame = %frame.name, "Failed to resample dataframe");
                frame.add_notice(Notice::warning(RESAMPLE_FAILED));
            }
        }
    }

    Ok(frame)
}
