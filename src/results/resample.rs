//! Gap-fill resampling
//!
//! Walks the time range in steps of the fill interval. Rows that fall in a
//! step are copied through unchanged; a step with no rows gets one
//! synthetic row at the step's start, filled per the fill mode.

use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

use crate::frame::{Field, Frame, FrameError, FrameResult, TimeSeriesKind, Value};
use crate::query::{FillOptions, TimeRange};

/// Floor `from` to a whole multiple of `interval` seconds since the epoch
pub fn align_start(from: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    let step = interval.as_secs() as i64;
    if step == 0 {
        return from;
    }
    let start = from.timestamp().div_euclid(step) * step;
    Utc.timestamp_opt(start, 0).single().unwrap_or(from)
}

/// Resample a wide time-series frame over `range`
pub fn resample(frame: &Frame, fill: &FillOptions, range: &TimeRange) -> FrameResult<Frame> {
    let schema = frame.time_series_schema();
    if schema.kind == TimeSeriesKind::Not {
        return Err(FrameError::NotTimeSeries);
    }
    let time_index = schema.time_index.ok_or(FrameError::NotTimeSeries)?;

    if fill.interval.is_zero() {
        return Ok(frame.clone());
    }
    let step = chrono::Duration::from_std(fill.interval)
        .map_err(|_| FrameError::IntervalOutOfRange(fill.interval))?;

    let mut out = Frame::new(frame.name.clone()).with_fields(
        frame
            .fields
            .iter()
            .map(|f| Field::new(f.name.clone(), f.field_type()).with_labels(f.labels.clone()))
            .collect(),
    );
    out.meta = frame.meta.clone();

    let time_field = &frame.fields[time_index];
    let rows = frame.rows();
    let mut last_seen: Option<usize> = None;
    let mut current = align_start(range.from, fill.interval);

    while current <= range.to {
        let next = current
            .checked_add_signed(step)
            .ok_or(FrameError::IntervalOutOfRange(fill.interval))?;
        let mut row = last_seen.map(|i| i + 1).unwrap_or(0);
        let mut bucket = Vec::new();

        while row < rows {
            let Some(t) = time_field.time_at(row) else {
                row += 1;
                continue;
            };
            if t > current {
                if t < next {
                    bucket.push(row);
                    last_seen = Some(row);
                }
                break;
            }
            bucket.push(row);
            last_seen = Some(row);
            row += 1;
        }

        if bucket.is_empty() {
            let out_row = out.rows();
            let mut values = Vec::with_capacity(out.fields.len());
            for (i, field) in out.fields.iter().enumerate() {
                if i == time_index {
                    values.push(Value::Time(current));
                } else {
                    values.push(fill.missing.cell_for(field, out_row));
                }
            }
            out.append_row(values)?;
        } else {
            for source in bucket {
                let values = frame.fields.iter().map(|f| f.at(source)).collect();
                out.append_row(values)?;
            }
        }

        current = next;
    }

    Ok(out)
}
