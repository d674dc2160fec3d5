//! Long-to-wide pivot
//!
//! A long frame holds one row per (time, dimension combination). The wide
//! form has a single time column and one value column per (value field,
//! dimension combination), with the dimensions carried as field labels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::data_frame::{Frame, TimeSeriesKind};
use super::error::{FrameError, FrameResult};
use super::field::{float_to_value, labels_key, Field, FieldType, Labels, Value};

/// How cells without a source row are filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    #[default]
    Null,
    Previous,
    Value,
}

/// Fill policy for missing cells
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FillMissing {
    pub mode: FillMode,
    /// Used when `mode` is `Value`
    pub value: f64,
}

impl FillMissing {
    pub fn null() -> Self {
        Self::default()
    }

    pub fn previous() -> Self {
        Self {
            mode: FillMode::Previous,
            value: 0.0,
        }
    }

    pub fn value(value: f64) -> Self {
        Self {
            mode: FillMode::Value,
            value,
        }
    }

    /// The cell to write at `row` of `field` when no data exists for it
    pub fn cell_for(&self, field: &Field, row: usize) -> Value {
        match self.mode {
            FillMode::Null => Value::Null,
            FillMode::Value => float_to_value(self.value, field.field_type()),
            FillMode::Previous if row > 0 => field.at(row - 1),
            FillMode::Previous => Value::Null,
        }
    }
}

struct WideColumn {
    value_index: usize,
    sort_key: String,
    field: Field,
    written: Vec<bool>,
}

/// Pivot a long frame into wide form
///
/// The input must be sorted ascending by time and carry no null times.
pub fn long_to_wide(long: &Frame, fill: Option<&FillMissing>) -> FrameResult<Frame> {
    let schema = long.time_series_schema();
    if schema.kind != TimeSeriesKind::Long {
        return Err(FrameError::NotLong(schema.kind));
    }
    let time_index = schema.time_index.ok_or(FrameError::NotLong(schema.kind))?;

    let rows = long.rows();
    if rows == 0 {
        return Err(FrameError::NoRows);
    }

    let long_time = &long.fields[time_index];
    let mut wide_time = Field::new(long_time.name.clone(), FieldType::Time);
    wide_time.labels = long_time.labels.clone();

    let mut columns: Vec<WideColumn> = Vec::new();
    let mut by_key: HashMap<(usize, String), usize> = HashMap::new();
    let mut last_time: Option<DateTime<Utc>> = None;

    for row in 0..rows {
        let time = long_time.time_at(row).ok_or(FrameError::NullTime)?;

        match last_time {
            Some(prev) if time < prev => return Err(FrameError::Unsorted),
            Some(prev) if time == prev => {}
            _ => {
                wide_time.push(Value::Time(time))?;
                for column in &mut columns {
                    column.field.extend_nulls(1);
                    column.written.push(false);
                }
                last_time = Some(time);
            }
        }
        let wide_row = wide_time.len() - 1;

        let mut labels = Labels::new();
        for &factor in &schema.factor_indices {
            let factor_field = &long.fields[factor];
            let value = match factor_field.at(row) {
                Value::String(s) => s,
                _ => String::new(),
            };
            labels.insert(factor_field.name.clone(), value);
        }
        let sort_key = labels_key(&labels);

        for &value_index in &schema.value_indices {
            let key = (value_index, sort_key.clone());
            let column_index = match by_key.get(&key) {
                Some(&i) => i,
                None => {
                    let source = &long.fields[value_index];
                    let field = Field::nulls(source.name.clone(), source.field_type(), wide_time.len())
                        .with_labels(labels.clone());
                    columns.push(WideColumn {
                        value_index,
                        sort_key: sort_key.clone(),
                        field,
                        written: vec![false; wide_time.len()],
                    });
                    by_key.insert(key, columns.len() - 1);
                    columns.len() - 1
                }
            };

            let column = &mut columns[column_index];
            column.field.set(wide_row, long.fields[value_index].at(row))?;
            column.written[wide_row] = true;
        }
    }

    if let Some(fill) = fill {
        for column in &mut columns {
            for row in 0..column.written.len() {
                if !column.written[row] {
                    let cell = fill.cell_for(&column.field, row);
                    column.field.set(row, cell)?;
                }
            }
        }
    }

    columns.sort_by(|a, b| {
        a.value_index
            .cmp(&b.value_index)
            .then_with(|| a.sort_key.cmp(&b.sort_key))
    });

    let mut fields = Vec::with_capacity(columns.len() + 1);
    fields.push(wide_time);
    fields.extend(columns.into_iter().map(|c| c.field));

    let mut wide = Frame::new(long.name.clone()).with_fields(fields);
    wide.meta = long.meta.clone();
    Ok(wide)
}
