//! Typed, nullable columns
//!
//! A [`Field`] owns one column of a [`Frame`](super::Frame). Every field is
//! nullable: values are stored as `Vec<Option<T>>` for the field's declared
//! [`FieldType`]. Cells cross the API as [`Value`], a tagged scalar with an
//! explicit `Null`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use super::error::{FrameError, FrameResult};

/// Labels attached to a field (series dimensions after a pivot)
pub type Labels = BTreeMap<String, String>;

/// Render labels the way series keys are compared and sorted
pub fn labels_key(labels: &Labels) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Declared type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Int16,
    Int32,
    Int64,
    Float64,
    Bool,
    Time,
    String,
    Json,
}

impl FieldType {
    /// Integer and float types
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Int16 | FieldType::Int32 | FieldType::Int64 | FieldType::Float64
        )
    }

    pub fn is_time(&self) -> bool {
        matches!(self, FieldType::Time)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, FieldType::String)
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldType::Int16 => "int16",
            FieldType::Int32 => "int32",
            FieldType::Int64 => "int64",
            FieldType::Float64 => "float64",
            FieldType::Bool => "bool",
            FieldType::Time => "time",
            FieldType::String => "string",
            FieldType::Json => "json",
        };
        write!(f, "{}", name)
    }
}

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Bool(bool),
    Time(DateTime<Utc>),
    String(String),
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short type name used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int16(_) => "int16",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float64(_) => "float64",
            Value::Bool(_) => "bool",
            Value::Time(_) => "time",
            Value::String(_) => "string",
            Value::Json(_) => "json",
        }
    }
}

impl From<Option<f64>> for Value {
    fn from(v: Option<f64>) -> Self {
        v.map(Value::Float64).unwrap_or(Value::Null)
    }
}

impl From<Option<DateTime<Utc>>> for Value {
    fn from(v: Option<DateTime<Utc>>) -> Self {
        v.map(Value::Time).unwrap_or(Value::Null)
    }
}

/// Column storage, one variant per field type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValues {
    Int16(Vec<Option<i16>>),
    Int32(Vec<Option<i32>>),
    Int64(Vec<Option<i64>>),
    Float64(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
    Time(Vec<Option<DateTime<Utc>>>),
    String(Vec<Option<String>>),
    Json(Vec<Option<serde_json::Value>>),
}

macro_rules! each_column {
    ($values:expr, $col:ident => $body:expr) => {
        match $values {
            FieldValues::Int16($col) => $body,
            FieldValues::Int32($col) => $body,
            FieldValues::Int64($col) => $body,
            FieldValues::Float64($col) => $body,
            FieldValues::Bool($col) => $body,
            FieldValues::Time($col) => $body,
            FieldValues::String($col) => $body,
            FieldValues::Json($col) => $body,
        }
    };
}

/// Store a non-null value into a column of the same type; false on mismatch
macro_rules! store_matching {
    ($values:expr, $value:expr, $col:ident, $v:ident => $store:expr) => {
        match ($values, $value) {
            (FieldValues::Int16($col), Value::Int16($v)) => {
                $store;
                true
            }
            (FieldValues::Int32($col), Value::Int32($v)) => {
                $store;
                true
            }
            (FieldValues::Int64($col), Value::Int64($v)) => {
                $store;
                true
            }
            (FieldValues::Float64($col), Value::Float64($v)) => {
                $store;
                true
            }
            (FieldValues::Bool($col), Value::Bool($v)) => {
                $store;
                true
            }
            (FieldValues::Time($col), Value::Time($v)) => {
                $store;
                true
            }
            (FieldValues::String($col), Value::String($v)) => {
                $store;
                true
            }
            (FieldValues::Json($col), Value::Json($v)) => {
                $store;
                true
            }
            _ => false,
        }
    };
}

impl FieldValues {
    /// Empty storage for a field type
    pub fn with_capacity(field_type: FieldType, capacity: usize) -> Self {
        match field_type {
            FieldType::Int16 => FieldValues::Int16(Vec::with_capacity(capacity)),
            FieldType::Int32 => FieldValues::Int32(Vec::with_capacity(capacity)),
            FieldType::Int64 => FieldValues::Int64(Vec::with_capacity(capacity)),
            FieldType::Float64 => FieldValues::Float64(Vec::with_capacity(capacity)),
            FieldType::Bool => FieldValues::Bool(Vec::with_capacity(capacity)),
            FieldType::Time => FieldValues::Time(Vec::with_capacity(capacity)),
            FieldType::String => FieldValues::String(Vec::with_capacity(capacity)),
            FieldType::Json => FieldValues::Json(Vec::with_capacity(capacity)),
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValues::Int16(_) => FieldType::Int16,
            FieldValues::Int32(_) => FieldType::Int32,
            FieldValues::Int64(_) => FieldType::Int64,
            FieldValues::Float64(_) => FieldType::Float64,
            FieldValues::Bool(_) => FieldType::Bool,
            FieldValues::Time(_) => FieldType::Time,
            FieldValues::String(_) => FieldType::String,
            FieldValues::Json(_) => FieldType::Json,
        }
    }

    pub fn len(&self) -> usize {
        each_column!(self, col => col.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_null_at(&self, index: usize) -> bool {
        each_column!(self, col => col.get(index).map(|v| v.is_none()).unwrap_or(true))
    }

    fn extend_nulls(&mut self, count: usize) {
        each_column!(self, col => col.extend(std::iter::repeat_with(|| None).take(count)))
    }
}

/// A named, typed, nullable column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    #[serde(skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,
    #[serde(rename = "type")]
    field_type: FieldType,
    values: FieldValues,
}

impl Field {
    /// Create an empty field of the given type
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self::with_capacity(name, field_type, 0)
    }

    pub fn with_capacity(name: impl Into<String>, field_type: FieldType, capacity: usize) -> Self {
        Self {
            name: name.into(),
            labels: Labels::new(),
            field_type,
            values: FieldValues::with_capacity(field_type, capacity),
        }
    }

    /// Create a field of `len` null cells
    pub fn nulls(name: impl Into<String>, field_type: FieldType, len: usize) -> Self {
        let mut field = Self::with_capacity(name, field_type, len);
        field.extend_nulls(len);
        field
    }

    /// Wrap existing storage
    pub fn from_values(name: impl Into<String>, values: FieldValues) -> Self {
        Self {
            name: name.into(),
            labels: Labels::new(),
            field_type: values.field_type(),
            values,
        }
    }

    /// Builder method: attach labels
    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn values(&self) -> &FieldValues {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_null_at(&self, index: usize) -> bool {
        self.values.is_null_at(index)
    }

    /// Append `count` null cells
    pub fn extend_nulls(&mut self, count: usize) {
        self.values.extend_nulls(count);
    }

    /// Append a value; `Value::Null` is accepted by every field type
    pub fn push(&mut self, value: Value) -> FrameResult<()> {
        let found = value.kind();
        let ok = match value {
            Value::Null => {
                self.values.extend_nulls(1);
                true
            }
            value => store_matching!(&mut self.values, value, col, v => col.push(Some(v))),
        };

        if ok {
            Ok(())
        } else {
            Err(FrameError::TypeMismatch {
                field: self.name.clone(),
                expected: self.field_type,
                found,
            })
        }
    }

    /// Overwrite the cell at `index`
    pub fn set(&mut self, index: usize, value: Value) -> FrameResult<()> {
        let len = self.len();
        if index >= len {
            return Err(FrameError::IndexOutOfRange { index, len });
        }

        let found = value.kind();
        let ok = match value {
            Value::Null => {
                each_column!(&mut self.values, col => col[index] = None);
                true
            }
            value => store_matching!(&mut self.values, value, col, v => col[index] = Some(v)),
        };

        if ok {
            Ok(())
        } else {
            Err(FrameError::TypeMismatch {
                field: self.name.clone(),
                expected: self.field_type,
                found,
            })
        }
    }

    /// Copy of the cell at `index`; out-of-range reads are `Null`
    pub fn at(&self, index: usize) -> Value {
        match &self.values {
            FieldValues::Int16(col) => col.get(index).copied().flatten().map(Value::Int16),
            FieldValues::Int32(col) => col.get(index).copied().flatten().map(Value::Int32),
            FieldValues::Int64(col) => col.get(index).copied().flatten().map(Value::Int64),
            FieldValues::Float64(col) => col.get(index).copied().flatten().map(Value::Float64),
            FieldValues::Bool(col) => col.get(index).copied().flatten().map(Value::Bool),
            FieldValues::Time(col) => col.get(index).copied().flatten().map(Value::Time),
            FieldValues::String(col) => col.get(index).cloned().flatten().map(Value::String),
            FieldValues::Json(col) => col.get(index).cloned().flatten().map(Value::Json),
        }
        .unwrap_or(Value::Null)
    }

    /// Timestamp at `index` when this is a time field
    pub fn time_at(&self, index: usize) -> Option<DateTime<Utc>> {
        match &self.values {
            FieldValues::Time(col) => col.get(index).copied().flatten(),
            _ => None,
        }
    }

    /// Read a cell as a nullable float
    ///
    /// This is the one numeric normalization used by the whole pipeline:
    /// integers and floats convert directly, booleans become 1/0, times become
    /// epoch milliseconds and strings are parsed. JSON cells are rejected.
    pub fn nullable_float_at(&self, index: usize) -> FrameResult<Option<f64>> {
        let len = self.len();
        if index >= len {
            return Err(FrameError::IndexOutOfRange { index, len });
        }

        let not_numeric = || FrameError::NotNumeric {
            field: self.name.clone(),
            field_type: self.field_type,
        };

        Ok(match &self.values {
            FieldValues::Int16(col) => col[index].map(f64::from),
            FieldValues::Int32(col) => col[index].map(f64::from),
            FieldValues::Int64(col) => col[index].map(|v| v as f64),
            FieldValues::Float64(col) => col[index],
            FieldValues::Bool(col) => col[index].map(|v| if v { 1.0 } else { 0.0 }),
            FieldValues::Time(col) => col[index].map(|t| t.timestamp_millis() as f64),
            FieldValues::String(col) => match &col[index] {
                Some(s) => Some(s.trim().parse::<f64>().map_err(|_| not_numeric())?),
                None => None,
            },
            FieldValues::Json(_) => return Err(not_numeric()),
        })
    }
}

/// Convert a float fill value into a cell of the given field type
///
/// Types without a numeric reading (time, string, JSON) get a null cell.
pub fn float_to_value(value: f64, field_type: FieldType) -> Value {
    match field_type {
        FieldType::Int16 => Value::Int16(value as i16),
        FieldType::Int32 => Value::Int32(value as i32),
        FieldType::Int64 => Value::Int64(value as i64),
        FieldType::Float64 => Value::Float64(value),
        FieldType::Bool => Value::Bool(value != 0.0),
        FieldType::Time | FieldType::String | FieldType::Json => Value::Null,
    }
}
