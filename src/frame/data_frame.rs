//! Frames: ordered collections of equal-length fields

use serde::Serialize;

use super::error::{FrameError, FrameResult};
use super::field::{Field, Value};

/// Notice severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A message attached to a frame for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub severity: Severity,
    pub text: String,
}

impl Notice {
    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            text: text.into(),
        }
    }
}

/// Frame metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMeta {
    /// The query text actually sent to the backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_query_string: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<Notice>,
}

/// A named collection of fields
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Frame {
    pub name: String,
    pub fields: Vec<Field>,
    pub meta: FrameMeta,
}

impl Frame {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder method: set fields
    pub fn with_fields(mut self, fields: Vec<Field>) -> Self {
        self.fields = fields;
        self
    }

    /// Number of rows; the length of the first field
    pub fn rows(&self) -> usize {
        self.fields.first().map(Field::len).unwrap_or(0)
    }

    /// Append one value per field
    pub fn append_row(&mut self, row: Vec<Value>) -> FrameResult<()> {
        if row.len() != self.fields.len() {
            return Err(FrameError::RowLength {
                expected: self.fields.len(),
                found: row.len(),
            });
        }
        for (field, value) in self.fields.iter_mut().zip(row) {
            field.push(value)?;
        }
        Ok(())
    }

    pub fn add_notice(&mut self, notice: Notice) {
        self.meta.notices.push(notice);
    }

    /// Index of the first field with the given name
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Classify the frame's columns for time-series handling
    pub fn time_series_schema(&self) -> TimeSeriesSchema {
        TimeSeriesSchema::of(self)
    }
}

/// How a frame is laid out as a time series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSeriesKind {
    /// No time column, or no value column
    Not,
    /// One time column and value columns, no string dimensions
    Wide,
    /// Time column, value columns and string dimension columns
    Long,
}

impl std::fmt::Display for TimeSeriesKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TimeSeriesKind::Not => "not",
            TimeSeriesKind::Wide => "wide",
            TimeSeriesKind::Long => "long",
        };
        write!(f, "{}", name)
    }
}

/// Column roles of a frame viewed as a time series
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSeriesSchema {
    pub kind: TimeSeriesKind,
    /// The first time field
    pub time_index: Option<usize>,
    /// Numeric and boolean fields
    pub value_indices: Vec<usize>,
    /// String fields
    pub factor_indices: Vec<usize>,
}

impl TimeSeriesSchema {
    fn of(frame: &Frame) -> Self {
        let mut time_index = None;
        let mut value_indices = Vec::new();
        let mut factor_indices = Vec::new();

        for (i, field) in frame.fields.iter().enumerate() {
            let field_type = field.field_type();
            if field_type.is_time() {
                if time_index.is_none() {
                    time_index = Some(i);
                }
            } else if field_type.is_string() {
                factor_indices.push(i);
            } else if field_type.is_numeric() || field_type == super::FieldType::Bool {
                value_indices.push(i);
            }
        }

        let kind = match (time_index, value_indices.is_empty(), factor_indices.is_empty()) {
            (None, _, _) | (_, true, _) => TimeSeriesKind::Not,
            (Some(_), false, true) => TimeSeriesKind::Wide,
            (Some(_), false, false) => TimeSeriesKind::Long,
        };

        Self {
            kind,
            time_index,
            value_indices,
            factor_indices,
        }
    }
}
