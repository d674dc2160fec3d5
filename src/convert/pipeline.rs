//! Wire type to frame type conversion
//!
//! The decoder table is built once and shared read-only between queries.

use std::collections::HashMap;

use super::decoders::{self, DecodeFn};
use super::error::{DecodeError, DecodeResult};
use super::types::{oid, ColumnDescriptor, DecodeMode, Oid};
use crate::frame::{Field, FieldType, Value};

/// A wire type's frame type and cell decoder
#[derive(Clone, Copy)]
pub struct Decoder {
    pub field_type: FieldType,
    pub decode: DecodeFn,
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("field_type", &self.field_type)
            .finish()
    }
}

/// Lookup table from type OID to decoder
#[derive(Debug, Clone)]
pub struct ConversionPipeline {
    decoders: HashMap<Oid, Decoder>,
    mode: DecodeMode,
}

impl Default for ConversionPipeline {
    fn default() -> Self {
        Self::new(DecodeMode::Lenient)
    }
}

impl ConversionPipeline {
    pub fn new(mode: DecodeMode) -> Self {
        let table: [(Oid, FieldType, DecodeFn); 20] = [
            (oid::INT2, FieldType::Int16, decoders::int2),
            (oid::INT4, FieldType::Int32, decoders::int4),
            (oid::INT8, FieldType::Int64, decoders::int8),
            (oid::FLOAT4, FieldType::Float64, decoders::float4),
            (oid::FLOAT8, FieldType::Float64, decoders::float8),
            (oid::NUMERIC, FieldType::Float64, decoders::numeric),
            (oid::BOOL, FieldType::Bool, decoders::boolean),
            (oid::TIMESTAMP, FieldType::Time, decoders::timestamp),
            (oid::TIMESTAMPTZ, FieldType::Time, decoders::timestamptz),
            (oid::DATE, FieldType::Time, decoders::date),
            (oid::JSON, FieldType::Json, decoders::json),
            (oid::JSONB, FieldType::Json, decoders::jsonb),
            (oid::TIME, FieldType::String, decoders::time_of_day),
            (oid::TIMETZ, FieldType::String, decoders::time_of_day_tz),
            (oid::BYTEA, FieldType::String, decoders::bytes),
            (oid::TEXT, FieldType::String, decoders::string),
            (oid::VARCHAR, FieldType::String, decoders::string),
            (oid::BPCHAR, FieldType::String, decoders::string),
            (oid::NAME, FieldType::String, decoders::string),
            (oid::UNKNOWN, FieldType::String, decoders::string),
        ];

        let decoders = table
            .into_iter()
            .map(|(oid, field_type, decode)| (oid, Decoder { field_type, decode }))
            .collect();

        Self { decoders, mode }
    }

    pub fn mode(&self) -> DecodeMode {
        self.mode
    }

    /// Frame type for a wire type; unknown types are strings
    pub fn field_type(&self, type_oid: Oid) -> FieldType {
        self.decoders
            .get(&type_oid)
            .map(|d| d.field_type)
            .unwrap_or(FieldType::String)
    }

    /// Empty field for a result column
    pub fn new_field(&self, column: &ColumnDescriptor) -> Field {
        Field::new(column.name.clone(), self.field_type(column.type_oid))
    }

    /// Decode one raw cell; `None` is always a null of the column type
    pub fn decode_cell(&self, raw: Option<&[u8]>, column: &ColumnDescriptor) -> DecodeResult<Value> {
        let Some(raw) = raw else {
            return Ok(Value::Null);
        };

        let decoder = self.decoders.get(&column.type_oid);
        if decoder.is_none() && self.mode == DecodeMode::Strict {
            return Err(DecodeError::UnsupportedType {
                column: column.name.clone(),
                type_name: column.type_name(),
                oid: column.type_oid,
            });
        }

        let decode = decoder.map(|d| d.decode).unwrap_or(decoders::lossy_string);
        decode(raw, column.format).map_err(|cause| DecodeError::Cell {
            column: column.name.clone(),
            type_name: column.type_name(),
            cause,
        })
    }

    /// Decode a full row against its column descriptors
    pub fn decode_row(
        &self,
        row: &[Option<Vec<u8>>],
        columns: &[ColumnDescriptor],
    ) -> DecodeResult<Vec<Value>> {
        if row.len() != columns.len() {
            return Err(DecodeError::RowWidth {
                expected: columns.len(),
                found: row.len(),
            });
        }

        row.iter()
            .zip(columns)
            .map(|(cell, column)| self.decode_cell(cell.as_deref(), column))
            .collect()
    }
}
