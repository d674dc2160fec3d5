//! Wire-level column metadata

use serde::{Deserialize, Serialize};

/// PostgreSQL type OID
pub type Oid = u32;

/// Type OIDs with dedicated decoders
pub mod oid {
    use super::Oid;

    pub const BOOL: Oid = 16;
    pub const BYTEA: Oid = 17;
    pub const NAME: Oid = 19;
    pub const INT8: Oid = 20;
    pub const INT2: Oid = 21;
    pub const INT4: Oid = 23;
    pub const TEXT: Oid = 25;
    pub const JSON: Oid = 114;
    pub const FLOAT4: Oid = 700;
    pub const FLOAT8: Oid = 701;
    pub const UNKNOWN: Oid = 705;
    pub const BPCHAR: Oid = 1042;
    pub const VARCHAR: Oid = 1043;
    pub const DATE: Oid = 1082;
    pub const TIME: Oid = 1083;
    pub const TIMESTAMP: Oid = 1114;
    pub const TIMESTAMPTZ: Oid = 1184;
    pub const TIMETZ: Oid = 1266;
    pub const NUMERIC: Oid = 1700;
    pub const JSONB: Oid = 3802;
}

/// Wire types a metric column may have when not named `metric`
pub const METRIC_COLUMN_TYPES: [Oid; 4] = [oid::TEXT, oid::VARCHAR, oid::BPCHAR, oid::UNKNOWN];

/// Encoding of a cell on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    Text,
    #[default]
    Binary,
}

/// One result column as described by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub type_oid: Oid,
    #[serde(default)]
    pub format: WireFormat,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, type_oid: Oid, format: WireFormat) -> Self {
        Self {
            name: name.into(),
            type_oid,
            format,
        }
    }

    pub fn binary(name: impl Into<String>, type_oid: Oid) -> Self {
        Self::new(name, type_oid, WireFormat::Binary)
    }

    pub fn text(name: impl Into<String>, type_oid: Oid) -> Self {
        Self::new(name, type_oid, WireFormat::Text)
    }

    /// PostgreSQL's name for the column type, or the raw OID
    pub fn type_name(&self) -> String {
        tokio_postgres::types::Type::from_oid(self.type_oid)
            .map(|t| t.name().to_string())
            .unwrap_or_else(|| format!("oid {}", self.type_oid))
    }
}

/// What to do with a type that has no decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMode {
    /// Read the cell as lossy UTF-8 text
    #[default]
    Lenient,
    /// Fail the statement
    Strict,
}
