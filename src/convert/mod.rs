//! Value and type conversion
//!
//! Maps PostgreSQL wire types onto frame field types and decodes raw cells:
//!
//! - **Types**: column descriptors, type OIDs, decode mode
//! - **Decoders**: one function per wire type, text and binary formats
//! - **Pipeline**: the OID lookup table used by the result assembler

mod decoders;
mod error;
mod numeric;
mod pipeline;
mod types;

pub use error::{BoxError, DecodeError, DecodeResult};
pub use numeric::decode_numeric;
pub use pipeline::{ConversionPipeline, Decoder};
pub use types::{oid, ColumnDescriptor, DecodeMode, Oid, WireFormat, METRIC_COLUMN_TYPES};
