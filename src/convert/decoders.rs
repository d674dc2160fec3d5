//! Per-type cell decoders
//!
//! Binary cells go through `tokio-postgres`' `FromSql` implementations
//! where one exists; text cells are parsed from PostgreSQL's output format.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tokio_postgres::types::{FromSql, Type};

use super::error::BoxError;
use super::numeric::decode_numeric;
use super::types::WireFormat;
use crate::frame::Value;

/// Signature shared by every decoder
pub type DecodeFn = fn(&[u8], WireFormat) -> Result<Value, BoxError>;

fn text(raw: &[u8]) -> Result<&str, BoxError> {
    Ok(std::str::from_utf8(raw)?)
}

fn binary<'a, T: FromSql<'a>>(ty: &Type, raw: &'a [u8]) -> Result<T, BoxError> {
    T::from_sql(ty, raw)
}

pub fn int2(raw: &[u8], format: WireFormat) -> Result<Value, BoxError> {
    Ok(Value::Int16(match format {
        WireFormat::Binary => binary(&Type::INT2, raw)?,
        WireFormat::Text => text(raw)?.parse()?,
    }))
}

pub fn int4(raw: &[u8], format: WireFormat) -> Result<Value, BoxError> {
    Ok(Value::Int32(match format {
        WireFormat::Binary => binary(&Type::INT4, raw)?,
        WireFormat::Text => text(raw)?.parse()?,
    }))
}

pub fn int8(raw: &[u8], format: WireFormat) -> Result<Value, BoxError> {
    Ok(Value::Int64(match format {
        WireFormat::Binary => binary(&Type::INT8, raw)?,
        WireFormat::Text => text(raw)?.parse()?,
    }))
}

pub fn float4(raw: &[u8], format: WireFormat) -> Result<Value, BoxError> {
    let v: f32 = match format {
        WireFormat::Binary => binary(&Type::FLOAT4, raw)?,
        WireFormat::Text => text(raw)?.parse()?,
    };
    Ok(Value::Float64(f64::from(v)))
}

pub fn float8(raw: &[u8], format: WireFormat) -> Result<Value, BoxError> {
    Ok(Value::Float64(match format {
        WireFormat::Binary => binary(&Type::FLOAT8, raw)?,
        WireFormat::Text => text(raw)?.parse()?,
    }))
}

pub fn numeric(raw: &[u8], format: WireFormat) -> Result<Value, BoxError> {
    Ok(Value::Float64(match format {
        WireFormat::Binary => decode_numeric(raw)?,
        WireFormat::Text => text(raw)?.parse()?,
    }))
}

pub fn boolean(raw: &[u8], format: WireFormat) -> Result<Value, BoxError> {
    Ok(Value::Bool(match format {
        WireFormat::Binary => binary(&Type::BOOL, raw)?,
        WireFormat::Text => match text(raw)? {
            "t" | "true" => true,
            "f" | "false" => false,
            other => return Err(format!("invalid boolean {:?}", other).into()),
        },
    }))
}

pub fn timestamp(raw: &[u8], format: WireFormat) -> Result<Value, BoxError> {
    let naive: NaiveDateTime = match format {
        WireFormat::Binary => binary(&Type::TIMESTAMP, raw)?,
        WireFormat::Text => NaiveDateTime::parse_from_str(text(raw)?, "%Y-%m-%d %H:%M:%S%.f")?,
    };
    Ok(Value::Time(naive.and_utc()))
}

pub fn timestamptz(raw: &[u8], format: WireFormat) -> Result<Value, BoxError> {
    Ok(Value::Time(match format {
        WireFormat::Binary => binary::<DateTime<Utc>>(&Type::TIMESTAMPTZ, raw)?,
        WireFormat::Text => {
            DateTime::parse_from_str(text(raw)?, "%Y-%m-%d %H:%M:%S%.f%#z")?.with_timezone(&Utc)
        }
    }))
}

pub fn date(raw: &[u8], format: WireFormat) -> Result<Value, BoxError> {
    let day: NaiveDate = match format {
        WireFormat::Binary => binary(&Type::DATE, raw)?,
        WireFormat::Text => NaiveDate::parse_from_str(text(raw)?, "%Y-%m-%d")?,
    };
    let midnight = day
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| format!("invalid date {}", day))?;
    Ok(Value::Time(midnight.and_utc()))
}

pub fn json(raw: &[u8], format: WireFormat) -> Result<Value, BoxError> {
    Ok(Value::Json(match format {
        WireFormat::Binary => binary(&Type::JSON, raw)?,
        WireFormat::Text => serde_json::from_slice(raw)?,
    }))
}

pub fn jsonb(raw: &[u8], format: WireFormat) -> Result<Value, BoxError> {
    Ok(Value::Json(match format {
        WireFormat::Binary => binary(&Type::JSONB, raw)?,
        WireFormat::Text => serde_json::from_slice(raw)?,
    }))
}

/// `time` stays text; only the binary form needs rendering
pub fn time_of_day(raw: &[u8], format: WireFormat) -> Result<Value, BoxError> {
    Ok(Value::String(match format {
        WireFormat::Binary => {
            let t: NaiveTime = binary(&Type::TIME, raw)?;
            t.format("%H:%M:%S%.f").to_string()
        }
        WireFormat::Text => text(raw)?.to_string(),
    }))
}

/// `timetz` binary: microseconds since midnight then the zone offset in
/// seconds west of UTC
pub fn time_of_day_tz(raw: &[u8], format: WireFormat) -> Result<Value, BoxError> {
    if format == WireFormat::Text {
        return Ok(Value::String(text(raw)?.to_string()));
    }

    let bytes: [u8; 12] = raw
        .try_into()
        .map_err(|_| format!("timetz needs 12 bytes, got {}", raw.len()))?;
    let micros = i64::from_be_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ]);
    let west = i32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);

    let secs = u32::try_from(micros / 1_000_000)?;
    let nanos = u32::try_from((micros % 1_000_000) * 1000)?;
    let t = NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
        .ok_or_else(|| format!("timetz out of range: {} microseconds", micros))?;

    let east = -west;
    let sign = if east < 0 { '-' } else { '+' };
    let (hours, minutes) = (east.abs() / 3600, (east.abs() % 3600) / 60);
    let offset = if minutes == 0 {
        format!("{}{:02}", sign, hours)
    } else {
        format!("{}{:02}:{:02}", sign, hours, minutes)
    };

    Ok(Value::String(format!("{}{}", t.format("%H:%M:%S%.f"), offset)))
}

/// `bytea` is surfaced as text
pub fn bytes(raw: &[u8], format: WireFormat) -> Result<Value, BoxError> {
    Ok(Value::String(match format {
        WireFormat::Binary => {
            let b: Vec<u8> = binary(&Type::BYTEA, raw)?;
            String::from_utf8_lossy(&b).into_owned()
        }
        WireFormat::Text => text(raw)?.to_string(),
    }))
}

/// Character types are UTF-8 in both formats
pub fn string(raw: &[u8], _format: WireFormat) -> Result<Value, BoxError> {
    Ok(Value::String(text(raw)?.to_string()))
}

/// Fallback for types without a decoder
pub fn lossy_string(raw: &[u8], _format: WireFormat) -> Result<Value, BoxError> {
    Ok(Value::String(String::from_utf8_lossy(raw).into_owned()))
}
