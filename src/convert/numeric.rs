//! Binary `numeric` decoding
//!
//! Layout: `ndigits: i16`, `weight: i16`, `sign: u16`, `dscale: u16`, then
//! `ndigits` base-10000 digits as `i16`. `weight` is the power of 10000 of
//! the first digit.

use super::error::BoxError;

const SIGN_POSITIVE: u16 = 0x0000;
const SIGN_NEGATIVE: u16 = 0x4000;
const SIGN_NAN: u16 = 0xC000;
const SIGN_POS_INF: u16 = 0xD000;
const SIGN_NEG_INF: u16 = 0xF000;

/// Decode a binary `numeric` into the nearest `f64`
pub fn decode_numeric(raw: &[u8]) -> Result<f64, BoxError> {
    if raw.len() < 8 {
        return Err(format!("numeric header needs 8 bytes, got {}", raw.len()).into());
    }

    let read_u16 = |at: usize| u16::from_be_bytes([raw[at], raw[at + 1]]);
    let ndigits = read_u16(0) as i16;
    let weight = read_u16(2) as i16;
    let sign = read_u16(4);

    match sign {
        SIGN_NAN => return Ok(f64::NAN),
        SIGN_POS_INF => return Ok(f64::INFINITY),
        SIGN_NEG_INF => return Ok(f64::NEG_INFINITY),
        SIGN_POSITIVE | SIGN_NEGATIVE => {}
        other => return Err(format!("invalid numeric sign 0x{:04x}", other).into()),
    }

    if ndigits < 0 {
        return Err(format!("invalid numeric digit count {}", ndigits).into());
    }
    let ndigits = ndigits as usize;
    if raw.len() != 8 + ndigits * 2 {
        return Err(format!(
            "numeric with {} digits needs {} bytes, got {}",
            ndigits,
            8 + ndigits * 2,
            raw.len()
        )
        .into());
    }
    if ndigits == 0 {
        return Ok(0.0);
    }

    let digits: Vec<u16> = (0..ndigits).map(|i| read_u16(8 + i * 2)).collect();
    if let Some(bad) = digits.iter().find(|d| **d >= 10_000) {
        return Err(format!("invalid numeric digit {}", bad).into());
    }

    let text = digits_to_decimal(&digits, weight as i32, sign == SIGN_NEGATIVE);
    text.parse::<f64>()
        .map_err(|e| format!("numeric {} is not a float: {}", text, e).into())
}

fn digits_to_decimal(digits: &[u16], weight: i32, negative: bool) -> String {
    let mut out = String::with_capacity(digits.len() * 4 + 8);
    if negative {
        out.push('-');
    }

    let integer_groups = weight + 1;
    if integer_groups <= 0 {
        out.push_str("0.");
        for _ in 0..(-integer_groups) {
            out.push_str("0000");
        }
        for d in digits {
            out.push_str(&format!("{:04}", d));
        }
        return out;
    }

    for i in 0..integer_groups as usize {
        let d = digits.get(i).copied().unwrap_or(0);
        if i == 0 {
            out.push_str(&d.to_string());
        } else {
            out.push_str(&format!("{:04}", d));
        }
    }

    let fraction = digits.get(integer_groups as usize..).unwrap_or(&[]);
    if !fraction.is_empty() {
        out.push('.');
        for d in fraction {
            out.push_str(&format!("{:04}", d));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(digits: &[u16], weight: i16, sign: u16, dscale: u16) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&(digits.len() as u16).to_be_bytes());
        raw.extend_from_slice(&weight.to_be_bytes());
        raw.extend_from_slice(&sign.to_be_bytes());
        raw.extend_from_slice(&dscale.to_be_bytes());
        for d in digits {
            raw.extend_from_slice(&d.to_be_bytes());
        }
        raw
    }

    #[test]
    fn test_integer() {
        // 12345678 = 1234 * 10000 + 5678
        assert_eq!(decode_numeric(&encode(&[1234, 5678], 1, SIGN_POSITIVE, 0)).unwrap(), 12345678.0);
        // 20000 = 2 * 10000, trailing zero group omitted
        assert_eq!(decode_numeric(&encode(&[2], 1, SIGN_POSITIVE, 0)).unwrap(), 20000.0);
    }

    #[test]
    fn test_fraction_and_sign() {
        // -1.5 = 1 . 5000
        assert_eq!(decode_numeric(&encode(&[1, 5000], 0, SIGN_NEGATIVE, 1)).unwrap(), -1.5);
        // 0.00012 = 0 . 0001 2000
        assert_eq!(decode_numeric(&encode(&[1, 2000], -1, SIGN_POSITIVE, 5)).unwrap(), 0.00012);
        // 0.000000005 = 0 . 0000 0000 5000
        assert_eq!(decode_numeric(&encode(&[5000], -3, SIGN_POSITIVE, 9)).unwrap(), 0.000000005);
    }

    #[test]
    fn test_special_values() {
        assert_eq!(decode_numeric(&encode(&[], 0, SIGN_POSITIVE, 0)).unwrap(), 0.0);
        assert!(decode_numeric(&encode(&[], 0, SIGN_NAN, 0)).unwrap().is_nan());
        assert_eq!(decode_numeric(&encode(&[], 0, SIGN_POS_INF, 0)).unwrap(), f64::INFINITY);
    }

    #[test]
    fn test_malformed() {
        assert!(decode_numeric(&[0, 1]).is_err());
        assert!(decode_numeric(&encode(&[10_000], 0, SIGN_POSITIVE, 0)).is_err());
        let mut truncated = encode(&[1, 2], 0, SIGN_POSITIVE, 0);
        truncated.pop();
        assert!(decode_numeric(&truncated).is_err());
    }
}
