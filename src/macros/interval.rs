//! Interval parsing and rendering
//!
//! Accepts the duration strings users put in macro arguments (`'5m'`,
//! `1h30m`, `250ms`, `2d`, `1w`) and renders durations back in the forms
//! the query languages expect.

use chrono::{DateTime, Utc};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit0, digit1, one_of},
    combinator::{all_consuming, map, map_res, opt, recognize, value, verify},
    multi::many1,
    sequence::pair,
    IResult,
};
use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;
const DAY_SECS: u64 = 24 * 60 * 60;

/// Parse an interval string into a duration
///
/// Go-style durations (`300ms`, `1.5h`, `1h30m`, bare `0`) and single calendar
/// units (`Nd`, `Nw`, `NM` as 30 days, `Ny` as 365 days) are accepted.
pub fn parse_interval(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input == "0" {
        return Some(Duration::ZERO);
    }

    if let Ok((_, d)) = all_consuming(calendar_interval)(input) {
        return Some(d);
    }

    all_consuming(go_duration)(input).ok().map(|(_, d)| d)
}

/// `7d`, `2w`, `1M`, `1y`
fn calendar_interval(input: &str) -> IResult<&str, Duration> {
    let (input, count) = map_res(digit1, |s: &str| s.parse::<u64>())(input)?;
    let (input, unit_secs) = map(one_of("dwMy"), |c| match c {
        'd' => DAY_SECS,
        'w' => 7 * DAY_SECS,
        'M' => 30 * DAY_SECS,
        _ => 365 * DAY_SECS,
    })(input)?;

    Ok((input, Duration::from_secs(count.saturating_mul(unit_secs))))
}

/// Sequence of `<decimal><unit>` terms
fn go_duration(input: &str) -> IResult<&str, Duration> {
    let (input, terms) = many1(pair(decimal, unit_nanos))(input)?;
    let nanos: f64 = terms.iter().map(|(n, unit)| n * unit).sum();
    Ok((input, Duration::from_nanos(nanos.round() as u64)))
}

fn decimal(input: &str) -> IResult<&str, f64> {
    map_res(
        verify(
            recognize(pair(digit0, opt(pair(char('.'), digit0)))),
            |s: &str| s.chars().any(|c| c.is_ascii_digit()),
        ),
        |s: &str| s.parse::<f64>(),
    )(input)
}

fn unit_nanos(input: &str) -> IResult<&str, f64> {
    alt((
        value(1.0, tag("ns")),
        value(1e3, alt((tag("us"), tag("µs"), tag("μs")))),
        value(1e6, tag("ms")),
        value(1e9, tag("s")),
        value(60e9, tag("m")),
        value(3600e9, tag("h")),
    ))(input)
}

/// Coarse interval rendering used for `$__interval`
///
/// Picks the largest whole unit (year, day, hour, minute, second,
/// millisecond) and truncates; anything shorter than a millisecond is `1ms`.
pub fn format_interval(interval: Duration) -> String {
    let ms = interval.as_millis();
    let units: [(u128, &str); 6] = [
        (365 * DAY_SECS as u128 * 1000, "y"),
        (DAY_SECS as u128 * 1000, "d"),
        (3_600_000, "h"),
        (60_000, "m"),
        (1000, "s"),
        (1, "ms"),
    ];

    for (size, suffix) in units {
        if ms >= size {
            return format!("{}{}", ms / size, suffix);
        }
    }
    "1ms".to_string()
}

/// Render a duration the way Go prints `time.Duration` (`1h0m0s`, `1.5s`, `250ms`)
pub fn format_go_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }

    if nanos < NANOS_PER_SEC {
        return if nanos < 1_000 {
            format!("{}ns", nanos)
        } else if nanos < 1_000_000 {
            format!("{}µs", with_fraction(nanos / 1_000, nanos % 1_000, 3))
        } else {
            format!("{}ms", with_fraction(nanos / 1_000_000, nanos % 1_000_000, 6))
        };
    }

    let total_secs = nanos / NANOS_PER_SEC;
    let seconds = with_fraction(total_secs % 60, nanos % NANOS_PER_SEC, 9);
    let minutes = total_secs / 60;
    if minutes == 0 {
        return format!("{}s", seconds);
    }
    let hours = minutes / 60;
    if hours == 0 {
        return format!("{}m{}s", minutes, seconds);
    }
    format!("{}h{}m{}s", hours, minutes % 60, seconds)
}

fn with_fraction(whole: u128, frac: u128, digits: usize) -> String {
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0width$}", frac, width = digits);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// RFC 3339 with nanoseconds, trailing fractional zeros dropped, always UTC `Z`
pub fn rfc3339_nano(t: &DateTime<Utc>) -> String {
    let base = t.format("%Y-%m-%dT%H:%M:%S");
    let nanos = t.timestamp_subsec_nanos();
    if nanos == 0 {
        format!("{}Z", base)
    } else {
        format!("{}{}Z", base, &with_fraction(0, nanos as u128, 9)[1..])
    }
}

/// Nanoseconds since the Unix epoch
pub fn unix_nanos(t: &DateTime<Utc>) -> i128 {
    t.timestamp() as i128 * NANOS_PER_SEC as i128 + t.timestamp_subsec_nanos() as i128
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_go_durations() {
        assert_eq!(parse_interval("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_interval("1h30m"), Some(Duration::from_secs(5400)));
        assert_eq!(parse_interval("1.5h"), Some(Duration::from_secs(5400)));
        assert_eq!(parse_interval("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_interval("10us"), Some(Duration::from_micros(10)));
        assert_eq!(parse_interval("0"), Some(Duration::ZERO));
        assert_eq!(parse_interval(".5s"), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_parse_calendar_units() {
        assert_eq!(parse_interval("2d"), Some(Duration::from_secs(2 * DAY_SECS)));
        assert_eq!(parse_interval("1w"), Some(Duration::from_secs(7 * DAY_SECS)));
        assert_eq!(parse_interval("1M"), Some(Duration::from_secs(30 * DAY_SECS)));
        assert_eq!(parse_interval("1y"), Some(Duration::from_secs(365 * DAY_SECS)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_interval(""), None);
        assert_eq!(parse_interval("5"), None);
        assert_eq!(parse_interval("abc"), None);
        assert_eq!(parse_interval("5mx"), None);
        assert_eq!(parse_interval("."), None);
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(Duration::from_secs(300)), "5m");
        assert_eq!(format_interval(Duration::from_secs(90)), "1m");
        assert_eq!(format_interval(Duration::from_secs(2 * DAY_SECS)), "2d");
        assert_eq!(format_interval(Duration::from_secs(400 * DAY_SECS)), "1y");
        assert_eq!(format_interval(Duration::from_millis(20)), "20ms");
        assert_eq!(format_interval(Duration::from_micros(10)), "1ms");
    }

    #[test]
    fn test_format_go_duration() {
        assert_eq!(format_go_duration(Duration::ZERO), "0s");
        assert_eq!(format_go_duration(Duration::from_secs(60)), "1m0s");
        assert_eq!(format_go_duration(Duration::from_secs(3600)), "1h0m0s");
        assert_eq!(format_go_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_go_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_go_duration(Duration::from_micros(1500)), "1.5ms");
        assert_eq!(format_go_duration(Duration::from_nanos(10)), "10ns");
    }

    #[test]
    fn test_rfc3339_nano() {
        let t = Utc.with_ymd_and_hms(2018, 4, 12, 18, 0, 0).unwrap();
        assert_eq!(rfc3339_nano(&t), "2018-04-12T18:00:00Z");

        let t = t + chrono::Duration::milliseconds(500);
        assert_eq!(rfc3339_nano(&t), "2018-04-12T18:00:00.5Z");

        let t = Utc.timestamp_opt(1, 123_456_789).unwrap();
        assert_eq!(rfc3339_nano(&t), "1970-01-01T00:00:01.123456789Z");
    }

    #[test]
    fn test_unix_nanos() {
        let t = Utc.timestamp_opt(1_600_000_000, 5).unwrap();
        assert_eq!(unix_nanos(&t), 1_600_000_000_000_000_005);
    }
}
