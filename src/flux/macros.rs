//! `v.<name>` variable substitution for Flux scripts

use once_cell::sync::Lazy;
use regex::Regex;

use crate::macros::interval::{format_go_duration, rfc3339_nano};
use crate::query::DataQuery;

static VARIABLE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-zA-Z]+)\.([a-zA-Z]+)").unwrap());

/// Bucket and organization injected into scripts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FluxVariables {
    pub organization: String,
    pub default_bucket: String,
}

/// Replace the known `<word>.<variable>` references in `script`
///
/// Unknown variables are left alone; interpolation never fails.
pub fn interpolate_flux(script: &str, query: &DataQuery, vars: &FluxVariables) -> String {
    let mut replacements: Vec<(String, String)> = Vec::new();

    for caps in VARIABLE_PATTERN.captures_iter(script) {
        let whole = caps[0].to_string();
        if replacements.iter().any(|(m, _)| *m == whole) {
            continue;
        }
        let value = match &caps[2] {
            "timeRangeStart" => rfc3339_nano(&query.time_range.from),
            "timeRangeStop" => rfc3339_nano(&query.time_range.to),
            "windowPeriod" => format_go_duration(query.interval()),
            "defaultBucket" => format!("\"{}\"", vars.default_bucket),
            "organization" => format!("\"{}\"", vars.organization),
            _ => continue,
        };
        replacements.push((whole, value));
    }

    let mut out = script.to_string();
    for (from, to) in replacements {
        out = out.replace(&from, &to);
    }
    out
}
