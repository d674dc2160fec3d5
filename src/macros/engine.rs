//! SQL macro evaluation
//!
//! Each `$__name(args)` token found by the scanner is evaluated against the
//! query's time range and replaced with dialect-specific SQL. Evaluation is
//! a pure function of its inputs apart from the fill side effect, which
//! only touches the [`QueryModel`] passed in for that call.

use std::sync::Arc;
use std::time::Duration;

use super::error::{MacroError, MacroResult};
use super::interval::{parse_interval, rfc3339_nano, unix_nanos};
use super::scanner::{MacroScanner, RegexScanner};
use crate::frame::FillMissing;
use crate::query::{FillOptions, QueryModel, TimeRange};

/// Text substituted for a macro that failed to evaluate
pub const MACRO_ERROR_SENTINEL: &str = "macro_error()";

const TIME_ALIAS: &str = " AS \"time\"";

/// Rewrites macro tokens in query text
pub trait MacroEngine: Send + Sync {
    /// Replace every macro in `sql`; any failure fails the whole call
    fn interpolate(
        &self,
        model: &mut QueryModel,
        time_range: &TimeRange,
        sql: &str,
    ) -> MacroResult<String>;
}

/// SQL flavour for `$__timeGroup`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqlDialect {
    /// Epoch arithmetic
    #[default]
    Postgres,
    /// `time_bucket()`
    TimescaleDb,
}

/// Macro engine for PostgreSQL and TimescaleDB
#[derive(Clone)]
pub struct SqlMacroEngine {
    dialect: SqlDialect,
    scanner: Arc<dyn MacroScanner>,
}

impl std::fmt::Debug for SqlMacroEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlMacroEngine")
            .field("dialect", &self.dialect)
            .finish()
    }
}

impl SqlMacroEngine {
    pub fn new(dialect: SqlDialect) -> Self {
        Self::with_scanner(dialect, Arc::new(RegexScanner))
    }

    pub fn with_scanner(dialect: SqlDialect, scanner: Arc<dyn MacroScanner>) -> Self {
        Self { dialect, scanner }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// Evaluate a single macro
    pub fn evaluate(
        &self,
        model: &mut QueryModel,
        time_range: &TimeRange,
        name: &str,
        args: &[String],
    ) -> MacroResult<String> {
        match name {
            "__time" => Ok(format!("{} AS \"time\"", column(name, args)?)),
            "__timeEpoch" => Ok(format!(
                "extract(epoch from {}) as \"time\"",
                column(name, args)?
            )),
            "__timeFilter" => Ok(format!(
                "{} BETWEEN '{}' AND '{}'",
                column(name, args)?,
                rfc3339_nano(&time_range.from),
                rfc3339_nano(&time_range.to)
            )),
            "__timeFrom" => Ok(format!("'{}'", rfc3339_nano(&time_range.from))),
            "__timeTo" => Ok(format!("'{}'", rfc3339_nano(&time_range.to))),
            "__timeGroup" => {
                let interval = group_interval(model, name, args)?;
                let secs = interval.as_secs_f64();
                Ok(match self.dialect {
                    SqlDialect::TimescaleDb => format!("time_bucket('{:.3}s',{})", secs, args[0]),
                    SqlDialect::Postgres => format!(
                        "floor(extract(epoch from {})/{})*{}",
                        args[0], secs, secs
                    ),
                })
            }
            "__timeGroupAlias" => {
                let group = self.evaluate(model, time_range, "__timeGroup", args)?;
                Ok(group + TIME_ALIAS)
            }
            "__unixEpochFilter" => {
                let col = column(name, args)?;
                Ok(format!(
                    "{} >= {} AND {} <= {}",
                    col,
                    time_range.from.timestamp(),
                    col,
                    time_range.to.timestamp()
                ))
            }
            "__unixEpochNanoFilter" => {
                let col = column(name, args)?;
                Ok(format!(
                    "{} >= {} AND {} <= {}",
                    col,
                    unix_nanos(&time_range.from),
                    col,
                    unix_nanos(&time_range.to)
                ))
            }
            "__unixEpochNanoFrom" => Ok(unix_nanos(&time_range.from).to_string()),
            "__unixEpochNanoTo" => Ok(unix_nanos(&time_range.to).to_string()),
            "__unixEpochGroup" => {
                let interval = group_interval(model, name, args)?;
                let secs = interval.as_secs_f64();
                Ok(format!("floor(({})/{})*{}", args[0], secs, secs))
            }
            "__unixEpochGroupAlias" => {
                let group = self.evaluate(model, time_range, "__unixEpochGroup", args)?;
                Ok(group + TIME_ALIAS)
            }
            _ => Err(MacroError::Unknown(name.to_string())),
        }
    }
}

impl MacroEngine for SqlMacroEngine {
    fn interpolate(
        &self,
        model: &mut QueryModel,
        time_range: &TimeRange,
        sql: &str,
    ) -> MacroResult<String> {
        let mut out = String::with_capacity(sql.len());
        let mut first_error = None;
        let mut last = 0;

        for token in self.scanner.scan(sql) {
            out.push_str(&sql[last..token.span.start]);
            match self.evaluate(model, time_range, &token.name, &token.args) {
                Ok(text) => out.push_str(&text),
                Err(e) => {
                    out.push_str(MACRO_ERROR_SENTINEL);
                    first_error.get_or_insert(e);
                }
            }
            last = token.span.end;
        }
        out.push_str(&sql[last..]);

        match first_error {
            Some(e) => Err(e),
            None => Ok(out),
        }
    }
}

/// First argument as a column name
fn column<'a>(name: &str, args: &'a [String]) -> MacroResult<&'a str> {
    match args.first() {
        Some(col) if !col.is_empty() => Ok(col),
        _ => Err(MacroError::MissingColumn(name.to_string())),
    }
}

/// Interval of a group macro, applying the optional fill argument to `model`
fn group_interval(model: &mut QueryModel, name: &str, args: &[String]) -> MacroResult<Duration> {
    if args.len() < 2 {
        return Err(MacroError::MissingInterval(name.to_string()));
    }

    let interval = parse_interval(args[1].trim_matches('\''))
        .ok_or_else(|| MacroError::Interval(args[1].clone()))?;

    if let Some(fill) = args.get(2) {
        model.fill = Some(FillOptions {
            missing: parse_fill(fill)?,
            interval,
        });
    }

    Ok(interval)
}

fn parse_fill(arg: &str) -> MacroResult<FillMissing> {
    match arg {
        "NULL" => Ok(FillMissing::null()),
        "previous" => Ok(FillMissing::previous()),
        other => other
            .parse::<f64>()
            .map(FillMissing::value)
            .map_err(|_| MacroError::FillValue(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FillMode;
    use crate::query::Format;
    use chrono::{TimeZone, Utc};

    fn model() -> QueryModel {
        QueryModel {
            raw_query: String::new(),
            format: Format::TimeSeries,
            fill: None,
        }
    }

    fn range() -> TimeRange {
        TimeRange::new(
            Utc.with_ymd_and_hms(2018, 4, 12, 18, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2018, 4, 12, 18, 5, 0).unwrap(),
        )
    }

    fn run(engine: &SqlMacroEngine, sql: &str) -> MacroResult<String> {
        engine.interpolate(&mut model(), &range(), sql)
    }

    #[test]
    fn test_time_macros() {
        let engine = SqlMacroEngine::new(SqlDialect::Postgres);
        assert_eq!(
            run(&engine, "select $__time(time_column)").unwrap(),
            "select time_column AS \"time\""
        );
        assert_eq!(
            run(&engine, "select $__timeEpoch(time)").unwrap(),
            "select extract(epoch from time) as \"time\""
        );
        assert_eq!(
            run(&engine, "WHERE $__timeFilter(time_column)").unwrap(),
            "WHERE time_column BETWEEN '2018-04-12T18:00:00Z' AND '2018-04-12T18:05:00Z'"
        );
        assert_eq!(
            run(&engine, "select $__timeFrom(), $__timeTo()").unwrap(),
            "select '2018-04-12T18:00:00Z', '2018-04-12T18:05:00Z'"
        );
    }

    #[test]
    fn test_missing_column() {
        let engine = SqlMacroEngine::new(SqlDialect::Postgres);
        for name in ["__time", "__timeEpoch", "__timeFilter", "__unixEpochFilter"] {
            let err = run(&engine, &format!("select ${}()", name)).unwrap_err();
            assert_eq!(err, MacroError::MissingColumn(name.to_string()));
            assert!(err.to_string().contains(name));
        }
    }

    #[test]
    fn test_time_group_dialects() {
        let postgres = SqlMacroEngine::new(SqlDialect::Postgres);
        assert_eq!(
            run(&postgres, "SELECT $__timeGroup(time_column,'5m')").unwrap(),
            "SELECT floor(extract(epoch from time_column)/300)*300"
        );

        let timescale = SqlMacroEngine::new(SqlDialect::TimescaleDb);
        assert_eq!(
            run(&timescale, "SELECT $__timeGroup(time_column,'5m')").unwrap(),
            "SELECT time_bucket('300.000s',time_column)"
        );
    }

    #[test]
    fn test_time_group_fractional_interval() {
        let engine = SqlMacroEngine::new(SqlDialect::Postgres);
        assert_eq!(
            run(&engine, "$__timeGroup(t,'500ms')").unwrap(),
            "floor(extract(epoch from t)/0.5)*0.5"
        );
    }

    #[test]
    fn test_time_group_alias_by_comma() {
        let engine = SqlMacroEngine::new(SqlDialect::Postgres);
        let implicit = run(&engine, "SELECT $__timeGroup(time_column,'5m'), value").unwrap();
        let explicit = run(&engine, "SELECT $__timeGroupAlias(time_column,'5m') value").unwrap();

        assert_eq!(
            implicit,
            "SELECT floor(extract(epoch from time_column)/300)*300 AS \"time\", value"
        );
        assert_eq!(implicit.matches(" AS \"time\"").count(), 1);
        assert_eq!(
            explicit,
            "SELECT floor(extract(epoch from time_column)/300)*300 AS \"time\" value"
        );

        let ordered = run(&engine, "ORDER BY $__timeGroup(time_column,'5m')").unwrap();
        assert!(!ordered.contains("AS \"time\""));
    }

    #[test]
    fn test_time_group_before_closing_paren_has_no_alias() {
        let engine = SqlMacroEngine::new(SqlDialect::Postgres);
        let nested = run(
            &engine,
            "SELECT max(v) FROM (SELECT $__timeGroup(time_column,'5m')) AS s",
        )
        .unwrap();
        assert_eq!(
            nested,
            "SELECT max(v) FROM (SELECT floor(extract(epoch from time_column)/300)*300) AS s"
        );
    }

    #[test]
    fn test_time_group_errors() {
        let engine = SqlMacroEngine::new(SqlDialect::Postgres);
        assert_eq!(
            run(&engine, "$__timeGroup(time)").unwrap_err(),
            MacroError::MissingInterval("__timeGroup".into())
        );
        assert_eq!(
            run(&engine, "$__timeGroup(time,'5x')").unwrap_err(),
            MacroError::Interval("'5x'".into())
        );
        assert_eq!(
            run(&engine, "$__timeGroup(time,'5m', nope)").unwrap_err(),
            MacroError::FillValue("nope".into())
        );
    }

    #[test]
    fn test_fill_side_effect() {
        let engine = SqlMacroEngine::new(SqlDialect::Postgres);

        let mut m = model();
        engine
            .interpolate(&mut m, &range(), "$__timeGroup(time,'5m', NULL)")
            .unwrap();
        let fill = m.fill.unwrap();
        assert_eq!(fill.missing.mode, FillMode::Null);
        assert_eq!(fill.interval, Duration::from_secs(300));

        let mut m = model();
        engine
            .interpolate(&mut m, &range(), "$__timeGroupAlias(time,'1h', previous)")
            .unwrap();
        assert_eq!(m.fill.unwrap().missing.mode, FillMode::Previous);

        let mut m = model();
        engine
            .interpolate(&mut m, &range(), "$__unixEpochGroup(time,'1m', 1.5)")
            .unwrap();
        let fill = m.fill.unwrap();
        assert_eq!(fill.missing, FillMissing::value(1.5));
        assert_eq!(fill.interval, Duration::from_secs(60));

        let mut m = model();
        engine.interpolate(&mut m, &range(), "$__timeGroup(time,'1m')").unwrap();
        assert!(m.fill.is_none());
    }

    #[test]
    fn test_unix_epoch_macros() {
        let engine = SqlMacroEngine::new(SqlDialect::Postgres);
        assert_eq!(
            run(&engine, "WHERE $__unixEpochFilter(time)").unwrap(),
            "WHERE time >= 1523556000 AND time <= 1523556300"
        );
        assert_eq!(
            run(&engine, "WHERE $__unixEpochNanoFilter(time)").unwrap(),
            "WHERE time >= 1523556000000000000 AND time <= 1523556300000000000"
        );
        assert_eq!(
            run(&engine, "$__unixEpochNanoFrom() $__unixEpochNanoTo()").unwrap(),
            "1523556000000000000 1523556300000000000"
        );
    }

    #[test]
    fn test_unix_epoch_group_alias_agrees() {
        let engine = SqlMacroEngine::new(SqlDialect::Postgres);
        let group = run(&engine, "$__unixEpochGroup(time_column,'5m')").unwrap();
        let alias = run(&engine, "$__unixEpochGroupAlias(time_column,'5m')").unwrap();

        assert_eq!(group, "floor((time_column)/300)*300");
        assert_eq!(alias, format!("{} AS \"time\"", group));
    }

    #[test]
    fn test_unknown_macro_replaced_and_reported() {
        let engine = SqlMacroEngine::new(SqlDialect::Postgres);
        let err = run(&engine, "select $__nope(a), $__time()").unwrap_err();
        assert_eq!(err, MacroError::Unknown("__nope".into()));
    }

    #[test]
    fn test_sub_millisecond_round_trip() {
        let engine = SqlMacroEngine::new(SqlDialect::Postgres);
        let from = Utc.with_ymd_and_hms(2018, 4, 12, 7, 0, 0).unwrap()
            + chrono::Duration::milliseconds(500);
        let to = from + chrono::Duration::nanoseconds(123_456_789);
        let range = TimeRange::new(from, to);

        let out = engine
            .interpolate(&mut model(), &range, "$__timeFrom()|$__timeTo()")
            .unwrap();
        assert_eq!(out, "'2018-04-12T07:00:00.5Z'|'2018-04-12T07:00:00.623456789Z'");

        let parsed: Vec<chrono::DateTime<Utc>> = out
            .split('|')
            .map(|s| s.trim_matches('\'').parse().unwrap())
            .collect();
        assert_eq!(parsed, vec![from, to]);
    }

    #[test]
    fn test_concurrent_interpolation() {
        let engine = Arc::new(SqlMacroEngine::new(SqlDialect::Postgres));
        let intervals = ["1s", "5s", "1m", "5m", "10m", "1h", "6h", "1d"];

        let expected: Vec<String> = intervals
            .iter()
            .map(|i| run(&engine, &format!("$__timeGroup(t,'{}', 0)", i)).unwrap())
            .collect();

        let handles: Vec<_> = intervals
            .iter()
            .map(|i| {
                let engine = Arc::clone(&engine);
                let sql = format!("$__timeGroup(t,'{}', 0)", i);
                std::thread::spawn(move || {
                    let mut m = model();
                    let out = (0..100)
                        .map(|_| engine.interpolate(&mut m, &range(), &sql).unwrap())
                        .last()
                        .unwrap();
                    (out, m.fill.unwrap().interval)
                })
            })
            .collect();

        for ((handle, want), interval) in handles.into_iter().zip(expected).zip(intervals) {
            let (got, fill_interval) = handle.join().unwrap();
            assert_eq!(got, want);
            assert_eq!(Some(fill_interval), parse_interval(interval));
        }
    }
}
