//! Global variable pass and the interpolation strategy
//!
//! `$__interval_ms`, `$__interval`, `$__unixEpochFrom()` and
//! `$__unixEpochTo()` are plain string replacements applied before macro
//! evaluation, so macros can use the substituted interval text.
//!
//! [`Interpolator`] is the strategy a query handler is built with. The
//! default runs the global pass and then a [`MacroEngine`]; [`Verbatim`]
//! leaves the text untouched.

use std::sync::Arc;
use std::time::Duration;

use super::engine::MacroEngine;
use super::error::MacroResult;
use super::interval::format_interval;
use crate::query::{DataQuery, QueryModel, TimeRange};

/// Replace the global variables in `sql`
pub fn apply_global_variables(sql: &str, time_range: &TimeRange, interval: Duration) -> String {
    sql.replace("$__interval_ms", &interval.as_millis().to_string())
        .replace("$__interval", &format_interval(interval))
        .replace("$__unixEpochFrom()", &time_range.from.timestamp().to_string())
        .replace("$__unixEpochTo()", &time_range.to.timestamp().to_string())
}

/// Turns a query's raw text into the text sent to the backend
pub trait Interpolator: Send + Sync {
    fn interpolate(&self, query: &DataQuery, model: &mut QueryModel) -> MacroResult<String>;
}

/// Global pass followed by macro evaluation
#[derive(Clone)]
pub struct MacroInterpolator {
    engine: Arc<dyn MacroEngine>,
}

impl MacroInterpolator {
    pub fn new(engine: Arc<dyn MacroEngine>) -> Self {
        Self { engine }
    }
}

impl Interpolator for MacroInterpolator {
    fn interpolate(&self, query: &DataQuery, model: &mut QueryModel) -> MacroResult<String> {
        let sql = apply_global_variables(&model.raw_query, &query.time_range, query.interval());
        self.engine.interpolate(model, &query.time_range, &sql)
    }
}

/// Returns the raw query unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Verbatim;

impl Interpolator for Verbatim {
    fn interpolate(&self, _query: &DataQuery, model: &mut QueryModel) -> MacroResult<String> {
        Ok(model.raw_query.clone())
    }
}
