//! Macro interpolation
//!
//! Rewrites query templates into the text sent to the database:
//!
//! - **Scanner**: finds `$name(args)` tokens
//! - **Engine**: evaluates each token for a dialect and time range
//! - **Global pass**: `$__interval`-style variables, applied first
//! - **Interval**: duration parsing and rendering shared with the Flux path
//!
//! # Example
//!
//! ```rust,ignore
//! use pgflux::macros::{MacroEngine, SqlDialect, SqlMacroEngine};
//!
//! let engine = SqlMacroEngine::new(SqlDialect::Postgres);
//! let sql = engine.interpolate(&mut model, &time_range, "SELECT $__timeGroup(ts,'5m')")?;
//! // SELECT floor(extract(epoch from ts)/300)*300
//! ```

mod engine;
mod error;
mod global;
pub mod interval;
mod scanner;

pub use engine::{MacroEngine, SqlDialect, SqlMacroEngine, MACRO_ERROR_SENTINEL};
pub use error::{MacroError, MacroResult};
pub use global::{apply_global_variables, Interpolator, MacroInterpolator, Verbatim};
pub use scanner::{MacroScanner, MacroToken, RegexScanner};
