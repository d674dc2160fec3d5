//! InfluxDB (Flux) datasource driver
//!
//! - **Macros**: `v.timeRangeStart`-style variable substitution
//! - **Client**: POSTs scripts to `/api/v2/query` and returns annotated CSV
//! - **Annotated**: annotated CSV to one frame per series
//! - **Handler**: the [`crate::query::QueryHandler`] tying them together

mod annotated;
mod client;
mod error;
mod handler;
mod macros;

pub use annotated::read_annotated_csv;
pub use client::{FluxRunner, InfluxClient};
pub use error::{FluxError, FluxResult};
pub use handler::FluxQueryHandler;
pub use macros::{interpolate_flux, FluxVariables};
