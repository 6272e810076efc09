//! Photovoltaic power chain simulator with pluggable MPPT algorithms.

/// REST API over a finished run.
#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod converter;
pub mod environment;
pub mod error;
pub mod io;
pub mod logging;
/// Maximum power point tracking: stride strategies, local and global algorithms.
pub mod mppt;
/// Cycle clock, pipeline, records and tracking report.
pub mod sim;
pub mod source;
