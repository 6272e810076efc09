//! REST API over a finished run.
//!
//! Provides two GET endpoints:
//! - `/state`: run summary, tracking report and latest cycle
//! - `/cycles`: per-cycle records with optional range filtering

mod handlers;
mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use crate::error::SimResult;
use crate::sim::kpi::TrackingReport;
use crate::sim::pipeline::Pipeline;
use crate::sim::types::{CycleRecord, RunSummary};

pub use types::{CycleView, CyclesQuery, ErrorResponse, StateResponse};

/// Immutable application state shared across all request handlers.
///
/// Built once after the run completes and wrapped in `Arc`; all data is
/// read-only so no locks are needed.
#[derive(Debug)]
pub struct AppState {
    /// Configuration of the run.
    pub summary: RunSummary,
    /// Tracking performance over the whole run.
    pub report: TrackingReport,
    /// Per-cycle records.
    pub records: Vec<CycleRecord>,
}

impl AppState {
    /// Snapshots a pipeline's summary and records.
    pub fn from_pipeline(pipeline: &Pipeline) -> Self {
        let records = pipeline.records().to_vec();
        Self {
            summary: pipeline.summary(),
            report: TrackingReport::from_records(&records),
            records,
        }
    }
}

/// Builds the axum router with all API routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/state", get(handlers::get_state))
        .route("/cycles", get(handlers::get_cycles))
        .with_state(state)
}

/// Binds to `addr` and serves the API until the process stops.
///
/// # Errors
///
/// Returns [`crate::error::SimError::Io`] if the listener cannot bind or
/// the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> SimResult<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
