#![cfg(feature = "api")]
//! REST API served over a completed preset run.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::util::ServiceExt;

use pv_sim::api::{AppState, router};
use pv_sim::config::ScenarioConfig;
use pv_sim::sim::pipeline::Pipeline;

fn state(max_cycles: usize) -> Arc<AppState> {
    let mut cfg = ScenarioConfig::baseline();
    cfg.simulation.max_cycles = max_cycles;
    let mut pipeline = Pipeline::from_config(&cfg).unwrap();
    pipeline.run().unwrap();
    Arc::new(AppState::from_pipeline(&pipeline))
}

async fn get_json(uri: &str, state: Arc<AppState>) -> (StatusCode, serde_json::Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn state_reports_summary_and_tracking() {
    let (status, json) = get_json("/state", state(50)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["summary"]["global"], "default");
    assert_eq!(json["summary"]["local"], "pando");
    assert_eq!(json["summary"]["cycles_run"], 51);
    assert_eq!(json["report"]["cycles"], 51);
    assert_eq!(json["latest_cycle"]["cycle"], 50);
}

#[tokio::test]
async fn cycles_are_inclusive_ranges() {
    let (status, json) = get_json("/cycles?from=10&to=19", state(50)).await;
    assert_eq!(status, StatusCode::OK);
    let cycles = json.as_array().unwrap();
    assert_eq!(cycles.len(), 10);
    assert_eq!(cycles[0]["cycle"], 10);
    assert_eq!(cycles[9]["cycle"], 19);
}

#[tokio::test]
async fn open_ended_range_runs_to_the_end() {
    let (_, json) = get_json("/cycles?from=45", state(50)).await;
    assert_eq!(json.as_array().map(Vec::len), Some(6));
}

#[tokio::test]
async fn reversed_range_is_a_bad_request() {
    let (status, json) = get_json("/cycles?from=9&to=3", state(10)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().is_some_and(|e| e.contains("must be <=")));
}
