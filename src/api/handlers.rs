//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::AppState;
use super::types::{CycleView, CyclesQuery, ErrorResponse, StateResponse};

/// `GET /state` → 200 + `StateResponse` JSON
pub async fn get_state(State(state): State<Arc<AppState>>) -> Json<StateResponse> {
    Json(StateResponse {
        summary: state.summary.clone(),
        report: state.report.clone(),
        latest_cycle: state.records.last().map(CycleView::from),
    })
}

/// Returns cycle records, optionally filtered by cycle range.
///
/// `GET /cycles` → 200 + `Vec<CycleView>` JSON
/// `GET /cycles?from=N&to=M` → filtered range (inclusive)
/// `GET /cycles?from=10&to=5` → 400 + `ErrorResponse`
pub async fn get_cycles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CyclesQuery>,
) -> impl IntoResponse {
    let from = query.from.unwrap_or(0);
    let to = query.to.unwrap_or(usize::MAX);

    if from > to {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("`from` ({from}) must be <= `to` ({to})"),
            }),
        ));
    }

    let cycles: Vec<CycleView> = state
        .records
        .iter()
        .filter(|r| r.cycle >= from && r.cycle <= to)
        .map(CycleView::from)
        .collect();

    Ok(Json(cycles))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    use super::*;
    use crate::api::router;
    use crate::environment::EnvironmentSpec;
    use crate::mppt::MpptKinds;
    use crate::sim::pipeline::{Pipeline, PipelineSetup};
    use crate::source::CellModelKind;

    fn make_test_state() -> Arc<AppState> {
        let setup = PipelineSetup::new(
            CellModelKind::Ideal,
            EnvironmentSpec::Step {
                irradiance: 1000.0,
                temperature: 25.0,
            },
            23,
            MpptKinds::default(),
        );
        let mut pipeline = Pipeline::new(setup).unwrap();
        pipeline.run().unwrap();
        Arc::new(AppState::from_pipeline(&pipeline))
    }

    #[tokio::test]
    async fn state_returns_200() {
        let app = router(make_test_state());

        let req = Request::builder().uri("/state").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json.get("summary").is_some());
        assert!(json.get("report").is_some());
        assert_eq!(json["latest_cycle"]["cycle"], 23);
    }

    #[tokio::test]
    async fn cycles_returns_all() {
        let app = router(make_test_state());

        let req = Request::builder().uri("/cycles").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(json.len(), 24);
    }

    #[tokio::test]
    async fn cycles_range_query() {
        let app = router(make_test_state());

        let req = Request::builder()
            .uri("/cycles?from=5&to=10")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(json.len(), 6);
        assert_eq!(json[0]["cycle"], 5);
        assert_eq!(json[5]["cycle"], 10);
    }

    #[tokio::test]
    async fn cycles_invalid_range_returns_400() {
        let app = router(make_test_state());

        let req = Request::builder()
            .uri("/cycles?from=10&to=5")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json.get("error").is_some());
    }
}
