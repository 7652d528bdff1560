//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers), adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/catalog", get(http::http_get_catalog))
        .route("/api/v1/session", get(http::http_get_session))
        .route("/api/v1/answer", post(http::http_post_answer))
        .route("/api/v1/hint", post(http::http_post_hint))
        .route("/api/v1/advance", post(http::http_post_advance))
        .route("/api/v1/select", post(http::http_post_select))
        .route("/api/v1/reset", post(http::http_post_reset))
        .route("/api/v1/assist", post(http::http_post_assist))
        .route("/api/v1/report", get(http::http_get_report))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assist::{Coach, LocalCoach};
    use crate::catalog::Catalog;
    use crate::seeds::seed_problem_bank;
    use crate::session::SessionSettings;
    use crate::store::DocumentStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        let state = AppState::from_parts(
            Arc::new(Catalog::new(seed_problem_bank()).unwrap()),
            Arc::new(DocumentStore::in_memory()),
            Coach::Local(LocalCoach),
            SessionSettings::default(),
        );
        build_router(Arc::new(state))
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_req(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_the_local_coach() {
        let (status, body) = call(&app(), get_req("/api/v1/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true, "coach": "local" }));
    }

    #[tokio::test]
    async fn session_view_never_leaks_solutions() {
        let (status, body) = call(&app(), get_req("/api/v1/session?studentId=kid")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phase"], "active");
        assert_eq!(body["problem"]["id"], "1.1");
        assert!(body["problem"].get("solution").is_none());
    }

    #[tokio::test]
    async fn play_through_the_api() {
        let app = app();
        let (status, body) = call(&app, post_req("/api/v1/answer", json!({ "studentId": "kid", "values": { "star": 1, "circle": 1 } }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["correct"], false);

        let (_, body) = call(&app, post_req("/api/v1/hint", json!({ "studentId": "kid" }))).await;
        assert_eq!(body["result"]["kind"], "hint");
        assert_eq!(body["result"]["number"], 1);

        let (_, body) = call(&app, post_req("/api/v1/answer", json!({ "studentId": "kid", "values": { "star": "3", "circle": 5 } }))).await;
        assert_eq!(body["result"]["correct"], true);
        assert_eq!(body["result"]["award"]["stars"], 2);
        assert_eq!(body["session"]["progress"]["currentProblemId"], "1.2");

        let (status, _) = call(&app, post_req("/api/v1/reset", json!({ "studentId": "kid" }))).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = call(&app, get_req("/api/v1/session?studentId=kid")).await;
        assert_eq!(body["progress"]["history"], json!([]));
    }

    #[tokio::test]
    async fn errors_map_to_status_codes() {
        let app = app();
        let (status, body) = call(&app, post_req("/api/v1/select", json!({ "studentId": "kid", "blockId": 2, "levelId": 1, "problemId": "2.1" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("locked"));

        let (status, _) = call(&app, post_req("/api/v1/select", json!({ "studentId": "kid", "blockId": 1, "levelId": 1, "problemId": "zzz" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app, post_req("/api/v1/advance", json!({ "studentId": "kid" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = call(&app, post_req("/api/v1/hint", json!({ "studentId": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let bad = Request::builder()
            .method("POST")
            .uri("/api/v1/answer")
            .header("content-type", "application/json")
            .body(Body::from("{ not json"))
            .unwrap();
        let (status, _) = call(&app, bad).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn assist_and_report_work_offline() {
        let app = app();
        for _ in 0..3 {
            call(&app, post_req("/api/v1/answer", json!({ "studentId": "kid", "values": { "star": 1, "circle": 9 } }))).await;
        }
        let (status, body) = call(&app, post_req("/api/v1/assist", json!({ "studentId": "kid" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pattern"], "single_variable_fixation");
        assert!(!body["advice"].as_str().unwrap().is_empty());

        let (status, body) = call(&app, get_req("/api/v1/report?studentId=kid&studentName=Ana")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["metrics"]["studentName"], "Ana");
        assert!(body["report"].as_str().unwrap().starts_with("Ana"));
    }

    #[tokio::test]
    async fn catalog_outline_is_served() {
        let (status, body) = call(&app(), get_req("/api/v1/catalog")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["blocks"][0]["checkpoint"], "CP1");
        assert_eq!(body["blocks"][0]["levels"][0]["problems"], json!(["1.1", "1.2"]));
    }
}
