use std::sync::Arc;

use serde_json::{Value, json};

use super::*;
use crate::llm::CanvasInterpreter;
use crate::state::test_helpers::{MockInterpreter, TINY_PNG, spawn_server, test_app_state, test_app_state_with};

fn mock(m: MockInterpreter) -> Option<Arc<dyn CanvasInterpreter>> {
    Some(Arc::new(m))
}

async fn post_assist(addr: SocketAddr, image: &str) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://{addr}/api/v1/ai-assist"))
        .json(&json!({ "image_data": image }))
        .send()
        .await
        .unwrap()
}

// =============================================================================
// ai-assist
// =============================================================================

#[tokio::test]
async fn ai_assist_returns_interpretation() {
    let state = test_app_state_with(|_| {}, mock(MockInterpreter::answering("A smiley face.")));
    let addr = spawn_server(state).await;

    let resp = post_assist(addr, TINY_PNG).await;
    assert_eq!(resp.status(), 200);
    let body: AiAssistResponse = resp.json().await.unwrap();
    assert_eq!(
        body,
        AiAssistResponse { success: true, interpretation: Some("A smiley face.".into()), error: None }
    );
}

#[tokio::test]
async fn ai_assist_unconfigured_is_503() {
    let addr = spawn_server(test_app_state()).await;
    let resp = post_assist(addr, TINY_PNG).await;
    assert_eq!(resp.status(), 503);
    let body: AiAssistResponse = resp.json().await.unwrap();
    assert!(!body.success);
    assert!(body.interpretation.is_none());
    assert!(body.error.unwrap().contains("unavailable"));
}

#[tokio::test]
async fn ai_assist_bad_image_is_400() {
    let state = test_app_state_with(|_| {}, mock(MockInterpreter::answering("unused answer")));
    let addr = spawn_server(state).await;
    let resp = post_assist(addr, "data:text/plain;base64,aGVsbG8=").await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn ai_assist_upstream_failure_is_soft() {
    let state = test_app_state_with(|_| {}, mock(MockInterpreter::failing("provider said 401 for sk-123")));
    let addr = spawn_server(state).await;
    let resp = post_assist(addr, TINY_PNG).await;
    assert_eq!(resp.status(), 200);
    let body: AiAssistResponse = resp.json().await.unwrap();
    assert!(!body.success);
    assert_eq!(body.error.as_deref(), Some("AI interpretation failed. Please try again later."));
}

#[tokio::test]
async fn ai_assist_rate_limited_with_retry_after() {
    let state = test_app_state_with(|c| c.rate_limit_requests = 1, mock(MockInterpreter::answering("A tidy drawing.")));
    let addr = spawn_server(state).await;

    assert_eq!(post_assist(addr, TINY_PNG).await.status(), 200);
    let resp = post_assist(addr, TINY_PNG).await;
    assert_eq!(resp.status(), 429);
    let retry_after: u64 = resp.headers()[reqwest::header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));
}

#[tokio::test]
async fn ai_assist_limits_per_forwarded_client() {
    let state = test_app_state_with(|c| c.rate_limit_requests = 1, mock(MockInterpreter::answering("A tidy drawing.")));
    let addr = spawn_server(state).await;
    let client = reqwest::Client::new();
    let send = |ip: &'static str| {
        client
            .post(format!("http://{addr}/api/v1/ai-assist"))
            .header("x-forwarded-for", ip)
            .json(&json!({ "image_data": TINY_PNG }))
            .send()
    };

    assert_eq!(send("203.0.113.1").await.unwrap().status(), 200);
    assert_eq!(send("203.0.113.2").await.unwrap().status(), 200);
    assert_eq!(send("203.0.113.1").await.unwrap().status(), 429);
}

// =============================================================================
// health / info / stats
// =============================================================================

#[tokio::test]
async fn health_without_ai_is_healthy() {
    let addr = spawn_server(test_app_state()).await;
    let resp = reqwest::get(format!("http://{addr}/api/v1/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "FastBoard");
    assert_eq!(body["ai_service"], json!({"available": false, "healthy": false}));
    assert!(body["timestamp"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn health_degraded_when_ai_unreachable() {
    let state = test_app_state_with(|_| {}, mock(MockInterpreter::failing("down")));
    let addr = spawn_server(state).await;
    let resp = reqwest::get(format!("http://{addr}/api/v1/health")).await.unwrap();
    assert_eq!(resp.status(), 503);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["ai_service"], json!({"available": true, "healthy": false}));
}

#[tokio::test]
async fn info_reports_limits() {
    let addr = spawn_server(test_app_state()).await;
    let body: Value = reqwest::get(format!("http://{addr}/api/v1/info"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["name"], "FastBoard");
    assert_eq!(body["features"]["ai_assist"], false);
    assert_eq!(body["features"]["real_time_collaboration"], true);
    assert_eq!(body["limits"]["max_stroke_points"], 1000);
    assert_eq!(body["limits"]["max_brush_size"], 100);
    assert_eq!(body["limits"]["ai_rate_limit"], "100 requests per 60 seconds");
}

#[tokio::test]
async fn ws_stats_lists_connections() {
    let state = test_app_state();
    let addr = spawn_server(state.clone()).await;
    let _h = state.hub.on_connect("alice", Some("203.0.113.9".into())).unwrap();

    let body: Value = reqwest::get(format!("http://{addr}/ws/stats"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["total_connections"], 1);
    assert_eq!(body["connections"][0]["client_id"], "alice");
    assert_eq!(body["connections"][0]["ip_address"], "203.0.113.9");
    assert_eq!(body["log"]["entries"], 0);
}

#[tokio::test]
async fn healthz_ok() {
    let addr = spawn_server(test_app_state()).await;
    let resp = reqwest::get(format!("http://{addr}/healthz")).await.unwrap();
    assert_eq!(resp.status(), 200);
}
