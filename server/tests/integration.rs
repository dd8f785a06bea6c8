//! Integration tests for the relay HTTP surface

mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use relay_server::config::ServerConfig;
use serde_json::json;
use tower::ServiceExt;

use common::*;

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = create_test_app(test_config(closed_port_addr().await), Arc::default());
    for uri in ["/health", "/healthz", "/api/health"] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, "ok");
    }
}

#[tokio::test]
async fn test_non_json_content_type_is_rejected() {
    let (app, metrics) = create_test_app(test_config(closed_port_addr().await), Arc::default());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/get_audio")
                .header("content-type", "text/plain")
                .body(Body::from("hello"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error, json!({ "error": "Request must be JSON" }));
    assert_eq!(metrics.snapshot().relay.bad_requests, 1);
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let (app, _) = create_test_app(test_config(closed_port_addr().await), Arc::default());
    let response = app
        .oneshot(post_json("/get_audio", "{\"prompt\": "))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "Request must be JSON");
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let synth = Arc::new(FakeSynth::default());
    let (app, metrics) = create_test_app(test_config(closed_port_addr().await), synth.clone());
    let response = app
        .oneshot(post_json("/get_audio", r#"{"prompt":"hi"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_ne!(
        response.headers().get("content-type").unwrap(),
        "audio/wav"
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(error["error"].as_str().unwrap().contains("Upstream unavailable"));
    assert!(synth.spoken().is_empty());
    assert_eq!(metrics.snapshot().relay.upstream_connect_failures, 1);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = create_test_app(test_config(closed_port_addr().await), Arc::default());
    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let metrics: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(metrics["relay"]["sentences_emitted"].is_number());
    assert!(metrics["first_audio_latency"]["p95_ms"].is_number());
    assert!(metrics["uptime_seconds"].is_number());
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let config = ServerConfig {
        max_body_bytes: 16,
        ..test_config(closed_port_addr().await)
    };
    let (app, _) = create_test_app(config, Arc::default());
    let payload = json!({ "prompt": "x".repeat(64) }).to_string();
    let response = app.oneshot(post_json("/get_audio", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_unknown_route_is_not_found_json() {
    let (app, _) = create_test_app(test_config(closed_port_addr().await), Arc::default());
    let response = app
        .oneshot(Request::builder().uri("/speak").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "No route for /speak");
}

#[tokio::test]
async fn test_rate_limit_refills_at_per_minute_rate() {
    let config = ServerConfig {
        rate_limit_per_minute: 120,
        ..test_config(closed_port_addr().await)
    };
    let (app, _) = create_test_app(config, Arc::default());
    let health = || Request::builder().uri("/health").body(Body::empty()).unwrap();

    for _ in 0..120 {
        let response = app.clone().oneshot(health()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app.clone().oneshot(health()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // 120 per minute refills one slot every 500 ms.
    tokio::time::sleep(std::time::Duration::from_millis(1200)).await;
    for _ in 0..2 {
        let response = app.clone().oneshot(health()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
