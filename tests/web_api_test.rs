//! HTTP surface driven through `tower::ServiceExt::oneshot`

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{build_engine_with, scored_collectors, test_config, MockCollector, SIX_SCORES};
use sitescore_core::persistence::{InMemoryPersistenceSink, PersistenceSink};
use sitescore_core::web::{create_app, AppState};

fn app_with(collectors: &[Arc<MockCollector>], sink: Option<Arc<dyn PersistenceSink>>) -> Router {
    let config = test_config();
    let engine = build_engine_with(&config, collectors, None, sink);
    create_app(AppState::new(&config, engine.orchestrator))
}

fn app() -> Router {
    app_with(&scored_collectors(&SIX_SCORES), None)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_analyze_returns_composite_score() {
    let app = app();

    let (status, body) = send(
        &app,
        post_json("/analyze", json!({"location": "Austin, TX", "radius": 2.0})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["overall_score"], json!(76.67));
    assert_eq!(body["location"], json!("Austin, TX"));
    assert_eq!(body["cached"], json!(false));
    assert_eq!(body["partial"], json!(false));
    assert_eq!(body["collectors"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn test_analyze_uses_default_radius() {
    let app = app();

    let (status, body) = send(&app, post_json("/analyze", json!({"location": "Denver, CO"}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["radius"], json!(2.0));
}

#[tokio::test]
async fn test_invalid_radius_is_bad_request() {
    let app = app();

    let (status, body) = send(
        &app,
        post_json("/analyze", json!({"location": "Austin, TX", "radius": -1.0})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("INVALID_REQUEST"));
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let app = app();

    let (status, body) = send(&app, post_json("/analyze", json!({"radius": 2.0}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("INVALID_REQUEST"));
}

#[tokio::test]
async fn test_all_collectors_failing_is_service_unavailable() {
    let collectors: Vec<_> = (1..=3)
        .map(|i| Arc::new(MockCollector::new(format!("category_{i}"), 50.0).failing()))
        .collect();
    let app = app_with(&collectors, None);

    let (status, body) = send(&app, post_json("/analyze", json!({"location": "Austin, TX"}))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], json!("AGGREGATE_UNAVAILABLE"));
}

#[tokio::test]
async fn test_batch_accepts_names_and_objects() {
    let app = app();

    let (status, body) = send(
        &app,
        post_json(
            "/analyze/batch",
            json!({
                "locations": ["Austin, TX", {"location": "Denver, CO", "radius": 5.0}, ""],
                "max_concurrency": 2
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], json!(3));
    assert_eq!(body["succeeded"], json!(2));
    assert_eq!(body["failed"], json!(1));
    let items = body["items"].as_array().unwrap();
    assert_eq!(items[1]["result"]["radius"], json!(5.0));
    assert_eq!(items[2]["error"]["code"], json!("INVALID_REQUEST"));
}

#[tokio::test]
async fn test_oversized_batch_is_bad_request() {
    let app = app();
    let locations: Vec<String> = (0..51).map(|i| format!("{i} Main St")).collect();

    let (status, body) = send(
        &app,
        post_json("/analyze/batch", json!({ "locations": locations })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("INVALID_REQUEST"));
}

#[tokio::test]
async fn test_history_without_persistence_is_not_found() {
    let app = app();

    let (status, body) = send(&app, get("/history?location=Austin")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], json!("PERSISTENCE_DISABLED"));
}

#[tokio::test]
async fn test_history_and_trend_after_analysis() {
    let sink = Arc::new(InMemoryPersistenceSink::new());
    let app = app_with(
        &scored_collectors(&SIX_SCORES),
        Some(Arc::clone(&sink) as Arc<dyn PersistenceSink>),
    );

    let (status, _) = send(&app, post_json("/analyze", json!({"location": "Austin, TX"}))).await;
    assert_eq!(status, StatusCode::OK);

    for _ in 0..50 {
        if !sink.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let (status, body) = send(&app, get("/history?location=austin,%20tx")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], json!(1));
    assert_eq!(body["records"][0]["overall_score"], json!(76.67));

    let (status, body) = send(&app, get("/trend?location=Austin,%20TX&metric=category_1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metric"], json!("category_1"));
    assert_eq!(body["days"], json!(30));
    assert_eq!(body["points"][0]["score"], json!(80.0));

    let (status, body) = send(&app, get("/history/statistics")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_analyses"], json!(1));

    let (status, _) = send(&app, get("/history?location=%20")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_reports_collectors_and_cache() {
    let app = app();

    let (status, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("healthy"));
    assert_eq!(body["collectors"], json!(6));
    assert_eq!(body["cache_backend"], json!("fallback"));
    assert_eq!(body["persistence_enabled"], json!(false));
}

#[tokio::test]
async fn test_health_without_collectors_is_unhealthy() {
    let app = app_with(&[], None);

    let (_, body) = send(&app, get("/health")).await;

    assert_eq!(body["status"], json!("unhealthy"));
}

#[tokio::test]
async fn test_cache_stats_and_clear() {
    let app = app();
    send(&app, post_json("/analyze", json!({"location": "Austin, TX"}))).await;
    send(&app, post_json("/analyze", json!({"location": "Austin, TX"}))).await;

    let (status, body) = send(&app, get("/cache/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["size"], json!(1));
    assert_eq!(body["hits"], json!(1));

    let (status, body) = send(&app, post_json("/cache/clear", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cleared"], json!(1));
}

#[tokio::test]
async fn test_circuit_breaker_listing_and_reset() {
    let app = app();
    send(&app, post_json("/analyze", json!({"location": "Austin, TX"}))).await;

    let (status, body) = send(&app, get("/circuit-breakers")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enabled"], json!(true));
    assert_eq!(body["circuit_breakers"].as_array().unwrap().len(), 6);
    assert_eq!(body["circuit_breakers"][0]["state"], json!("CLOSED"));

    let (status, body) = send(&app, post_json("/circuit-breakers/reset", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reset"], json!(6));
}

#[tokio::test]
async fn test_metrics_count_requests() {
    let app = app();
    send(&app, post_json("/analyze", json!({"location": "Austin, TX"}))).await;
    send(&app, post_json("/analyze", json!({"location": "Austin, TX"}))).await;

    let (status, body) = send(&app, get("/metrics")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["engine"]["requests_total"], json!(2));
    assert_eq!(body["engine"]["cache_hits"], json!(1));
    assert_eq!(body["engine"]["collector_calls"]["succeeded"], json!(6));
    assert_eq!(body["cache"]["backend"], json!("fallback"));
}
