// tests/metrics.rs
use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use thread_scout::metrics::Metrics;
use thread_scout::providers::stub::StubProvider;
use thread_scout::{api, AppConfig, AppState, MemoryStore, ProviderRegistry, ProviderTag};

async fn body_text(app: &Router, uri: &str) -> (StatusCode, String) {
    let resp = app
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    // axum::body::to_bytes requires an explicit limit
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap(); // 1 MiB
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn metrics_endpoint_contains_search_series() {
    let metrics = Metrics::init().expect("metrics recorder");
    let registry = ProviderRegistry::new()
        .with(StubProvider::urls(ProviderTag::Bing, &["https://quora.com/q/1"]))
        .with(StubProvider::failing(ProviderTag::Google, "timed out"));
    let app = api::router(AppState::new(registry, Arc::new(MemoryStore::new())))
        .merge(metrics.router());

    let (status, _) = body_text(&app, "/api/search/quora?q=crm").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = body_text(&app, "/api/search/quora?q=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = body_text(&app, "/bookmarks").await;
    assert_eq!(status, StatusCode::OK);

    let (status, text) = body_text(&app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    for needle in [
        "search_requests_total",
        "search_provider_records_total",
        "search_provider_errors_total",
        "search_validation_rejected_total",
        "search_duration_ms",
        "bookmark_ops_total",
    ] {
        assert!(text.contains(needle), "metrics output missing {needle}:\n{text}");
    }
    assert!(text.contains("provider=\"google\""));
}

#[tokio::test]
async fn full_app_builds_from_default_config() {
    let app = thread_scout::app_with_config(&AppConfig::default())
        .await
        .expect("app should build from defaults");
    let (status, body) = body_text(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
    let (status, _) = body_text(&app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
}
