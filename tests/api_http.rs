// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot, with
// scripted providers and an in-memory bookmark store.
//
// Covered:
// - GET /health
// - GET /api/search/{group}  (items field, stats, isBookmarked, source filter, errors)
// - /bookmarks CRUD + export
// - JSON error bodies for unknown routes and methods

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    Router,
};
use http::{header, Request, StatusCode};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`
use uuid::Uuid;

use thread_scout::bookmarks::{BookmarkPatch, NewBookmark, PersistenceError};
use thread_scout::providers::stub::StubProvider;
use thread_scout::{api, AppState, Bookmark, BookmarkStore, MemoryStore, ProviderRegistry, ProviderTag};

const BODY_LIMIT: usize = 1024 * 1024;

/// reddit page: Reddit and Google overlap on one thread, Bing is down.
fn test_router() -> Router {
    let registry = ProviderRegistry::new()
        .with(StubProvider::urls(
            ProviderTag::Reddit,
            &[
                "https://www.reddit.com/r/crm/comments/a1/best_crm/",
                "https://www.reddit.com/r/crm/comments/b2/pipedrive/",
            ],
        ))
        .with(StubProvider::failing(ProviderTag::Bing, "Access denied due to invalid subscription key"))
        .with(StubProvider::urls(
            ProviderTag::Google,
            &[
                "https://reddit.com/r/crm/comments/a1/best_crm?utm_source=share",
                "https://www.reddit.com/r/sales/comments/c3/switching/",
            ],
        ));
    api::router(AppState::new(registry, Arc::new(MemoryStore::new())))
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Json) {
    let req = Request::get(uri).body(Body::empty()).expect("build GET");
    let (status, bytes) = send(app, req).await;
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Json) -> (StatusCode, Json) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request");
    let (status, bytes) = send(app, req).await;
    let v = if bytes.is_empty() {
        Json::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, v)
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let app = test_router();
    let (status, bytes) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(bytes).unwrap(), "ok");
}

#[tokio::test]
async fn search_merges_across_providers_and_reports_partial_failure() {
    let app = test_router();
    let (status, v) = get_json(&app, "/api/search/reddit?q=crm").await;
    assert_eq!(status, StatusCode::OK, "body: {v}");

    let threads = v["threads"].as_array().expect("reddit page uses 'threads'");
    assert_eq!(threads.len(), 3);
    assert_eq!(threads[0]["sources"], json!(["reddit", "google"]));
    assert_eq!(threads[0]["isBookmarked"], json!(false));
    assert!(threads[0]["providerPayload"]["google"].is_object());

    let stats = &v["stats"];
    assert_eq!(stats["total"], 3);
    assert_eq!(stats["multiSource"], 1);
    assert_eq!(stats["perSource"], json!({"reddit": 2, "bing": 0, "google": 2}));
    assert_eq!(stats["failedSources"], json!(["bing"]));
}

#[tokio::test]
async fn source_filter_narrows_items_but_not_stats() {
    let app = test_router();

    let (_, multi) = get_json(&app, "/api/search/reddit?q=crm&source=multi").await;
    assert_eq!(multi["threads"].as_array().unwrap().len(), 1);
    assert_eq!(multi["stats"]["total"], 3);

    let (_, only) = get_json(&app, "/api/search/reddit?q=crm&source=google").await;
    let only = only["threads"].as_array().unwrap();
    assert_eq!(only.len(), 1);
    assert_eq!(only[0]["sources"], json!(["google"]));
}

#[tokio::test]
async fn disabled_provider_is_not_reported() {
    let app = test_router();
    let (status, v) = get_json(&app, "/api/search/reddit?q=crm&bing=false&limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["threads"].as_array().unwrap().len(), 2);
    assert!(v["stats"].get("failedSources").is_none());
    assert!(v["stats"]["perSource"].get("bing").is_none());
}

#[tokio::test]
async fn validation_errors_are_400_with_message() {
    let app = test_router();

    let (status, v) = get_json(&app, "/api/search/reddit?q=%20%20").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["message"], "query must not be empty");

    let (status, v) = get_json(&app, "/api/search/myspace?q=crm").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(v["message"].as_str().unwrap().contains("myspace"));

    let (status, _) = get_json(&app, "/api/search/reddit?q=crm&source=digg").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, v) =
        get_json(&app, "/api/search/reddit?q=crm&reddit=false&bing=false&google=false").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["message"], "no providers enabled for reddit");
}

#[tokio::test]
async fn all_sources_failed_is_502() {
    let registry = ProviderRegistry::new()
        .with(StubProvider::failing(ProviderTag::Bing, "quota exceeded"))
        .with(StubProvider::failing(ProviderTag::Google, "timed out"));
    let app = api::router(AppState::new(registry, Arc::new(MemoryStore::new())));

    let (status, v) = get_json(&app, "/api/search/quora?q=crm").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let msg = v["message"].as_str().unwrap();
    assert!(msg.starts_with("all sources failed"));
    assert!(msg.contains("quota exceeded") && msg.contains("timed out"));
}

#[tokio::test]
async fn unregistered_providers_count_as_failed() {
    let registry = ProviderRegistry::new().with(StubProvider::urls(
        ProviderTag::Reddit,
        &["https://www.reddit.com/r/crm/comments/a1/best_crm/"],
    ));
    let app = api::router(AppState::new(registry, Arc::new(MemoryStore::new())));
    let (status, v) = get_json(&app, "/api/search/reddit?q=crm").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["stats"]["failedSources"], json!(["bing", "google"]));
}

#[tokio::test]
async fn bookmarks_round_trip_and_decorate_search_results() {
    let app = test_router();

    let (_, v) = get_json(&app, "/api/search/reddit?q=crm").await;
    let first = v["threads"][0].clone();

    let (status, created) = send_json(
        &app,
        "POST",
        "/bookmarks",
        json!({
            "thread": {
                "id": first["id"],
                "url": first["url"],
                "title": first["title"],
                "sources": first["sources"],
            },
            "notes": "reply with the comparison post"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "body: {created}");
    assert_eq!(created["status"], "pending");
    let id = created["id"].as_str().unwrap().to_string();

    // Same thread again: existing bookmark comes back.
    let (_, again) = send_json(&app, "POST", "/bookmarks", json!({ "thread": created["thread"] })).await;
    assert_eq!(again["id"], created["id"]);

    let (_, v) = get_json(&app, "/api/search/reddit?q=crm").await;
    let flags: Vec<bool> = v["threads"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["isBookmarked"].as_bool().unwrap())
        .collect();
    assert_eq!(flags, vec![true, false, false]);

    let (status, patched) = send_json(
        &app,
        "PATCH",
        &format!("/bookmarks/{id}"),
        json!({ "status": "in_progress" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["status"], "in_progress");
    assert_eq!(patched["notes"], "reply with the comparison post");

    let (_, list) = get_json(&app, "/bookmarks").await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let del = Request::delete(format!("/bookmarks/{id}")).body(Body::empty()).unwrap();
    let (status, _) = send(&app, del).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, v) = get_json(&app, "/api/search/reddit?q=crm").await;
    assert_eq!(v["threads"][0]["isBookmarked"], json!(false));
}

#[tokio::test]
async fn bookmark_errors_map_to_status_codes() {
    let app = test_router();

    let missing = "/bookmarks/3f2504e0-4f89-41d3-9a0c-0305e82c3301";
    let (status, v) = send_json(&app, "PATCH", missing, json!({ "notes": "x" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(v["message"].as_str().unwrap().contains("not found"));

    let (status, _) = send(&app, Request::delete(missing).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, v) = send_json(&app, "PATCH", "/bookmarks/not-a-uuid", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(v["message"].as_str().unwrap().contains("not-a-uuid"));

    let (status, v) = send_json(&app, "POST", "/bookmarks", json!({ "notes": "no thread" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(v.get("message").is_some());

    let (status, _) = send_json(
        &app,
        "POST",
        "/bookmarks",
        json!({ "thread": { "id": "", "url": "https://x.test/", "title": "t" } }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn export_serves_csv_attachment() {
    let app = test_router();
    send_json(
        &app,
        "POST",
        "/bookmarks",
        json!({
            "thread": {
                "id": "reddit:a1",
                "url": "https://www.reddit.com/r/crm/comments/a1/best_crm/",
                "title": "Best CRM, honestly?",
                "sources": ["reddit", "google"]
            },
            "notes": "draft"
        }),
    )
    .await;

    let req = Request::get("/bookmarks/export?format=csv").body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    assert_eq!(
        resp.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"bookmarks.csv\""
    );
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("id,title,url,sources,status,notes,created_at"));
    let row = lines.next().unwrap();
    assert!(row.contains("\"Best CRM, honestly?\""));
    assert!(row.contains("reddit;google"));
    assert!(row.contains(",pending,draft,"));

    let (status, v) = get_json(&app, "/bookmarks/export?format=xml").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(v["message"].as_str().unwrap().contains("xml"));
}

/// Store whose backing file is gone.
struct UnavailableStore;

#[async_trait]
impl BookmarkStore for UnavailableStore {
    async fn list(&self) -> Result<Vec<Bookmark>, PersistenceError> {
        Err(PersistenceError::Io("disk gone".into()))
    }
    async fn create(&self, _new: NewBookmark) -> Result<Bookmark, PersistenceError> {
        Err(PersistenceError::Io("disk gone".into()))
    }
    async fn update(&self, _id: Uuid, _patch: BookmarkPatch) -> Result<Bookmark, PersistenceError> {
        Err(PersistenceError::Io("disk gone".into()))
    }
    async fn delete(&self, _id: Uuid) -> Result<(), PersistenceError> {
        Err(PersistenceError::Io("disk gone".into()))
    }
}

#[tokio::test]
async fn search_survives_bookmark_store_failure() {
    let registry = ProviderRegistry::new()
        .with(StubProvider::urls(ProviderTag::Bing, &["https://quora.com/a", "https://quora.com/b"]))
        .with(StubProvider::urls(ProviderTag::Google, &["https://www.quora.com/a"]));
    let app = api::router(AppState::new(registry, Arc::new(UnavailableStore)));

    let (status, v) = get_json(&app, "/api/search/quora?q=crm").await;
    assert_eq!(status, StatusCode::OK, "body: {v}");
    let questions = v["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    assert!(questions.iter().all(|q| q["isBookmarked"] == json!(false)));
    assert_eq!(v["stats"]["multiSource"], 1);

    // The bookmark routes themselves still report the failure.
    let (status, v) = get_json(&app, "/bookmarks").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(v["message"].as_str().unwrap().contains("disk gone"));
}

#[tokio::test]
async fn unknown_routes_and_methods_return_json_messages() {
    let app = test_router();

    let (status, v) = get_json(&app, "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(v["message"].as_str().unwrap().contains("/nope"));

    let uri = "/bookmarks/3f2504e0-4f89-41d3-9a0c-0305e82c3301";
    let (status, v) = get_json(&app, uri).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(v["message"].as_str().unwrap().starts_with("GET not allowed"));

    let (status, v) = send_json(&app, "PUT", "/health", json!({})).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(v.get("message").is_some());
}
