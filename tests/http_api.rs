use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use blob_sweeper::{
    routes::routes::routes,
    services::{
        graph_source::{GraphSource, InMemoryGraph},
        storage_service::{LocalBlobStore, apply_schema},
        sweep_service::{SweepOptions, Sweeper},
    },
    state::AppState,
};
use serde_json::{Value, json};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

async fn test_app() -> (Router, TempDir) {
    let dir = TempDir::new().unwrap();
    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    apply_schema(&db).await.unwrap();

    let store = LocalBlobStore::new(Arc::new(db), dir.path());
    let graph: Arc<dyn GraphSource> = Arc::new(InMemoryGraph::default());
    let sweeper = Arc::new(Sweeper::new(
        Arc::new(store.clone()),
        graph.clone(),
        SweepOptions::default(),
    ));
    let app = routes().with_state(AppState {
        store,
        graph,
        sweeper,
    });
    (app, dir)
}

async fn send(app: &Router, method: Method, uri: &str, body: Body) -> (StatusCode, Vec<u8>) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(body)
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, Body::from(body.to_string())).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn healthz_is_ok() {
    let (app, _dir) = test_app().await;
    let (status, body) = send_json(&app, Method::GET, "/healthz", Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn readyz_checks_db_and_disk() {
    let (app, _dir) = test_app().await;
    let (status, body) = send_json(&app, Method::GET, "/readyz", Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["sqlite"]["ok"], true);
    assert_eq!(body["checks"]["disk"]["ok"], true);
}

#[tokio::test]
async fn blob_round_trip() {
    let (app, _dir) = test_app().await;

    let (status, _) = send(&app, Method::PUT, "/blobs/picture:1", Body::from("png-bytes")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, bytes) = send(&app, Method::GET, "/blobs/picture:1", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"png-bytes");

    let (status, _) = send(&app, Method::DELETE, "/blobs/picture:1", Body::empty()).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, "/blobs/picture:1", Body::empty()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_pages_with_encoded_token() {
    let (app, _dir) = test_app().await;
    for key in ["picture:1", "picture:2", "picture:3", "file:1"] {
        send(&app, Method::PUT, &format!("/blobs/{key}"), Body::from("x")).await;
    }

    let (status, first) = send_json(
        &app,
        Method::GET,
        "/blobs?prefix=picture:&max-keys=2",
        Value::Null,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["key_count"], 2);
    assert_eq!(first["is_truncated"], true);

    let token = first["next_continuation_token"].as_str().unwrap();
    let (_, second) = send_json(
        &app,
        Method::GET,
        &format!("/blobs?prefix=picture:&max-keys=2&continuation-token={token}"),
        Value::Null,
    )
    .await;
    assert_eq!(second["key_count"], 1);
    assert_eq!(second["blobs"][0]["key"], "picture:3");
}

#[tokio::test]
async fn sweep_before_state_is_loaded_is_refused() {
    let (app, _dir) = test_app().await;
    send(&app, Method::PUT, "/blobs/file:3", Body::from("x")).await;

    let (status, _) = send_json(&app, Method::POST, "/sweep", Value::Null).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = send(&app, Method::HEAD, "/blobs/file:3", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn sweep_removes_only_orphans() {
    let (app, _dir) = test_app().await;
    for key in ["picture:1", "picture:2", "file:3", "avatar:me"] {
        send(&app, Method::PUT, &format!("/blobs/{key}"), Body::from("x")).await;
    }

    let state = json!({
        "sessions": [{
            "id": "s1",
            "messages": [{
                "id": "m1",
                "pictures": [{"storageKey": "picture:1"}],
                "contentParts": [{"type": "image", "storageKey": "picture:2"}]
            }]
        }]
    });
    let (status, _) = send_json(&app, Method::PUT, "/state", state).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, report) = send_json(&app, Method::POST, "/sweep", Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["deleted"], json!(["file:3"]));
    assert_eq!(report["candidates"], 3);

    for (key, expected) in [
        ("picture:1", StatusCode::OK),
        ("picture:2", StatusCode::OK),
        ("avatar:me", StatusCode::OK),
        ("file:3", StatusCode::NOT_FOUND),
    ] {
        let (status, _) = send(&app, Method::HEAD, &format!("/blobs/{key}"), Body::empty()).await;
        assert_eq!(status, expected, "{key}");
    }
}

#[tokio::test]
async fn state_round_trips() {
    let (app, _dir) = test_app().await;
    let state = json!({
        "sessions": [],
        "settings": {"userAvatarKey": "picture:9"}
    });
    send_json(&app, Method::PUT, "/state", state).await;

    let (status, body) = send_json(&app, Method::GET, "/state", Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["settings"]["userAvatarKey"], "picture:9");
}
