use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use tower::util::ServiceExt;

use wordfreq::handlers::{AppState, router};
use wordfreq::{Aggregator, EngineConfig, MemorySource, Ranking};

fn make_state() -> AppState {
    let sources = [
        MemorySource::new("a", "cat dog cat"),
        MemorySource::new("b", "dog dog bird"),
    ];
    let table = Aggregator::new(EngineConfig {
        chunks_per_source: 2,
        ..EngineConfig::default()
    })
    .aggregate(&sources)
    .unwrap();
    AppState {
        ranking: Arc::new(Ranking::from_table(&table)),
        sources: sources.len(),
        max_top_k: 2,
        default_chunks: 4,
        max_chunks: 8,
    }
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body_bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&body_bytes).unwrap()
}

#[tokio::test]
async fn healthz_ok() {
    let app = router(make_state());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn top_endpoint_returns_ranked_words() {
    let app = router(make_state());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/top?k=2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["k"], 2);
    assert_eq!(body["sources"], 2);
    assert_eq!(body["distinct"], 3);
    assert_eq!(body["total"], 6);
    assert_eq!(body["items"][0]["word"], "dog");
    assert_eq!(body["items"][0]["count"], 3);
    assert_eq!(body["items"][1]["word"], "cat");
    assert_eq!(body["items"][1]["count"], 2);
}

#[tokio::test]
async fn top_endpoint_clamps_k() {
    let app = router(make_state());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/top?k=500")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["k"], 2);
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn top_endpoint_with_zero_k_is_empty() {
    let app = router(make_state());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/top?k=0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn count_endpoint_counts_request_body() {
    let app = router(make_state());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/count?k=2&chunks=3")
                .body(Body::from("The hat and the bat and THE cat"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["sources"], 1);
    assert_eq!(body["distinct"], 5);
    assert_eq!(body["items"][0]["word"], "the");
    assert_eq!(body["items"][0]["count"], 3);
    assert_eq!(body["items"][1]["word"], "and");
    assert_eq!(body["items"][1]["count"], 2);
}

#[tokio::test]
async fn count_endpoint_accepts_empty_body() {
    let app = router(make_state());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/count")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["total"], 0);
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn count_endpoint_rejects_zero_chunks() {
    let app = router(make_state());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/count?chunks=0")
                .body(Body::from("cat"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(
        body["error"]
            .as_str()
            .unwrap_or_default()
            .contains("chunks")
    );
}
