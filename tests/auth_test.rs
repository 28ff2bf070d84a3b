mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use art_catalog::route::create_app;
use common::*;

fn setup_test_app(secret: Option<&str>) -> (Router, TestCatalog) {
    let t = setup();
    (create_app(t.app_state(secret)), t)
}

/// Helper function to parse response body as JSON
async fn response_json(body: Body) -> Value {
    let bytes = body
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes();

    serde_json::from_slice(&bytes).expect("Failed to parse JSON")
}

fn list_request(authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri("/api/groups");
    if let Some(value) = authorization {
        builder = builder.header("Authorization", value);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_auth_middleware_enabled_valid_token() {
    let (app, _t) = setup_test_app(Some("secret_token"));

    let response = app.oneshot(list_request(Some("secret_token"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_auth_middleware_enabled_invalid_token() {
    let (app, _t) = setup_test_app(Some("secret_token"));

    let response = app.oneshot(list_request(Some("wrong_token"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response.into_body()).await;
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert_eq!(body["message"], "Invalid or missing authorization header");
}

#[tokio::test]
async fn test_auth_middleware_enabled_missing_token() {
    let (app, _t) = setup_test_app(Some("secret_token"));

    let response = app.oneshot(list_request(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_middleware_runs_before_caller_checks() {
    let (app, _t) = setup_test_app(Some("secret_token"));

    // An admin caller id does not bypass the gateway secret
    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/groups/1")
                .header("X-Caller-Id", ADMIN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_middleware_disabled() {
    let (app, _t) = setup_test_app(None);

    let response = app.oneshot(list_request(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _t) = setup_test_app(Some("secret_token"));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_caller_is_a_designer_not_an_admin() {
    let (app, _t) = setup_test_app(None);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/lookups/formats")
                .header("X-Caller-Id", "dana")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"name":"square"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
