mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use quadra_sdk::{app, AppState};
use serde_json::Value;
use tower::ServiceExt;

async fn call(uri: &str, roles: Option<&str>) -> (StatusCode, Value) {
    let router = app(AppState::new(common::gateway()));
    let mut req = Request::builder().uri(uri);
    if let Some(roles) = roles {
        req = req.header("X-User-ID", "u1").header("X-User-Roles", roles);
    }
    let res = router
        .oneshot(req.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_is_ok() {
    let (status, body) = call("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn get_command_returns_param_envelope() {
    let (status, body) = call("/p/widget:03/_get", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], 1);
    let out = &body["data"][0];
    assert_eq!(out["uri"], "/p/widget:03/_get");
    assert_eq!(out["action"], "_get");
    assert_eq!(out["type"], "param");
    assert_eq!(out["value"]["path"], "/widget");
}

#[tokio::test]
async fn roles_header_restricts_params() {
    let (status, body) = call("/p/widget:03/secret/_get", Some("guest, auditor")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["value"]["visible"], false);
}

#[tokio::test]
async fn new_command_is_created() {
    let (status, body) = call("/p/widget/_new", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["data"][0]["value"]["children"].is_array());
}

#[tokio::test]
async fn search_command_returns_count() {
    let (status, body) = call(
        "/p/widget/_search?where=widget.size.gt(10)&aggregateCriteria=count",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["type"], "search");
    assert_eq!(body["data"][0]["value"]["kind"], "count");
    assert_eq!(body["data"][0]["value"]["value"], 2);
}

#[tokio::test]
async fn unknown_alias_is_config_error() {
    let (status, body) = call("/p/gadget/_get", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "config_error");
}

#[tokio::test]
async fn bad_criteria_is_compile_error() {
    let (status, body) = call("/p/widget/_search?where=widget.weight.eq(1)", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "compile_error");
    assert_eq!(body["error"]["details"]["type"], "Widget");
}

#[tokio::test]
async fn malformed_uri_is_bad_request() {
    let (status, body) = call("/nothing/here", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}
