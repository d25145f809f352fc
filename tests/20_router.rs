// Router-level checks that never reach the database: the pool is lazy, so
// authentication and token-shape failures answer before any connection is made.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
};
use serde_json::Value;
use tower::ServiceExt;

async fn send(method: Method, uri: &str, bearer: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let response = backoffice_api::app()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    for uri in ["/api/clients", "/api/dashboard/summary", "/api/projection/2025", "/api/auth/me"] {
        let (status, body) = send(Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "UNAUTHORIZED");
    }
}

#[tokio::test]
async fn admin_routes_require_a_token() {
    let (status, _) = send(Method::GET, "/api/admin/users", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn garbage_tokens_are_rejected() {
    let (status, body) = send(Method::GET, "/api/transactions", Some("not.a.jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Token inválido ou expirado");
}

#[tokio::test]
async fn malformed_share_tokens_are_not_found() {
    let (status, body) = send(Method::GET, "/share/too-short", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, _) = send(Method::POST, "/share/with%20space", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_routes_are_404_without_auth() {
    let (status, _) = send(Method::GET, "/api/nao-existe", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
