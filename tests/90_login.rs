mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn login_rejects_unknown_credentials() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/auth/login", server.base_url))
        .json(&json!({ "email": "ninguem@example.com", "password": "senha-errada" }))
        .send()
        .await?;

    // 401 with a database; 503 when none is reachable
    assert!(
        res.status() == StatusCode::UNAUTHORIZED || res.status() == StatusCode::SERVICE_UNAVAILABLE,
        "unexpected status: {}",
        res.status()
    );

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], false, "{}", body);
    assert!(body.get("error").is_some(), "Response should have 'error' field: {}", body);
    assert!(body.get("code").is_some(), "Response should have 'code' field: {}", body);
    Ok(())
}

#[tokio::test]
async fn login_requires_a_json_body() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client.post(format!("{}/auth/login", server.base_url)).send().await?;

    assert!(res.status().is_client_error(), "unexpected status: {}", res.status());
    Ok(())
}

#[tokio::test]
async fn protected_routes_answer_401_over_http() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::get(format!("{}/api/clients", server.base_url)).await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}
