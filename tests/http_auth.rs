mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::json;

#[tokio::test]
async fn register_login_and_profile() -> anyhow::Result<()> {
    let (app, _) = common::spawn_app().await;

    // trailing slash form used by the browser client
    let (status, user) = app
        .call(
            Method::POST,
            "/api/auth/",
            None,
            Some(json!({"name": "Alice", "email": "Alice@Example.com", "password": "secret123", "phone": "555"})),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["email"], "alice@example.com");
    assert_eq!(user["phone"], "555");
    assert!(user.get("password").is_none());
    assert!(user.get("passwordHash").is_none());

    let (status, login) = app
        .call(Method::POST, "/api/auth/login", None, Some(json!({"email": "alice@example.com", "password": "secret123"})))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["success"], true);
    let token = login["token"].as_str().unwrap().to_string();

    // legacy header
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/getuser")
        .header("auth-token", token.as_str())
        .body(Body::empty())?;
    let (status, me) = app.send(req).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["user"]["name"], "Alice");

    let (status, updated) = app
        .call(Method::PUT, "/api/auth/updateuser", Some(&token), Some(json!({"name": "Alice L"})))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["user"]["name"], "Alice L");
    assert_eq!(updated["user"]["phone"], "555");
    Ok(())
}

#[tokio::test]
async fn duplicate_email_is_rejected() -> anyhow::Result<()> {
    let (app, _) = common::spawn_app().await;
    app.signup("alice", "alice@example.com").await?;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth",
            None,
            Some(json!({"name": "Other", "email": "ALICE@example.com", "password": "another1"})),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "duplicate_email");
    Ok(())
}

#[tokio::test]
async fn bad_credentials_and_tokens() -> anyhow::Result<()> {
    let (app, _) = common::spawn_app().await;
    app.signup("alice", "alice@example.com").await?;

    let (status, _) = app
        .call(Method::POST, "/api/auth/login", None, Some(json!({"email": "alice@example.com", "password": "wrong-pass"})))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .call(Method::POST, "/api/auth/login", None, Some(json!({"email": "nobody@example.com", "password": "secret123"})))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.call(Method::POST, "/api/auth/getuser", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "missing_token");

    let (status, _) = app.call(Method::POST, "/api/auth/getuser", Some("garbage"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn registration_validation_lists_fields() -> anyhow::Result<()> {
    let (app, _) = common::spawn_app().await;
    let (status, body) = app
        .call(Method::POST, "/api/auth", None, Some(json!({"name": "", "email": "nope", "password": "1"})))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"].as_array().map(Vec::len), Some(3));
    Ok(())
}

#[tokio::test]
async fn health_is_mounted() -> anyhow::Result<()> {
    let (app, _) = common::spawn_app().await;
    let (status, body) = app.call(Method::GET, "/health", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    Ok(())
}
