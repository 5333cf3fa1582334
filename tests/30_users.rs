mod common;

use anyhow::Result;
use greenlight::database::models::Scope;
use greenlight::database::{TokenRepository, UserRepository};
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn register(server: &common::TestServer, email: &str) -> Result<reqwest::Response> {
    Ok(server
        .client
        .post(server.url("/v1/users"))
        .json(&json!({ "name": "Alice Smith", "email": email, "password": "pa55word1234" }))
        .send()
        .await?)
}

async fn activate(server: &common::TestServer, token: &str) -> Result<reqwest::Response> {
    Ok(server
        .client
        .put(server.url("/v1/users/activated"))
        .json(&json!({ "token": token }))
        .send()
        .await?)
}

#[tokio::test]
async fn registration_creates_an_inactive_user() -> Result<()> {
    let server = common::spawn_server().await?;

    let res = register(&server, "alice@example.com").await?;
    assert_eq!(res.status(), StatusCode::ACCEPTED);

    let user = res.json::<Value>().await?["user"].clone();
    assert_eq!(user["id"], 1);
    assert_eq!(user["name"], "Alice Smith");
    assert_eq!(user["email"], "alice@example.com");
    assert_eq!(user["activated"], false);
    assert!(user.get("password").is_none());
    assert!(user.get("password_hash").is_none());

    let stored = server.models.users.get_by_email("alice@example.com").await?;
    assert!(stored.password.matches("pa55word1234")?);
    Ok(())
}

#[tokio::test]
async fn duplicate_email_is_a_validation_error() -> Result<()> {
    let server = common::spawn_server().await?;
    register(&server, "alice@example.com").await?;

    let res = register(&server, "ALICE@example.com").await?;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        res.json::<Value>().await?["error"]["email"],
        "a user with this email address already exists"
    );
    Ok(())
}

#[tokio::test]
async fn registration_validates_every_field() -> Result<()> {
    let server = common::spawn_server().await?;

    let res = server
        .client
        .post(server.url("/v1/users"))
        .json(&json!({ "name": "", "email": "not-an-email", "password": "short" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        res.json::<Value>().await?,
        json!({
            "error": {
                "name": "must be provided",
                "email": "must be a valid email address",
                "password": "must be at least 8 bytes long"
            }
        })
    );
    Ok(())
}

#[tokio::test]
async fn activation_consumes_the_token() -> Result<()> {
    let server = common::spawn_server().await?;
    let res = register(&server, "alice@example.com").await?;
    let user_id = res.json::<Value>().await?["user"]["id"].as_i64().unwrap_or_default();

    let token = server
        .models
        .tokens
        .new_token(user_id, chrono::Duration::days(3), Scope::Activation)
        .await?;

    let res = activate(&server, &token.plaintext).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let user = res.json::<Value>().await?["user"].clone();
    assert_eq!(user["id"], user_id);
    assert_eq!(user["activated"], true);

    // every activation token for the user is gone
    let res = activate(&server, &token.plaintext).await?;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        res.json::<Value>().await?["error"]["token"],
        "invalid or expired activation token"
    );
    Ok(())
}

#[tokio::test]
async fn activation_rejects_wrong_scope_expired_and_malformed_tokens() -> Result<()> {
    let server = common::spawn_server().await?;
    let res = register(&server, "alice@example.com").await?;
    let user_id = res.json::<Value>().await?["user"]["id"].as_i64().unwrap_or_default();

    let auth = server
        .models
        .tokens
        .new_token(user_id, chrono::Duration::days(1), Scope::Authentication)
        .await?;
    let res = activate(&server, &auth.plaintext).await?;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let expired = server
        .models
        .tokens
        .new_token(user_id, chrono::Duration::seconds(-1), Scope::Activation)
        .await?;
    let res = activate(&server, &expired.plaintext).await?;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = activate(&server, "too-short").await?;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.json::<Value>().await?["error"]["token"], "must be 43 bytes long");

    let stored = server.models.users.get(user_id).await?;
    assert!(!stored.activated);
    Ok(())
}
