#![allow(dead_code)]

use std::net::SocketAddr;

use anyhow::{Context, Result};
use greenlight::config::{AppConfig, Environment};
use greenlight::database::Models;
use greenlight::{app, AppState};

/// A server bound to an ephemeral port on loopback, backed by the in-memory
/// store. Lives as long as the test's runtime.
pub struct TestServer {
    pub addr: SocketAddr,
    pub base_url: String,
    pub models: Models,
    pub client: reqwest::Client,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Development config with the limiter off, so tests don't trip it
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::for_environment(Environment::Development);
    config.limiter.enabled = false;
    config
}

pub async fn spawn_server() -> Result<TestServer> {
    spawn_server_with(test_config()).await
}

pub async fn spawn_server_with(config: AppConfig) -> Result<TestServer> {
    let models = Models::in_memory();
    let state = AppState::new(config, models.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("failed to bind test listener")?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        axum::serve(
            listener,
            app(state).into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    });

    Ok(TestServer {
        addr,
        base_url: format!("http://{addr}"),
        models,
        client: reqwest::Client::new(),
    })
}

/// POST a movie and return the created record
pub async fn create_movie(server: &TestServer, body: serde_json::Value) -> Result<serde_json::Value> {
    let res = server
        .client
        .post(server.url("/v1/movies"))
        .json(&body)
        .send()
        .await?;
    anyhow::ensure!(
        res.status() == reqwest::StatusCode::CREATED,
        "create failed: {}",
        res.status()
    );
    let payload = res.json::<serde_json::Value>().await?;
    Ok(payload["movie"].clone())
}
