mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn burst_is_admitted_then_limited() -> Result<()> {
    let mut config = common::test_config();
    config.limiter.enabled = true;
    config.limiter.rps = 0.5;
    config.limiter.burst = 3;
    let server = common::spawn_server_with(config).await?;

    for _ in 0..3 {
        let res = server.client.get(server.url("/v1/healthcheck")).send().await?;
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = server.client.get(server.url("/v1/healthcheck")).send().await?;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = res.headers()["retry-after"].to_str()?.parse()?;
    assert!((1..=2).contains(&retry_after), "retry-after {retry_after}");
    assert_eq!(res.json::<Value>().await?["error"], "rate limit exceeded");
    Ok(())
}

#[tokio::test]
async fn proxied_clients_are_limited_separately() -> Result<()> {
    let mut config = common::test_config();
    config.limiter.enabled = true;
    config.limiter.rps = 0.1;
    config.limiter.burst = 1;
    config.limiter.trust_proxy = true;
    let server = common::spawn_server_with(config).await?;

    let get = |client_ip: &'static str| {
        server
            .client
            .get(server.url("/v1/healthcheck"))
            .header("X-Forwarded-For", client_ip)
            .send()
    };

    assert_eq!(get("203.0.113.1").await?.status(), StatusCode::OK);
    assert_eq!(get("203.0.113.1").await?.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(get("203.0.113.2").await?.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn forwarding_headers_are_ignored_without_a_trusted_proxy() -> Result<()> {
    let mut config = common::test_config();
    config.limiter.enabled = true;
    config.limiter.rps = 0.1;
    config.limiter.burst = 1;
    let server = common::spawn_server_with(config).await?;

    let mut statuses = Vec::new();
    for i in 0..20 {
        let res = server
            .client
            .get(server.url("/v1/healthcheck"))
            .header("X-Forwarded-For", format!("203.0.113.{i}"))
            .header("X-Real-IP", format!("198.51.100.{i}"))
            .send()
            .await?;
        statuses.push(res.status().as_u16());
    }

    assert_eq!(statuses[0], 200);
    assert!(statuses[1..].iter().all(|&status| status == 429), "{statuses:?}");
    Ok(())
}

#[tokio::test]
async fn disabled_limiter_admits_everything() -> Result<()> {
    let server = common::spawn_server().await?;

    for _ in 0..20 {
        let res = server.client.get(server.url("/v1/healthcheck")).send().await?;
        assert_eq!(res.status(), StatusCode::OK);
    }
    Ok(())
}
