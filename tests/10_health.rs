mod common;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn health_needs_no_key() -> Result<()> {
    let server = common::spawn_default(10).await?;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/health")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body, serde_json::json!({ "status": "ok" }));
    Ok(())
}

#[tokio::test]
async fn health_is_never_throttled() -> Result<()> {
    let server = common::spawn_server(
        common::test_config(&[("API_RATE_LIMIT_REQUESTS", "2")]),
        common::MemoryStore::with_events(1),
    )
    .await?;
    let client = reqwest::Client::new();

    for _ in 0..40 {
        let res = client
            .get(server.url("/health"))
            .header("x-forwarded-for", "198.51.100.1")
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::OK);
    }

    // Health traffic did not use up this identity's dataset budget
    let res = client
        .get(server.url("/datasets/ecom_events"))
        .header("x-forwarded-for", "198.51.100.1")
        .header("X-API-KEY", common::API_KEY)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn readiness_reflects_store() -> Result<()> {
    let client = reqwest::Client::new();

    let server = common::spawn_default(1).await?;
    let res = client.get(server.url("/health/ready")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["database"], "ok");

    let server = common::spawn_server(common::test_config(&[]), common::MemoryStore::failing()).await?;
    let res = client.get(server.url("/health/ready")).send().await?;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["status"], "degraded");
    assert!(!body.to_string().contains("refused"));
    Ok(())
}

#[tokio::test]
async fn unknown_route_is_json_404() -> Result<()> {
    let server = common::spawn_default(1).await?;
    let res = reqwest::get(server.url("/datasets/other")).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["code"], "NOT_FOUND");
    Ok(())
}
