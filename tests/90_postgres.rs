mod common;

use std::sync::Arc;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;

use ecom_events_api::database::PgDatasetStore;
use ecom_events_api::AppState;

// Runs against a real PostgreSQL when ECOM_TEST_DATABASE_URL is set; the
// test creates and drops its own schema holding a v_ecom_events table.

#[tokio::test]
async fn pages_through_a_live_view() -> Result<()> {
    let Ok(url) = std::env::var("ECOM_TEST_DATABASE_URL") else {
        eprintln!("ECOM_TEST_DATABASE_URL not set; skipping live database test");
        return Ok(());
    };

    let pool = PgPoolOptions::new().max_connections(4).connect(&url).await?;
    let schema = format!("ecom_test_{}", uuid::Uuid::new_v4().simple());

    sqlx::query(&format!("CREATE SCHEMA {}", schema)).execute(&pool).await?;
    sqlx::query(&format!(
        "CREATE TABLE {}.v_ecom_events (
            event_time timestamp NOT NULL,
            event_type text NOT NULL,
            product_id bigint NOT NULL,
            price numeric(10, 2),
            user_session uuid,
            attrs jsonb,
            tags int4[],
            labels text[],
            ip inet,
            dur interval
        )",
        schema
    ))
    .execute(&pool)
    .await?;
    // Inserted in reverse so ordering comes from the query, not insertion
    sqlx::query(&format!(
        "INSERT INTO {}.v_ecom_events
         SELECT timestamp '2019-10-01 00:00:00' + make_interval(secs => g),
                CASE WHEN g % 3 = 0 THEN 'purchase' ELSE 'view' END,
                1000 + g,
                (g % 50) + 0.99,
                NULL,
                jsonb_build_object('n', g),
                ARRAY[g, g + 1],
                ARRAY['a', NULL],
                inet '10.0.0.1',
                interval '1 hour'
         FROM generate_series(999, 0, -1) AS g",
        schema
    ))
    .execute(&pool)
    .await?;

    let outcome = exercise(&url, &schema).await;

    sqlx::query(&format!("DROP SCHEMA {} CASCADE", schema)).execute(&pool).await?;
    pool.close().await;
    outcome
}

async fn exercise(url: &str, schema: &str) -> Result<()> {
    let config = common::test_config(&[("DATABASE_URL", url), ("DATASET_SCHEMA", schema)]);
    config.validate()?;

    let pool = PgPoolOptions::new().max_connections(2).connect(url).await?;
    let store = PgDatasetStore::new(pool, 5_000);
    let base_url = common::serve(AppState::new(config, Arc::new(store))).await?;
    let client = reqwest::Client::new();

    let fetch = |query: String| {
        let client = client.clone();
        let url = format!("{}/datasets/ecom_events{}", base_url, query);
        async move {
            let res = client.get(url).header("X-API-KEY", common::API_KEY).send().await?;
            let status = res.status();
            anyhow::Ok((status, res.json::<Value>().await?))
        }
    };

    let (status, whole) = fetch("?page_size=1000".into()).await?;
    assert_eq!(status, StatusCode::OK, "body: {}", whole);
    assert_eq!(whole["meta"]["total"], 1000);
    let whole = whole["data"].as_array().cloned().unwrap_or_default();
    assert_eq!(whole.len(), 1000);
    assert_eq!(whole[0]["event_time"], "2019-10-01T00:00:00");
    assert_eq!(whole[0]["product_id"], 1000);
    assert_eq!(whole[0]["price"], 0.99);
    assert_eq!(whole[0]["user_session"], Value::Null);
    assert_eq!(whole[0]["attrs"]["n"], 0);
    assert_eq!(whole[0]["tags"], serde_json::json!([0, 1]));
    assert_eq!(whole[0]["labels"], serde_json::json!(["a", null]));
    // No JSON mapping for these; they must not leak binary wire bytes
    assert_eq!(whole[0]["ip"], Value::Null);
    assert_eq!(whole[0]["dur"], Value::Null);

    let mut stitched = Vec::new();
    for page in 1..=10 {
        let (_, body) = fetch(format!("?page={}&page_size=100", page)).await?;
        stitched.extend(body["data"].as_array().cloned().unwrap_or_default());
    }
    assert_eq!(stitched, whole);

    let (_, body) = fetch("?start_time=2019-10-01T00:01:00&end_time=2019-10-01T00:02:00".into()).await?;
    assert_eq!(body["meta"]["total"], 60);

    let (_, body) = fetch("?page=11&page_size=100".into()).await?;
    assert_eq!(body["meta"]["total"], 1000);
    assert!(body["data"].as_array().map_or(false, |d| d.is_empty()));

    Ok(())
}
