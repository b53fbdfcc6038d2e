#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use ecom_events_api::config::AppConfig;
use ecom_events_api::database::{DatabaseError, DatasetStore, PageResult, RowRecord};
use ecom_events_api::query::QueryPlan;
use ecom_events_api::{app, AppState};

pub const API_KEY: &str = "test-key-123";

/// In-memory dataset that applies a plan's range and window the way the
/// SQL does: half-open range on event_time, ascending order, offset/limit.
pub struct MemoryStore {
    rows: Vec<(NaiveDateTime, RowRecord)>,
    fail: bool,
    calls: AtomicUsize,
}

impl MemoryStore {
    pub fn with_events(count: usize) -> Self {
        let mut rows: Vec<_> = (0..count).map(event).collect();
        rows.sort_by_key(|(t, _)| *t);
        Self { rows, fail: false, calls: AtomicUsize::new(0) }
    }

    pub fn failing() -> Self {
        Self { rows: vec![], fail: true, calls: AtomicUsize::new(0) }
    }

    /// Number of read_page calls that reached the store
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatasetStore for MemoryStore {
    async fn read_page(&self, plan: &QueryPlan) -> Result<PageResult, DatabaseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DatabaseError::Sqlx(sqlx::Error::Protocol(
                "relation \"api.v_ecom_events\" does not exist".into(),
            )));
        }

        let matching: Vec<&RowRecord> = self
            .rows
            .iter()
            .filter(|(t, _)| plan.range.map_or(true, |r| r.contains(*t)))
            .map(|(_, row)| row)
            .collect();

        let rows = matching
            .iter()
            .skip(plan.window.offset as usize)
            .take(plan.window.limit as usize)
            .map(|row| (*row).clone())
            .collect();

        Ok(PageResult { total: matching.len() as i64, rows })
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        if self.fail {
            Err(DatabaseError::ConnectionError("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

pub fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2019, 10, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
}

/// Event `i` happens `i` minutes after 2019-10-01T00:00:00
fn event(i: usize) -> (NaiveDateTime, RowRecord) {
    let t = base_time() + Duration::minutes(i as i64);
    let mut row = RowRecord::new();
    row.insert("event_time".into(), json!(t.format("%Y-%m-%dT%H:%M:%S").to_string()));
    row.insert("event_type".into(), json!(if i % 3 == 0 { "purchase" } else { "view" }));
    row.insert("product_id".into(), json!(1000 + i));
    row.insert("price".into(), json!(9.99));
    (t, row)
}

/// Configuration for tests: known key, proxy headers trusted so each test
/// can pick caller identities with X-Forwarded-For.
pub fn test_config(extra: &[(&str, &str)]) -> AppConfig {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("API_KEY".into(), API_KEY.into());
    vars.insert("API_TRUST_FORWARDED_FOR".into(), "true".into());
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    AppConfig::from_lookup(|key| vars.get(key).cloned())
}

pub struct TestServer {
    pub base_url: String,
    pub store: Arc<MemoryStore>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Route server logs through the test harness; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

/// Serve the router in-process on a free port; returns the base URL
pub async fn serve(state: AppState) -> Result<String> {
    init_tracing();
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    let router = app(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()).await;
    });

    Ok(format!("http://{}", addr))
}

pub async fn spawn_server(config: AppConfig, store: MemoryStore) -> Result<TestServer> {
    let store = Arc::new(store);
    let base_url = serve(AppState::new(config, store.clone())).await?;
    Ok(TestServer { base_url, store })
}

pub async fn spawn_default(events: usize) -> Result<TestServer> {
    spawn_server(test_config(&[]), MemoryStore::with_events(events)).await
}
