use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::state::AppState;

pub const RATE_LIMIT_LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const RATE_LIMIT_REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Rate-limit key for the current request, inserted by `rate_limit_middleware`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientIdentity(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

/// Sliding-window log limiter keyed by caller identity.
///
/// Each identity keeps the instants of its admitted requests that are still
/// inside the window. Check and record happen under one lock, so concurrent
/// requests from the same identity cannot both take the last slot.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<LimiterState>>,
    limit: u32,
    window: Duration,
    max_keys: usize,
}

#[derive(Default)]
struct LimiterState {
    events: HashMap<String, Entry>,
    /// Admissions in order, as (seq, key). A slot is live while the key's
    /// entry still carries that seq; older slots are skipped on eviction.
    recency: VecDeque<(u64, String)>,
    next_seq: u64,
    checks: u64,
}

#[derive(Default)]
struct Entry {
    log: VecDeque<Instant>,
    seq: u64,
}

const SWEEP_EVERY: u64 = 1024;

impl RateLimiter {
    pub fn new(limit: u32, window: Duration, max_keys: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LimiterState::default())),
            limit,
            window,
            max_keys: max_keys.max(1),
        }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(
            config.rate_limit_requests,
            Duration::from_secs(config.rate_limit_window_secs),
            config.rate_limit_max_keys,
        )
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let state = &mut *guard;

        state.checks = state.checks.wrapping_add(1);
        if state.checks % SWEEP_EVERY == 0 {
            state.sweep(now, self.window);
        }
        if !state.events.contains_key(key) && state.events.len() >= self.max_keys {
            state.evict_least_recent();
        }

        let entry = state.events.entry(key.to_string()).or_default();
        prune_queue(&mut entry.log, now, self.window);

        if entry.log.len() >= self.limit as usize {
            // Rejections are not recorded
            let oldest = entry.log.front().copied().unwrap_or(now);
            let retry_after = self.window.saturating_sub(now.saturating_duration_since(oldest));
            return RateDecision::Limited { retry_after };
        }

        entry.log.push_back(now);
        entry.seq = state.next_seq;
        state.recency.push_back((state.next_seq, key.to_string()));
        state.next_seq += 1;
        RateDecision::Allowed { remaining: self.limit - entry.log.len() as u32 }
    }

    /// Number of identities currently tracked
    pub fn tracked_keys(&self) -> usize {
        match self.inner.lock() {
            Ok(guard) => guard.events.len(),
            Err(poisoned) => poisoned.into_inner().events.len(),
        }
    }
}

impl LimiterState {
    /// Drop idle identities and the recency slots they no longer own
    fn sweep(&mut self, now: Instant, window: Duration) {
        self.events.retain(|_, entry| {
            prune_queue(&mut entry.log, now, window);
            !entry.log.is_empty()
        });
        let events = &self.events;
        self.recency
            .retain(|(seq, key)| events.get(key).map_or(false, |entry| entry.seq == *seq));
    }

    /// Evict the identity whose last admission is oldest
    fn evict_least_recent(&mut self) {
        while let Some((seq, key)) = self.recency.pop_front() {
            if self.events.get(&key).map_or(false, |entry| entry.seq == seq) {
                self.events.remove(&key);
                return;
            }
        }
        // Only identities that were never admitted remain
        if let Some(key) = self.events.keys().next().cloned() {
            self.events.remove(&key);
        }
    }
}

fn prune_queue(queue: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(front) = queue.front() {
        if now.saturating_duration_since(*front) >= window {
            queue.pop_front();
        } else {
            break;
        }
    }
}

/// Resolve the caller identity: the socket peer, or the first forwarded
/// address when the deployment sits behind a trusted proxy.
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(addr) = forwarded.or(real_ip) {
            return addr.to_string();
        }
    }
    peer.map(|p| p.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Admits or rejects the request before any other gate runs
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let identity = client_identity(request.headers(), peer, state.config.api.trust_forwarded_for);
    request.extensions_mut().insert(ClientIdentity(identity.clone()));

    let Some(limiter) = &state.limiter else {
        return next.run(request).await;
    };

    match limiter.check(&identity) {
        RateDecision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(limiter.limit()));
            headers.insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(remaining));
            response
        }
        RateDecision::Limited { retry_after } => {
            tracing::warn!(
                client = %identity,
                path = %request.uri().path(),
                "Rate limit exceeded"
            );
            // Round up so clients never retry early
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            let mut response =
                ApiError::too_many_requests("Rate limit exceeded", secs.max(1)).into_response();
            let headers = response.headers_mut();
            headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(limiter.limit()));
            headers.insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(0u32));
            response
        }
    }
}
