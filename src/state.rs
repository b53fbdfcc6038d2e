use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::DatasetStore;
use crate::middleware::{ApiKeyGuard, RateLimiter};
use crate::query::QueryPlanner;

/// Shared, immutable-after-startup application state.
///
/// The rate limiter is the only component with interior mutability.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DatasetStore>,
    pub planner: Arc<QueryPlanner>,
    pub guard: ApiKeyGuard,
    pub limiter: Option<RateLimiter>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn DatasetStore>) -> Self {
        let planner = QueryPlanner::new(&config.dataset);
        let guard = ApiKeyGuard::new(&config.security.api_key);
        let limiter = config
            .api
            .enable_rate_limiting
            .then(|| RateLimiter::from_config(&config.api));

        Self {
            config: Arc::new(config),
            store,
            planner: Arc::new(planner),
            guard,
            limiter,
        }
    }
}
