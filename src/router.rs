use axum::{
    http::{HeaderName, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::error::ApiError;
use crate::handlers::{protected, public};
use crate::middleware::{api_key_middleware, rate_limit_middleware, API_KEY_HEADER};
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        // Public
        .merge(public_routes())
        // Protected: rate limit, then API key
        .merge(dataset_routes(state.clone()))
        .fallback(not_found)
        .with_state(state.clone())
        // Global middleware
        .layer(TraceLayer::new_for_http());

    if state.config.security.enable_cors {
        router = router.layer(cors_layer(&state.config.security.cors_origins));
    }
    router
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(public::health))
        .route("/health/ready", get(public::ready))
}

fn dataset_routes(state: AppState) -> Router<AppState> {
    // route_layer: the last layer added runs first
    Router::new()
        .route("/datasets/ecom_events", get(protected::ecom_events_get))
        .route_layer(middleware::from_fn_with_state(state.clone(), api_key_middleware))
        .route_layer(middleware::from_fn_with_state(state, rate_limit_middleware))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()))
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET])
        .allow_headers([HeaderName::from_static(API_KEY_HEADER)])
}

async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}
