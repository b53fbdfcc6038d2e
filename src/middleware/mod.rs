pub mod auth;
pub mod rate_limit;

pub use auth::{api_key_middleware, ApiKeyGuard, API_KEY_HEADER};
pub use rate_limit::{rate_limit_middleware, ClientIdentity, RateDecision, RateLimiter};
