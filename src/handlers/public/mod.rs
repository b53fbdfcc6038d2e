// Public handlers: liveness and readiness probes, no API key, not rate limited
pub mod health;

pub use health::{health, ready};
