// Protected handlers. The router wraps these in the rate limiter and the
// API key guard; handlers only see requests that passed both gates.
pub mod datasets;

pub use datasets::{ecom_events_get, ECOM_EVENTS};
