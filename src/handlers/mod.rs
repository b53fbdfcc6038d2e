// handlers/mod.rs - two security tiers
//
// Public (no key, not throttled) → Protected (rate limit, then X-API-KEY)
pub mod public;
pub mod protected;
