//! # Resilience Utilities
//!
//! Per-external-API token-bucket limiting and the bounded retry driver the
//! pipelines wrap their adapter calls in.

pub mod rate_limiter;
pub mod retry;

pub use rate_limiter::{ApiBudget, ApiRateLimiter, OpKind, RateBudget, TokenBucket};
pub use retry::{retry_until, Outcome};
