//! Shared throttling and short-lived state for session flows.
//!
//! - [`RateLimiter`]: fixed-window throttle keyed by arbitrary strings
//!   (outbound e-mail per identity, for instance)
//! - [`ExpiringMap`]: pending premium confirmations and password reset tokens
//!
//! Both are internally synchronized and safe to share between concurrent
//! command executions.

pub mod cache;
pub mod errors;
pub mod rate_limiter;

pub use cache::ExpiringMap;
pub use errors::{RateLimitError, RateLimiterResult};
pub use rate_limiter::{RateLimitConfig, RateLimitResult, RateLimiter};
