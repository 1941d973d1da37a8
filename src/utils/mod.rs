//! Utils Module
pub mod otel;
pub mod rate_limiter;
pub mod truncate;

pub use rate_limiter::RateLimiter;
pub use truncate::snippet;
