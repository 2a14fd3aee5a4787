//! Per-client admission control for the login endpoint.

mod limiter;

pub use limiter::RateLimiter;
