//! # market-auth
//!
//! Client-side login protection for the admin panel.
//!
//! ## Modules
//!
//! - `rate_limit`: sliding-window failed-login limiter with temporary
//!   lockout, backed by an in-memory or Redis store

pub mod rate_limit;

pub use rate_limit::{
    LoginRateLimiter, MemoryRateLimitStore, RateLimitDecision, RateLimitEntry, RateLimitPolicy,
    RateLimitStore,
};
