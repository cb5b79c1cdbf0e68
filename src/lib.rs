//! Checkin Guard - request throttling for a hackathon check-in service
//!
//! This crate implements the in-memory sliding-window rate limiter that
//! guards login, check-in and database status operations. State lives in
//! the owning process; each limiter keeps its own per-identifier history
//! and reclaims idle entries on a background schedule.

pub mod config;
pub mod error;
pub mod ratelimit;

pub use error::{Error, Result, Throttled};
pub use ratelimit::{Limiters, Policy, RateLimitConfig, RateLimitResult, RateLimiter};
