//! Rate limiting logic and state management.

mod clock;
mod entry;
mod identifier;
mod limiter;
mod policy;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{RateLimitConfig, RateLimitEntry, RateLimitResult, MIN_WINDOW_MS};
pub use identifier::{
    client_identifier, login_identifier, ANONYMOUS_IDENTIFIER, FORWARDED_FOR_HEADER,
    REAL_IP_HEADER,
};
pub use limiter::{RateLimiter, DEFAULT_CLEANUP_INTERVAL};
pub use policy::{Limiters, Policy};
