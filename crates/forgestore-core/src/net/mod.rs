//! HTTP plumbing: rate-limit tracking, transport, and the safe-call wrapper

pub mod ratelimit;
pub mod safecall;
pub mod transport;

pub use ratelimit::{RateLimitSnapshot, RateLimitTracker};
pub use safecall::{safe_api_call, safe_api_call_text};
pub use transport::{ApiResponse, ApiTransport, RetryPolicy};
