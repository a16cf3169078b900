//! Transport-hygiene security: rate limiting and generic payload
//! validation. Ambient stack carried despite spec Non-goals excluding
//! game-content validation — this module never looks at game content,
//! only frame shape (spec's AMBIENT STACK section).

pub mod input_validation;
pub mod rate_limiter;

pub use rate_limiter::RateLimiter;

#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    #[error("message too large: {0} bytes")]
    MessageTooLarge(usize),
    #[error("invalid message format: {0}")]
    InvalidMessageFormat(String),
    #[error("message content rejected")]
    MaliciousContent,
    #[error("rate limit exceeded")]
    RateLimited,
}
