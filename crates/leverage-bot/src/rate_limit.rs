//! Per-sender rate limiting for inbound messages

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;

/// Token bucket keyed by sender id
pub struct SenderRateLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
}

impl SenderRateLimiter {
    /// Allow `limit` messages per minute per sender, with bursts up to `limit`
    pub fn per_minute(limit: NonZeroU32) -> Self {
        Self {
            limiter: RateLimiter::keyed(Quota::per_minute(limit)),
        }
    }

    /// Returns `true` if `sender` may be served right now
    pub fn check(&self, sender: &str) -> bool {
        self.limiter.check_key(&sender.to_string()).is_ok()
    }

    /// Drop buckets that have fully refilled
    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
    }

    /// Number of senders currently tracked
    pub fn tracked(&self) -> usize {
        self.limiter.len()
    }
}

impl std::fmt::Debug for SenderRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderRateLimiter")
            .field("tracked", &self.tracked())
            .finish()
    }
}
