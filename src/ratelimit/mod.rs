pub mod memory;
pub mod upstash;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::config::RateLimitSettings;
use crate::error::Result;

pub use memory::MemoryRateLimiter;
pub use upstash::UpstashRateLimiter;

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Decision for the `count`-th hit inside a window that resets in `reset_in`.
    pub fn from_count(count: u64, limit: u32, reset_in: Duration) -> Self {
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        Self {
            allowed: count <= limit,
            remaining: limit.saturating_sub(count),
            reset_at: Utc::now()
                + chrono::Duration::from_std(reset_in).unwrap_or_else(|_| chrono::Duration::zero()),
        }
    }
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Counts one hit against `key` and reports whether it is within `limit`.
    async fn hit(&self, key: &str, limit: u32, window: Duration) -> Result<RateLimitDecision>;
}

/// Outcome of the per-email and per-IP checks for one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionCheck {
    pub email_allowed: bool,
    pub ip_allowed: bool,
}

impl SubmissionCheck {
    pub fn allowed(&self) -> bool {
        self.email_allowed && self.ip_allowed
    }
}

/// Applies the limit to both hashes under `scope`. Both counters are always
/// hit. A backend failure lets the submission through.
pub async fn check_submission(
    limiter: &dyn RateLimiter,
    settings: &RateLimitSettings,
    scope: &str,
    email_hash: &str,
    ip_hash: &str,
) -> SubmissionCheck {
    let window = Duration::from_secs(settings.window_secs);
    let email_key = format!("ratelimit:{}:email:{}", scope, email_hash);
    let ip_key = format!("ratelimit:{}:ip:{}", scope, ip_hash);

    let (email, ip) = tokio::join!(
        limiter.hit(&email_key, settings.max_requests, window),
        limiter.hit(&ip_key, settings.max_requests, window),
    );

    let allowed = |result: Result<RateLimitDecision>, which: &str| match result {
        Ok(decision) => decision.allowed,
        Err(e) => {
            log::error!("Rate limiter unavailable for {} check, allowing: {}", which, e);
            true
        }
    };

    SubmissionCheck {
        email_allowed: allowed(email, "email"),
        ip_allowed: allowed(ip, "ip"),
    }
}
