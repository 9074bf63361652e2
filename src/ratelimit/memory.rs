use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::{RateLimitDecision, RateLimiter};
use crate::error::Result;

/// Entries beyond this count trigger a sweep of expired windows.
const PRUNE_THRESHOLD: usize = 1024;

struct Window {
    count: u64,
    resets: Instant,
}

/// Single-process limiter. Not shared between instances, so only suitable
/// outside production.
#[derive(Default)]
pub struct MemoryRateLimiter {
    windows: Mutex<HashMap<String, Window>>,
}

impl MemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().len()
    }

    fn record(&self, key: &str, limit: u32, window: Duration, now: Instant) -> RateLimitDecision {
        let mut windows = self.windows.lock();
        if windows.len() >= PRUNE_THRESHOLD {
            windows.retain(|_, w| w.resets > now);
        }

        let entry = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            resets: now + window,
        });
        if entry.resets <= now {
            entry.count = 0;
            entry.resets = now + window;
        }
        entry.count += 1;

        RateLimitDecision::from_count(entry.count, limit, entry.resets - now)
    }
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn hit(&self, key: &str, limit: u32, window: Duration) -> Result<RateLimitDecision> {
        Ok(self.record(key, limit, window, Instant::now()))
    }
}
