//! Client-side rate limiter for the Carbon Intensity API.
//!
//! A full refresh issues one request per (operation, region) pair, so the
//! limiter keeps a cycle from bursting dozens of requests at once.

use governor::{Quota, RateLimiter as GovLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;

type DirectLimiter = GovLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Single shared bucket; the upstream API is read-only.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    limiter: Arc<DirectLimiter>,
}

impl RateLimiter {
    /// Create with the given per-second limit (0 is treated as 1).
    pub fn per_second(requests_per_sec: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(requests_per_sec).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: Arc::new(GovLimiter::direct(quota)),
        }
    }

    /// Take a request slot, waiting for one if the bucket is empty.
    pub async fn wait(&self) {
        if !self.try_acquire() {
            debug!("Rate limit reached, waiting for a request slot");
            self.limiter.until_ready().await;
        }
    }

    /// Try to acquire a slot without waiting. Returns true if acquired.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}
