use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Client-side request pacing shared by every task of an executor.
#[derive(Clone)]
pub struct RequestThrottle {
    limiter: Arc<DirectRateLimiter>,
    rate: NonZeroU32,
}

impl RequestThrottle {
    /// Allows `per_second` requests per second, with a burst of the same size.
    pub fn per_second(per_second: NonZeroU32) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
            rate: per_second,
        }
    }

    pub fn rate(&self) -> NonZeroU32 {
        self.rate
    }

    /// Takes one cell of budget if available right now.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    /// Waits until one cell of budget is available.
    pub async fn until_ready(&self) {
        self.limiter.until_ready().await;
    }
}

impl std::fmt::Debug for RequestThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestThrottle")
            .field("rate", &self.rate)
            .finish()
    }
}
