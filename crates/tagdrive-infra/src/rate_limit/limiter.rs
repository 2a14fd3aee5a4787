use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Above this many tracked keys, fully refilled buckets are dropped on the next take.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone)]
struct Bucket {
    tokens: u32,
    capacity: u32,
    timeout: Duration,
    last_take: Instant,
}

impl Bucket {
    fn new(capacity: u32, timeout: Duration, now: Instant) -> Self {
        Self {
            tokens: capacity,
            capacity,
            timeout,
            last_take: now,
        }
    }

    /// One token comes back per `timeout` elapsed since the last successful take.
    fn refill(&mut self, now: Instant) {
        if self.tokens == self.capacity || self.timeout.is_zero() {
            self.tokens = self.capacity;
            return;
        }

        let elapsed = now.saturating_duration_since(self.last_take);
        let earned = (elapsed.as_nanos() / self.timeout.as_nanos()).min(u32::MAX as u128) as u32;
        self.tokens = self.tokens.saturating_add(earned).min(self.capacity);
    }

    fn try_take(&mut self, now: Instant) -> bool {
        self.refill(now);

        if self.tokens == 0 {
            return false;
        }
        self.tokens -= 1;
        self.last_take = now;
        true
    }

    fn is_full(&self) -> bool {
        self.tokens == self.capacity
    }
}

/// Token bucket per key (the client address) with integer refill.
///
/// A client that exhausts its `capacity` gets one more
/// attempt per `timeout` that passes without a successful take.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<String, Bucket>>>,
    capacity: u32,
    timeout: Duration,
}

impl RateLimiter {
    pub fn new(capacity: u32, timeout: Duration) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            capacity,
            timeout,
        }
    }

    /// Try to take a token for `key` without blocking.
    #[tracing::instrument(skip(self))]
    pub async fn take(&self, key: &str) -> bool {
        self.take_at(key, Instant::now()).await
    }

    async fn take_at(&self, key: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.lock().await;

        if buckets.len() > PRUNE_THRESHOLD {
            buckets.iter_mut().for_each(|(_, bucket)| bucket.refill(now));
            buckets.retain(|_, bucket| !bucket.is_full());
        }

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket::new(self.capacity, self.timeout, now));

        let taken = bucket.try_take(now);
        if taken {
            tracing::trace!(key = %key, tokens_remaining = bucket.tokens, "Rate limit token taken");
        } else {
            tracing::debug!(key = %key, "Rate limit reached");
        }
        taken
    }

    /// Number of keys currently tracked.
    pub async fn tracked_keys(&self) -> usize {
        self.buckets.lock().await.len()
    }
}
