//! Rate Limiter
//!
//! Token buckets keyed by an arbitrary string (the login e-mail). Each key gets
//! its own bucket on first use; buckets that have refilled completely are
//! forgotten by `purge`, and swept eagerly once too many keys pile up.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Bucket count that triggers a sweep inside `check`.
const SWEEP_THRESHOLD: usize = 4096;

struct TokenBucket {
    tokens: u32,
    last_refill: Instant,
}

impl TokenBucket {
    fn full(max_tokens: u32) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, max_tokens: u32, refill_every: Duration) {
        let refills = (self.last_refill.elapsed().as_secs_f64() / refill_every.as_secs_f64()) as u32;
        if refills > 0 {
            self.tokens = self.tokens.saturating_add(refills).min(max_tokens);
            self.last_refill = Instant::now();
        }
    }

    /// Indistinguishable from a fresh bucket.
    fn is_full(&mut self, max_tokens: u32, refill_every: Duration) -> bool {
        self.refill(max_tokens, refill_every);
        self.tokens >= max_tokens
    }

    fn try_consume(&mut self, max_tokens: u32, refill_every: Duration) -> bool {
        self.refill(max_tokens, refill_every);

        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }
}

pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    max_tokens: u32,
    refill_every: Duration,
}

impl RateLimiter {
    pub fn new(max_tokens: u32, refill_every: Duration) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            max_tokens,
            refill_every,
        }
    }

    /// 5 attempts, one regained every 60 seconds.
    pub fn for_logins() -> Self {
        Self::new(5, Duration::from_secs(60))
    }

    /// Consume one token for `key`; false when the bucket is empty.
    pub async fn check(&self, key: &str) -> bool {
        let key = key.trim().to_lowercase();
        let mut buckets = self.buckets.lock().await;
        if buckets.len() >= SWEEP_THRESHOLD {
            let (max_tokens, refill_every) = (self.max_tokens, self.refill_every);
            buckets.retain(|_, bucket| !bucket.is_full(max_tokens, refill_every));
        }
        buckets
            .entry(key)
            .or_insert_with(|| TokenBucket::full(self.max_tokens))
            .try_consume(self.max_tokens, self.refill_every)
    }

    /// Forget a key, e.g. after a successful login.
    pub async fn reset(&self, key: &str) {
        self.buckets.lock().await.remove(&key.trim().to_lowercase());
    }

    /// Drop every bucket that has refilled completely, returns how many went.
    pub async fn purge(&self) -> usize {
        let (max_tokens, refill_every) = (self.max_tokens, self.refill_every);
        let mut buckets = self.buckets.lock().await;
        let before = buckets.len();
        buckets.retain(|_, bucket| !bucket.is_full(max_tokens, refill_every));
        before - buckets.len()
    }

    /// Number of keys currently tracked.
    pub async fn tracked(&self) -> usize {
        self.buckets.lock().await.len()
    }
}
