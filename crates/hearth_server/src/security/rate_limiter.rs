//! Token bucket rate limiter, one bucket per IP. Nearly verbatim from
//! `game_server/src/security/rate_limiter.rs`.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

#[derive(Debug)]
pub struct RateLimiter {
    buckets: Arc<RwLock<HashMap<IpAddr, TokenBucket>>>,
    max_tokens: u32,
    refill_interval: Duration,
    blocked_count: Arc<std::sync::atomic::AtomicU64>,
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: u32,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(max_tokens: u32, refill_interval: Duration) -> Self {
        Self {
            buckets: Arc::new(RwLock::new(HashMap::new())),
            max_tokens,
            refill_interval,
            blocked_count: Arc::new(std::sync::atomic::AtomicU64::new(0)),
        }
    }

    pub async fn check_rate_limit(&self, ip: IpAddr) -> bool {
        let mut buckets = self.buckets.write().await;
        let now = Instant::now();

        let bucket = buckets.entry(ip).or_insert(TokenBucket {
            tokens: self.max_tokens,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill);
        if elapsed >= self.refill_interval {
            let intervals_passed = elapsed.as_millis() / self.refill_interval.as_millis().max(1);
            let tokens_to_add = (intervals_passed as u32).min(self.max_tokens - bucket.tokens);
            bucket.tokens = (bucket.tokens + tokens_to_add).min(self.max_tokens);
            bucket.last_refill = now;
        }

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            self.blocked_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            false
        }
    }

    pub async fn get_blocked_count(&self) -> u64 {
        self.blocked_count.load(std::sync::atomic::Ordering::Relaxed)
    }

    pub async fn cleanup_old_entries(&self) {
        let mut buckets = self.buckets.write().await;
        let cutoff = Instant::now() - Duration::from_secs(3600);
        buckets.retain(|_, bucket| bucket.last_refill > cutoff);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn allows_within_limit_then_blocks() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        let ip = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));

        for _ in 0..5 {
            assert!(limiter.check_rate_limit(ip).await);
        }
        assert!(!limiter.check_rate_limit(ip).await);
        assert_eq!(limiter.get_blocked_count().await, 1);
    }

    #[tokio::test]
    async fn refills_after_interval() {
        let limiter = RateLimiter::new(2, Duration::from_millis(50));
        let ip = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));

        assert!(limiter.check_rate_limit(ip).await);
        assert!(limiter.check_rate_limit(ip).await);
        assert!(!limiter.check_rate_limit(ip).await);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(limiter.check_rate_limit(ip).await);
    }
}
