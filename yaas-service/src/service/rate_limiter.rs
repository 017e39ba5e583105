//! # Rate Limiter
//!
//! Per-IP x per-endpoint token bucket (spec §4.7). A visitor map keyed
//! `"ip:endpoint"` holds one [`governor`] limiter plus a last-seen
//! timestamp; a background sweeper evicts idle entries so the map doesn't
//! grow unbounded across the service's lifetime.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use governor::clock::{Clock, DefaultClock};
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use shared::config::{RateLimitConfig, RateLimitRule};
use shared::errors::ApiError;
use tokio::sync::Mutex;
use tracing::debug;

type DirectLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

struct VisitorEntry {
    limiter: Arc<DirectLimiter>,
    last_seen: Instant,
    /// Seconds to wait before retrying, precomputed from the rule so a 429
    /// response doesn't need to touch `governor`'s internals again.
    retry_after_seconds: u64,
}

/// Per-IP x per-endpoint token-bucket limiter with a background sweeper.
///
/// Clone is cheap: the visitor map lives behind an `Arc<Mutex<_>>`, so
/// every handler can hold its own `RateLimiter` value.
#[derive(Clone)]
pub struct RateLimiter {
    config: Arc<RateLimitConfig>,
    visitors: Arc<Mutex<HashMap<String, VisitorEntry>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self { config: Arc::new(config), visitors: Arc::new(Mutex::new(HashMap::new())) }
    }

    fn rule_for(&self, endpoint: &str) -> &RateLimitRule {
        self.config.endpoints.get(endpoint).unwrap_or(&self.config.default)
    }

    /// Checks and consumes one token for `ip` on `endpoint`. Creates the
    /// bucket on first use (spec §4.7: `getOrCreate(key)`).
    ///
    /// # Errors
    ///
    /// `ApiError::RateLimited { retry_after_seconds }` when the bucket is
    /// exhausted; callers surface this as `429` with a `Retry-After`
    /// header (spec §6.1, §8 property 6).
    pub async fn check(&self, ip: &str, endpoint: &str) -> Result<(), ApiError> {
        let key = format!("{ip}:{endpoint}");
        let mut visitors = self.visitors.lock().await;

        let entry = match visitors.get_mut(&key) {
            Some(entry) => entry,
            None => {
                let rule = self.rule_for(endpoint);
                let quota = quota_for(rule);
                visitors.insert(
                    key.clone(),
                    VisitorEntry {
                        limiter: Arc::new(GovernorRateLimiter::direct(quota)),
                        last_seen: Instant::now(),
                        retry_after_seconds: retry_after_for(rule),
                    },
                );
                visitors.get_mut(&key).expect("just inserted")
            }
        };

        entry.last_seen = Instant::now();

        match entry.limiter.check() {
            Ok(()) => Ok(()),
            Err(_not_until) => {
                debug!(ip, endpoint, "rate limit exceeded");
                Err(ApiError::RateLimited { retry_after_seconds: entry.retry_after_seconds })
            }
        }
    }

    /// Evicts entries whose `last_seen` is older than the configured
    /// cleanup interval. Intended to run on a fixed period from a
    /// `tokio::spawn`'d background task for the lifetime of the process.
    pub async fn sweep(&self) {
        let ttl = Duration::from_secs(self.config.cleanup_interval_seconds);
        let now = Instant::now();
        let mut visitors = self.visitors.lock().await;
        let before = visitors.len();
        visitors.retain(|_, entry| now.duration_since(entry.last_seen) < ttl);
        let evicted = before - visitors.len();
        if evicted > 0 {
            debug!(evicted, "swept idle rate-limit visitors");
        }
    }

    /// Runs [`Self::sweep`] forever on the configured interval. Meant to
    /// be `tokio::spawn`'d once at startup.
    pub async fn run_sweeper(self) {
        let interval = Duration::from_secs(self.config.cleanup_interval_seconds.max(1));
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            self.sweep().await;
        }
    }
}

fn quota_for(rule: &RateLimitRule) -> Quota {
    let rate = NonZeroU32::new(rule.requests_per_second.max(1)).expect("clamped to at least 1");
    let burst = NonZeroU32::new(rule.burst.max(1)).expect("clamped to at least 1");
    Quota::per_second(rate).allow_burst(burst)
}

/// `ceil(1 / rate)` seconds (spec §4.7).
fn retry_after_for(rule: &RateLimitRule) -> u64 {
    let rate = rule.requests_per_second.max(1) as f64;
    (1.0 / rate).ceil() as u64
}

/// Resolves the client IP for rate-limiting purposes following spec
/// §4.7's precedence: `X-Forwarded-For` (first hop, trimmed) →
/// `X-Real-IP` → the connection's remote address.
pub fn resolve_client_ip(
    forwarded_for: Option<&str>,
    real_ip: Option<&str>,
    remote_addr: Option<&str>,
) -> String {
    if let Some(forwarded) = forwarded_for {
        if let Some(first) = forwarded.split(',').next() {
            let trimmed = first.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }

    if let Some(real_ip) = real_ip {
        let trimmed = real_ip.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    match remote_addr {
        Some(addr) => addr.rsplit_once(':').map(|(host, _port)| host).unwrap_or(addr).to_string(),
        None => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RateLimitConfig {
        RateLimitConfig {
            default: RateLimitRule { requests_per_second: 2, burst: 2 },
            endpoints: HashMap::new(),
            cleanup_interval_seconds: 300,
        }
    }

    #[tokio::test]
    async fn allows_requests_within_burst_then_denies() {
        let limiter = RateLimiter::new(config());
        limiter.check("1.1.1.1", "login").await.unwrap();
        limiter.check("1.1.1.1", "login").await.unwrap();

        let result = limiter.check("1.1.1.1", "login").await;
        assert!(matches!(result, Err(ApiError::RateLimited { retry_after_seconds: 1 })));
    }

    #[tokio::test]
    async fn different_ips_have_independent_buckets() {
        let limiter = RateLimiter::new(config());
        limiter.check("1.1.1.1", "login").await.unwrap();
        limiter.check("1.1.1.1", "login").await.unwrap();
        // A second IP against the same endpoint must not be affected.
        limiter.check("2.2.2.2", "login").await.unwrap();
    }

    #[tokio::test]
    async fn different_endpoints_have_independent_buckets() {
        let limiter = RateLimiter::new(config());
        limiter.check("1.1.1.1", "login").await.unwrap();
        limiter.check("1.1.1.1", "login").await.unwrap();
        limiter.check("1.1.1.1", "register").await.unwrap();
    }

    #[tokio::test]
    async fn sweep_evicts_idle_entries() {
        let mut cfg = config();
        cfg.cleanup_interval_seconds = 0;
        let limiter = RateLimiter::new(cfg);
        limiter.check("1.1.1.1", "login").await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        limiter.sweep().await;

        assert!(limiter.visitors.lock().await.is_empty());
    }

    #[test]
    fn resolve_client_ip_prefers_forwarded_for() {
        let ip = resolve_client_ip(Some("203.0.113.5, 10.0.0.1"), Some("10.0.0.2"), Some("127.0.0.1:9090"));
        assert_eq!(ip, "203.0.113.5");
    }

    #[test]
    fn resolve_client_ip_falls_back_to_real_ip() {
        let ip = resolve_client_ip(None, Some("10.0.0.2"), Some("127.0.0.1:9090"));
        assert_eq!(ip, "10.0.0.2");
    }

    #[test]
    fn resolve_client_ip_falls_back_to_remote_addr_host() {
        let ip = resolve_client_ip(None, None, Some("127.0.0.1:9090"));
        assert_eq!(ip, "127.0.0.1");
    }
}
