use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::error::AppError;

/// Windows tracked before stale ones are pruned.
const MAX_TRACKED_WINDOWS: usize = 10_000;

/// Fixed-window limiter for live-view reads, keyed by pair code.
#[derive(Clone)]
pub struct ViewRateLimiter {
    state: Arc<Mutex<HashMap<String, RateWindow>>>,
    window: Duration,
    limit: u32,
    metrics: Arc<RateLimitMetrics>,
}

#[derive(Default)]
struct RateLimitMetrics {
    views_allowed: AtomicU64,
    views_limited: AtomicU64,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct RateLimitMetricsSnapshot {
    pub views_allowed: u64,
    pub views_limited: u64,
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    started_at: Instant,
    count: u32,
}

impl ViewRateLimiter {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.view_rate_limit_window,
            config.view_rate_limit_per_window,
        )
    }

    fn new(window: Duration, limit: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(HashMap::new())),
            window,
            limit,
            metrics: Arc::new(RateLimitMetrics::default()),
        }
    }

    pub async fn check(&self, pair_code: &str) -> Result<(), AppError> {
        let now = Instant::now();
        let mut guard = self.state.lock().await;
        if guard.len() >= MAX_TRACKED_WINDOWS {
            let window = self.window;
            guard.retain(|_, entry| now.duration_since(entry.started_at) < window);
        }

        let entry = guard.entry(pair_code.to_string()).or_insert(RateWindow {
            started_at: now,
            count: 0,
        });

        if now.duration_since(entry.started_at) >= self.window {
            entry.started_at = now;
            entry.count = 0;
        }

        if entry.count >= self.limit {
            let retry_after_secs = self
                .window
                .saturating_sub(now.duration_since(entry.started_at))
                .as_secs();
            self.metrics.views_limited.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                pair = code_fingerprint(pair_code),
                retry_after_secs,
                "View rate limit exceeded"
            );
            return Err(AppError::too_many_requests(
                "Rate limit exceeded for shift view",
                retry_after_secs,
            ));
        }

        entry.count += 1;
        self.metrics.views_allowed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn metrics_snapshot(&self) -> RateLimitMetricsSnapshot {
        RateLimitMetricsSnapshot {
            views_allowed: self.metrics.views_allowed.load(Ordering::Relaxed),
            views_limited: self.metrics.views_limited.load(Ordering::Relaxed),
        }
    }
}

/// Pair codes grant read access, so logs only carry a hash.
pub fn code_fingerprint(pair_code: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    pair_code.hash(&mut hasher);
    hasher.finish()
}
