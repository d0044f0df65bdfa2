//! Per-dimension fixed-window rate limiter.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace};

use crate::clock::Clock;
use crate::error::{QuotagateError, Result};

use super::store::{CounterEntry, WindowCounterStore};

/// One independent axis of quota enforcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Ip,
    User,
    Endpoint,
    Tenant,
}

impl Dimension {
    /// Stable lowercase name, used in denial messages and stats.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Ip => "ip",
            Dimension::User => "user",
            Dimension::Endpoint => "endpoint",
            Dimension::Tenant => "tenant",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Limit configuration for one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionPolicy {
    /// Maximum requests admitted per window.
    pub limit: u32,
    /// Fixed window duration.
    pub window: Duration,
}

impl DimensionPolicy {
    /// Create a policy, failing fast on a non-positive limit or window.
    pub fn new(limit: u32, window: Duration) -> Result<Self> {
        let policy = Self { limit, window };
        policy.validate()?;
        Ok(policy)
    }

    /// Reject non-positive limits and windows at construction time rather
    /// than degrading to unlimited traffic at request time.
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(QuotagateError::Config(
                "rate limit must be a positive integer".to_string(),
            ));
        }
        if self.window.is_zero() {
            return Err(QuotagateError::Config(
                "rate limit window must be a positive duration".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of one quota check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request is admitted.
    pub allowed: bool,
    /// The binding limit for the reported dimension.
    pub limit: u32,
    /// Quota left in the current window, never negative.
    pub remaining: u32,
    /// Instant at which the reported window resets.
    pub reset_at: Instant,
    /// Set on denial to the dimension that rejected the request.
    pub violated_dimension: Option<Dimension>,
    /// Human-readable denial reason; absent on admission.
    pub message: Option<String>,
}

impl Decision {
    /// Time until the reported window resets, for `Retry-After`-style hints.
    pub fn retry_after(&self, now: Instant) -> Duration {
        self.reset_at.saturating_duration_since(now)
    }
}

/// Fixed-window limiter for a single dimension.
///
/// Wraps one [`WindowCounterStore`] behind a mutex so that concurrent
/// checks on the same key serialize their read-modify-write and never lose
/// an increment. Each `check()` is a bounded in-memory computation; nothing
/// here blocks on I/O or awaits.
pub struct DimensionLimiter {
    dimension: Dimension,
    store: Mutex<WindowCounterStore>,
    clock: Arc<dyn Clock>,
}

impl DimensionLimiter {
    /// Create a limiter over a store bounded to `capacity` entries with the
    /// given TTL.
    pub fn new(
        dimension: Dimension,
        capacity: usize,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            dimension,
            store: Mutex::new(WindowCounterStore::new(capacity, ttl)),
            clock,
        }
    }

    /// The dimension this limiter enforces.
    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    /// Count one request against `key` under `policy` and decide admission.
    ///
    /// Fixed-window semantics: the first request for a key (or the first
    /// after the window closes) opens a new window with `count = 1`. The
    /// request that brings `count` to exactly `limit` is still admitted;
    /// the next one is denied. A request arriving at exactly the reset
    /// instant belongs to the new window.
    pub fn check(&self, key: &str, policy: &DimensionPolicy) -> Decision {
        let now = self.clock.now();
        let mut store = self.store.lock();

        trace!(dimension = %self.dimension, key = %key, "Checking rate limit");

        #[derive(Clone, Copy)]
        enum Lookup {
            InWindow { count: u32, reset_at: Instant },
            RolledOver,
            Absent,
        }

        let lookup = match store.get_mut(key, now) {
            Some(entry) if now < entry.window_reset_at => {
                entry.count += 1;
                entry.last_seen_at = now;
                Lookup::InWindow {
                    count: entry.count,
                    reset_at: entry.window_reset_at,
                }
            }
            Some(_) => Lookup::RolledOver,
            None => Lookup::Absent,
        };

        if let Lookup::InWindow { count, reset_at } = lookup {
            drop(store);
            return self.decide(key, count, reset_at, policy);
        }

        // New key, or the previous window has closed: open a fresh window
        // counting the triggering request itself.
        let entry = CounterEntry {
            count: 1,
            window_reset_at: now + policy.window,
            last_seen_at: now,
        };
        store.set(key, entry);
        drop(store);

        if matches!(lookup, Lookup::RolledOver) {
            debug!(dimension = %self.dimension, key = %key, "Window rolled over");
        } else {
            debug!(
                dimension = %self.dimension,
                key = %key,
                limit = policy.limit,
                window_ms = policy.window.as_millis() as u64,
                "Creating new rate limit counter"
            );
        }

        Decision {
            allowed: true,
            limit: policy.limit,
            remaining: policy.limit.saturating_sub(1),
            reset_at: entry.window_reset_at,
            violated_dimension: None,
            message: None,
        }
    }

    fn decide(&self, key: &str, count: u32, reset_at: Instant, policy: &DimensionPolicy) -> Decision {
        let allowed = count <= policy.limit;
        let message = if allowed {
            None
        } else {
            debug!(
                dimension = %self.dimension,
                key = %key,
                count = count,
                limit = policy.limit,
                "Rate limit exceeded"
            );
            Some(format!(
                "{} limit exceeded ({}/{})",
                self.dimension, count, policy.limit
            ))
        };

        Decision {
            allowed,
            limit: policy.limit,
            remaining: policy.limit.saturating_sub(count),
            reset_at,
            violated_dimension: if allowed { None } else { Some(self.dimension) },
            message,
        }
    }

    /// Current count for a key, without charging it or touching the window.
    ///
    /// Returns `None` if no counter exists for the key.
    pub fn current_count(&self, key: &str) -> Option<u32> {
        let now = self.clock.now();
        self.store.lock().get(key, now).map(|e| e.count)
    }

    /// Remove all counters for this dimension.
    pub fn clear(&self) {
        self.store.lock().clear();
    }

    /// Number of live counters.
    pub fn entry_count(&self) -> usize {
        self.store.lock().len()
    }

    /// Coarse estimate of resident bytes for this dimension's store.
    pub fn approx_bytes(&self) -> usize {
        self.store.lock().approx_bytes()
    }
}
