use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::config::RateLimitConfig;
use crate::storage::{KeyValueStore, KeyedLocks};
use crate::utils::error::Result;

/// Storage namespace for per-endpoint request logs
pub(crate) const KEY_PREFIX: &str = "webguard.rate.";

/// Sliding-window request throttle, keyed by logical endpoint name.
///
/// Each key maps to the ordered timestamps of its admitted requests; entries
/// older than the window are pruned lazily on every check. This is an
/// advisory client-side gate with no cross-instance state; real abuse
/// prevention has to be enforced server-side as well.
pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
    locks: KeyedLocks,
}

impl RateLimiter {
    /// Create a rate limiter over the given store
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    /// Check whether a request for `key` is admitted right now.
    ///
    /// Admitted requests consume a window slot; rejected requests do not, so
    /// repeated rejected probes cannot starve the key indefinitely. Storage
    /// failures fail closed.
    pub fn check_rate_limit(&self, key: &str, config: &RateLimitConfig) -> bool {
        match self.check_and_record(key, config) {
            Ok(allowed) => {
                if !allowed {
                    debug!(key, "request rejected by rate limit");
                }
                allowed
            }
            Err(e) => {
                warn!(key, error = %e, "rate limit check failed");
                false
            }
        }
    }

    /// Drop the request log for `key`
    pub fn reset(&self, key: &str) -> Result<()> {
        let lock = self.locks.lock_for(key)?;
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        self.store.remove(&format!("{}{}", KEY_PREFIX, key))
    }

    fn check_and_record(&self, key: &str, config: &RateLimitConfig) -> Result<bool> {
        let storage_key = format!("{}{}", KEY_PREFIX, key);
        let lock = self.locks.lock_for(key)?;
        // The prune/check/append sequence must be one atomic turn per key
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let now = Utc::now().timestamp_millis();
        let mut admitted: Vec<i64> = match self.store.get(&storage_key)? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            None => Vec::new(),
        };

        let window = config.window_ms as i64;
        admitted.retain(|&t| now - t < window);

        let allowed = admitted.len() < config.max_requests as usize;
        if allowed {
            admitted.push(now);
        }
        self.store
            .set(&storage_key, &serde_json::to_string(&admitted)?)?;

        Ok(allowed)
    }
}
