use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::IpBlockConfig;
use crate::storage::{KeyValueStore, KeyedLocks};
use crate::utils::error::Result;

/// Storage namespace for per-IP attempt counters
pub(crate) const KEY_PREFIX: &str = "webguard.ipblock.";

/// Per-IP failed-attempt record.
///
/// Invariant: once `attempts` reaches the configured maximum, `blocked_until`
/// is set to now + block duration; once that instant has elapsed the record
/// resets to zero attempts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IpBlockRecord {
    attempts: u32,
    blocked_until: Option<i64>,
}

/// Failed-attempt tracker with timed blocking, keyed by IP string.
///
/// Like the rate limiter this is an advisory client-side gate; it shares no
/// state across instances and must not be the sole enforcement point.
pub struct IpBlockGuard {
    store: Arc<dyn KeyValueStore>,
    locks: KeyedLocks,
}

impl IpBlockGuard {
    /// Create an IP block guard over the given store
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    /// Record one failed attempt for `ip`. Returns `true` when the record is
    /// in a blocked state after the increment. Storage failures fail closed.
    pub fn record_failed_attempt(&self, ip: &str, config: &IpBlockConfig) -> bool {
        match self.increment(ip, config) {
            Ok(blocked) => blocked,
            Err(e) => {
                warn!(ip, error = %e, "failed to record attempt");
                true
            }
        }
    }

    /// Check whether requests from `ip` are currently allowed.
    ///
    /// A never-seen IP is always allowed; an elapsed block resets the
    /// attempt counter to zero.
    pub fn check_ip_block(&self, ip: &str, config: &IpBlockConfig) -> bool {
        match self.check_and_reset(ip, config) {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!(ip, error = %e, "ip block check failed");
                false
            }
        }
    }

    /// Drop the attempt record for `ip`
    pub fn clear_attempts(&self, ip: &str) -> Result<()> {
        let lock = self.locks.lock_for(ip)?;
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        self.store.remove(&format!("{}{}", KEY_PREFIX, ip))
    }

    fn increment(&self, ip: &str, config: &IpBlockConfig) -> Result<bool> {
        let storage_key = format!("{}{}", KEY_PREFIX, ip);
        let lock = self.locks.lock_for(ip)?;
        // Increment and threshold check are one atomic turn per key
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut record = self.load(&storage_key)?;
        record.attempts += 1;

        if record.attempts >= config.max_attempts && record.blocked_until.is_none() {
            let until = Utc::now().timestamp_millis() + config.block_duration_ms as i64;
            record.blocked_until = Some(until);
            warn!(
                ip,
                attempts = record.attempts,
                "blocking after repeated failed attempts"
            );
        }

        let blocked = record.blocked_until.is_some();
        self.store
            .set(&storage_key, &serde_json::to_string(&record)?)?;
        Ok(blocked)
    }

    fn check_and_reset(&self, ip: &str, config: &IpBlockConfig) -> Result<bool> {
        let storage_key = format!("{}{}", KEY_PREFIX, ip);
        let lock = self.locks.lock_for(ip)?;
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let Some(raw) = self.store.get(&storage_key)? else {
            return Ok(true);
        };
        let mut record: IpBlockRecord = serde_json::from_str(&raw).unwrap_or_default();

        // Enforce the record invariant even if the threshold was reached
        // under a previous, looser configuration
        if record.blocked_until.is_none() && record.attempts >= config.max_attempts {
            record.blocked_until =
                Some(Utc::now().timestamp_millis() + config.block_duration_ms as i64);
            self.store
                .set(&storage_key, &serde_json::to_string(&record)?)?;
        }

        match record.blocked_until {
            None => Ok(true),
            Some(until) => {
                let now = Utc::now().timestamp_millis();
                if now >= until {
                    debug!(ip, "block elapsed, resetting attempts");
                    self.store
                        .set(&storage_key, &serde_json::to_string(&IpBlockRecord::default())?)?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    fn load(&self, storage_key: &str) -> Result<IpBlockRecord> {
        Ok(match self.store.get(storage_key)? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            None => IpBlockRecord::default(),
        })
    }
}
