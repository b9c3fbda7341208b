//! Log throttling
//!
//! A relay that loses its viewers hits the same write error for every packet.
//! [`LogThrottler`] lets one message per key through per interval and counts
//! the rest.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct Entry {
    last: Instant,
    suppressed: u64,
}

/// Limits how often the same message is logged
///
/// ```rust
/// use std::time::Duration;
/// use broadcast_relay::utils::LogThrottler;
///
/// let throttler = LogThrottler::new(Duration::from_secs(5));
/// assert!(throttler.should_log("write_failed"));
/// assert!(!throttler.should_log("write_failed"));
/// assert_eq!(throttler.suppressed("write_failed"), 1);
/// ```
pub struct LogThrottler {
    entries: Mutex<HashMap<String, Entry>>,
    interval: Duration,
}

impl LogThrottler {
    pub fn new(interval: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            interval,
        }
    }

    pub fn with_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Returns `true` if a message for `key` may be logged now
    ///
    /// A `true` result restarts the interval and resets the suppressed count.
    pub fn should_log(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        match entries.get_mut(key) {
            Some(entry) if now.duration_since(entry.last) < self.interval => {
                entry.suppressed += 1;
                false
            }
            Some(entry) => {
                entry.last = now;
                entry.suppressed = 0;
                true
            }
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        last: now,
                        suppressed: 0,
                    },
                );
                true
            }
        }
    }

    /// Messages dropped for `key` since it was last logged
    pub fn suppressed(&self, key: &str) -> u64 {
        self.entries
            .lock()
            .get(key)
            .map(|entry| entry.suppressed)
            .unwrap_or(0)
    }

    /// Forget `key`, so the next occurrence is logged immediately
    pub fn clear(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}

impl Default for LogThrottler {
    fn default() -> Self {
        Self::with_secs(5)
    }
}

/// Throttled `tracing::warn!`
///
/// ```rust
/// use broadcast_relay::utils::LogThrottler;
/// use broadcast_relay::warn_throttled;
///
/// let throttler = LogThrottler::default();
/// warn_throttled!(throttler, "relay_write", "Write failed: {}", "closed pipe");
/// ```
#[macro_export]
macro_rules! warn_throttled {
    ($throttler:expr, $key:expr, $($arg:tt)*) => {
        if $throttler.should_log($key) {
            tracing::warn!($($arg)*);
        }
    };
}
