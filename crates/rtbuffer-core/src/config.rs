use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default initial capacity of the sample byte storage (64 KiB).
pub const DEFAULT_INITIAL_SAMPLE_BYTES: usize = 64 * 1024;

/// Default initial capacity of the event list.
pub const DEFAULT_INITIAL_EVENTS: usize = 64;

/// Default slice length for blocking waits, in milliseconds.
pub const DEFAULT_WAIT_POLL_INTERVAL_MS: u64 = 100;

/// Tuning knobs for [`BufferStore`](crate::BufferStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Bytes reserved for samples when a header is written.
    pub initial_sample_bytes: usize,
    /// Event slots reserved when a header is written.
    pub initial_events: usize,
    /// How often a blocked wait wakes to consult its cancel probe.
    pub wait_poll_interval_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            initial_sample_bytes: DEFAULT_INITIAL_SAMPLE_BYTES,
            initial_events: DEFAULT_INITIAL_EVENTS,
            wait_poll_interval_ms: DEFAULT_WAIT_POLL_INTERVAL_MS,
        }
    }
}

impl StoreConfig {
    /// Poll interval as a [`Duration`], never shorter than 1 ms.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.wait_poll_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: StoreConfig = serde_json::from_str(r#"{"initial_events": 8}"#).unwrap();
        assert_eq!(cfg.initial_events, 8);
        assert_eq!(cfg.initial_sample_bytes, DEFAULT_INITIAL_SAMPLE_BYTES);
        assert_eq!(cfg.poll_interval(), Duration::from_millis(100));
    }

    #[test]
    fn misspelled_field_is_rejected() {
        let err = serde_json::from_str::<StoreConfig>(r#"{"initial_event": 8}"#).unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn zero_poll_interval_is_clamped() {
        let cfg = StoreConfig {
            wait_poll_interval_ms: 0,
            ..StoreConfig::default()
        };
        assert_eq!(cfg.poll_interval(), Duration::from_millis(1));
    }
}
