use std::path::Path;
use std::time::Duration;

use rtbuffer_core::StoreConfig;
use rtbuffer_frame::{FrameConfig, DEFAULT_MAX_PAYLOAD};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};

/// Server tuning, loadable from a JSON file.
///
/// ```json
/// {
///   "max_payload_size": 67108864,
///   "write_timeout_ms": 5000,
///   "store": { "initial_sample_bytes": 1048576, "wait_poll_interval_ms": 50 }
/// }
/// ```
///
/// Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Largest request payload a session accepts.
    pub max_payload_size: usize,
    /// Idle time after which a session is dropped. `None` keeps idle
    /// clients forever.
    pub read_timeout_ms: Option<u64>,
    /// Bound on writing one response.
    pub write_timeout_ms: Option<u64>,
    pub store: StoreConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout_ms: None,
            write_timeout_ms: Some(5_000),
            store: StoreConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|err| ServerError::Config(err.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| ServerError::Config(format!("{}: {err}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|err| ServerError::Config(format!("{}: {err}", path.display())))
    }

    /// Frame limits applied to every session.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_payload_size: self.max_payload_size,
            read_timeout: self.read_timeout_ms.map(Duration::from_millis),
            write_timeout: self.write_timeout_ms.map(Duration::from_millis),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_default() {
        assert_eq!(
            ServerConfig::from_json_str("{}").unwrap(),
            ServerConfig::default()
        );
    }

    #[test]
    fn nested_store_settings() {
        let cfg = ServerConfig::from_json_str(
            r#"{"max_payload_size": 1024, "store": {"wait_poll_interval_ms": 5}}"#,
        )
        .unwrap();
        assert_eq!(cfg.max_payload_size, 1024);
        assert_eq!(cfg.store.poll_interval(), Duration::from_millis(5));
        assert_eq!(cfg.frame_config().max_payload_size, 1024);
        assert_eq!(cfg.frame_config().read_timeout, None);
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(matches!(
            ServerConfig::from_json_str(r#"{"port": 1972}"#),
            Err(ServerError::Config(_))
        ));
        assert!(matches!(
            ServerConfig::from_json_str(r#"{"store": {"wait_poll_ms": 5}}"#),
            Err(ServerError::Config(_))
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ServerConfig::from_json_file("/nonexistent/rtbuffer.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/rtbuffer.json"));
    }
}
