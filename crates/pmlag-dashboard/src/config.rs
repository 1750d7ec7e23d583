//! Presenter configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Presenter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenterConfig {
    /// Status line refresh interval in milliseconds.
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,
    /// Port for `/api/snapshot`, `/metrics` and `/health`. Disabled when unset.
    #[serde(default)]
    pub http_port: Option<u16>,
}

fn default_refresh_ms() -> u64 {
    1000
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self {
            refresh_ms: default_refresh_ms(),
            http_port: None,
        }
    }
}

impl PresenterConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_ms.max(1))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.refresh_ms == 0 {
            return Err("presenter.refresh_ms must be > 0".to_string());
        }
        Ok(())
    }
}
