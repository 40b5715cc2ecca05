//! Engine and host configuration, loaded from a JSON file.
//!
//! ```text
//! {
//!   "defaultSurfaceId": "main",
//!   "pruneDeletedSurfaces": false,
//!   "retry": {"maxRetries": 3, "retryDelayMs": 1000},
//!   "transport": {
//!     "endpoint": "http://localhost:4111/",
//!     "agentId": "a2uiAgent",
//!     "autoBeginRendering": true
//!   }
//! }
//! ```
//!
//! Every field is optional. `A2UI_AGENT_URL` overrides `transport.endpoint`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use super::error::{A2uiError, Result};
use super::transport::RetryOptions;

/// Environment variable holding the agent server base URL.
pub const AGENT_URL_ENV: &str = "A2UI_AGENT_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Surface used when an agent omits the id of an auto-begun surface
    pub default_surface_id: String,

    /// Drop surfaces from the engine once deleted, instead of keeping them empty
    pub prune_deleted_surfaces: bool,

    pub retry: RetryConfig,

    pub transport: TransportConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            default_surface_id: "main".to_string(),
            prune_deleted_surfaces: false,
            retry: RetryConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportConfig {
    /// Agent server base URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Url>,

    pub agent_id: String,

    pub auto_begin_rendering: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            endpoint: None,
            agent_id: "a2uiAgent".to_string(),
            auto_begin_rendering: true,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| A2uiError::Config(e.to_string()))
    }

    /// Read a config file. A missing file yields the defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            ::log::debug!("[A2UI config] {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Apply `A2UI_AGENT_URL` if it is set and not empty.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        match std::env::var(AGENT_URL_ENV) {
            Ok(url) if !url.is_empty() => self.set_endpoint(&url),
            _ => Ok(()),
        }
    }

    pub fn set_endpoint(&mut self, url: &str) -> Result<()> {
        let url = Url::parse(url)
            .map_err(|e| A2uiError::Config(format!("invalid endpoint {:?}: {}", url, e)))?;
        self.transport.endpoint = Some(url);
        Ok(())
    }

    pub fn retry_options(&self) -> RetryOptions {
        RetryOptions {
            max_retries: self.retry.max_retries,
            retry_delay: Duration::from_millis(self.retry.retry_delay_ms),
            on_retry: None,
        }
    }
}
