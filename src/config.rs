//! # Client Configuration
//!
//! Settings for the bundled `reqwest` transport, loaded from environment
//! variables or a YAML file.
//!
//! ## Environment Variables
//!
//! ### `BRRTC_BASE_URL`
//!
//! Base URL that relative request paths are joined onto. Required unless
//! every method declares an absolute URL.
//!
//! ### `BRRTC_USER_AGENT`
//!
//! Default: `brrtclient/<crate version>`
//!
//! ### `BRRTC_TIMEOUT_MS` / `BRRTC_CONNECT_TIMEOUT_MS`
//!
//! Whole-request and connect timeouts in milliseconds. Unset means no
//! timeout beyond what `reqwest` applies.
//!
//! ### `BRRTC_DEFAULT_HEADERS`
//!
//! Headers sent with every request, as `Name: value` entries separated by
//! `;`. Declared headers still override them per request.
//!
//! ## Usage
//!
//! ```rust
//! use brrtclient::config::ClientConfig;
//!
//! let config = ClientConfig::from_env();
//! println!("Base URL: {:?}", config.base_url);
//! ```
//!
//! ## Example Configuration
//!
//! ```yaml
//! base_url: https://api.example.com/v1
//! timeout_ms: 30000
//! default_headers:
//!   Accept: application/json
//! ```

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use std::time::Duration;

/// Transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: Option<String>,
    pub user_agent: String,
    pub timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub default_headers: BTreeMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: None,
            user_agent: default_user_agent(),
            timeout_ms: None,
            connect_timeout_ms: None,
            default_headers: BTreeMap::new(),
        }
    }
}

fn default_user_agent() -> String {
    format!("brrtclient/{}", env!("CARGO_PKG_VERSION"))
}

impl ClientConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            base_url: non_empty("BRRTC_BASE_URL"),
            user_agent: non_empty("BRRTC_USER_AGENT").unwrap_or_else(default_user_agent),
            timeout_ms: non_empty("BRRTC_TIMEOUT_MS").and_then(|s| s.trim().parse().ok()),
            connect_timeout_ms: non_empty("BRRTC_CONNECT_TIMEOUT_MS")
                .and_then(|s| s.trim().parse().ok()),
            default_headers: non_empty("BRRTC_DEFAULT_HEADERS")
                .map(|s| parse_header_list(&s))
                .unwrap_or_default(),
        }
    }

    /// Load configuration from a YAML file. Missing keys take their defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_yaml_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_header_list(s: &str) -> BTreeMap<String, String> {
    s.split(';')
        .filter_map(|entry| {
            let (name, value) = entry.split_once(':')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}
