//! Application config file: fan-out settings plus logging.

use std::path::Path;

use anyhow::{Context, Result};
use chainfanout_core::FanoutConfig;
use serde::{Deserialize, Serialize};

use crate::logging::LogConfig;

/// ```json
/// {
///   "agents": ["scanner-1", "scanner-2:9000"],
///   "queue_capacity": 100,
///   "call_timeout_ms": 5000,
///   "log": { "level": "info", "json": false }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub fanout: FanoutConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config file '{}'", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parse config file '{}'", path.display()))
    }
}
