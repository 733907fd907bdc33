//! Fan-out configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agent::AgentEndpoint;
use crate::dispatcher::DispatchConfig;
use crate::error::{ConfigError, StartupError};

/// Top-level configuration: which agents to call and how hard to push them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanoutConfig {
    /// Agent addresses, in fan-out order. `host`, `host:port` or a URL.
    #[serde(default)]
    pub agents: Vec<String>,
    /// Pending requests buffered per agent before ingestion blocks.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Per-call deadline in milliseconds.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

fn default_queue_capacity() -> usize { 100 }
fn default_call_timeout_ms() -> u64 { 5_000 }

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            agents: vec![],
            queue_capacity: default_queue_capacity(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

impl FanoutConfig {
    /// Parse a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agents.is_empty() {
            return Err(ConfigError::Invalid {
                reason: "at least one agent address is required".into(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                reason: "queue_capacity must be greater than zero".into(),
            });
        }
        if self.call_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "call_timeout_ms must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// Parse every agent address, preserving order.
    pub fn endpoints(&self) -> Result<Vec<AgentEndpoint>, StartupError> {
        self.agents.iter().map(|a| AgentEndpoint::parse(a)).collect()
    }

    pub fn dispatch(&self) -> DispatchConfig {
        DispatchConfig {
            queue_capacity: self.queue_capacity,
            call_timeout: Duration::from_millis(self.call_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let cfg = FanoutConfig::from_json(r#"{ "agents": ["scanner-1", "scanner-2:9000"] }"#).unwrap();
        assert_eq!(cfg.queue_capacity, 100);
        assert_eq!(cfg.call_timeout_ms, 5_000);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.dispatch().call_timeout, Duration::from_secs(5));
    }

    #[test]
    fn endpoints_keep_order() {
        let cfg = FanoutConfig {
            agents: vec!["b".into(), "a".into()],
            ..Default::default()
        };
        let eps = cfg.endpoints().unwrap();
        assert_eq!(eps[0].url(), "http://b:50051");
        assert_eq!(eps[1].url(), "http://a:50051");
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(FanoutConfig::default().validate().is_err());
        let cfg = FanoutConfig {
            agents: vec!["a".into()],
            queue_capacity: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = FanoutConfig {
            agents: vec!["a".into()],
            call_timeout_ms: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert!(matches!(
            FanoutConfig::from_json("{ agents: "),
            Err(ConfigError::Parse(_))
        ));
    }
}
