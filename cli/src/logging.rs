//! Log output for the `chainfanout` binary.
//!
//! Agent results, agent failures and translation errors are all emitted as
//! `tracing` events; this module decides how they are filtered and rendered.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// The `log` section of the config file, overridable by `--log-level` and
/// `--json-logs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default level, or a full filter such as `info,chainfanout_http=debug`.
    #[serde(default = "default_level")]
    pub level: String,
    /// Extra levels keyed by crate, e.g. `chainfanout-core: debug` to see
    /// worker state changes.
    #[serde(default)]
    pub components: BTreeMap<String, String>,
    /// One JSON object per event, for log shippers.
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            components: BTreeMap::new(),
            json: false,
        }
    }
}

impl LogConfig {
    /// `EnvFilter` directives. Crate names are normalised to module paths.
    pub fn directives(&self) -> String {
        let mut directives = self.level.clone();
        for (component, level) in &self.components {
            directives.push_str(&format!(",{}={}", component.replace('-', "_"), level));
        }
        directives
    }
}

/// Install the global subscriber on stderr; `translate` prints its messages
/// on stdout. An unparsable filter falls back to `info`.
pub fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_new(config.directives()).unwrap_or_else(|_| EnvFilter::new("info"));
    let output = fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        registry.with(output.json()).init();
    } else {
        registry.with(output).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_include_components() {
        let mut cfg = LogConfig::default();
        cfg.components.insert("chainfanout-core".into(), "debug".into());
        assert_eq!(cfg.directives(), "info,chainfanout_core=debug");
    }

    #[test]
    fn component_directives_are_ordered() {
        let cfg: LogConfig = serde_json::from_str(
            r#"{ "level": "warn", "components": { "chainfanout-http": "trace", "chainfanout-core": "debug" } }"#,
        )
        .unwrap();
        assert_eq!(
            cfg.directives(),
            "warn,chainfanout_core=debug,chainfanout_http=trace"
        );
    }

    #[test]
    fn missing_fields_use_defaults() {
        let cfg: LogConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, LogConfig::default());
    }
}
