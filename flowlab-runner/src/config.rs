//! Serializable run configuration.

use anyhow::{Context, Result};
use flowlab_core::config::BacktestConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Unique identifier for a run (content-addressable hash).
pub type RunId = String;

/// Where price data comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    /// Environment variable holding the API key; never the key itself.
    pub api_key_env: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.polygon.io".into(),
            api_key_env: "FLOWLAB_API_KEY".into(),
        }
    }
}

/// Complete configuration for a single run.
///
/// Two runs with the same config produce the same `run_id`, which names
/// the artifact directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub initial_cash: f64,
    pub source: SourceConfig,
    #[serde(flatten)]
    pub engine: BacktestConfig,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: RunConfig = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config
            .engine
            .validate(config.initial_cash)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Deterministic content hash of the full configuration.
    pub fn run_id(&self) -> Result<RunId> {
        let json = serde_json::to_string(self).context("config serialization for run_id")?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_toml() {
        let config: RunConfig = toml::from_str(
            r#"
            initial_cash = 500000.0

            [entry]
            min_premium = 750000.0
            "#,
        )
        .unwrap();
        assert_eq!(config.initial_cash, 500_000.0);
        assert_eq!(config.engine.entry.min_premium, 750_000.0);
        assert_eq!(config.engine.data.prefetch_days, 6);
        assert_eq!(config.source.api_key_env, "FLOWLAB_API_KEY");
    }

    #[test]
    fn run_id_is_stable_and_config_sensitive() {
        let a = RunConfig {
            initial_cash: 1_000_000.0,
            ..Default::default()
        };
        let b = RunConfig {
            initial_cash: 1_000_000.0,
            ..Default::default()
        };
        assert_eq!(a.run_id().unwrap(), b.run_id().unwrap());

        let mut c = RunConfig {
            initial_cash: 1_000_000.0,
            ..Default::default()
        };
        c.engine.entry.min_premium = 1.0;
        assert_ne!(a.run_id().unwrap(), c.run_id().unwrap());
    }
}
