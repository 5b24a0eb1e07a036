//! Atlas configuration, usually expected in an `atlas.toml` file.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use config::{Config, File};
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AtlasConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Keyed by network name (`ethereum`, `aurora`, `near`).
    #[serde(default)]
    pub networks: HashMap<String, NetworkConfig>,
    /// Keyed by governance scheme (`safe`, `astrodao`).
    #[serde(default)]
    pub policies: HashMap<String, PolicyConfig>,
    /// Declared-node JSON file consumed by the CLI.
    #[serde(default)]
    pub nodes_file: Option<String>,
}

impl AtlasConfig {
    /// Loads the configuration from a file.
    pub fn new(config_path: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(Path::new(config_path)))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Spec staleness threshold in minutes.
    pub ttl_minutes: i64,
    /// Minimum spacing between upstream requests, per adapter.
    pub request_delay_ms: u64,
    /// Attempts per guarded fetch.
    pub retry: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: 120,
            request_delay_ms: 1_000,
            retry: 3,
        }
    }
}

/// Endpoints for one chain.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkConfig {
    pub rpc_url: String,
    #[serde(default)]
    pub explorer_url: Option<String>,
    #[serde(default)]
    pub explorer_api_key: Option<String>,
    #[serde(default)]
    pub network_type: Option<String>,
}

/// Endpoints for one governance scheme.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyConfig {
    /// Safe transaction service or AstroDAO RPC base URL.
    #[serde(default)]
    pub service_url: Option<String>,
    /// RBAC subgraph endpoint (EVM only).
    #[serde(default)]
    pub subgraph_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_policy() {
        let p = PipelineConfig::default();
        assert_eq!(p.ttl_minutes, 120);
        assert_eq!(p.request_delay_ms, 1_000);
        assert_eq!(p.retry, 3);
    }

    #[test]
    fn parses_a_minimal_toml() {
        let dir = std::env::temp_dir();
        let path = dir.join("atlas_config_test.toml");
        std::fs::write(
            &path,
            r#"
            [pipeline]
            ttl_minutes = 30

            [networks.near]
            rpc_url = "https://rpc.mainnet.near.org"
            network_type = "mainnet"
            "#,
        )
        .unwrap();

        let config = AtlasConfig::new(path.to_str().unwrap()).unwrap();
        assert_eq!(config.pipeline.ttl_minutes, 30);
        assert_eq!(config.pipeline.retry, 3);
        assert_eq!(
            config.networks.get("near").unwrap().rpc_url,
            "https://rpc.mainnet.near.org"
        );

        std::fs::remove_file(path).ok();
    }
}
