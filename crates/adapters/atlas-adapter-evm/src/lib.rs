//! EVM chain adapter for Ethereum and Aurora.

pub mod abi;
pub mod address;
mod explorer;
mod rpc;
mod subgraph;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use atlas_core::ChainAdapter;
use atlas_model::{ModelError, Network, SourceSpec, StateSpec, TxInfo};
use chrono::Utc;
use serde::Deserialize;
use tokio::time::sleep;

use crate::abi::Classified;
use crate::explorer::Explorer;
use crate::rpc::EthRpc;

pub use crate::subgraph::SubgraphRoleGroups;

#[derive(Debug, Clone, Deserialize)]
pub struct EvmAdapterConfig {
    pub rpc_url: String,
    #[serde(default)]
    pub explorer_url: Option<String>,
    #[serde(default)]
    pub explorer_api_key: Option<String>,
    #[serde(default)]
    pub request_delay_ms: Option<u64>,
}

pub struct EvmAdapter {
    network: Network,
    rpc: EthRpc,
    explorer: Option<Explorer>,
    request_delay: Duration,
}

impl EvmAdapter {
    /// `network` must be an EVM chain (ethereum or aurora).
    pub fn new(network: Network, config: EvmAdapterConfig) -> Result<Self> {
        anyhow::ensure!(
            network.is_evm(),
            "EvmAdapter cannot serve '{network}'"
        );
        let explorer = match &config.explorer_url {
            Some(url) => Some(Explorer::new(url, config.explorer_api_key.clone())?),
            None => None,
        };
        Ok(Self {
            network,
            rpc: EthRpc::new(&config.rpc_url)?,
            explorer,
            request_delay: Duration::from_millis(config.request_delay_ms.unwrap_or(1_000)),
        })
    }

    fn explorer(&self) -> Option<&Explorer> {
        if self.explorer.is_none() {
            tracing::debug!(
                target: "atlas_adapter_evm",
                network = %self.network,
                "no explorer configured"
            );
        }
        self.explorer.as_ref()
    }
}

#[async_trait]
impl ChainAdapter for EvmAdapter {
    fn network(&self) -> Network {
        self.network
    }

    fn is_valid_address(&self, address: &str) -> bool {
        address::is_valid(address)
    }

    fn normalize_address(&self, address: &str) -> Result<String, ModelError> {
        address::normalize(address)
    }

    async fn is_contract(&self, address: &str) -> bool {
        match self.rpc.get_code(address).await {
            Ok(code) => !matches!(code.as_str(), "" | "0x" | "0x0"),
            Err(err) => {
                tracing::warn!(
                    target: "atlas_adapter_evm",
                    address,
                    error = ?err,
                    "eth_getCode failed, treating address as non-contract"
                );
                false
            }
        }
    }

    async fn fetch_source_spec(&self, address: &str) -> Result<Option<SourceSpec>> {
        let Some(explorer) = self.explorer() else {
            return Ok(None);
        };
        let Some(mut source) = explorer.get_source(address).await? else {
            return Ok(None);
        };
        sleep(self.request_delay).await;
        source.creation_block = match explorer.get_creation_transaction(address).await {
            Ok(tx) => tx.and_then(|tx| tx.block),
            Err(err) => {
                tracing::warn!(target: "atlas_adapter_evm", address, error = ?err, "creation lookup failed");
                None
            }
        };
        Ok(Some(source))
    }

    /// Call every zero-argument read-only method once, spacing calls by the
    /// configured inter-request delay, and classify each result.
    async fn fetch_state_spec(
        &self,
        address: &str,
        source: &SourceSpec,
    ) -> Result<Option<StateSpec>> {
        let Some(abi) = &source.abi else {
            return Ok(None);
        };
        let views = abi::zero_arg_views(abi);
        if views.is_empty() {
            return Ok(None);
        }

        let mut spec = StateSpec::empty(Utc::now());
        for (index, view) in views.iter().enumerate() {
            if index > 0 {
                sleep(self.request_delay).await;
            }
            let data = abi::selector(&view.name);
            let raw = match self.rpc.call(address, &data).await {
                Ok(raw) => raw,
                Err(err) => {
                    tracing::debug!(
                        target: "atlas_adapter_evm",
                        address,
                        method = view.name.as_str(),
                        error = ?err,
                        "view call failed, skipping method"
                    );
                    continue;
                }
            };
            let values = match abi::decode_return(&view.outputs, &raw) {
                Ok(values) => values,
                Err(err) => {
                    tracing::debug!(
                        target: "atlas_adapter_evm",
                        address,
                        method = view.name.as_str(),
                        error = ?err,
                        "undecodable return, skipping method"
                    );
                    continue;
                }
            };
            match abi::classify(view, values) {
                Classified::RoleGetter(role_id) => {
                    spec.role_getters.insert(view.name.clone(), role_id);
                }
                Classified::InteractsWith(target) => {
                    let target = address::normalize(&target).unwrap_or(target);
                    spec.interacts_with.insert(view.name.clone(), target);
                }
                Classified::Fact(fact) => {
                    spec.facts.insert(view.name.clone(), fact);
                }
            }
        }

        tracing::debug!(
            target: "atlas_adapter_evm",
            address,
            facts = spec.facts.len(),
            interactions = spec.interacts_with.len(),
            roles = spec.role_getters.len(),
            "state spec assembled"
        );
        Ok(Some(spec))
    }

    async fn fetch_first_transaction(&self, address: &str) -> Result<Option<TxInfo>> {
        let Some(explorer) = self.explorer() else {
            return Ok(None);
        };
        match explorer.get_edge_transaction(address, true).await {
            Ok(tx) => Ok(tx),
            Err(err) => {
                tracing::warn!(target: "atlas_adapter_evm", address, error = ?err, "first-transaction lookup failed");
                Ok(None)
            }
        }
    }

    async fn fetch_last_transaction(&self, address: &str) -> Result<Option<TxInfo>> {
        let Some(explorer) = self.explorer() else {
            return Ok(None);
        };
        match explorer.get_edge_transaction(address, false).await {
            Ok(tx) => Ok(tx),
            Err(err) => {
                tracing::warn!(target: "atlas_adapter_evm", address, error = ?err, "last-transaction lookup failed");
                Ok(None)
            }
        }
    }

    async fn fetch_creation_transaction(&self, address: &str) -> Result<Option<TxInfo>> {
        let Some(explorer) = self.explorer() else {
            return Ok(None);
        };
        match explorer.get_creation_transaction(address).await {
            Ok(tx) => Ok(tx),
            Err(err) => {
                tracing::warn!(target: "atlas_adapter_evm", address, error = ?err, "creation-transaction lookup failed");
                Ok(None)
            }
        }
    }

    fn request_delay(&self) -> Duration {
        self.request_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_evm_networks() {
        let config = EvmAdapterConfig {
            rpc_url: "http://localhost:8545".to_string(),
            explorer_url: None,
            explorer_api_key: None,
            request_delay_ms: None,
        };
        assert!(EvmAdapter::new(Network::Near, config).is_err());
    }

    #[test]
    fn default_request_delay_is_one_second() {
        let config = EvmAdapterConfig {
            rpc_url: "http://localhost:8545".to_string(),
            explorer_url: None,
            explorer_api_key: None,
            request_delay_ms: None,
        };
        let adapter = EvmAdapter::new(Network::Ethereum, config).unwrap();
        assert_eq!(adapter.request_delay(), Duration::from_secs(1));
    }
}
