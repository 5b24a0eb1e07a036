//! NEAR chain adapter.

pub mod address;
mod explorer;
pub mod rpc;
pub mod wasm;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use atlas_core::{ChainAdapter, RoleGroupAdapter};
use atlas_model::{
    AccessKeySpec, ModelError, Network, RbacSpec, RoleGrant, SourceSpec, StateSpec, TxInfo,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tokio::time::sleep;

use crate::explorer::NearExplorer;
use crate::rpc::{NearRpc, EMPTY_CODE_HASH};

/// View method exposed by near-plugins ACL contracts.
const ACL_METHOD: &str = "acl_get_permissioned_accounts";

#[derive(Debug, Clone, Deserialize)]
pub struct NearAdapterConfig {
    pub rpc_url: String,
    #[serde(default)]
    pub explorer_url: Option<String>,
    #[serde(default)]
    pub explorer_api_key: Option<String>,
    #[serde(default)]
    pub request_delay_ms: Option<u64>,
}

pub struct NearAdapter {
    rpc: Arc<NearRpc>,
    explorer: Option<NearExplorer>,
    request_delay: Duration,
}

impl NearAdapter {
    pub fn new(config: NearAdapterConfig) -> Result<Self> {
        let explorer = match &config.explorer_url {
            Some(url) => Some(NearExplorer::new(url, config.explorer_api_key.clone())?),
            None => None,
        };
        Ok(Self {
            rpc: Arc::new(NearRpc::new(&config.rpc_url)?),
            explorer,
            request_delay: Duration::from_millis(config.request_delay_ms.unwrap_or(1_000)),
        })
    }

    /// Shared handle to the adapter's RPC endpoint.
    pub fn rpc(&self) -> Arc<NearRpc> {
        self.rpc.clone()
    }

    /// Role-group adapter backed by the same RPC endpoint, for contracts
    /// exposing the near-plugins ACL view method.
    pub fn acl_role_groups(&self) -> NearAclRoleGroups {
        NearAclRoleGroups {
            rpc: self.rpc.clone(),
        }
    }

    /// Decode a view-call result and classify it: a decoded string that is
    /// itself a valid account id becomes an interacts-with target, anything
    /// else an opaque JSON fact.
    fn classify_result(bytes: &[u8]) -> Classified {
        let text = String::from_utf8_lossy(bytes).into_owned();
        match serde_json::from_str::<JsonValue>(&text) {
            Ok(JsonValue::String(s)) if address::is_valid(&s) => {
                Classified::InteractsWith(s.to_ascii_lowercase())
            }
            Ok(value) => Classified::Fact(value.to_string()),
            // Not JSON at all: keep the raw text as a quoted fact.
            Err(_) => Classified::Fact(JsonValue::String(text).to_string()),
        }
    }
}

enum Classified {
    InteractsWith(String),
    Fact(String),
}

#[async_trait]
impl ChainAdapter for NearAdapter {
    fn network(&self) -> Network {
        Network::Near
    }

    fn is_valid_address(&self, address: &str) -> bool {
        address::is_valid(address)
    }

    fn normalize_address(&self, address: &str) -> Result<String, ModelError> {
        address::normalize(address)
    }

    async fn is_contract(&self, address: &str) -> bool {
        match self.rpc.code_hash(address).await {
            Ok(hash) => hash != EMPTY_CODE_HASH,
            Err(err) => {
                tracing::warn!(
                    target: "atlas_adapter_near",
                    address,
                    error = ?err,
                    "view_account failed, treating address as non-contract"
                );
                false
            }
        }
    }

    async fn fetch_source_spec(&self, address: &str) -> Result<Option<SourceSpec>> {
        if !self.is_contract(address).await {
            return Ok(None);
        }
        // NEAR has no on-chain ABI; the spec records provenance only, and
        // the state fetch enumerates methods from the wasm itself.
        let creation_block = match &self.explorer {
            Some(explorer) => match explorer.get_deployment_transaction(address).await {
                Ok(tx) => tx.and_then(|tx| tx.block),
                Err(err) => {
                    tracing::warn!(target: "atlas_adapter_near", address, error = ?err, "deployment lookup failed");
                    None
                }
            },
            None => None,
        };
        Ok(Some(SourceSpec {
            abi: None,
            verified: false,
            creation_block,
            fetch_date: Utc::now(),
        }))
    }

    async fn fetch_state_spec(
        &self,
        address: &str,
        _source: &SourceSpec,
    ) -> Result<Option<StateSpec>> {
        let code = self.rpc.view_code(address).await?;
        let methods = wasm::exported_methods(&code)?;
        if methods.is_empty() {
            return Ok(None);
        }

        let mut spec = StateSpec::empty(Utc::now());
        for (index, method) in methods.iter().enumerate() {
            if index > 0 {
                sleep(self.request_delay).await;
            }
            let bytes = match self.rpc.call_view(address, method).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    // Mutating methods and methods requiring arguments land
                    // here; they are simply not part of the state snapshot.
                    tracing::trace!(
                        target: "atlas_adapter_near",
                        address,
                        method = method.as_str(),
                        error = ?err,
                        "view call rejected, skipping method"
                    );
                    continue;
                }
            };
            match Self::classify_result(&bytes) {
                Classified::InteractsWith(target) => {
                    spec.interacts_with.insert(method.clone(), target);
                }
                Classified::Fact(fact) => {
                    spec.facts.insert(method.clone(), fact);
                }
            }
        }

        tracing::debug!(
            target: "atlas_adapter_near",
            address,
            methods = methods.len(),
            facts = spec.facts.len(),
            interactions = spec.interacts_with.len(),
            "state spec assembled"
        );
        Ok(Some(spec))
    }

    async fn fetch_first_transaction(&self, address: &str) -> Result<Option<TxInfo>> {
        let Some(explorer) = &self.explorer else {
            return Ok(None);
        };
        match explorer.get_edge_transaction(address, true).await {
            Ok(tx) => Ok(tx),
            Err(err) => {
                tracing::warn!(target: "atlas_adapter_near", address, error = ?err, "first-transaction lookup failed");
                Ok(None)
            }
        }
    }

    async fn fetch_last_transaction(&self, address: &str) -> Result<Option<TxInfo>> {
        let Some(explorer) = &self.explorer else {
            return Ok(None);
        };
        match explorer.get_edge_transaction(address, false).await {
            Ok(tx) => Ok(tx),
            Err(err) => {
                tracing::warn!(target: "atlas_adapter_near", address, error = ?err, "last-transaction lookup failed");
                Ok(None)
            }
        }
    }

    async fn fetch_creation_transaction(&self, address: &str) -> Result<Option<TxInfo>> {
        let Some(explorer) = &self.explorer else {
            return Ok(None);
        };
        match explorer.get_deployment_transaction(address).await {
            Ok(tx) => Ok(tx),
            Err(err) => {
                tracing::warn!(target: "atlas_adapter_near", address, error = ?err, "deployment lookup failed");
                Ok(None)
            }
        }
    }

    async fn fetch_access_keys(&self, address: &str) -> Result<Vec<AccessKeySpec>> {
        self.rpc.access_key_list(address).await
    }

    fn request_delay(&self) -> Duration {
        self.request_delay
    }
}

/// RBAC extraction from contracts exposing the near-plugins ACL interface.
pub struct NearAclRoleGroups {
    rpc: Arc<NearRpc>,
}

impl NearAclRoleGroups {
    fn parse_permissioned_accounts(value: &JsonValue) -> Option<RbacSpec> {
        let roles_value = value.get("roles")?.as_object()?;
        let mut roles = std::collections::BTreeMap::new();
        for (role_id, grant) in roles_value {
            let admins: Vec<String> = grant
                .get("admins")
                .and_then(JsonValue::as_array)
                .map(|rows| {
                    rows.iter()
                        .filter_map(JsonValue::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            let members = grant
                .get("grantees")
                .and_then(JsonValue::as_array)
                .map(|rows| {
                    rows.iter()
                        .filter_map(JsonValue::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            roles.insert(
                role_id.clone(),
                RoleGrant {
                    admin: admins.first().cloned(),
                    admin_of: Vec::new(),
                    members,
                },
            );
        }
        if roles.is_empty() {
            return None;
        }
        Some(RbacSpec {
            roles,
            fetch_date: Utc::now(),
        })
    }
}

#[async_trait]
impl RoleGroupAdapter for NearAclRoleGroups {
    async fn fetch_rbac(&self, address: &str) -> Result<Option<RbacSpec>> {
        let bytes = match self.rpc.call_view(address, ACL_METHOD).await {
            Ok(bytes) => bytes,
            Err(err) => {
                // Contracts without the ACL plugin reject the call.
                tracing::debug!(
                    target: "atlas_adapter_near",
                    address,
                    error = ?err,
                    "contract does not expose the ACL interface"
                );
                return Ok(None);
            }
        };
        let value: JsonValue = serde_json::from_slice(&bytes)?;
        Ok(Self::parse_permissioned_accounts(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_detects_account_results() {
        match NearAdapter::classify_result(br#""treasury.near""#) {
            Classified::InteractsWith(target) => assert_eq!(target, "treasury.near"),
            Classified::Fact(_) => panic!("expected interacts-with"),
        }
        match NearAdapter::classify_result(br#"{"total":"100"}"#) {
            Classified::Fact(fact) => assert_eq!(fact, r#"{"total":"100"}"#),
            Classified::InteractsWith(_) => panic!("expected fact"),
        }
        // Raw non-JSON output survives as a quoted fact.
        match NearAdapter::classify_result(b"plain text") {
            Classified::Fact(fact) => assert_eq!(fact, "\"plain text\""),
            Classified::InteractsWith(_) => panic!("expected fact"),
        }
    }

    #[test]
    fn parses_acl_permissioned_accounts() {
        let spec = NearAclRoleGroups::parse_permissioned_accounts(&json!({
            "roles": {
                "PauseManager": {
                    "admins": ["dao.near"],
                    "grantees": ["ops.near", "alice.near"]
                }
            }
        }))
        .unwrap();
        let grant = &spec.roles["PauseManager"];
        assert_eq!(grant.admin.as_deref(), Some("dao.near"));
        assert_eq!(grant.members, vec!["ops.near", "alice.near"]);
    }

    #[test]
    fn acl_without_roles_is_none() {
        assert!(NearAclRoleGroups::parse_permissioned_accounts(&json!({ "roles": {} })).is_none());
        assert!(NearAclRoleGroups::parse_permissioned_accounts(&json!({})).is_none());
    }
}
