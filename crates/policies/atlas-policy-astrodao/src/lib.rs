//! Sputnik v2 (AstroDAO) policy adapter.
//!
//! The DAO contract itself holds the governance policy; `get_policy` returns
//! the full document and `version` the contract release string.

pub mod policy;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use atlas_adapter_near::rpc::NearRpc;
use atlas_core::PolicyAdapter;
use atlas_model::PolicySpec;
use chrono::Utc;
use serde_json::Value as JsonValue;

/// Source of Sputnik policy documents, abstracted so stages and tests can
/// substitute fixtures for live RPC.
#[async_trait]
pub trait PolicyDocumentSource: Send + Sync {
    async fn fetch_policy_document(&self, address: &str) -> Result<JsonValue>;

    /// Contract release string, best effort.
    async fn fetch_version(&self, _address: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Live document source over a NEAR RPC endpoint.
pub struct AstroDaoClient {
    rpc: Arc<NearRpc>,
}

impl AstroDaoClient {
    pub fn new(rpc: Arc<NearRpc>) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl PolicyDocumentSource for AstroDaoClient {
    async fn fetch_policy_document(&self, address: &str) -> Result<JsonValue> {
        let bytes = self
            .rpc
            .call_view(address, "get_policy")
            .await
            .with_context(|| format!("get_policy on {address}"))?;
        serde_json::from_slice(&bytes).context("get_policy returned non-JSON payload")
    }

    async fn fetch_version(&self, address: &str) -> Result<Option<String>> {
        let bytes = match self.rpc.call_view(address, "version").await {
            Ok(bytes) => bytes,
            Err(err) => {
                // Old sputnik releases do not expose a version view.
                tracing::debug!(
                    target: "atlas_policy_astrodao",
                    address,
                    error = ?err,
                    "version view unavailable"
                );
                return Ok(None);
            }
        };
        Ok(serde_json::from_slice::<JsonValue>(&bytes)
            .ok()
            .and_then(|value| value.as_str().map(str::to_string)))
    }
}

pub struct AstroDaoPolicy {
    source: Arc<dyn PolicyDocumentSource>,
}

impl AstroDaoPolicy {
    pub fn new(source: Arc<dyn PolicyDocumentSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl PolicyAdapter for AstroDaoPolicy {
    fn scheme(&self) -> &'static str {
        "astrodao"
    }

    async fn fetch_owners(&self, address: &str) -> Result<Vec<String>> {
        let document = self.source.fetch_policy_document(address).await?;
        Ok(policy::council_members(&document)?)
    }

    async fn fetch_policy(&self, address: &str, owner_count: u64) -> Result<Option<PolicySpec>> {
        let document = self.source.fetch_policy_document(address).await?;
        let threshold = policy::council_threshold(&document, owner_count)?;
        let version = self
            .source
            .fetch_version(address)
            .await
            .unwrap_or_default()
            .unwrap_or_else(|| "unknown".to_string());
        Ok(Some(PolicySpec {
            owner_count,
            threshold,
            version,
            fetch_date: Utc::now(),
        }))
    }
}
