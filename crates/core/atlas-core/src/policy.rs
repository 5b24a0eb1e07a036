//! Governance-scheme capability abstractions.

use anyhow::Result;
use async_trait::async_trait;
use atlas_model::{PolicySpec, RbacSpec};

/// Capability object for one multisig/DAO governance scheme.
#[async_trait]
pub trait PolicyAdapter: Send + Sync {
    /// Scheme label used in logs and registry lookups (`safe`, `astrodao`).
    fn scheme(&self) -> &'static str;

    /// Current owner addresses of the multisig.
    async fn fetch_owners(&self, address: &str) -> Result<Vec<String>>;

    /// Ownership policy: seat count, approval threshold, scheme version.
    /// `owner_count` is passed in so ratio policies can be materialized
    /// without a second owners fetch.
    async fn fetch_policy(&self, address: &str, owner_count: u64) -> Result<Option<PolicySpec>>;
}

/// RBAC role/membership extraction for a contract.
#[async_trait]
pub trait RoleGroupAdapter: Send + Sync {
    async fn fetch_rbac(&self, address: &str) -> Result<Option<RbacSpec>>;
}
