//! Per-chain capability abstraction.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use atlas_model::{AccessKeySpec, ModelError, Network, SourceSpec, StateSpec, TxInfo};

/// Capability object for one chain: address grammar, contract detection, and
/// bounded point-in-time fetches against the chain and its explorer.
///
/// Every fetch is independently optional: an upstream failure degrades to
/// "spec absent" (logged by the implementation), never a stage abort.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    fn network(&self) -> Network;

    /// Pure, chain-specific address grammar check. No network access.
    fn is_valid_address(&self, address: &str) -> bool;

    /// Canonical address form. Checksum-cases EVM addresses, lower-cases
    /// NEAR account ids. Must be idempotent.
    fn normalize_address(&self, address: &str) -> Result<String, ModelError>;

    /// Whether the address currently holds contract code.
    ///
    /// Returns `false` (never an error) on any RPC failure so contract
    /// detection can never block the pipeline.
    async fn is_contract(&self, address: &str) -> bool;

    /// Verified source/ABI provenance from the chain's explorer.
    async fn fetch_source_spec(&self, address: &str) -> Result<Option<SourceSpec>>;

    /// Zero-argument read-only state snapshot, classified per method.
    async fn fetch_state_spec(
        &self,
        address: &str,
        source: &SourceSpec,
    ) -> Result<Option<StateSpec>>;

    async fn fetch_first_transaction(&self, address: &str) -> Result<Option<TxInfo>>;

    async fn fetch_last_transaction(&self, address: &str) -> Result<Option<TxInfo>>;

    async fn fetch_creation_transaction(&self, address: &str) -> Result<Option<TxInfo>>;

    /// Current access keys of the account. Only meaningful on chains with
    /// key-based account models; the default is an empty list.
    async fn fetch_access_keys(&self, _address: &str) -> Result<Vec<AccessKeySpec>> {
        Ok(Vec::new())
    }

    /// Minimum spacing between consecutive upstream requests. Retry backoff
    /// for guarded actions is derived from this.
    fn request_delay(&self) -> Duration;
}
