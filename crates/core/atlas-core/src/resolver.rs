//! Address resolution: raw reference → correctly typed node.

use std::sync::Arc;

use anyhow::{Context, Result};
use atlas_model::{
    ContractDetail, EntityRef, MultisigDetail, Network, NetworkType, Node, NodeId, NodeKind,
    NodeRole,
};

use crate::registry::AdapterRegistry;

/// Identity lookup against the host catalog store. The pipeline never
/// creates a second canonical node for an identity the store already holds.
pub trait NodeStore: Send + Sync {
    fn get(&self, id: &NodeId) -> Option<Node>;
}

/// The single point where "what kind of thing is this address" is decided.
///
/// Resolution is two-phase: a store lookup by identity first, then stub
/// construction from a fresh on-chain probe. The contract probe is never
/// cached across roles, since the same address can be a plain account under
/// one role and a contract under another.
pub struct Resolver {
    adapters: Arc<AdapterRegistry>,
    store: Arc<dyn NodeStore>,
}

impl Resolver {
    pub fn new(adapters: Arc<AdapterRegistry>, store: Arc<dyn NodeStore>) -> Self {
        Self { adapters, store }
    }

    /// Phase 1: return the canonical node already declared for `id`, if any.
    pub fn lookup_declared(&self, id: &NodeId) -> Option<Node> {
        self.store.get(id)
    }

    /// Phase 2: build a disposable stub for an identity with no declaration,
    /// probing the chain to pick the node variant.
    pub async fn resolve_stub(&self, id: &NodeId) -> Result<Node> {
        let adapter = self
            .adapters
            .chain(id.network)
            .with_context(|| format!("no chain adapter registered for '{}'", id.network))?;

        let kind = if adapter.is_contract(&id.address).await {
            match id.role {
                NodeRole::Multisig => NodeKind::Multisig(MultisigDetail::default()),
                _ => NodeKind::Contract(ContractDetail::default()),
            }
        } else {
            NodeKind::Plain
        };

        tracing::debug!(
            target: "atlas_core",
            id = %id,
            stub_kind = ?std::mem::discriminant(&kind),
            "constructed stub node"
        );
        Ok(Node::stub(id.clone(), kind))
    }

    /// Resolve an address under a role: normalize, look up the declaration,
    /// fall back to stub construction.
    pub async fn resolve(
        &self,
        network: Network,
        network_type: NetworkType,
        address: &str,
        role: NodeRole,
    ) -> Result<Node> {
        let adapter = self
            .adapters
            .chain(network)
            .with_context(|| format!("no chain adapter registered for '{network}'"))?;
        let normalized = adapter.normalize_address(address)?;
        let id = NodeId::new(network, network_type, normalized, role);

        if let Some(declared) = self.lookup_declared(&id) {
            tracing::trace!(target: "atlas_core", id = %id, "resolved to declared node");
            return Ok(declared);
        }
        self.resolve_stub(&id).await
    }

    /// Resolve a declared entity reference.
    pub async fn resolve_ref(&self, reference: &EntityRef) -> Result<Node> {
        self.resolve(
            reference.network,
            reference.network_type.clone(),
            &reference.address,
            reference.role,
        )
        .await
    }
}
