//! Registries wiring adapters and stages into the pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use atlas_model::Network;

use crate::adapter::ChainAdapter;
use crate::policy::{PolicyAdapter, RoleGroupAdapter};
use crate::stage::Stage;

/// Registry tracking the capability objects available per network.
#[derive(Default)]
pub struct AdapterRegistry {
    chains: HashMap<Network, Arc<dyn ChainAdapter>>,
    policies: HashMap<Network, Arc<dyn PolicyAdapter>>,
    role_groups: HashMap<Network, Arc<dyn RoleGroupAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the chain adapter for its own network. Registering a second
    /// adapter for the same network is a wiring error.
    pub fn register_chain(&mut self, adapter: Arc<dyn ChainAdapter>) -> Result<()> {
        let network = adapter.network();
        if self.chains.contains_key(&network) {
            anyhow::bail!("chain adapter for '{network}' registered twice");
        }
        tracing::info!(
            target: "atlas_core",
            network = %network,
            "registered chain adapter"
        );
        self.chains.insert(network, adapter);
        Ok(())
    }

    /// Register the governance policy adapter used for multisigs on `network`.
    pub fn register_policy(&mut self, network: Network, adapter: Arc<dyn PolicyAdapter>) {
        tracing::info!(
            target: "atlas_core",
            network = %network,
            scheme = adapter.scheme(),
            "registered policy adapter"
        );
        self.policies.insert(network, adapter);
    }

    pub fn register_role_groups(&mut self, network: Network, adapter: Arc<dyn RoleGroupAdapter>) {
        tracing::info!(
            target: "atlas_core",
            network = %network,
            "registered role-group adapter"
        );
        self.role_groups.insert(network, adapter);
    }

    pub fn chain(&self, network: Network) -> Option<&Arc<dyn ChainAdapter>> {
        self.chains.get(&network)
    }

    pub fn policy(&self, network: Network) -> Option<&Arc<dyn PolicyAdapter>> {
        self.policies.get(&network)
    }

    pub fn role_groups(&self, network: Network) -> Option<&Arc<dyn RoleGroupAdapter>> {
        self.role_groups.get(&network)
    }
}

/// Ordered stage list. Order is the pipeline's fixed stage order; duplicate
/// stage names collide in the guard table and are rejected here.
#[derive(Default)]
pub struct StageRegistry {
    stages: Vec<Arc<dyn Stage>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stages(stages: Vec<Arc<dyn Stage>>) -> Result<Self> {
        let mut registry = Self::new();
        for stage in stages {
            registry.register(stage)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, stage: Arc<dyn Stage>) -> Result<()> {
        if self.stages.iter().any(|s| s.name() == stage.name()) {
            anyhow::bail!("stage '{}' registered twice", stage.name());
        }
        tracing::info!(target: "atlas_core", stage = stage.name(), "registered stage");
        self.stages.push(stage);
        Ok(())
    }

    pub fn stages(&self) -> &[Arc<dyn Stage>] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
