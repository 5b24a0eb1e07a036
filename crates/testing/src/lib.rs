//! Scripted adapters and in-memory host doubles for exercising stages and
//! the pipeline without touching a network.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use atlas_core::{
    AdapterRegistry, ChainAdapter, Emitter, GuardTable, NodeStore, PipelineOptions, PolicyAdapter,
    Resolver, SpecCache, StageContext,
};
use atlas_model::{
    AccessKeySpec, ModelError, Network, Node, NodeId, PolicySpec, RelationPair, SourceSpec,
    StateSpec, TxInfo,
};
use atlas_policy_astrodao::PolicyDocumentSource;
use chrono::Utc;
use serde_json::Value as JsonValue;

/// In-memory catalog store.
#[derive(Default)]
pub struct MemoryStore {
    nodes: Mutex<HashMap<NodeId, Node>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, node: Node) {
        self.nodes.lock().unwrap().insert(node.id.clone(), node);
    }
}

impl NodeStore for MemoryStore {
    fn get(&self, id: &NodeId) -> Option<Node> {
        self.nodes.lock().unwrap().get(id).cloned()
    }
}

/// In-memory spec cache.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, JsonValue>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, key: &str, value: JsonValue) {
        self.set(key, value);
    }
}

impl SpecCache for MemoryCache {
    fn get(&self, key: &str) -> Option<JsonValue> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: JsonValue) {
        self.entries.lock().unwrap().insert(key.to_string(), value);
    }
}

/// Emitter double collecting everything the stages produce.
#[derive(Default)]
pub struct RecordingEmitter {
    nodes: Mutex<Vec<Node>>,
    relations: Mutex<Vec<RelationPair>>,
    reports: Mutex<Vec<(String, String, String)>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.nodes.lock().unwrap().clone()
    }

    pub fn relations(&self) -> Vec<RelationPair> {
        self.relations.lock().unwrap().clone()
    }

    /// `(stage, node, message)` triples.
    pub fn reports(&self) -> Vec<(String, String, String)> {
        self.reports.lock().unwrap().clone()
    }

    pub fn emitted_node(&self, name: &str) -> Option<Node> {
        self.nodes().into_iter().find(|n| n.name() == name)
    }

    pub fn has_relation(&self, relation: atlas_model::Relation, source: &str, target: &str) -> bool {
        self.relations().iter().any(|pair| {
            pair.forward.relation == relation
                && pair.forward.source == source
                && pair.forward.target == target
        })
    }
}

impl Emitter for RecordingEmitter {
    fn node(&self, node: Node) {
        self.nodes.lock().unwrap().push(node);
    }

    fn relation(&self, pair: RelationPair) {
        self.relations.lock().unwrap().push(pair);
    }

    fn report(&self, stage: &str, node: &str, error: &anyhow::Error) {
        self.reports
            .lock()
            .unwrap()
            .push((stage.to_string(), node.to_string(), format!("{error:#}")));
    }
}

/// Chain adapter with scripted responses and recorded call windows.
///
/// Any non-empty address is valid; normalization lower-cases. Fetch methods
/// answer from the scripted maps and record a `(label, start, end)` window
/// so exclusivity can be asserted from tests.
pub struct StubChainAdapter {
    network: Network,
    contracts: Mutex<HashSet<String>>,
    sources: Mutex<HashMap<String, SourceSpec>>,
    states: Mutex<HashMap<String, StateSpec>>,
    keys: Mutex<HashMap<String, Vec<AccessKeySpec>>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<(String, Instant, Instant)>>,
    call_duration: Duration,
}

impl StubChainAdapter {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            contracts: Mutex::default(),
            sources: Mutex::default(),
            states: Mutex::default(),
            keys: Mutex::default(),
            failing: Mutex::default(),
            calls: Mutex::default(),
            call_duration: Duration::from_millis(5),
        }
    }

    pub fn with_contract(self, address: &str) -> Self {
        self.contracts.lock().unwrap().insert(address.to_string());
        self
    }

    pub fn with_source(self, address: &str, source: SourceSpec) -> Self {
        self.sources
            .lock()
            .unwrap()
            .insert(address.to_string(), source);
        self
    }

    pub fn with_state(self, address: &str, state: StateSpec) -> Self {
        self.states
            .lock()
            .unwrap()
            .insert(address.to_string(), state);
        self
    }

    pub fn with_keys(self, address: &str, keys: Vec<AccessKeySpec>) -> Self {
        self.keys.lock().unwrap().insert(address.to_string(), keys);
        self
    }

    /// Make every fetch against `address` fail.
    pub fn with_failing(self, address: &str) -> Self {
        self.failing.lock().unwrap().insert(address.to_string());
        self
    }

    /// Recorded `(label, start, end)` call windows, in completion order.
    pub fn call_windows(&self) -> Vec<(String, Instant, Instant)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    async fn record(&self, label: &str, address: &str) -> Result<()> {
        let start = Instant::now();
        tokio::time::sleep(self.call_duration).await;
        self.calls
            .lock()
            .unwrap()
            .push((format!("{label}:{address}"), start, Instant::now()));
        if self.failing.lock().unwrap().contains(address) {
            return Err(anyhow!("scripted failure for {address}"));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainAdapter for StubChainAdapter {
    fn network(&self) -> Network {
        self.network
    }

    fn is_valid_address(&self, address: &str) -> bool {
        !address.is_empty()
    }

    fn normalize_address(&self, address: &str) -> Result<String, ModelError> {
        if address.is_empty() {
            return Err(ModelError::InvalidAddress(address.to_string()));
        }
        Ok(address.to_ascii_lowercase())
    }

    async fn is_contract(&self, address: &str) -> bool {
        self.contracts.lock().unwrap().contains(address)
    }

    async fn fetch_source_spec(&self, address: &str) -> Result<Option<SourceSpec>> {
        self.record("source", address).await?;
        Ok(self.sources.lock().unwrap().get(address).cloned())
    }

    async fn fetch_state_spec(
        &self,
        address: &str,
        _source: &SourceSpec,
    ) -> Result<Option<StateSpec>> {
        self.record("state", address).await?;
        Ok(self.states.lock().unwrap().get(address).cloned())
    }

    async fn fetch_first_transaction(&self, address: &str) -> Result<Option<TxInfo>> {
        self.record("first-tx", address).await?;
        Ok(None)
    }

    async fn fetch_last_transaction(&self, address: &str) -> Result<Option<TxInfo>> {
        self.record("last-tx", address).await?;
        Ok(None)
    }

    async fn fetch_creation_transaction(&self, address: &str) -> Result<Option<TxInfo>> {
        self.record("creation-tx", address).await?;
        Ok(None)
    }

    async fn fetch_access_keys(&self, address: &str) -> Result<Vec<AccessKeySpec>> {
        self.record("access-keys", address).await?;
        Ok(self
            .keys
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_default())
    }

    fn request_delay(&self) -> Duration {
        Duration::ZERO
    }
}

/// Policy adapter double with a fixed owner set and threshold.
pub struct StubPolicy {
    pub owners: Vec<String>,
    pub threshold: u64,
}

#[async_trait]
impl PolicyAdapter for StubPolicy {
    fn scheme(&self) -> &'static str {
        "stub"
    }

    async fn fetch_owners(&self, _address: &str) -> Result<Vec<String>> {
        Ok(self.owners.clone())
    }

    async fn fetch_policy(&self, _address: &str, owner_count: u64) -> Result<Option<PolicySpec>> {
        Ok(Some(PolicySpec {
            owner_count,
            threshold: self.threshold,
            version: "stub".to_string(),
            fetch_date: Utc::now(),
        }))
    }
}

/// DAO policy-document source answering with a fixed document.
pub struct StubDocuments {
    pub document: JsonValue,
}

#[async_trait]
impl PolicyDocumentSource for StubDocuments {
    async fn fetch_policy_document(&self, _address: &str) -> Result<JsonValue> {
        Ok(self.document.clone())
    }
}

/// One-stop wiring of the host doubles into a stage context.
pub struct Harness {
    pub adapters: Arc<AdapterRegistry>,
    pub store: Arc<MemoryStore>,
    pub cache: Arc<MemoryCache>,
    pub emitter: Arc<RecordingEmitter>,
    pub guards: Arc<GuardTable>,
    pub resolver: Arc<Resolver>,
    pub options: PipelineOptions,
}

impl Harness {
    pub fn new(adapters: AdapterRegistry) -> Self {
        let adapters = Arc::new(adapters);
        let store = Arc::new(MemoryStore::new());
        let resolver = Arc::new(Resolver::new(
            adapters.clone(),
            store.clone() as Arc<dyn NodeStore>,
        ));
        Self {
            adapters,
            store,
            cache: Arc::new(MemoryCache::new()),
            emitter: Arc::new(RecordingEmitter::new()),
            guards: Arc::new(GuardTable::new()),
            resolver,
            options: PipelineOptions::default(),
        }
    }

    pub fn context(&self) -> StageContext {
        StageContext {
            emitter: self.emitter.clone(),
            cache: self.cache.clone(),
            guards: self.guards.clone(),
            adapters: self.adapters.clone(),
            resolver: self.resolver.clone(),
            options: self.options.clone(),
        }
    }
}
