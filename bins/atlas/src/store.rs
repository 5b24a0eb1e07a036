//! Declared-node catalog and the process-local spec cache.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Context, Result};
use atlas::core::{NodeStore, SpecCache};
use atlas::model::{Node, NodeId};
use serde_json::Value as JsonValue;

/// Catalog of explicitly declared nodes, loaded from a JSON array.
pub struct DeclaredStore {
    nodes: HashMap<NodeId, Node>,
}

impl DeclaredStore {
    pub fn load(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading declared nodes from '{path}'"))?;
        let declared: Vec<Node> =
            serde_json::from_str(&raw).with_context(|| format!("parsing '{path}'"))?;

        let mut nodes = HashMap::new();
        for node in declared {
            anyhow::ensure!(
                !node.stub,
                "'{}' is declared but marked as a stub",
                node.id
            );
            let id = node.id.clone();
            anyhow::ensure!(
                nodes.insert(id.clone(), node).is_none(),
                "duplicate declaration for '{id}'"
            );
        }
        Ok(Self { nodes })
    }

    pub fn count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.nodes.values().cloned().collect()
    }
}

impl NodeStore for DeclaredStore {
    fn get(&self, id: &NodeId) -> Option<Node> {
        self.nodes.get(id).cloned()
    }
}

/// Process-lifetime spec cache. Specs survive across passes of one run but
/// not across runs.
#[derive(Default)]
pub struct RunCache {
    entries: Mutex<HashMap<String, JsonValue>>,
}

impl RunCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpecCache for RunCache {
    fn get(&self, key: &str) -> Option<JsonValue> {
        self.entries.lock().expect("cache poisoned").get(key).cloned()
    }

    fn set(&self, key: &str, value: JsonValue) {
        self.entries
            .lock()
            .expect("cache poisoned")
            .insert(key.to_string(), value);
    }
}
