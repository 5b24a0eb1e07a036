//! Pass driver: runs every node through the fixed stage order.

use std::sync::{Arc, Mutex};

use atlas_model::{Node, RelationPair};
use futures::future::join_all;
use tracing::Instrument;

use crate::cache::{ScopedCache, SpecCache};
use crate::guard::GuardTable;
use crate::registry::{AdapterRegistry, StageRegistry};
use crate::resolver::Resolver;
use crate::stage::{Emitter, PipelineOptions, StageContext};

/// A stage-local failure surfaced through the reporting channel.
#[derive(Debug, Clone)]
pub struct StageError {
    pub stage: String,
    pub node: String,
    pub message: String,
}

/// Everything one pipeline pass produced.
pub struct PassOutcome {
    /// Updated snapshots of the input nodes, in completion order.
    pub nodes: Vec<Node>,
    /// Nodes emitted by stages (stubs, role groups, keys, twins).
    pub emitted: Vec<Node>,
    pub relations: Vec<RelationPair>,
    pub errors: Vec<StageError>,
}

/// Collecting [`Emitter`] used by the in-process driver and by tests.
#[derive(Default)]
pub struct PassRecorder {
    nodes: Mutex<Vec<Node>>,
    relations: Mutex<Vec<RelationPair>>,
    errors: Mutex<Vec<StageError>>,
}

impl PassRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.nodes.lock().expect("recorder poisoned").clone()
    }

    pub fn relations(&self) -> Vec<RelationPair> {
        self.relations.lock().expect("recorder poisoned").clone()
    }

    pub fn errors(&self) -> Vec<StageError> {
        self.errors.lock().expect("recorder poisoned").clone()
    }
}

impl Emitter for PassRecorder {
    fn node(&self, node: Node) {
        self.nodes.lock().expect("recorder poisoned").push(node);
    }

    fn relation(&self, pair: RelationPair) {
        self.relations.lock().expect("recorder poisoned").push(pair);
    }

    fn report(&self, stage: &str, node: &str, error: &anyhow::Error) {
        self.errors.lock().expect("recorder poisoned").push(StageError {
            stage: stage.to_string(),
            node: node.to_string(),
            message: format!("{error:#}"),
        });
    }
}

/// Assembled pipeline: stage order, adapters, guards, shared cache.
pub struct Pipeline {
    pub stages: StageRegistry,
    pub adapters: Arc<AdapterRegistry>,
    pub resolver: Arc<Resolver>,
    pub guards: Arc<GuardTable>,
    pub cache: Arc<dyn SpecCache>,
    pub options: PipelineOptions,
}

/// Execute one pass: each node runs the stage chain in order as its own
/// task, so different stages are in flight concurrently across nodes while
/// each stage's fetches stay serialized behind its guard.
///
/// A stage error is reported and the node continues through the remaining
/// stages unmodified; nothing aborts the pass.
pub async fn run_pass(pipeline: &Pipeline, nodes: Vec<Node>) -> PassOutcome {
    let recorder = Arc::new(PassRecorder::new());
    let total = nodes.len();
    let span = tracing::info_span!("pass", nodes = total, stages = pipeline.stages.stages().len());

    let tasks = nodes.into_iter().map(|node| {
        let recorder = recorder.clone();
        let ctx = StageContext {
            emitter: recorder.clone(),
            cache: Arc::new(ScopedCache::new(pipeline.cache.clone(), &node.name())),
            guards: pipeline.guards.clone(),
            adapters: pipeline.adapters.clone(),
            resolver: pipeline.resolver.clone(),
            options: pipeline.options.clone(),
        };
        async move {
            let mut node = node;
            for stage in pipeline.stages.stages() {
                let name = node.name();
                match stage
                    .post_process(node.clone(), &ctx)
                    .instrument(tracing::info_span!("stage", stage = stage.name(), node = %name))
                    .await
                {
                    Ok(updated) => node = updated,
                    Err(err) => {
                        tracing::warn!(
                            target: "atlas_core",
                            stage = stage.name(),
                            node = %name,
                            error = ?err,
                            "stage failed, node left intact"
                        );
                        ctx.emitter.report(stage.name(), &name, &err);
                    }
                }
            }
            node
        }
    });

    let nodes = join_all(tasks).instrument(span).await;

    let outcome = PassOutcome {
        nodes,
        emitted: recorder.nodes(),
        relations: recorder.relations(),
        errors: recorder.errors(),
    };
    tracing::info!(
        target: "atlas_core",
        processed = total,
        emitted = outcome.emitted.len(),
        relations = outcome.relations.len(),
        errors = outcome.errors.len(),
        "pass complete"
    );
    outcome
}
