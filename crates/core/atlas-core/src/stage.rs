//! Stage trait and the per-node context handed to each stage.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use atlas_model::{Node, RelationPair, DEFAULT_TTL_MINUTES};
use chrono::Duration;

use crate::cache::SpecCache;
use crate::guard::GuardTable;
use crate::registry::AdapterRegistry;
use crate::resolver::Resolver;

/// Emission callback contract offered by the host pipeline: new nodes,
/// matched relationship pairs, and the error-reporting channel for
/// stage-local failures.
pub trait Emitter: Send + Sync {
    fn node(&self, node: Node);
    fn relation(&self, pair: RelationPair);
    fn report(&self, stage: &str, node: &str, error: &anyhow::Error);
}

/// Pass-wide tuning knobs.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Spec staleness threshold.
    pub ttl: Duration,
    /// Attempts per guarded fetch.
    pub retries: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::minutes(DEFAULT_TTL_MINUTES),
            retries: 3,
        }
    }
}

/// Everything a stage may touch while post-processing one node.
pub struct StageContext {
    pub emitter: Arc<dyn Emitter>,
    /// Spec cache scoped to the node being processed.
    pub cache: Arc<dyn SpecCache>,
    pub guards: Arc<GuardTable>,
    pub adapters: Arc<AdapterRegistry>,
    pub resolver: Arc<Resolver>,
    pub options: PipelineOptions,
}

/// One discovery stage, run once per node per pipeline pass.
///
/// Stages never call each other; cross-stage coordination happens only
/// through node mutation and emissions consumed on later passes. A stage
/// returns the (possibly updated) node snapshot; returning an error leaves
/// the input node intact and routes the error to the reporting channel.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stage identifier, also the exclusivity-guard key.
    fn name(&self) -> &'static str;

    async fn post_process(&self, node: Node, ctx: &StageContext) -> Result<Node>;
}
