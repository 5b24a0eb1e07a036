//! Core runtime primitives for the Atlas discovery pipeline.

mod adapter;
mod cache;
mod config;
mod guard;
mod policy;
mod registry;
mod resolver;
mod runtime;
mod stage;

pub use adapter::ChainAdapter;
pub use cache::{cached_fetch, ScopedCache, SpecCache};
pub use config::{AtlasConfig, NetworkConfig, PipelineConfig, PolicyConfig};
pub use guard::{run_guarded, GuardTable};
pub use policy::{PolicyAdapter, RoleGroupAdapter};
pub use registry::{AdapterRegistry, StageRegistry};
pub use resolver::{NodeStore, Resolver};
pub use runtime::{run_pass, PassOutcome, PassRecorder, Pipeline, StageError};
pub use stage::{Emitter, PipelineOptions, Stage, StageContext};
