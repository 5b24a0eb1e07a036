//! Atlas - Multi-chain entity discovery and reconciliation pipeline.
//!
//! Crawls EVM-compatible chains and NEAR to build a typed graph of on-chain
//! entities, merging explicitly declared records with records discovered by
//! probing chain state and explorer APIs. This crate is the umbrella facade:
//! the work lives in the workspace members, re-exported here under stable
//! paths.

pub use atlas_adapter_evm as adapter_evm;
pub use atlas_adapter_near as adapter_near;
pub use atlas_core as core;
pub use atlas_model as model;
pub use atlas_policy_astrodao as policy_astrodao;
pub use atlas_policy_safe as policy_safe;
pub use atlas_stages as stages;
