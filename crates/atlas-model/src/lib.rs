//! Common types shared by adapters, stages, and the runtime.

mod error;
mod name;
mod node;
pub mod policy;
mod refs;
mod relation;
mod spec;

pub use error::{ModelError, PolicyError};
pub use name::node_name;
pub use node::{
    AccessKeyDetail, ContractDetail, MultisigDetail, Network, NetworkType, Node, NodeId, NodeKind,
    NodeRole, RoleGroupDetail,
};
pub use refs::EntityRef;
pub use relation::{Edge, Relation, RelationPair};
pub use spec::{
    AccessKeySpec, PolicySpec, RbacSpec, RoleGrant, SourceSpec, StateSpec, Timestamped, TxInfo,
    DEFAULT_TTL_MINUTES,
};

/// Tag applied to every node discovered purely on-chain.
pub const TAG_STUB: &str = "stub";
/// Tag that suppresses `has-unknown`/`unknown` propagation below a node.
pub const TAG_ALLOW_UNKNOWN: &str = "allow-unknown";
/// Tag applied to a multisig whose owner set contains an undeclared signer.
pub const TAG_HAS_UNKNOWN: &str = "has-unknown";
/// Tag back-propagated onto undeclared signers and keys.
pub const TAG_UNKNOWN: &str = "unknown";
pub const TAG_DEPRECATED: &str = "deprecated";
pub const TAG_RETIRED: &str = "retired";
