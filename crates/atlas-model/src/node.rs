//! Node identity and the closed set of typed node variants.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::name::node_name;
use crate::refs::EntityRef;
use crate::spec::{PolicySpec, RbacSpec, SourceSpec, StateSpec};
use crate::TAG_STUB;

/// Chains the pipeline knows how to probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Ethereum,
    Aurora,
    Near,
}

impl Network {
    /// Ethereum and Aurora share address grammar and signer key material.
    pub fn is_evm(&self) -> bool {
        matches!(self, Network::Ethereum | Network::Aurora)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Ethereum => "ethereum",
            Network::Aurora => "aurora",
            Network::Near => "near",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ethereum" => Ok(Network::Ethereum),
            "aurora" => Ok(Network::Aurora),
            "near" => Ok(Network::Near),
            other => Err(ModelError::InvalidNetwork(other.to_string())),
        }
    }
}

/// Network flavor. The grammar is open-ended, so unrecognized values are
/// preserved verbatim rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NetworkType {
    Mainnet,
    Testnet,
    Custom(String),
}

impl NetworkType {
    pub fn as_str(&self) -> &str {
        match self {
            NetworkType::Mainnet => "mainnet",
            NetworkType::Testnet => "testnet",
            NetworkType::Custom(s) => s,
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for NetworkType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "mainnet" => NetworkType::Mainnet,
            "testnet" => NetworkType::Testnet,
            _ => NetworkType::Custom(s),
        }
    }
}

impl From<NetworkType> for String {
    fn from(t: NetworkType) -> Self {
        t.as_str().to_string()
    }
}

impl FromStr for NetworkType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ModelError::InvalidNetwork(s.to_string()));
        }
        Ok(NetworkType::from(s.to_string()))
    }
}

/// Closed role set. Parsing an unknown role fails fast, before any
/// network call is attempted on behalf of the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeRole {
    Signer,
    Contract,
    Multisig,
    RoleGroup,
    AccessKey,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Signer => "signer",
            NodeRole::Contract => "contract",
            NodeRole::Multisig => "multisig",
            NodeRole::RoleGroup => "role-group",
            NodeRole::AccessKey => "access-key",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeRole {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "signer" => Ok(NodeRole::Signer),
            "contract" => Ok(NodeRole::Contract),
            "multisig" => Ok(NodeRole::Multisig),
            "role-group" => Ok(NodeRole::RoleGroup),
            "access-key" => Ok(NodeRole::AccessKey),
            other => Err(ModelError::InvalidRole(other.to_string())),
        }
    }
}

/// Canonical node identity: `(network, network_type, normalized_address, role)`.
///
/// The address stored here is expected to already be normalized by the
/// owning chain adapter. The same raw address under two different roles is
/// two distinct identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    pub network: Network,
    pub network_type: NetworkType,
    pub address: String,
    pub role: NodeRole,
}

impl NodeId {
    pub fn new(
        network: Network,
        network_type: NetworkType,
        address: impl Into<String>,
        role: NodeRole,
    ) -> Self {
        Self {
            network,
            network_type,
            address: address.into(),
            role,
        }
    }

    /// Host-facing identifier, subject to the 63-character limit.
    pub fn name(&self) -> String {
        node_name(self)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}/{}/{}",
            self.role, self.network, self.network_type, self.address
        )
    }
}

/// Governance-capable sub-records of a contract deployment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<StateSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rbac: Option<RbacSpec>,
}

/// A multisig is a contract deployment with an ownership policy on top.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultisigDetail {
    #[serde(flatten)]
    pub contract: ContractDetail,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicySpec>,
    /// Owner addresses as reported by the policy adapter.
    #[serde(default)]
    pub owners: Vec<String>,
}

/// On-chain permission bucket with its admin wiring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleGroupDetail {
    /// Role identifier, distinct from the parent contract's address.
    pub role_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<String>,
    #[serde(default)]
    pub admin_of: Vec<String>,
    #[serde(default)]
    pub members: Vec<String>,
}

/// NEAR access key. Identity is the public key (hashed when over-long).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessKeyDetail {
    pub public_key: String,
    pub full_access: bool,
    #[serde(default)]
    pub deprecated: bool,
}

/// Closed tagged union of node specializations, dispatched by pattern match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum NodeKind {
    Plain,
    Contract(ContractDetail),
    Multisig(MultisigDetail),
    RoleGroup(RoleGroupDetail),
    AccessKey(AccessKeyDetail),
}

impl NodeKind {
    /// Contract detail for both contract and multisig variants.
    pub fn contract_detail(&self) -> Option<&ContractDetail> {
        match self {
            NodeKind::Contract(c) => Some(c),
            NodeKind::Multisig(m) => Some(&m.contract),
            _ => None,
        }
    }

    pub fn contract_detail_mut(&mut self) -> Option<&mut ContractDetail> {
        match self {
            NodeKind::Contract(c) => Some(c),
            NodeKind::Multisig(m) => Some(&mut m.contract),
            _ => None,
        }
    }
}

/// A typed, identity-bearing record proposed to the host catalog.
///
/// Nodes are rebuilt from scratch on every pipeline pass; the host storage
/// layer owns persisted identity and merges replacement snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub title: String,
    /// True when the node was discovered purely on-chain, with no explicit
    /// declaration backing it.
    pub stub: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Name of the declared owning entity, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default)]
    pub deployed_at: Vec<EntityRef>,
    #[serde(default)]
    pub interacts_with: Vec<EntityRef>,
    pub kind: NodeKind,
}

impl Node {
    /// Build a canonical node from an explicit declaration.
    pub fn declared(id: NodeId, kind: NodeKind) -> Self {
        let title = id.address.clone();
        Self {
            id,
            title,
            stub: false,
            tags: Vec::new(),
            owner: None,
            deployed_at: Vec::new(),
            interacts_with: Vec::new(),
            kind,
        }
    }

    /// Build a stub node for an identity discovered on-chain. Stubs are
    /// `*`-titled, tagged, and live in the discovered namespace until a
    /// canonical declaration supersedes them.
    pub fn stub(id: NodeId, kind: NodeKind) -> Self {
        let title = format!("*{}", id.address);
        Self {
            id,
            title,
            stub: true,
            tags: vec![TAG_STUB.to_string()],
            owner: None,
            deployed_at: Vec::new(),
            interacts_with: Vec::new(),
            kind,
        }
    }

    pub fn name(&self) -> String {
        self.id.name()
    }

    /// Stubs are stored apart from canonical nodes so they can be
    /// superseded without colliding.
    pub fn namespace(&self) -> &'static str {
        if self.stub {
            "discovered"
        } else {
            "default"
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Idempotent tag insertion.
    pub fn add_tag(&mut self, tag: &str) {
        if !self.has_tag(tag) {
            self.tags.push(tag.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trip() {
        for role in [
            NodeRole::Signer,
            NodeRole::Contract,
            NodeRole::Multisig,
            NodeRole::RoleGroup,
            NodeRole::AccessKey,
        ] {
            assert_eq!(role.as_str().parse::<NodeRole>().unwrap(), role);
        }
    }

    #[test]
    fn invalid_role_fails_fast() {
        let err = "validator".parse::<NodeRole>().unwrap_err();
        assert_eq!(err, ModelError::InvalidRole("validator".to_string()));
    }

    #[test]
    fn network_type_preserves_custom_values() {
        assert_eq!("mainnet".parse::<NetworkType>().unwrap(), NetworkType::Mainnet);
        let custom = "shadow".parse::<NetworkType>().unwrap();
        assert_eq!(custom, NetworkType::Custom("shadow".to_string()));
        assert_eq!(custom.as_str(), "shadow");
    }

    #[test]
    fn stub_nodes_are_marked_and_namespaced() {
        let id = NodeId::new(
            Network::Near,
            NetworkType::Mainnet,
            "alice.near",
            NodeRole::Signer,
        );
        let stub = Node::stub(id.clone(), NodeKind::Plain);
        assert!(stub.stub);
        assert!(stub.has_tag(TAG_STUB));
        assert_eq!(stub.title, "*alice.near");
        assert_eq!(stub.namespace(), "discovered");

        let canonical = Node::declared(id, NodeKind::Plain);
        assert!(!canonical.stub);
        assert_eq!(canonical.namespace(), "default");
    }

    #[test]
    fn add_tag_is_idempotent() {
        let id = NodeId::new(
            Network::Ethereum,
            NetworkType::Mainnet,
            "0x00",
            NodeRole::Signer,
        );
        let mut node = Node::declared(id, NodeKind::Plain);
        node.add_tag("deprecated");
        node.add_tag("deprecated");
        assert_eq!(node.tags.iter().filter(|t| *t == "deprecated").count(), 1);
    }
}
