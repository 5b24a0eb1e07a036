//! Declared entity references of the form `role:network/network_type/address`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::node::{Network, NetworkType, NodeId, NodeRole};

/// A declared pointer at another on-chain entity, e.g.
/// `contract:near/mainnet/aurora`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityRef {
    pub role: NodeRole,
    pub network: Network,
    pub network_type: NetworkType,
    pub address: String,
}

impl EntityRef {
    pub fn new(
        role: NodeRole,
        network: Network,
        network_type: NetworkType,
        address: impl Into<String>,
    ) -> Self {
        Self {
            role,
            network,
            network_type,
            address: address.into(),
        }
    }

    /// The identity this reference resolves to, assuming the address is
    /// already in normalized form.
    pub fn node_id(&self) -> NodeId {
        NodeId::new(
            self.network,
            self.network_type.clone(),
            self.address.clone(),
            self.role,
        )
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}/{}/{}",
            self.role, self.network, self.network_type, self.address
        )
    }
}

impl FromStr for EntityRef {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ModelError::InvalidReference(s.to_string());

        let (role, rest) = s.split_once(':').ok_or_else(malformed)?;
        let mut parts = rest.splitn(3, '/');
        let network = parts.next().ok_or_else(malformed)?;
        let network_type = parts.next().ok_or_else(malformed)?;
        let address = parts.next().ok_or_else(malformed)?;
        if address.is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            role: role.parse().map_err(|_| malformed())?,
            network: network.parse().map_err(|_| malformed())?,
            network_type: network_type.parse().map_err(|_| malformed())?,
            address: address.to_string(),
        })
    }
}

impl TryFrom<String> for EntityRef {
    type Error = ModelError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<EntityRef> for String {
    fn from(r: EntityRef) -> Self {
        r.to_string()
    }
}
