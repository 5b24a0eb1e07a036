//! Host-facing node naming.
//!
//! The hosting catalog limits identifiers to 63 characters. Names are
//! `{network}-{network_type}-{address}` whenever that fits; otherwise the
//! address segment is replaced by a base58 encoding of its SHA-256 digest.
//! The fallback is lossy but deterministic, and the raw address is always
//! carried on the node itself, never only in the name.

use sha2::{Digest, Sha256};

use crate::node::NodeId;

/// Maximum identifier length accepted by the host catalog.
pub const MAX_NAME_LEN: usize = 63;

/// Compute the host identifier for a node identity.
pub fn node_name(id: &NodeId) -> String {
    let literal = format!("{}-{}-{}", id.network, id.network_type, id.address);
    if literal.len() <= MAX_NAME_LEN {
        return literal;
    }
    format!(
        "{}-{}-{}",
        id.network,
        id.network_type,
        hashed_segment(&id.address)
    )
}

/// Deterministic short form of an over-long address segment.
pub fn hashed_segment(address: &str) -> String {
    let digest = Sha256::digest(address.as_bytes());
    bs58::encode(digest).into_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Network, NetworkType, NodeRole};

    #[test]
    fn short_names_stay_literal() {
        let id = NodeId::new(
            Network::Ethereum,
            NetworkType::Mainnet,
            "0xd3c21bcecceda1000000d3c21bcecceda1000000",
            NodeRole::Contract,
        );
        assert_eq!(
            node_name(&id),
            "ethereum-mainnet-0xd3c21bcecceda1000000d3c21bcecceda1000000"
        );
    }

    #[test]
    fn long_names_fall_back_to_hash() {
        // 64-hex NEAR implicit account: the literal form is 78 chars.
        let implicit = "f".repeat(64);
        let id = NodeId::new(
            Network::Near,
            NetworkType::Mainnet,
            implicit.clone(),
            NodeRole::Signer,
        );
        let name = node_name(&id);
        assert!(name.len() <= MAX_NAME_LEN, "name too long: {name}");
        assert!(name.starts_with("near-mainnet-"));
        assert!(!name.contains(&implicit));
        // Deterministic function of the address alone.
        assert_eq!(name, node_name(&id));
        assert_eq!(
            name.trim_start_matches("near-mainnet-"),
            hashed_segment(&implicit)
        );
    }

    #[test]
    fn distinct_addresses_hash_to_distinct_segments() {
        let a = hashed_segment(&"a".repeat(64));
        let b = hashed_segment(&"b".repeat(64));
        assert_ne!(a, b);
    }
}
