//! NEAR access-key discovery.

use anyhow::{Context, Result};
use async_trait::async_trait;
use atlas_core::{run_guarded, Stage, StageContext};
use atlas_model::{
    AccessKeyDetail, Network, Node, NodeId, NodeKind, NodeRole, Relation, RelationPair,
    TAG_DEPRECATED, TAG_RETIRED,
};

const STAGE: &str = "near-keys";

pub struct NearKeysStage;

#[async_trait]
impl Stage for NearKeysStage {
    fn name(&self) -> &'static str {
        STAGE
    }

    async fn post_process(&self, node: Node, ctx: &StageContext) -> Result<Node> {
        if node.id.network != Network::Near
            || !matches!(
                node.id.role,
                NodeRole::Signer | NodeRole::Contract | NodeRole::Multisig
            )
        {
            return Ok(node);
        }
        let adapter = ctx
            .adapters
            .chain(Network::Near)
            .context("no chain adapter registered for 'near'")?;
        let address = node.id.address.clone();

        let keys = match run_guarded(
            &ctx.guards,
            STAGE,
            ctx.options.retries,
            adapter.request_delay(),
            || adapter.fetch_access_keys(&address),
        )
        .await
        {
            Ok(keys) => keys,
            // Transient failure: no fresh data this pass.
            Err(_) => return Ok(node),
        };

        // Keys of a deprecated or retired account are themselves deprecated.
        let deprecated = node.has_tag(TAG_DEPRECATED) || node.has_tag(TAG_RETIRED);
        for key in keys {
            let full_access = key.is_full_access();
            let mut key_node = Node::stub(
                NodeId::new(
                    Network::Near,
                    node.id.network_type.clone(),
                    key.public_key.clone(),
                    NodeRole::AccessKey,
                ),
                NodeKind::AccessKey(AccessKeyDetail {
                    public_key: key.public_key.clone(),
                    full_access,
                    deprecated,
                }),
            );
            if deprecated {
                key_node.add_tag(TAG_DEPRECATED);
            }

            // A full-access key on a plain signer is the owner's key, not the
            // account's: hang it off the declared owner when there is one.
            let parent = if full_access && matches!(node.kind, NodeKind::Plain) {
                node.owner.clone().unwrap_or_else(|| node.name())
            } else {
                node.name()
            };
            ctx.emitter
                .relation(RelationPair::new(Relation::Owns, parent, key_node.name()));
            ctx.emitter.node(key_node);
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_core::AdapterRegistry;
    use atlas_model::{AccessKeySpec, NetworkType};
    use atlas_test_utils::{Harness, StubChainAdapter};
    use serde_json::json;
    use std::sync::Arc;

    fn full_key(public_key: &str) -> AccessKeySpec {
        AccessKeySpec {
            public_key: public_key.to_string(),
            permission: json!("FullAccess"),
            nonce: 1,
        }
    }

    fn restricted_key(public_key: &str) -> AccessKeySpec {
        AccessKeySpec {
            public_key: public_key.to_string(),
            permission: json!({
                "FunctionCall": { "receiver_id": "app.near", "method_names": [] }
            }),
            nonce: 1,
        }
    }

    fn harness(address: &str, keys: Vec<AccessKeySpec>) -> Harness {
        let adapter = StubChainAdapter::new(Network::Near).with_keys(address, keys);
        let mut adapters = AdapterRegistry::new();
        adapters.register_chain(Arc::new(adapter)).unwrap();
        Harness::new(adapters)
    }

    fn signer(address: &str) -> Node {
        Node::declared(
            NodeId::new(
                Network::Near,
                NetworkType::Mainnet,
                address,
                NodeRole::Signer,
            ),
            NodeKind::Plain,
        )
    }

    #[tokio::test]
    async fn emits_a_node_per_key_with_permission_classified() {
        let harness = harness(
            "alice.near",
            vec![full_key("ed25519:aaa"), restricted_key("ed25519:bbb")],
        );
        NearKeysStage
            .post_process(signer("alice.near"), &harness.context())
            .await
            .unwrap();

        let full = harness.emitter.emitted_node("near-mainnet-ed25519:aaa").unwrap();
        let NodeKind::AccessKey(detail) = &full.kind else {
            panic!("not an access key")
        };
        assert!(detail.full_access);

        let restricted = harness.emitter.emitted_node("near-mainnet-ed25519:bbb").unwrap();
        let NodeKind::AccessKey(detail) = &restricted.kind else {
            panic!("not an access key")
        };
        assert!(!detail.full_access);
    }

    #[tokio::test]
    async fn full_access_key_reparents_onto_the_declared_owner() {
        let harness = harness("alice.near", vec![full_key("ed25519:aaa")]);
        let mut node = signer("alice.near");
        node.owner = Some("alice".to_string());

        NearKeysStage
            .post_process(node, &harness.context())
            .await
            .unwrap();

        assert!(harness
            .emitter
            .has_relation(Relation::Owns, "alice", "near-mainnet-ed25519:aaa"));
    }

    #[tokio::test]
    async fn restricted_key_stays_on_the_account() {
        let harness = harness("alice.near", vec![restricted_key("ed25519:bbb")]);
        let mut node = signer("alice.near");
        node.owner = Some("alice".to_string());

        NearKeysStage
            .post_process(node, &harness.context())
            .await
            .unwrap();

        assert!(harness.emitter.has_relation(
            Relation::Owns,
            "near-mainnet-alice.near",
            "near-mainnet-ed25519:bbb"
        ));
    }

    #[tokio::test]
    async fn keys_of_a_retired_account_are_deprecated() {
        let harness = harness("old.near", vec![full_key("ed25519:ccc")]);
        let mut node = signer("old.near");
        node.add_tag(TAG_RETIRED);

        NearKeysStage
            .post_process(node, &harness.context())
            .await
            .unwrap();

        let key = harness.emitter.emitted_node("near-mainnet-ed25519:ccc").unwrap();
        assert!(key.has_tag(TAG_DEPRECATED));
        let NodeKind::AccessKey(detail) = &key.kind else {
            panic!("not an access key")
        };
        assert!(detail.deprecated);
    }

    #[tokio::test]
    async fn failed_key_fetch_leaves_the_node_intact() {
        let adapter = StubChainAdapter::new(Network::Near).with_failing("down.near");
        let mut adapters = AdapterRegistry::new();
        adapters.register_chain(Arc::new(adapter)).unwrap();
        let harness = Harness::new(adapters);

        let node = signer("down.near");
        let updated = NearKeysStage
            .post_process(node.clone(), &harness.context())
            .await
            .unwrap();
        assert_eq!(updated, node);
        assert!(harness.emitter.nodes().is_empty());
    }

    #[tokio::test]
    async fn non_near_nodes_are_skipped() {
        let mut adapters = AdapterRegistry::new();
        adapters
            .register_chain(Arc::new(StubChainAdapter::new(Network::Ethereum)))
            .unwrap();
        let harness = Harness::new(adapters);

        let node = Node::declared(
            NodeId::new(
                Network::Ethereum,
                NetworkType::Mainnet,
                "0xaaa",
                NodeRole::Signer,
            ),
            NodeKind::Plain,
        );
        let updated = NearKeysStage
            .post_process(node.clone(), &harness.context())
            .await
            .unwrap();
        assert_eq!(updated, node);
    }
}
