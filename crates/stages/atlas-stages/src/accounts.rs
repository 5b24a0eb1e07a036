//! Signer bookkeeping: interaction references, EVM/Aurora twins, tags.

use anyhow::Result;
use async_trait::async_trait;
use atlas_core::{Stage, StageContext};
use atlas_model::{
    Network, Node, NodeId, NodeKind, NodeRole, Relation, RelationPair, TAG_DEPRECATED, TAG_RETIRED,
};

use crate::support::resolve_and_emit;

/// Ethereum and Aurora signers share key material, so a wallet declared on
/// one side implies the same wallet on the other.
fn twin_of(network: Network) -> Option<Network> {
    match network {
        Network::Ethereum => Some(Network::Aurora),
        Network::Aurora => Some(Network::Ethereum),
        Network::Near => None,
    }
}

pub struct AccountStage;

#[async_trait]
impl Stage for AccountStage {
    fn name(&self) -> &'static str {
        "accounts"
    }

    async fn post_process(&self, mut node: Node, ctx: &StageContext) -> Result<Node> {
        if node.id.role != NodeRole::Signer {
            return Ok(node);
        }

        // Retired signers are also deprecated.
        if node.has_tag(TAG_RETIRED) {
            node.add_tag(TAG_DEPRECATED);
        }

        if let Some(owner) = &node.owner {
            ctx.emitter
                .relation(RelationPair::new(Relation::Owns, owner.clone(), node.name()));
        }

        for reference in &node.interacts_with {
            let target = resolve_and_emit(ctx, reference).await?;
            ctx.emitter.relation(RelationPair::new(
                Relation::Consumes,
                node.name(),
                target.name(),
            ));
        }

        // Derive the twin signer unless the other side was declared itself.
        if !node.stub {
            if let Some(twin_network) = twin_of(node.id.network) {
                let twin_id = NodeId::new(
                    twin_network,
                    node.id.network_type.clone(),
                    node.id.address.clone(),
                    NodeRole::Signer,
                );
                if ctx.resolver.lookup_declared(&twin_id).is_none() {
                    let mut twin = Node::stub(twin_id, NodeKind::Plain);
                    twin.owner = node.owner.clone();
                    for tag in [TAG_DEPRECATED, TAG_RETIRED] {
                        if node.has_tag(tag) {
                            twin.add_tag(tag);
                        }
                    }
                    tracing::debug!(
                        target: "atlas_stages",
                        signer = %node.id,
                        twin = %twin.id,
                        "derived twin signer"
                    );
                    if let Some(owner) = &node.owner {
                        ctx.emitter.relation(RelationPair::new(
                            Relation::Owns,
                            owner.clone(),
                            twin.name(),
                        ));
                    }
                    ctx.emitter.node(twin);
                }
            }
        }

        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_core::AdapterRegistry;
    use atlas_model::{EntityRef, NetworkType, TAG_STUB};
    use atlas_test_utils::{Harness, StubChainAdapter};
    use std::sync::Arc;

    fn signer(network: Network, address: &str) -> Node {
        Node::declared(
            NodeId::new(network, NetworkType::Mainnet, address, NodeRole::Signer),
            NodeKind::Plain,
        )
    }

    fn harness() -> Harness {
        let mut adapters = AdapterRegistry::new();
        adapters
            .register_chain(Arc::new(StubChainAdapter::new(Network::Ethereum)))
            .unwrap();
        adapters
            .register_chain(Arc::new(StubChainAdapter::new(Network::Aurora)))
            .unwrap();
        Harness::new(adapters)
    }

    #[tokio::test]
    async fn derives_the_aurora_twin_for_an_ethereum_signer() {
        let harness = harness();
        let node = signer(Network::Ethereum, "0xaaa");
        AccountStage
            .post_process(node, &harness.context())
            .await
            .unwrap();

        let twin = harness
            .emitter
            .emitted_node("aurora-mainnet-0xaaa")
            .expect("twin emitted");
        assert!(twin.stub);
        assert!(twin.has_tag(TAG_STUB));
        assert_eq!(twin.id.network, Network::Aurora);
    }

    #[tokio::test]
    async fn twin_derivation_is_symmetric() {
        let harness = harness();
        AccountStage
            .post_process(signer(Network::Aurora, "0xbbb"), &harness.context())
            .await
            .unwrap();
        assert!(harness.emitter.emitted_node("ethereum-mainnet-0xbbb").is_some());
    }

    #[tokio::test]
    async fn declared_twin_suppresses_derivation() {
        let harness = harness();
        harness.store.insert(signer(Network::Aurora, "0xccc"));
        AccountStage
            .post_process(signer(Network::Ethereum, "0xccc"), &harness.context())
            .await
            .unwrap();
        assert!(harness.emitter.nodes().is_empty());
    }

    #[tokio::test]
    async fn twin_inherits_owner_and_deprecation_tags() {
        let harness = harness();
        let mut node = signer(Network::Ethereum, "0xddd");
        node.owner = Some("alice".to_string());
        node.add_tag(TAG_RETIRED);

        let updated = AccountStage
            .post_process(node, &harness.context())
            .await
            .unwrap();
        assert!(updated.has_tag(TAG_DEPRECATED), "retired implies deprecated");

        let twin = harness.emitter.emitted_node("aurora-mainnet-0xddd").unwrap();
        assert_eq!(twin.owner.as_deref(), Some("alice"));
        assert!(twin.has_tag(TAG_RETIRED));
        assert!(twin.has_tag(TAG_DEPRECATED));
        assert!(harness
            .emitter
            .has_relation(Relation::Owns, "alice", "ethereum-mainnet-0xddd"));
        assert!(harness
            .emitter
            .has_relation(Relation::Owns, "alice", "aurora-mainnet-0xddd"));
    }

    #[tokio::test]
    async fn interaction_references_resolve_and_emit_edges() {
        let harness = harness();
        let mut node = signer(Network::Ethereum, "0xeee");
        node.interacts_with = vec![EntityRef::new(
            NodeRole::Contract,
            Network::Ethereum,
            NetworkType::Mainnet,
            "0xfff",
        )];

        AccountStage
            .post_process(node, &harness.context())
            .await
            .unwrap();

        assert!(harness.emitter.has_relation(
            Relation::Consumes,
            "ethereum-mainnet-0xeee",
            "ethereum-mainnet-0xfff"
        ));
        // The undeclared target surfaced as a stub.
        assert!(harness
            .emitter
            .emitted_node("ethereum-mainnet-0xfff")
            .unwrap()
            .stub);
    }

    #[tokio::test]
    async fn non_signers_pass_through_untouched() {
        let harness = harness();
        let node = Node::declared(
            NodeId::new(
                Network::Ethereum,
                NetworkType::Mainnet,
                "0x123",
                NodeRole::Contract,
            ),
            NodeKind::Contract(Default::default()),
        );
        let updated = AccountStage
            .post_process(node.clone(), &harness.context())
            .await
            .unwrap();
        assert_eq!(updated, node);
        assert!(harness.emitter.nodes().is_empty());
    }
}
