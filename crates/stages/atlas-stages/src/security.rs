//! Security tiering: mark undeclared signers and keys.

use anyhow::Result;
use async_trait::async_trait;
use atlas_core::{Stage, StageContext};
use atlas_model::{Node, NodeRole, TAG_ALLOW_UNKNOWN, TAG_UNKNOWN};

pub struct SecurityStage;

#[async_trait]
impl Stage for SecurityStage {
    fn name(&self) -> &'static str {
        "security"
    }

    async fn post_process(&self, mut node: Node, _ctx: &StageContext) -> Result<Node> {
        if !node.stub || !matches!(node.id.role, NodeRole::Signer | NodeRole::AccessKey) {
            return Ok(node);
        }
        // An allow-unknown tag propagated from an ancestor shields the stub.
        if node.has_tag(TAG_ALLOW_UNKNOWN) {
            return Ok(node);
        }
        tracing::debug!(target: "atlas_stages", node = %node.id, "marking undeclared node");
        node.add_tag(TAG_UNKNOWN);
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_core::AdapterRegistry;
    use atlas_model::{Network, NetworkType, NodeId, NodeKind};
    use atlas_test_utils::Harness;

    fn stub_signer(address: &str) -> Node {
        Node::stub(
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
    async fn undeclared_signer_is_marked_unknown() {
        let harness = Harness::new(AdapterRegistry::new());
        let updated = SecurityStage
            .post_process(stub_signer("ghost.near"), &harness.context())
            .await
            .unwrap();
        assert!(updated.has_tag(TAG_UNKNOWN));
    }

    #[tokio::test]
    async fn allow_unknown_ancestry_shields_the_stub() {
        let harness = Harness::new(AdapterRegistry::new());
        let mut node = stub_signer("ghost.near");
        node.add_tag(TAG_ALLOW_UNKNOWN);
        let updated = SecurityStage
            .post_process(node, &harness.context())
            .await
            .unwrap();
        assert!(!updated.has_tag(TAG_UNKNOWN));
    }

    #[tokio::test]
    async fn declared_nodes_are_never_marked() {
        let harness = Harness::new(AdapterRegistry::new());
        let node = Node::declared(
            NodeId::new(
                Network::Near,
                NetworkType::Mainnet,
                "alice.near",
                NodeRole::Signer,
            ),
            NodeKind::Plain,
        );
        let updated = SecurityStage
            .post_process(node, &harness.context())
            .await
            .unwrap();
        assert!(!updated.has_tag(TAG_UNKNOWN));
    }
}
