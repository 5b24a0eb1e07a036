//! DAO governance membership from Sputnik policy documents.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use atlas_core::{run_guarded, Stage, StageContext};
use atlas_model::{Network, Node, NodeKind, NodeRole, Relation, RelationPair, TAG_ALLOW_UNKNOWN};
use atlas_policy_astrodao::{policy, PolicyDocumentSource};

const STAGE: &str = "dao-roles";

pub struct DaoRoleStage {
    source: Arc<dyn PolicyDocumentSource>,
}

impl DaoRoleStage {
    pub fn new(source: Arc<dyn PolicyDocumentSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Stage for DaoRoleStage {
    fn name(&self) -> &'static str {
        STAGE
    }

    async fn post_process(&self, node: Node, ctx: &StageContext) -> Result<Node> {
        if node.id.network != Network::Near || !matches!(node.kind, NodeKind::Multisig(_)) {
            return Ok(node);
        }
        let adapter = ctx
            .adapters
            .chain(Network::Near)
            .context("no chain adapter registered for 'near'")?;
        let address = node.id.address.clone();

        let document = run_guarded(
            &ctx.guards,
            STAGE,
            ctx.options.retries,
            adapter.request_delay(),
            || self.source.fetch_policy_document(&address),
        )
        .await
        .with_context(|| format!("policy document of '{}'", node.id))?;

        // Malformed or unsupported documents surface through the stage
        // boundary, leaving the node intact.
        let members = policy::council_members(&document)?;

        for member in members {
            let member_node = ctx
                .resolver
                .resolve(
                    Network::Near,
                    node.id.network_type.clone(),
                    &member,
                    NodeRole::Signer,
                )
                .await?;
            if member_node.stub {
                let mut stub = member_node.clone();
                // The shield travels with the stub so later tiers skip it.
                if node.has_tag(TAG_ALLOW_UNKNOWN) {
                    stub.add_tag(TAG_ALLOW_UNKNOWN);
                }
                ctx.emitter.node(stub);
            }
            ctx.emitter.relation(RelationPair::new(
                Relation::HasMember,
                node.name(),
                member_node.name(),
            ));
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_core::AdapterRegistry;
    use atlas_model::{MultisigDetail, NetworkType, NodeId};
    use atlas_test_utils::{Harness, StubChainAdapter, StubDocuments};
    use serde_json::json;

    fn dao(address: &str) -> Node {
        Node::declared(
            NodeId::new(
                Network::Near,
                NetworkType::Mainnet,
                address,
                NodeRole::Multisig,
            ),
            NodeKind::Multisig(MultisigDetail::default()),
        )
    }

    fn harness() -> Harness {
        let mut adapters = AdapterRegistry::new();
        adapters
            .register_chain(Arc::new(StubChainAdapter::new(Network::Near)))
            .unwrap();
        Harness::new(adapters)
    }

    fn stage(document: serde_json::Value) -> DaoRoleStage {
        DaoRoleStage::new(Arc::new(StubDocuments { document }))
    }

    #[tokio::test]
    async fn council_members_get_membership_edges() {
        let harness = harness();
        let stage = stage(json!({
            "roles": [{
                "name": "council",
                "kind": { "Group": ["alice.near", "bob.near"] },
                "permissions": ["*:*"]
            }]
        }));

        stage
            .post_process(dao("dao.sputnik-dao.near"), &harness.context())
            .await
            .unwrap();

        for member in ["alice.near", "bob.near"] {
            assert!(harness.emitter.has_relation(
                Relation::HasMember,
                "near-mainnet-dao.sputnik-dao.near",
                &format!("near-mainnet-{member}")
            ));
            assert!(harness
                .emitter
                .emitted_node(&format!("near-mainnet-{member}"))
                .unwrap()
                .stub);
        }
    }

    #[tokio::test]
    async fn allow_unknown_travels_with_member_stubs() {
        let harness = harness();
        let stage = stage(json!({
            "roles": [{
                "name": "council",
                "kind": { "Group": ["ghost.near"] },
                "permissions": ["*:*"]
            }]
        }));
        let mut node = dao("dao.sputnik-dao.near");
        node.add_tag(TAG_ALLOW_UNKNOWN);

        stage.post_process(node, &harness.context()).await.unwrap();

        let stub = harness
            .emitter
            .emitted_node("near-mainnet-ghost.near")
            .unwrap();
        assert!(stub.has_tag(TAG_ALLOW_UNKNOWN));
    }

    #[tokio::test]
    async fn malformed_policy_is_a_stage_error_not_a_crash() {
        let harness = harness();
        let stage = stage(json!({ "roles": "oops" }));

        let result = stage
            .post_process(dao("dao.sputnik-dao.near"), &harness.context())
            .await;
        assert!(result.is_err());
        assert!(harness.emitter.relations().is_empty());
    }

    #[tokio::test]
    async fn non_dao_nodes_pass_through() {
        let harness = harness();
        let stage = stage(json!({}));
        let node = Node::declared(
            NodeId::new(
                Network::Near,
                NetworkType::Mainnet,
                "app.near",
                NodeRole::Contract,
            ),
            NodeKind::Contract(Default::default()),
        );
        let updated = stage
            .post_process(node.clone(), &harness.context())
            .await
            .unwrap();
        assert_eq!(updated, node);
    }
}
