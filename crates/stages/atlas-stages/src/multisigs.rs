//! Multisig ownership: owner resolution, unknown-owner tagging, policy spec.

use anyhow::{Context, Result};
use async_trait::async_trait;
use atlas_core::{cached_fetch, run_guarded, Stage, StageContext};
use atlas_model::{Node, NodeKind, NodeRole, PolicySpec, TAG_ALLOW_UNKNOWN, TAG_HAS_UNKNOWN};

const STAGE: &str = "multisigs";

pub struct MultisigStage;

#[async_trait]
impl Stage for MultisigStage {
    fn name(&self) -> &'static str {
        STAGE
    }

    async fn post_process(&self, mut node: Node, ctx: &StageContext) -> Result<Node> {
        if !matches!(node.kind, NodeKind::Multisig(_)) {
            return Ok(node);
        }
        let network = node.id.network;
        let Some(policy) = ctx.adapters.policy(network) else {
            tracing::debug!(
                target: "atlas_stages",
                node = %node.id,
                "no policy adapter for network, skipping multisig"
            );
            return Ok(node);
        };
        let adapter = ctx
            .adapters
            .chain(network)
            .with_context(|| format!("no chain adapter registered for '{network}'"))?;
        let retries = ctx.options.retries;
        let delay = adapter.request_delay();
        let address = node.id.address.clone();

        let owners = run_guarded(&ctx.guards, STAGE, retries, delay, || {
            policy.fetch_owners(&address)
        })
        .await
        .with_context(|| format!("owners of multisig '{}'", node.id))?;

        for owner in &owners {
            let owner_node = ctx
                .resolver
                .resolve(network, node.id.network_type.clone(), owner, NodeRole::Signer)
                .await?;
            if owner_node.stub {
                let mut stub = owner_node;
                if node.has_tag(TAG_ALLOW_UNKNOWN) {
                    // The shield travels with the stub so later tiers skip it.
                    stub.add_tag(TAG_ALLOW_UNKNOWN);
                } else {
                    node.add_tag(TAG_HAS_UNKNOWN);
                }
                ctx.emitter.node(stub);
            }
        }

        let spec: Option<PolicySpec> = cached_fetch(
            ctx.cache.as_ref(),
            "policy",
            ctx.options.ttl,
            || {
                run_guarded(&ctx.guards, STAGE, retries, delay, || {
                    policy.fetch_policy(&address, owners.len() as u64)
                })
            },
        )
        .await;

        if let NodeKind::Multisig(detail) = &mut node.kind {
            detail.owners = owners;
            if spec.is_some() {
                detail.policy = spec;
            }
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_core::AdapterRegistry;
    use atlas_model::{MultisigDetail, Network, NetworkType, NodeId};
    use atlas_test_utils::{Harness, StubChainAdapter, StubPolicy};
    use std::sync::Arc;

    fn multisig(address: &str) -> Node {
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

    fn harness(owners: Vec<&str>, threshold: u64) -> Harness {
        let mut adapters = AdapterRegistry::new();
        adapters
            .register_chain(Arc::new(StubChainAdapter::new(Network::Near)))
            .unwrap();
        adapters.register_policy(
            Network::Near,
            Arc::new(StubPolicy {
                owners: owners.into_iter().map(str::to_string).collect(),
                threshold,
            }),
        );
        Harness::new(adapters)
    }

    #[tokio::test]
    async fn records_owners_and_policy_spec() {
        let harness = harness(vec!["alice.near", "bob.near"], 2);
        let updated = MultisigStage
            .post_process(multisig("dao.near"), &harness.context())
            .await
            .unwrap();

        let NodeKind::Multisig(detail) = &updated.kind else {
            panic!("kind changed")
        };
        assert_eq!(detail.owners, vec!["alice.near", "bob.near"]);
        let policy = detail.policy.as_ref().expect("policy spec");
        assert_eq!(policy.owner_count, 2);
        assert_eq!(policy.threshold, 2);
    }

    #[tokio::test]
    async fn undeclared_owner_marks_the_parent() {
        let harness = harness(vec!["ghost.near"], 1);
        let updated = MultisigStage
            .post_process(multisig("dao.near"), &harness.context())
            .await
            .unwrap();

        assert!(updated.has_tag(TAG_HAS_UNKNOWN));
        assert!(harness
            .emitter
            .emitted_node("near-mainnet-ghost.near")
            .unwrap()
            .stub);
    }

    #[tokio::test]
    async fn allow_unknown_shields_the_parent_and_travels_with_the_stub() {
        let harness = harness(vec!["ghost.near"], 1);
        let mut node = multisig("dao.near");
        node.add_tag(TAG_ALLOW_UNKNOWN);

        let updated = MultisigStage
            .post_process(node, &harness.context())
            .await
            .unwrap();

        assert!(!updated.has_tag(TAG_HAS_UNKNOWN));
        let stub = harness
            .emitter
            .emitted_node("near-mainnet-ghost.near")
            .unwrap();
        assert!(stub.has_tag(TAG_ALLOW_UNKNOWN));
    }

    #[tokio::test]
    async fn declared_owner_does_not_mark_the_parent() {
        let harness = harness(vec!["alice.near"], 1);
        harness.store.insert(Node::declared(
            NodeId::new(
                Network::Near,
                NetworkType::Mainnet,
                "alice.near",
                NodeRole::Signer,
            ),
            NodeKind::Plain,
        ));

        let updated = MultisigStage
            .post_process(multisig("dao.near"), &harness.context())
            .await
            .unwrap();
        assert!(!updated.has_tag(TAG_HAS_UNKNOWN));
        assert!(harness.emitter.nodes().is_empty());
    }

    #[tokio::test]
    async fn non_multisigs_pass_through() {
        let harness = harness(vec![], 0);
        let node = Node::declared(
            NodeId::new(
                Network::Near,
                NetworkType::Mainnet,
                "app.near",
                NodeRole::Contract,
            ),
            NodeKind::Contract(Default::default()),
        );
        let updated = MultisigStage
            .post_process(node.clone(), &harness.context())
            .await
            .unwrap();
        assert_eq!(updated, node);
    }
}
