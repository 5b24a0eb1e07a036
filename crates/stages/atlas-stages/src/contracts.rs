//! Contract enrichment: source/state/RBAC specs, dependency edges, role
//! groups.

use anyhow::{Context, Result};
use async_trait::async_trait;
use atlas_core::{cached_fetch, run_guarded, Stage, StageContext};
use atlas_model::{
    Node, NodeId, NodeKind, NodeRole, RbacSpec, Relation, RelationPair, RoleGrant,
    RoleGroupDetail, SourceSpec, StateSpec,
};
use chrono::Utc;
use std::collections::BTreeMap;

use crate::support::resolve_and_emit;

const STAGE: &str = "contracts";

pub struct ContractStage;

impl ContractStage {
    /// Populate the contract detail from guarded, TTL-cached fetches. Every
    /// upstream failure degrades to "spec absent"; enrichment itself only
    /// fails on wiring errors.
    async fn enrich(&self, node: &mut Node, key_prefix: &str, ctx: &StageContext) -> Result<()> {
        let network = node.id.network;
        let adapter = ctx
            .adapters
            .chain(network)
            .with_context(|| format!("no chain adapter registered for '{network}'"))?;
        let address = node.id.address.clone();
        let retries = ctx.options.retries;
        let delay = adapter.request_delay();

        let source: Option<SourceSpec> = cached_fetch(
            ctx.cache.as_ref(),
            &format!("{key_prefix}source"),
            ctx.options.ttl,
            || {
                run_guarded(&ctx.guards, STAGE, retries, delay, || {
                    adapter.fetch_source_spec(&address)
                })
            },
        )
        .await;

        // State enumeration works from the source spec when one exists (EVM
        // ABI walk); otherwise from an empty placeholder (NEAR wasm scan).
        let probe = source.clone().unwrap_or(SourceSpec {
            abi: None,
            verified: false,
            creation_block: None,
            fetch_date: Utc::now(),
        });
        let state: Option<StateSpec> = cached_fetch(
            ctx.cache.as_ref(),
            &format!("{key_prefix}state"),
            ctx.options.ttl,
            || {
                run_guarded(&ctx.guards, STAGE, retries, delay, || {
                    adapter.fetch_state_spec(&address, &probe)
                })
            },
        )
        .await;

        let rbac: Option<RbacSpec> = match ctx.adapters.role_groups(network) {
            Some(groups) => {
                cached_fetch(
                    ctx.cache.as_ref(),
                    &format!("{key_prefix}rbac"),
                    ctx.options.ttl,
                    || {
                        run_guarded(&ctx.guards, STAGE, retries, delay, || {
                            groups.fetch_rbac(&address)
                        })
                    },
                )
                .await
            }
            None => None,
        };

        let detail = node
            .kind
            .contract_detail_mut()
            .with_context(|| format!("'{}' has no contract detail", node.id))?;
        if source.is_some() {
            detail.source = source;
        }
        if state.is_some() {
            detail.state = state;
        }
        if rbac.is_some() {
            detail.rbac = rbac;
        }
        Ok(())
    }

    /// Address-valued state facts become depends-on edges.
    async fn derive_state_edges(&self, node: &Node, ctx: &StageContext) {
        let Some(state) = node.kind.contract_detail().and_then(|d| d.state.as_ref()) else {
            return;
        };
        for (method, target) in &state.interacts_with {
            let resolved = ctx
                .resolver
                .resolve(
                    node.id.network,
                    node.id.network_type.clone(),
                    target,
                    NodeRole::Contract,
                )
                .await;
            let target_node = match resolved {
                Ok(target_node) => target_node,
                Err(err) => {
                    tracing::debug!(
                        target: "atlas_stages",
                        node = %node.id,
                        method = method.as_str(),
                        error = ?err,
                        "skipping unresolvable state-fact target"
                    );
                    continue;
                }
            };
            if target_node.stub {
                ctx.emitter.node(target_node.clone());
            }
            ctx.emitter.relation(RelationPair::new(
                Relation::DependsOn,
                node.name(),
                target_node.name(),
            ));
        }
    }

    /// Role ids surfaced by `*ROLE*` getters and by the RBAC spec become
    /// role-group nodes provided by the contract; RBAC members get
    /// membership edges.
    async fn emit_role_groups(&self, node: &Node, ctx: &StageContext) {
        let Some(detail) = node.kind.contract_detail() else {
            return;
        };

        let mut roles: BTreeMap<String, Option<RoleGrant>> = BTreeMap::new();
        if let Some(rbac) = &detail.rbac {
            for (role_id, grant) in &rbac.roles {
                roles.insert(role_id.clone(), Some(grant.clone()));
            }
        }
        if let Some(state) = &detail.state {
            for role_id in state.role_getters.values() {
                roles.entry(role_id.clone()).or_insert(None);
            }
        }

        for (role_id, grant) in roles {
            let grant = grant.unwrap_or_default();
            let group_id = NodeId::new(
                node.id.network,
                node.id.network_type.clone(),
                format!("{}/{}", node.id.address, role_id),
                NodeRole::RoleGroup,
            );
            let group = Node::stub(
                group_id,
                NodeKind::RoleGroup(RoleGroupDetail {
                    role_id: role_id.clone(),
                    admin: grant.admin.clone(),
                    admin_of: grant.admin_of.clone(),
                    members: grant.members.clone(),
                }),
            );
            ctx.emitter.relation(RelationPair::new(
                Relation::Provides,
                node.name(),
                group.name(),
            ));

            for member in &grant.members {
                let resolved = ctx
                    .resolver
                    .resolve(
                        node.id.network,
                        node.id.network_type.clone(),
                        member,
                        NodeRole::Signer,
                    )
                    .await;
                match resolved {
                    Ok(member_node) => {
                        if member_node.stub {
                            ctx.emitter.node(member_node.clone());
                        }
                        ctx.emitter.relation(RelationPair::new(
                            Relation::HasMember,
                            group.name(),
                            member_node.name(),
                        ));
                    }
                    Err(err) => {
                        tracing::debug!(
                            target: "atlas_stages",
                            group = %group.id,
                            member = member.as_str(),
                            error = ?err,
                            "skipping unresolvable role member"
                        );
                    }
                }
            }

            ctx.emitter.node(group);
        }
    }
}

#[async_trait]
impl Stage for ContractStage {
    fn name(&self) -> &'static str {
        STAGE
    }

    async fn post_process(&self, mut node: Node, ctx: &StageContext) -> Result<Node> {
        if !matches!(node.id.role, NodeRole::Contract | NodeRole::Multisig) {
            return Ok(node);
        }

        // Declared deployment references: each target is resolved, enriched
        // and emitted as its own snapshot.
        for reference in node.deployed_at.clone() {
            let mut target = ctx.resolver.resolve_ref(&reference).await?;
            if target.kind.contract_detail().is_some() {
                let prefix = format!("{}/", target.name());
                self.enrich(&mut target, &prefix, ctx).await?;
                self.derive_state_edges(&target, ctx).await;
                self.emit_role_groups(&target, ctx).await;
            }
            ctx.emitter.relation(RelationPair::new(
                Relation::Owns,
                node.name(),
                target.name(),
            ));
            ctx.emitter.node(target);
        }

        for reference in node.interacts_with.clone() {
            let target = resolve_and_emit(ctx, &reference).await?;
            ctx.emitter.relation(RelationPair::new(
                Relation::DependsOn,
                node.name(),
                target.name(),
            ));
        }

        if node.kind.contract_detail().is_some() {
            self.enrich(&mut node, "", ctx).await?;
            self.derive_state_edges(&node, ctx).await;
            self.emit_role_groups(&node, ctx).await;
        }

        Ok(node)
    }
}
