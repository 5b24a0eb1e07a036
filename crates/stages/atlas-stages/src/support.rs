use anyhow::Result;
use atlas_core::StageContext;
use atlas_model::{EntityRef, Node};

/// Resolve a declared reference; freshly discovered stubs are emitted so the
/// host learns about them.
pub(crate) async fn resolve_and_emit(ctx: &StageContext, reference: &EntityRef) -> Result<Node> {
    let node = ctx.resolver.resolve_ref(reference).await?;
    if node.stub {
        ctx.emitter.node(node.clone());
    }
    Ok(node)
}
