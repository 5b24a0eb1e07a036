//! Discovery stages, run in a fixed order by the pass driver.
//!
//! Stages never call each other. A stage sees one node at a time, may mutate
//! it, and may emit new nodes and relation pairs; everything it emits is
//! consumed by the host on later passes.

pub mod accounts;
pub mod contracts;
pub mod dao_roles;
pub mod multisigs;
pub mod near_keys;
pub mod security;

mod support;

use std::sync::Arc;

use atlas_core::Stage;
use atlas_policy_astrodao::PolicyDocumentSource;

pub use crate::accounts::AccountStage;
pub use crate::contracts::ContractStage;
pub use crate::dao_roles::DaoRoleStage;
pub use crate::multisigs::MultisigStage;
pub use crate::near_keys::NearKeysStage;
pub use crate::security::SecurityStage;

/// The canonical stage order: accounts → contracts → multisigs → near-keys →
/// dao-roles → security. The DAO-role stage is only wired when a policy
/// document source is configured.
pub fn default_stages(dao_documents: Option<Arc<dyn PolicyDocumentSource>>) -> Vec<Arc<dyn Stage>> {
    let mut stages: Vec<Arc<dyn Stage>> = vec![
        Arc::new(AccountStage),
        Arc::new(ContractStage),
        Arc::new(MultisigStage),
        Arc::new(NearKeysStage),
    ];
    if let Some(source) = dao_documents {
        stages.push(Arc::new(DaoRoleStage::new(source)));
    }
    stages.push(Arc::new(SecurityStage));
    stages
}
