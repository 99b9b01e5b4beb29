use super::{Injected, ReconcileResult, Reconciler};
use crate::client::{CreateIdentityPoolOpts, IdentityManagerService, StateHandlers};
use crate::error::{OperationContext, Result};
use crate::metadata::CommonMetadata;
use resourcetree::{ResourceKind, ResourceNode, ResourceNodeState};
use std::sync::Arc;

/// User pool authenticating on `auth.<zone domain>`
pub struct IdentityManagerReconciler {
    injected: Injected,
    client: Arc<dyn IdentityManagerService>,
}

impl IdentityManagerReconciler {
    pub fn new(client: Arc<dyn IdentityManagerService>) -> Self {
        Self {
            injected: Injected::default(),
            client,
        }
    }
}

impl Reconciler for IdentityManagerReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::IdentityManager
    }

    fn set_common_metadata(&mut self, metadata: Arc<CommonMetadata>) {
        self.injected.set_metadata(metadata);
    }

    fn set_state_handlers(&mut self, handlers: Arc<dyn StateHandlers>) {
        self.injected.set_handlers(handlers);
    }

    fn reconcile(&self, node: &ResourceNode) -> Result<ReconcileResult> {
        match node.state {
            ResourceNodeState::Present => {
                let metadata = self.injected.metadata(self.kind())?;
                let zone = self
                    .injected
                    .handlers(self.kind())?
                    .get_primary_hosted_zone()
                    .operation("getting primary hosted zone")?;

                let pool = self
                    .client
                    .create_identity_pool(
                        &metadata.context,
                        CreateIdentityPoolOpts {
                            id: metadata.cluster_id.clone(),
                            auth_domain: format!("auth.{}", zone.domain),
                            hosted_zone_id: zone.hosted_zone_id,
                        },
                    )
                    .operation("creating identity pool")?;
                log::debug!("Identity pool {} on {}", pool.user_pool_id, pool.auth_domain);
            }
            ResourceNodeState::Absent => {
                let metadata = self.injected.metadata(self.kind())?;
                self.client
                    .delete_identity_pool(&metadata.context, &metadata.cluster_id)
                    .operation("deleting identity pool")?;
            }
            ResourceNodeState::Noop => {}
        }

        Ok(ReconcileResult::default())
    }
}
