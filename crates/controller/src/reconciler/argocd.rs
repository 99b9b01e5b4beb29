use super::{Injected, ReconcileResult, Reconciler};
use crate::client::{ArgoCdService, CreateArgoCdOpts, StateHandlers};
use crate::error::{OperationContext, Result};
use crate::metadata::CommonMetadata;
use resourcetree::{ResourceKind, ResourceNode, ResourceNodeState};
use std::sync::Arc;

/// Argo CD behind the identity pool, syncing from the GitOps repository
pub struct ArgoCdReconciler {
    injected: Injected,
    client: Arc<dyn ArgoCdService>,
}

impl ArgoCdReconciler {
    pub fn new(client: Arc<dyn ArgoCdService>) -> Self {
        Self {
            injected: Injected::default(),
            client,
        }
    }
}

impl Reconciler for ArgoCdReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ArgoCd
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
                let handlers = self.injected.handlers(self.kind())?;

                let zone = handlers
                    .get_primary_hosted_zone()
                    .operation("getting primary hosted zone")?;
                let pool = handlers
                    .get_identity_pool(&metadata.cluster_id.cluster_name)
                    .operation("getting identity pool")?;
                let repository = handlers
                    .get_github_repository()
                    .operation("getting github repository")?;

                self.client
                    .create_argocd(
                        &metadata.context,
                        CreateArgoCdOpts {
                            id: metadata.cluster_id.clone(),
                            domain: format!("argocd.{}", zone.domain),
                            hosted_zone_id: zone.hosted_zone_id,
                            user_pool_id: pool.user_pool_id,
                            repository: repository.full_name(),
                        },
                    )
                    .operation("creating argocd")?;
            }
            ResourceNodeState::Absent => {
                let metadata = self.injected.metadata(self.kind())?;
                self.client
                    .delete_argocd(&metadata.context, &metadata.cluster_id)
                    .operation("deleting argocd")?;
            }
            ResourceNodeState::Noop => {}
        }

        Ok(ReconcileResult::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeServices, FakeState, metadata};

    #[test]
    fn test_argocd_needs_repository() {
        let services = Arc::new(FakeServices::default());
        let state = Arc::new(FakeState::provisioned());
        state.with(|s| s.github = None);

        let mut reconciler = ArgoCdReconciler::new(services.clone());
        reconciler.set_common_metadata(Arc::new(metadata()));
        reconciler.set_state_handlers(state.clone());

        let node = ResourceNode::new(ResourceKind::ArgoCd);
        let err = reconciler.reconcile(&node).unwrap_err();
        assert!(err.to_string().starts_with("getting github repository"));

        let provisioned = FakeState::provisioned();
        state.with(|s| s.github = provisioned.with(|p| p.github.clone()));
        reconciler.reconcile(&node).unwrap();

        let record = services.state.with(|s| s.argocd.clone()).unwrap();
        assert_eq!(record.domain, "argocd.staging.example.com");
    }
}
