use super::{Injected, ReconcileResult, Reconciler};
use crate::client::{CreateKubePromStackOpts, KubePromStackService, StateHandlers};
use crate::error::{OperationContext, Result};
use crate::metadata::CommonMetadata;
use resourcetree::{ResourceKind, ResourceNode, ResourceNodeState};
use std::sync::Arc;

/// Monitoring stack with grafana behind the identity pool
pub struct KubePromStackReconciler {
    injected: Injected,
    client: Arc<dyn KubePromStackService>,
}

impl KubePromStackReconciler {
    pub fn new(client: Arc<dyn KubePromStackService>) -> Self {
        Self {
            injected: Injected::default(),
            client,
        }
    }
}

impl Reconciler for KubePromStackReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::KubePromStack
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

                self.client
                    .create_kube_prom_stack(
                        &metadata.context,
                        CreateKubePromStackOpts {
                            id: metadata.cluster_id.clone(),
                            domain: format!("grafana.{}", zone.domain),
                            hosted_zone_id: zone.hosted_zone_id,
                            user_pool_id: pool.user_pool_id,
                        },
                    )
                    .operation("creating kube-prometheus-stack")?;
            }
            ResourceNodeState::Absent => {
                let metadata = self.injected.metadata(self.kind())?;
                self.client
                    .delete_kube_prom_stack(&metadata.context, &metadata.cluster_id)
                    .operation("deleting kube-prometheus-stack")?;
            }
            ResourceNodeState::Noop => {}
        }

        Ok(ReconcileResult::default())
    }
}
