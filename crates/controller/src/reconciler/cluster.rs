use super::{Injected, ReconcileResult, Reconciler};
use crate::client::{ClusterService, CreateClusterOpts, StateHandlers};
use crate::error::{OperationContext, Result};
use crate::metadata::CommonMetadata;
use resourcetree::{ResourceKind, ResourceNode, ResourceNodeState};
use std::sync::Arc;

/// Kubernetes control plane inside the recorded vpc
pub struct ClusterReconciler {
    injected: Injected,
    client: Arc<dyn ClusterService>,
}

impl ClusterReconciler {
    pub fn new(client: Arc<dyn ClusterService>) -> Self {
        Self {
            injected: Injected::default(),
            client,
        }
    }
}

impl Reconciler for ClusterReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Cluster
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
                let declaration = metadata.cluster(self.kind())?;
                let vpc = self
                    .injected
                    .handlers(self.kind())?
                    .get_vpc(&metadata.cluster_id.cluster_name)
                    .operation("getting vpc")?;

                let cluster = self
                    .client
                    .create_cluster(
                        &metadata.context,
                        CreateClusterOpts {
                            id: metadata.cluster_id.clone(),
                            cidr: declaration.vpc.cidr.clone(),
                            vpc_id: vpc.vpc_id,
                        },
                    )
                    .operation("creating cluster")?;

                if let Some(endpoint) = &cluster.endpoint {
                    log::debug!("Cluster {} serves {endpoint}", cluster.name);
                }
            }
            ResourceNodeState::Absent => {
                let metadata = self.injected.metadata(self.kind())?;
                self.client
                    .delete_cluster(&metadata.context, &metadata.cluster_id)
                    .operation("deleting cluster")?;
            }
            ResourceNodeState::Noop => {}
        }

        Ok(ReconcileResult::default())
    }
}
