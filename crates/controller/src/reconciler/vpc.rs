use super::{Injected, ReconcileResult, Reconciler};
use crate::client::{CreateVpcOpts, StateHandlers, VpcService};
use crate::error::{OperationContext, Result};
use crate::metadata::CommonMetadata;
use resourcetree::{ResourceKind, ResourceNode, ResourceNodeState};
use std::sync::Arc;

pub struct VpcReconciler {
    injected: Injected,
    client: Arc<dyn VpcService>,
}

impl VpcReconciler {
    pub fn new(client: Arc<dyn VpcService>) -> Self {
        Self {
            injected: Injected::default(),
            client,
        }
    }
}

impl Reconciler for VpcReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Vpc
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
                let vpc = &metadata.cluster(self.kind())?.vpc;

                let record = self
                    .client
                    .create_vpc(
                        &metadata.context,
                        CreateVpcOpts {
                            id: metadata.cluster_id.clone(),
                            cidr: vpc.cidr.clone(),
                            high_availability: vpc.high_availability,
                        },
                    )
                    .operation("creating vpc")?;
                log::debug!("Vpc {} uses {}", record.vpc_id, record.cidr);
            }
            ResourceNodeState::Absent => {
                let metadata = self.injected.metadata(self.kind())?;
                self.client
                    .delete_vpc(&metadata.context, &metadata.cluster_id)
                    .operation("deleting vpc")?;
            }
            ResourceNodeState::Noop => {}
        }

        Ok(ReconcileResult::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testing::{FakeServices, FakeState, metadata};

    fn reconciler(services: &Arc<FakeServices>) -> VpcReconciler {
        let mut reconciler = VpcReconciler::new(services.clone());
        reconciler.set_common_metadata(Arc::new(metadata()));
        reconciler.set_state_handlers(Arc::new(FakeState::default()));
        reconciler
    }

    fn node(state: ResourceNodeState) -> ResourceNode {
        let mut node = ResourceNode::new(ResourceKind::Vpc);
        node.state = state;
        node
    }

    #[test]
    fn test_present_creates() {
        let services = Arc::new(FakeServices::default());
        let result = reconciler(&services).reconcile(&node(ResourceNodeState::Present)).unwrap();

        assert!(!result.requeue);
        assert_eq!(services.calls(), vec!["create_vpc"]);
        assert!(services.state.with(|s| s.vpc));
    }

    #[test]
    fn test_absent_deletes() {
        let services = Arc::new(FakeServices::default());
        reconciler(&services).reconcile(&node(ResourceNodeState::Absent)).unwrap();
        assert_eq!(services.calls(), vec!["delete_vpc"]);
    }

    #[test]
    fn test_noop_makes_no_call() {
        let services = Arc::new(FakeServices::default());
        reconciler(&services).reconcile(&node(ResourceNodeState::Noop)).unwrap();
        assert!(services.calls().is_empty());
    }

    #[test]
    fn test_failure_names_the_operation() {
        let services = Arc::new(FakeServices::default());
        services.fail("create_vpc");

        let err = reconciler(&services)
            .reconcile(&node(ResourceNodeState::Present))
            .unwrap_err();
        assert!(matches!(err, Error::Operation { .. }));
        assert!(err.to_string().starts_with("creating vpc: "));
    }

    #[test]
    fn test_cancelled_context_stops_before_calling() {
        let services = Arc::new(FakeServices::default());
        let metadata = metadata();
        metadata.context.cancel();

        let mut reconciler = VpcReconciler::new(services.clone());
        reconciler.set_common_metadata(Arc::new(metadata));

        let err = reconciler.reconcile(&node(ResourceNodeState::Present)).unwrap_err();
        assert!(matches!(err, Error::Cancelled(_)));
        assert!(services.calls().is_empty());
    }
}
