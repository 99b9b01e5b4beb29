//! Teardown-only reconcilers for resources the platform creates implicitly
//!
//! Load balancers and their security groups are created by workloads, not by
//! us, and would block deleting the cluster and the vpc. These nodes never
//! create anything. The desired tree built from a declaration always keeps
//! the vpc and the cluster, so these only run when the caller hands
//! `synchronize` a desired tree that tears them down.

use super::{Injected, ReconcileResult, Reconciler};
use crate::client::{CleanupService, StateHandlers};
use crate::current::found;
use crate::error::{OperationContext, Result};
use crate::metadata::CommonMetadata;
use resourcetree::{ResourceKind, ResourceNode};
use std::sync::Arc;

/// Removes security groups left in the vpc
pub struct SecurityGroupCleanupReconciler {
    injected: Injected,
    client: Arc<dyn CleanupService>,
}

impl SecurityGroupCleanupReconciler {
    pub fn new(client: Arc<dyn CleanupService>) -> Self {
        Self {
            injected: Injected::default(),
            client,
        }
    }
}

impl Reconciler for SecurityGroupCleanupReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::CleanupSecurityGroups
    }

    fn set_common_metadata(&mut self, metadata: Arc<CommonMetadata>) {
        self.injected.set_metadata(metadata);
    }

    fn set_state_handlers(&mut self, handlers: Arc<dyn StateHandlers>) {
        self.injected.set_handlers(handlers);
    }

    fn reconcile(&self, node: &ResourceNode) -> Result<ReconcileResult> {
        if !node.state.is_absent() {
            return Ok(ReconcileResult::default());
        }

        let metadata = self.injected.metadata(self.kind())?;
        let vpc = found(
            self.injected
                .handlers(self.kind())?
                .get_vpc(&metadata.cluster_id.cluster_name),
        )
        .operation("getting vpc")?;

        let Some(vpc) = vpc else {
            log::debug!("No vpc recorded for {}, skipping security group cleanup", metadata.cluster_id);
            return Ok(ReconcileResult::default());
        };

        self.client
            .delete_dangling_security_groups(&metadata.context, &metadata.cluster_id, &vpc.vpc_id)
            .operation("cleaning up security groups")?;

        Ok(ReconcileResult::default())
    }
}

/// Removes load balancers created by ingresses
pub struct LoadBalancerCleanupReconciler {
    injected: Injected,
    client: Arc<dyn CleanupService>,
}

impl LoadBalancerCleanupReconciler {
    pub fn new(client: Arc<dyn CleanupService>) -> Self {
        Self {
            injected: Injected::default(),
            client,
        }
    }
}

impl Reconciler for LoadBalancerCleanupReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::CleanupLoadBalancers
    }

    fn set_common_metadata(&mut self, metadata: Arc<CommonMetadata>) {
        self.injected.set_metadata(metadata);
    }

    fn set_state_handlers(&mut self, handlers: Arc<dyn StateHandlers>) {
        self.injected.set_handlers(handlers);
    }

    fn reconcile(&self, node: &ResourceNode) -> Result<ReconcileResult> {
        if !node.state.is_absent() {
            return Ok(ReconcileResult::default());
        }

        let metadata = self.injected.metadata(self.kind())?;
        self.client
            .delete_dangling_load_balancers(&metadata.context, &metadata.cluster_id)
            .operation("cleaning up load balancers")?;

        Ok(ReconcileResult::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeServices, FakeState, metadata};
    use resourcetree::ResourceNodeState;

    fn node(kind: ResourceKind, state: ResourceNodeState) -> ResourceNode {
        let mut node = ResourceNode::new(kind);
        node.state = state;
        node
    }

    #[test]
    fn test_cleanup_only_acts_on_absent() {
        let services = Arc::new(FakeServices::default());
        let state = Arc::new(FakeState::default());
        state.with(|s| s.vpc = true);

        let mut groups = SecurityGroupCleanupReconciler::new(services.clone());
        groups.set_common_metadata(Arc::new(metadata()));
        groups.set_state_handlers(state);
        let mut balancers = LoadBalancerCleanupReconciler::new(services.clone());
        balancers.set_common_metadata(Arc::new(metadata()));

        groups
            .reconcile(&node(ResourceKind::CleanupSecurityGroups, ResourceNodeState::Present))
            .unwrap();
        balancers
            .reconcile(&node(ResourceKind::CleanupLoadBalancers, ResourceNodeState::Present))
            .unwrap();
        assert!(services.calls().is_empty());

        groups
            .reconcile(&node(ResourceKind::CleanupSecurityGroups, ResourceNodeState::Absent))
            .unwrap();
        balancers
            .reconcile(&node(ResourceKind::CleanupLoadBalancers, ResourceNodeState::Absent))
            .unwrap();
        assert_eq!(
            services.calls(),
            vec!["delete_dangling_security_groups", "delete_dangling_load_balancers"]
        );
    }

    #[test]
    fn test_security_groups_skipped_without_vpc() {
        let services = Arc::new(FakeServices::default());
        let mut groups = SecurityGroupCleanupReconciler::new(services.clone());
        groups.set_common_metadata(Arc::new(metadata()));
        groups.set_state_handlers(Arc::new(FakeState::default()));

        groups
            .reconcile(&node(ResourceKind::CleanupSecurityGroups, ResourceNodeState::Absent))
            .unwrap();
        assert!(services.calls().is_empty());
    }
}
