use super::{Injected, ReconcileResult, Reconciler};
use crate::client::{DomainService, StateHandlers};
use crate::error::{Error, OperationContext, Result};
use crate::metadata::CommonMetadata;
use resourcetree::{ResourceKind, ResourceNode};
use std::sync::Arc;

/// Gate that holds back everything needing a certificate
///
/// Certificates can only be issued once the zone's nameservers are
/// delegated. Until then the gate fails with a timeout, which asks for the
/// whole run to be repeated later.
pub struct NameserversDelegatedTestReconciler {
    injected: Injected,
    client: Arc<dyn DomainService>,
}

impl NameserversDelegatedTestReconciler {
    pub fn new(client: Arc<dyn DomainService>) -> Self {
        Self {
            injected: Injected::default(),
            client,
        }
    }
}

impl Reconciler for NameserversDelegatedTestReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::NameserversDelegatedTest
    }

    fn set_common_metadata(&mut self, metadata: Arc<CommonMetadata>) {
        self.injected.set_metadata(metadata);
    }

    fn set_state_handlers(&mut self, handlers: Arc<dyn StateHandlers>) {
        self.injected.set_handlers(handlers);
    }

    fn reconcile(&self, node: &ResourceNode) -> Result<ReconcileResult> {
        if !node.state.is_present() {
            return Ok(ReconcileResult::default());
        }

        let metadata = self.injected.metadata(self.kind())?;
        let domain = &metadata.cluster(self.kind())?.cluster_root_domain;

        let delegated = self
            .client
            .confirm_delegation(&metadata.context, &metadata.cluster_id, domain)
            .operation("confirming nameserver delegation")?;

        if !delegated {
            return Err(Error::timeout(format!(
                "nameservers for {domain} are not yet delegated"
            )));
        }

        Ok(ReconcileResult::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeServices, metadata};
    use resourcetree::ResourceNodeState;

    #[test]
    fn test_gate_times_out_until_delegated() {
        let services = Arc::new(FakeServices::default());
        let mut reconciler = NameserversDelegatedTestReconciler::new(services.clone());
        reconciler.set_common_metadata(Arc::new(metadata()));

        let node = ResourceNode::new(ResourceKind::NameserversDelegatedTest);
        let err = reconciler.reconcile(&node).unwrap_err();
        assert!(err.requeue());
        assert!(err.to_string().contains("staging.example.com"));

        services.set_delegated(true);
        reconciler.reconcile(&node).unwrap();
    }

    #[test]
    fn test_absent_gate_is_free() {
        let services = Arc::new(FakeServices::default());
        let mut reconciler = NameserversDelegatedTestReconciler::new(services.clone());
        reconciler.set_common_metadata(Arc::new(metadata()));

        let mut node = ResourceNode::new(ResourceKind::NameserversDelegatedTest);
        node.state = ResourceNodeState::Absent;
        reconciler.reconcile(&node).unwrap();
        assert!(services.calls().is_empty());
    }
}
