use super::{Injected, ReconcileResult, Reconciler};
use crate::client::{ServiceQuotaService, StateHandlers};
use crate::error::{OperationContext, Result};
use crate::metadata::CommonMetadata;
use resourcetree::{ResourceKind, ResourceNode, ResourceNodeState};
use std::sync::Arc;

/// Checks account quotas before anything is created
pub struct ServiceQuotaReconciler {
    injected: Injected,
    client: Arc<dyn ServiceQuotaService>,
}

impl ServiceQuotaReconciler {
    pub fn new(client: Arc<dyn ServiceQuotaService>) -> Self {
        Self {
            injected: Injected::default(),
            client,
        }
    }
}

impl Reconciler for ServiceQuotaReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ServiceQuota
    }

    fn set_common_metadata(&mut self, metadata: Arc<CommonMetadata>) {
        self.injected.set_metadata(metadata);
    }

    fn set_state_handlers(&mut self, handlers: Arc<dyn StateHandlers>) {
        self.injected.set_handlers(handlers);
    }

    fn reconcile(&self, node: &ResourceNode) -> Result<ReconcileResult> {
        // Nothing to release on teardown
        if node.state != ResourceNodeState::Present {
            return Ok(ReconcileResult::default());
        }

        let metadata = self.injected.metadata(self.kind())?;
        self.client
            .check_quotas(&metadata.context, &metadata.cluster_id)
            .operation("checking service quotas")?;

        Ok(ReconcileResult::default())
    }
}
