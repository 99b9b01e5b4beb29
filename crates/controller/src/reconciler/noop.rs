use super::{ReconcileResult, Reconciler};
use crate::client::StateHandlers;
use crate::error::Result;
use crate::metadata::CommonMetadata;
use resourcetree::{ResourceKind, ResourceNode};
use std::sync::Arc;

/// Reconciler for structural nodes with no resource behind them
pub struct NoopReconciler {
    kind: ResourceKind,
}

impl NoopReconciler {
    pub fn new(kind: ResourceKind) -> Self {
        Self { kind }
    }
}

impl Default for NoopReconciler {
    fn default() -> Self {
        Self::new(ResourceKind::Group)
    }
}

impl Reconciler for NoopReconciler {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn set_common_metadata(&mut self, _metadata: Arc<CommonMetadata>) {}

    fn set_state_handlers(&mut self, _handlers: Arc<dyn StateHandlers>) {}

    fn reconcile(&self, _node: &ResourceNode) -> Result<ReconcileResult> {
        Ok(ReconcileResult::default())
    }
}
