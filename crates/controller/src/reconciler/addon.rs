use super::{Injected, ReconcileResult, Reconciler};
use crate::client::{AddonService, StateHandlers};
use crate::error::{OperationContext, Result};
use crate::metadata::CommonMetadata;
use resourcetree::{ResourceKind, ResourceNode, ResourceNodeState};
use std::sync::Arc;

/// Installs or removes the helm chart its service is bound to
///
/// One instance is registered per chart; the kind follows the chart.
pub struct AddonReconciler {
    injected: Injected,
    client: Arc<dyn AddonService>,
}

impl AddonReconciler {
    pub fn new(client: Arc<dyn AddonService>) -> Self {
        Self {
            injected: Injected::default(),
            client,
        }
    }
}

impl Reconciler for AddonReconciler {
    fn kind(&self) -> ResourceKind {
        self.client.chart().kind()
    }

    fn set_common_metadata(&mut self, metadata: Arc<CommonMetadata>) {
        self.injected.set_metadata(metadata);
    }

    fn set_state_handlers(&mut self, handlers: Arc<dyn StateHandlers>) {
        self.injected.set_handlers(handlers);
    }

    fn reconcile(&self, node: &ResourceNode) -> Result<ReconcileResult> {
        let chart = self.client.chart();

        match node.state {
            ResourceNodeState::Present => {
                let metadata = self.injected.metadata(self.kind())?;
                let release = self
                    .client
                    .create(&metadata.context, &metadata.cluster_id)
                    .operation(format!("creating {}", chart.release_name()))?;
                log::debug!("Installed {} into {}", release.release_name, release.namespace);
            }
            ResourceNodeState::Absent => {
                let metadata = self.injected.metadata(self.kind())?;
                self.client
                    .delete(&metadata.context, &metadata.cluster_id)
                    .operation(format!("deleting {}", chart.release_name()))?;
            }
            ResourceNodeState::Noop => {}
        }

        Ok(ReconcileResult::default())
    }
}
