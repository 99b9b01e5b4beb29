use super::{Injected, ReconcileResult, Reconciler};
use crate::client::{ApplicationService, StateHandlers};
use crate::error::{OperationContext, Result};
use crate::metadata::CommonMetadata;
use resourcetree::{ResourceKind, ResourceNode, ResourceNodeState};
use std::sync::Arc;

/// Image registry for applications built by us
pub struct ContainerRepositoryReconciler {
    injected: Injected,
    client: Arc<dyn ApplicationService>,
}

impl ContainerRepositoryReconciler {
    pub fn new(client: Arc<dyn ApplicationService>) -> Self {
        Self {
            injected: Injected::default(),
            client,
        }
    }
}

impl Reconciler for ContainerRepositoryReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ContainerRepository
    }

    fn set_common_metadata(&mut self, metadata: Arc<CommonMetadata>) {
        self.injected.set_metadata(metadata);
    }

    fn set_state_handlers(&mut self, handlers: Arc<dyn StateHandlers>) {
        self.injected.set_handlers(handlers);
    }

    fn reconcile(&self, node: &ResourceNode) -> Result<ReconcileResult> {
        if node.state.is_noop() {
            return Ok(ReconcileResult::default());
        }

        let metadata = self.injected.metadata(self.kind())?;
        let application = metadata.application(self.kind())?;
        let name = application
            .image
            .name
            .as_deref()
            .unwrap_or(&application.metadata.name);

        match node.state {
            ResourceNodeState::Present => {
                let repository = self
                    .client
                    .create_container_repository(&metadata.context, &metadata.cluster_id, name)
                    .operation("creating container repository")?;
                log::debug!("Push {} images to {}", repository.name, repository.uri);
            }
            ResourceNodeState::Absent => {
                self.client
                    .delete_container_repository(&metadata.context, &metadata.cluster_id, name)
                    .operation("deleting container repository")?;
            }
            ResourceNodeState::Noop => {}
        }

        Ok(ReconcileResult::default())
    }
}
