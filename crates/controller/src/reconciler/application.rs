use super::{Injected, ReconcileResult, Reconciler};
use crate::client::{ApplicationService, StateHandlers};
use crate::error::{OperationContext, Result};
use crate::metadata::CommonMetadata;
use resourcetree::{ResourceKind, ResourceNode, ResourceNodeState};
use std::sync::Arc;

/// Deployment of one declared application
pub struct ApplicationReconciler {
    injected: Injected,
    client: Arc<dyn ApplicationService>,
}

impl ApplicationReconciler {
    pub fn new(client: Arc<dyn ApplicationService>) -> Self {
        Self {
            injected: Injected::default(),
            client,
        }
    }
}

impl Reconciler for ApplicationReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Application
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

        match node.state {
            ResourceNodeState::Present => {
                let record = self
                    .client
                    .create_application(&metadata.context, &metadata.cluster_id, application)
                    .operation("creating application")?;
                if let Some(url) = &record.url {
                    log::info!("{} is served on {url}", record.name);
                }
            }
            ResourceNodeState::Absent => {
                self.client
                    .delete_application(
                        &metadata.context,
                        &metadata.cluster_id,
                        &application.metadata.name,
                    )
                    .operation("deleting application")?;
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
    use crate::testing::{FakeServices, application_metadata, metadata};

    #[test]
    fn test_application_needs_application_declaration() {
        let services = Arc::new(FakeServices::default());
        let mut reconciler = ApplicationReconciler::new(services.clone());
        reconciler.set_common_metadata(Arc::new(metadata()));

        let err = reconciler
            .reconcile(&ResourceNode::new(ResourceKind::Application))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidMetadata { .. }));
        assert!(services.calls().is_empty());
    }

    #[test]
    fn test_application_is_recorded() {
        let services = Arc::new(FakeServices::default());
        let mut reconciler = ApplicationReconciler::new(services.clone());
        reconciler.set_common_metadata(Arc::new(application_metadata()));

        reconciler
            .reconcile(&ResourceNode::new(ResourceKind::Application))
            .unwrap();
        assert_eq!(services.calls(), vec!["create_application web"]);
        assert!(services.state.with(|s| s.applications.contains(&"web".to_string())));
    }
}
