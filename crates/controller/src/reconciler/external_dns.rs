use super::{Injected, ReconcileResult, Reconciler};
use crate::client::{CreateExternalDnsOpts, ExternalDnsService, StateHandlers};
use crate::error::{OperationContext, Result};
use crate::metadata::CommonMetadata;
use resourcetree::{ResourceKind, ResourceNode, ResourceNodeState};
use std::sync::Arc;

/// External DNS bound to the primary hosted zone
pub struct ExternalDnsReconciler {
    injected: Injected,
    client: Arc<dyn ExternalDnsService>,
}

impl ExternalDnsReconciler {
    pub fn new(client: Arc<dyn ExternalDnsService>) -> Self {
        Self {
            injected: Injected::default(),
            client,
        }
    }
}

impl Reconciler for ExternalDnsReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ExternalDns
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
                let zone = self
                    .injected
                    .handlers(self.kind())?
                    .get_primary_hosted_zone()
                    .operation("getting primary hosted zone")?;

                self.client
                    .create_external_dns(
                        &metadata.context,
                        CreateExternalDnsOpts {
                            id: metadata.cluster_id.clone(),
                            hosted_zone_id: zone.hosted_zone_id,
                            domain: declaration.cluster_root_domain.clone(),
                        },
                    )
                    .operation("creating external DNS")?;
            }
            ResourceNodeState::Absent => {
                let metadata = self.injected.metadata(self.kind())?;
                self.client
                    .delete_external_dns(&metadata.context, &metadata.cluster_id)
                    .operation("deleting external DNS")?;
            }
            ResourceNodeState::Noop => {}
        }

        Ok(ReconcileResult::default())
    }
}
