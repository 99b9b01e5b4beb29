use super::{Injected, ReconcileResult, Reconciler};
use crate::client::{CreatePrimaryHostedZoneOpts, DomainService, StateHandlers};
use crate::error::{OperationContext, Result};
use crate::metadata::CommonMetadata;
use resourcetree::{ResourceKind, ResourceNode, ResourceNodeState};
use std::sync::Arc;

/// Primary hosted zone for the cluster root domain
pub struct ZoneReconciler {
    injected: Injected,
    client: Arc<dyn DomainService>,
}

impl ZoneReconciler {
    pub fn new(client: Arc<dyn DomainService>) -> Self {
        Self {
            injected: Injected::default(),
            client,
        }
    }
}

impl Reconciler for ZoneReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Zone
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
        let domain = &metadata.cluster(self.kind())?.cluster_root_domain;

        match node.state {
            ResourceNodeState::Present => {
                let zone = self
                    .client
                    .create_primary_hosted_zone(
                        &metadata.context,
                        CreatePrimaryHostedZoneOpts {
                            id: metadata.cluster_id.clone(),
                            domain: domain.clone(),
                        },
                    )
                    .operation("creating primary hosted zone")?;
                log::debug!("Hosted zone {} serves {}", zone.hosted_zone_id, zone.domain);
            }
            ResourceNodeState::Absent => {
                self.client
                    .delete_primary_hosted_zone(&metadata.context, &metadata.cluster_id, domain)
                    .operation("deleting primary hosted zone")?;
            }
            ResourceNodeState::Noop => {}
        }

        Ok(ReconcileResult::default())
    }
}
