use super::{Injected, ReconcileResult, Reconciler};
use crate::client::{NameserverDelegationOpts, NameserverService, StateHandlers};
use crate::error::{OperationContext, Result};
use crate::metadata::CommonMetadata;
use resourcetree::{ResourceKind, ResourceNode, ResourceNodeState};
use std::sync::Arc;

/// Delegates the primary zone from its parent domain
pub struct NameserverDelegatorReconciler {
    injected: Injected,
    client: Arc<dyn NameserverService>,
}

impl NameserverDelegatorReconciler {
    pub fn new(client: Arc<dyn NameserverService>) -> Self {
        Self {
            injected: Injected::default(),
            client,
        }
    }
}

impl Reconciler for NameserverDelegatorReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::NameserverDelegator
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
                let zone = self
                    .injected
                    .handlers(self.kind())?
                    .get_primary_hosted_zone()
                    .operation("getting primary hosted zone")?;

                self.client
                    .create_nameserver_delegation(
                        &metadata.context,
                        NameserverDelegationOpts {
                            id: metadata.cluster_id.clone(),
                            domain: zone.domain,
                            name_servers: zone.name_servers,
                        },
                    )
                    .operation("creating nameserver delegation")?;
            }
            ResourceNodeState::Absent => {
                let metadata = self.injected.metadata(self.kind())?;
                let domain = &metadata.cluster(self.kind())?.cluster_root_domain;

                self.client
                    .delete_nameserver_delegation(&metadata.context, &metadata.cluster_id, domain)
                    .operation("deleting nameserver delegation")?;
            }
            ResourceNodeState::Noop => {}
        }

        Ok(ReconcileResult::default())
    }
}
