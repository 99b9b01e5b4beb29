//! Per-kind reconcilers and the composite dispatcher
//!
//! A reconciler turns one node of the transition tree into at most one
//! idempotent service call: `Present` creates, `Absent` deletes and `Noop`
//! returns straight away.

mod addon;
mod application;
mod argocd;
mod cleanup;
mod cluster;
mod composite;
mod container_repository;
mod external_dns;
mod github;
mod identity_manager;
mod kube_prom_stack;
mod nameserver_delegator;
mod nameservers_delegated_test;
mod noop;
mod postgres;
mod service_quota;
mod users;
mod vpc;
mod zone;

pub use addon::AddonReconciler;
pub use application::ApplicationReconciler;
pub use argocd::ArgoCdReconciler;
pub use cleanup::{LoadBalancerCleanupReconciler, SecurityGroupCleanupReconciler};
pub use cluster::ClusterReconciler;
pub use composite::CompositeReconciler;
pub use container_repository::ContainerRepositoryReconciler;
pub use external_dns::ExternalDnsReconciler;
pub use github::GithubReconciler;
pub use identity_manager::IdentityManagerReconciler;
pub use kube_prom_stack::KubePromStackReconciler;
pub use nameserver_delegator::NameserverDelegatorReconciler;
pub use nameservers_delegated_test::NameserversDelegatedTestReconciler;
pub use noop::NoopReconciler;
pub use postgres::PostgresReconciler;
pub use service_quota::ServiceQuotaReconciler;
pub use users::UsersReconciler;
pub use vpc::VpcReconciler;
pub use zone::ZoneReconciler;

use crate::client::StateHandlers;
use crate::error::{Error, Result};
use crate::metadata::CommonMetadata;
use resourcetree::{ResourceKind, ResourceNode};
use std::sync::Arc;

/// Outcome of a successful reconciliation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileResult {
    /// The node reached an intermediate state and the run should be repeated
    pub requeue: bool,
}

/// Handler for every node of one kind
pub trait Reconciler: Send + Sync {
    /// Kind this reconciler serves, instances included
    fn kind(&self) -> ResourceKind;

    /// Injected once before any reconciliation
    fn set_common_metadata(&mut self, metadata: Arc<CommonMetadata>);

    /// Injected once before any reconciliation
    fn set_state_handlers(&mut self, handlers: Arc<dyn StateHandlers>);

    /// Drive the node's resource to the node's state
    fn reconcile(&self, node: &ResourceNode) -> Result<ReconcileResult>;
}

/// Collaborators injected into a reconciler after construction
#[derive(Default)]
pub(crate) struct Injected {
    metadata: Option<Arc<CommonMetadata>>,
    handlers: Option<Arc<dyn StateHandlers>>,
}

impl Injected {
    pub(crate) fn set_metadata(&mut self, metadata: Arc<CommonMetadata>) {
        self.metadata = Some(metadata);
    }

    pub(crate) fn set_handlers(&mut self, handlers: Arc<dyn StateHandlers>) {
        self.handlers = Some(handlers);
    }

    /// Common metadata, after checking the run has not been cancelled
    pub(crate) fn metadata(&self, kind: ResourceKind) -> Result<&CommonMetadata> {
        let metadata = self.metadata.as_deref().ok_or(Error::NotInjected {
            kind,
            what: "common metadata",
        })?;
        metadata.context.check()?;
        Ok(metadata)
    }

    pub(crate) fn handlers(&self, kind: ResourceKind) -> Result<&dyn StateHandlers> {
        self.handlers.as_deref().ok_or(Error::NotInjected {
            kind,
            what: "state handlers",
        })
    }
}
