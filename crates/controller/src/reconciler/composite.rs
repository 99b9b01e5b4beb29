use super::{
    AddonReconciler, ApplicationReconciler, ArgoCdReconciler, ClusterReconciler,
    ContainerRepositoryReconciler, ExternalDnsReconciler, GithubReconciler,
    IdentityManagerReconciler, KubePromStackReconciler, LoadBalancerCleanupReconciler,
    NameserverDelegatorReconciler, NameserversDelegatedTestReconciler, NoopReconciler,
    PostgresReconciler, ReconcileResult, Reconciler, SecurityGroupCleanupReconciler,
    ServiceQuotaReconciler, UsersReconciler, VpcReconciler, ZoneReconciler,
};
use crate::client::{AddonService, ServiceSet, StateHandlers};
use crate::error::{Error, Result};
use crate::metadata::CommonMetadata;
use crate::progress::{NoProgress, ProgressReporter};
use resourcetree::{ResourceKind, ResourceNode};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of reconcilers, dispatching each node to the one for its kind
///
/// Instances of a multiple kind share one reconciler: lookup uses the kind
/// alone, never the instance key. The registry starts with a no-op
/// reconciler for `group` nodes.
pub struct CompositeReconciler {
    reconcilers: HashMap<ResourceKind, Box<dyn Reconciler>>,
    progress: Arc<dyn ProgressReporter>,
}

impl CompositeReconciler {
    pub fn new(progress: Arc<dyn ProgressReporter>) -> Self {
        let mut reconcilers: HashMap<ResourceKind, Box<dyn Reconciler>> = HashMap::new();
        reconcilers.insert(ResourceKind::Group, Box::new(NoopReconciler::default()));
        Self {
            reconcilers,
            progress,
        }
    }

    /// Registry with every built-in reconciler
    ///
    /// `client` serves all resource families; `addons` holds one service
    /// per helm chart.
    pub fn standard<S>(
        client: &Arc<S>,
        addons: impl IntoIterator<Item = Arc<dyn AddonService>>,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self
    where
        S: ServiceSet + 'static,
    {
        let mut registry = Self::new(progress)
            .with(ServiceQuotaReconciler::new(client.clone()))
            .with(ZoneReconciler::new(client.clone()))
            .with(NameserverDelegatorReconciler::new(client.clone()))
            .with(VpcReconciler::new(client.clone()))
            .with(SecurityGroupCleanupReconciler::new(client.clone()))
            .with(ClusterReconciler::new(client.clone()))
            .with(LoadBalancerCleanupReconciler::new(client.clone()))
            .with(ExternalDnsReconciler::new(client.clone()))
            .with(NoopReconciler::new(ResourceKind::Postgres))
            .with(PostgresReconciler::new(client.clone()))
            .with(NameserversDelegatedTestReconciler::new(client.clone()))
            .with(IdentityManagerReconciler::new(client.clone()))
            .with(GithubReconciler::new(client.clone()))
            .with(ArgoCdReconciler::new(client.clone()))
            .with(UsersReconciler::new(client.clone()))
            .with(KubePromStackReconciler::new(client.clone()))
            .with(ContainerRepositoryReconciler::new(client.clone()))
            .with(ApplicationReconciler::new(client.clone()));

        for addon in addons {
            registry.register(Box::new(AddonReconciler::new(addon)));
        }
        registry
    }

    /// Add a reconciler, replacing any earlier one for the same kind
    pub fn register(&mut self, reconciler: Box<dyn Reconciler>) {
        let kind = reconciler.kind();
        if self.reconcilers.insert(kind, reconciler).is_some() {
            log::debug!("Replaced reconciler for {kind}");
        }
    }

    /// Builder form of [`register`](Self::register)
    pub fn with(mut self, reconciler: impl Reconciler + 'static) -> Self {
        self.register(Box::new(reconciler));
        self
    }

    pub fn remove(&mut self, kind: ResourceKind) -> Option<Box<dyn Reconciler>> {
        self.reconcilers.remove(&kind)
    }

    pub fn handles(&self, kind: ResourceKind) -> bool {
        self.reconcilers.contains_key(&kind)
    }

    /// Kinds with a registered reconciler, sorted
    pub fn kinds(&self) -> Vec<ResourceKind> {
        let mut kinds: Vec<_> = self.reconcilers.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

impl Reconciler for CompositeReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Group
    }

    fn set_common_metadata(&mut self, metadata: Arc<CommonMetadata>) {
        for reconciler in self.reconcilers.values_mut() {
            reconciler.set_common_metadata(Arc::clone(&metadata));
        }
    }

    fn set_state_handlers(&mut self, handlers: Arc<dyn StateHandlers>) {
        for reconciler in self.reconcilers.values_mut() {
            reconciler.set_state_handlers(Arc::clone(&handlers));
        }
    }

    fn reconcile(&self, node: &ResourceNode) -> Result<ReconcileResult> {
        let reconciler = self
            .reconcilers
            .get(&node.kind())
            .ok_or_else(|| Error::NoReconciler {
                node: node.node_type.clone(),
            })?;

        self.progress.start(node);
        let result = reconciler.reconcile(node);
        self.progress.stop(node, result.is_ok());

        if node.state.is_present() || node.state.is_absent() {
            match &result {
                Ok(_) => log::info!("Reconciled {} ({})", node.node_type, node.state),
                Err(err) => log::debug!("Reconciling {} failed: {err}", node.node_type),
            }
        }
        result
    }
}

impl Default for CompositeReconciler {
    fn default() -> Self {
        Self::new(Arc::new(NoProgress))
    }
}
