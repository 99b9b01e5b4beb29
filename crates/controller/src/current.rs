//! Current state from recorded service state
//!
//! Only `NotFound` answers mean "absent". Any other error from a state
//! handler aborts the build.

use crate::client::{Chart, PostgresDatabaseRecord, StateHandlers};
use crate::error::Result;
use crate::graph::{
    attach_database_instances, create_application_resource_dependency_tree,
    create_resource_dependency_tree,
};
use crate::metadata::ClusterId;
use declaration::{ApplicationDeclaration, User};
use resourcetree::{ResourceKind, ResourceNode, ResourceNodeState};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// What the recorded state says is provisioned for a cluster
#[derive(Debug, Clone, Default)]
pub struct ExistingResources {
    pub has_primary_hosted_zone: bool,
    pub has_delegated_nameservers: bool,
    pub has_vpc: bool,
    pub has_cluster: bool,
    pub has_external_dns: bool,
    pub has_identity_manager: bool,
    pub has_github: bool,
    pub has_argocd: bool,
    /// Users are recorded and, when any are declared, exactly those
    pub has_users: bool,
    pub helm_releases: HashMap<Chart, bool>,
    pub postgres: BTreeMap<String, PostgresDatabaseRecord>,
}

impl ExistingResources {
    /// Query every state handler once
    ///
    /// Recorded users that differ from `declared_users` count as absent so
    /// a wanted users node is reconciled again.
    pub fn identify(
        id: &ClusterId,
        declared_users: &[User],
        handlers: &dyn StateHandlers,
    ) -> Result<Self> {
        let zone = found(handlers.get_primary_hosted_zone())?;

        let postgres = handlers
            .get_postgres_databases()?
            .into_iter()
            .map(|db| (db.application_name.clone(), db))
            .collect();

        let mut helm_releases = HashMap::new();
        for chart in Chart::ALL {
            let exists = found(handlers.get_helm_release(chart.release_name()))?.is_some();
            helm_releases.insert(chart, exists);
        }

        let recorded_users = handlers.get_users()?;
        let has_users = !recorded_users.is_empty()
            && (declared_users.is_empty() || same_users(&recorded_users, declared_users));

        let existing = Self {
            has_primary_hosted_zone: zone.is_some(),
            has_delegated_nameservers: zone.as_ref().is_some_and(|zone| zone.is_delegated),
            has_vpc: found(handlers.get_vpc(&id.cluster_name))?.is_some(),
            has_cluster: found(handlers.get_cluster(&id.cluster_name))?.is_some(),
            has_external_dns: found(handlers.get_external_dns())?.is_some(),
            has_identity_manager: found(handlers.get_identity_pool(&id.cluster_name))?.is_some(),
            has_github: found(handlers.get_github_repository())?.is_some(),
            has_argocd: found(handlers.get_argocd())?.is_some(),
            has_users,
            helm_releases,
            postgres,
        };

        log::debug!("Identified existing resources for {id}: {existing:?}");
        Ok(existing)
    }

    pub fn has_release(&self, chart: Chart) -> bool {
        self.helm_releases.get(&chart).copied().unwrap_or(false)
    }

    /// Recorded databases, ordered by application name
    pub fn databases(&self) -> Vec<PostgresDatabaseRecord> {
        self.postgres.values().cloned().collect()
    }

    fn exists(&self, kind: ResourceKind, parent: ResourceNodeState) -> bool {
        match kind {
            // Checks that must run every time they are wanted
            ResourceKind::ServiceQuota | ResourceKind::NameserversDelegatedTest => false,
            ResourceKind::Users => self.has_users,
            ResourceKind::Zone => self.has_primary_hosted_zone,
            ResourceKind::NameserverDelegator => self.has_delegated_nameservers,
            ResourceKind::Vpc => self.has_vpc,
            ResourceKind::Cluster => self.has_cluster,
            ResourceKind::CleanupSecurityGroups | ResourceKind::CleanupLoadBalancers => {
                parent.is_present()
            }
            ResourceKind::ExternalSecrets => self.has_release(Chart::ExternalSecrets),
            ResourceKind::Autoscaler => self.has_release(Chart::Autoscaler),
            ResourceKind::Blockstorage => self.has_release(Chart::Blockstorage),
            ResourceKind::AwsLoadBalancerController => {
                self.has_release(Chart::AwsLoadBalancerController)
            }
            ResourceKind::ExternalDns => self.has_external_dns,
            ResourceKind::IdentityManager => self.has_identity_manager,
            ResourceKind::Github => self.has_github,
            ResourceKind::ArgoCd => self.has_argocd,
            ResourceKind::KubePromStack => self.has_release(Chart::KubePrometheusStack),
            ResourceKind::Loki => self.has_release(Chart::Loki),
            ResourceKind::Promtail => self.has_release(Chart::Promtail),
            ResourceKind::Tempo => self.has_release(Chart::Tempo),
            ResourceKind::Group | ResourceKind::Postgres => true,
            // Keyed nodes and application nodes are resolved elsewhere
            ResourceKind::PostgresInstance
            | ResourceKind::ContainerRepository
            | ResourceKind::Application => false,
        }
    }
}

fn same_users(recorded: &[User], declared: &[User]) -> bool {
    let emails = |users: &[User]| {
        users
            .iter()
            .map(|user| user.email.to_ascii_lowercase())
            .collect::<BTreeSet<_>>()
    };
    emails(recorded) == emails(declared)
}

/// Build the cluster tree with states taken from `existing`
///
/// `database_names` must be the same list the desired tree was built with.
pub fn create_current_state_graph(
    existing: &ExistingResources,
    database_names: &[String],
) -> Result<ResourceNode> {
    let mut tree = create_resource_dependency_tree();
    attach_database_instances(&mut tree, database_names)?;
    mark(&mut tree, ResourceNodeState::Present, existing);
    Ok(tree)
}

fn mark(node: &mut ResourceNode, parent: ResourceNodeState, existing: &ExistingResources) {
    let exists = match node.node_type.key() {
        Some(name) if node.kind() == ResourceKind::PostgresInstance => {
            existing.postgres.contains_key(name)
        }
        _ => existing.exists(node.kind(), parent),
    };
    node.state = ResourceNodeState::from_presence(exists);

    let state = node.state;
    for child in &mut node.children {
        mark(child, state, existing);
    }
}

/// What the recorded state says is provisioned for one application
#[derive(Debug, Clone, Copy, Default)]
pub struct ExistingApplication {
    pub has_container_repository: bool,
    pub has_application: bool,
}

impl ExistingApplication {
    pub fn identify(declaration: &ApplicationDeclaration, handlers: &dyn StateHandlers) -> Result<Self> {
        let name = &declaration.metadata.name;
        Ok(Self {
            has_container_repository: found(handlers.get_container_repository(name))?.is_some(),
            has_application: found(handlers.get_application(name))?.is_some(),
        })
    }
}

/// Build the application tree with states taken from `existing`
pub fn create_application_current_state_graph(existing: ExistingApplication) -> ResourceNode {
    let mut tree = create_application_resource_dependency_tree();
    tree.for_each_mut(&mut |node| {
        node.state = ResourceNodeState::from_presence(match node.kind() {
            ResourceKind::ContainerRepository => existing.has_container_repository,
            ResourceKind::Application => existing.has_application,
            _ => true,
        });
    });
    tree
}

/// `Ok(None)` for `NotFound`, the record otherwise, errors passed through
pub(crate) fn found<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}
