//! Desired state from a declaration
//!
//! Core infrastructure is always wanted. Optional components follow the
//! declared integrations, each on its own. A node is never wanted below a
//! parent that is not.

use crate::client::PostgresDatabaseRecord;
use crate::error::Result;
use crate::graph::{
    attach_database_instances, create_application_resource_dependency_tree,
    create_resource_dependency_tree, database_names,
};
use declaration::{ApplicationDeclaration, ClusterDeclaration, PostgresDatabase};
use resourcetree::{ResourceKind, ResourceNode, ResourceNodeState};

/// Build the cluster tree and mark what the declaration wants
///
/// `existing` lists databases recorded as provisioned, so databases removed
/// from the declaration still get a node to be deleted through.
pub fn create_desired_state_graph(
    declaration: &ClusterDeclaration,
    existing: &[PostgresDatabaseRecord],
) -> Result<ResourceNode> {
    let mut tree = create_resource_dependency_tree();
    let names = database_names(
        declaration.postgres_databases().iter().map(|db| db.name.as_str()),
        existing.iter().map(|db| db.application_name.as_str()),
    );
    attach_database_instances(&mut tree, &names)?;
    apply_desired_state(&mut tree, declaration, existing);
    Ok(tree)
}

/// Set every node's state from the declaration
pub fn apply_desired_state(
    tree: &mut ResourceNode,
    declaration: &ClusterDeclaration,
    existing: &[PostgresDatabaseRecord],
) {
    annotate(tree, ResourceNodeState::Present, declaration, existing);
}

fn annotate(
    node: &mut ResourceNode,
    parent: ResourceNodeState,
    declaration: &ClusterDeclaration,
    existing: &[PostgresDatabaseRecord],
) {
    let wanted = if node.kind() == ResourceKind::PostgresInstance {
        annotate_database(node, declaration, existing)
    } else {
        is_wanted(node.kind(), declaration)
    };

    node.state = if parent.is_absent() {
        ResourceNodeState::Absent
    } else {
        ResourceNodeState::from_presence(wanted)
    };

    let state = node.state;
    for child in &mut node.children {
        annotate(child, state, declaration, existing);
    }
}

fn is_wanted(kind: ResourceKind, declaration: &ClusterDeclaration) -> bool {
    let integrations = &declaration.integrations;

    match kind {
        ResourceKind::ExternalSecrets => integrations.external_secrets,
        ResourceKind::Autoscaler => integrations.autoscaler,
        ResourceKind::Blockstorage => integrations.blockstorage,
        ResourceKind::AwsLoadBalancerController => integrations.aws_load_balancer_controller,
        ResourceKind::ExternalDns => integrations.external_dns,
        ResourceKind::IdentityManager => integrations.identity_manager,
        // The GitOps repository only exists to serve argocd
        ResourceKind::Github | ResourceKind::ArgoCd => integrations.argocd,
        ResourceKind::Users => declaration.has_users(),
        ResourceKind::KubePromStack => integrations.kube_prometheus_stack,
        ResourceKind::Loki => integrations.loki,
        ResourceKind::Promtail => integrations.promtail,
        ResourceKind::Tempo => integrations.tempo,
        _ => true,
    }
}

/// Attach the database definition to an instance node, returning whether it is declared
fn annotate_database(
    node: &mut ResourceNode,
    declaration: &ClusterDeclaration,
    existing: &[PostgresDatabaseRecord],
) -> bool {
    let Some(name) = node.node_type.key().map(str::to_string) else {
        return false;
    };

    if let Some(db) = declaration
        .postgres_databases()
        .iter()
        .find(|db| db.name == name)
    {
        node.set_metadata(db.clone());
        return true;
    }

    if let Some(record) = existing.iter().find(|db| db.application_name == name) {
        node.set_metadata(PostgresDatabase {
            name: record.application_name.clone(),
            user: record.user_name.clone(),
            namespace: record.namespace.clone(),
        });
    }
    false
}

/// Build the application tree and mark what the declaration wants
pub fn create_application_desired_state_graph(declaration: &ApplicationDeclaration) -> ResourceNode {
    let mut tree = create_application_resource_dependency_tree();
    apply_application_desired_state(&mut tree, declaration);
    tree
}

/// Set application node states; the repository is only wanted for images we build
pub fn apply_application_desired_state(tree: &mut ResourceNode, declaration: &ApplicationDeclaration) {
    tree.for_each_mut(&mut |node| {
        node.state = match node.kind() {
            ResourceKind::ContainerRepository => {
                ResourceNodeState::from_presence(declaration.needs_container_repository())
            }
            _ => ResourceNodeState::Present,
        };
    });
}
