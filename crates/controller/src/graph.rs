//! Static install order of every managed resource
//!
//! The builders here encode which resource depends on which and nothing
//! else. What is desired is decided separately.

use crate::error::Result;
use resourcetree::{ResourceKind, ResourceNode, ResourceNodeType, TreeError};
use std::collections::BTreeSet;

/// Dependency tree of a complete cluster
///
/// ```text
/// service-quota
/// └── zone
///     ├── nameserver-delegator
///     └── vpc
///         ├── cleanup-security-groups
///         └── cluster
///             ├── cleanup-load-balancers
///             ├── external-secrets
///             ├── autoscaler
///             ├── blockstorage
///             ├── aws-load-balancer-controller
///             ├── external-dns
///             ├── postgres
///             └── nameservers-delegated-test
///                 └── identity-manager
///                     ├── github
///                     │   └── argocd
///                     ├── users
///                     └── kube-prometheus-stack
///                         ├── loki
///                         │   └── promtail
///                         └── tempo
/// ```
pub fn create_resource_dependency_tree() -> ResourceNode {
    use ResourceKind::*;

    let mut root = ResourceNode::new(ServiceQuota);

    let zone = root.add_child(Zone);
    zone.add_child(NameserverDelegator);

    let vpc = zone.add_child(Vpc);
    vpc.add_child(CleanupSecurityGroups);

    let cluster = vpc.add_child(Cluster);
    cluster.add_child(CleanupLoadBalancers);
    cluster.add_child(ExternalSecrets);
    cluster.add_child(Autoscaler);
    cluster.add_child(Blockstorage);
    cluster.add_child(AwsLoadBalancerController);
    cluster.add_child(ExternalDns);
    cluster.add_child(Postgres);

    // Everything needing a certificate hangs below the delegation gate
    let delegated = cluster.add_child(NameserversDelegatedTest);

    let identity = delegated.add_child(IdentityManager);
    identity.add_child(Github).add_child(ArgoCd);
    identity.add_child(Users);

    let monitoring = identity.add_child(KubePromStack);
    monitoring.add_child(Loki).add_child(Promtail);
    monitoring.add_child(Tempo);

    root
}

/// Dependency tree of one application
pub fn create_application_resource_dependency_tree() -> ResourceNode {
    let mut root = ResourceNode::new(ResourceKind::Group);
    root.add_child(ResourceKind::ContainerRepository)
        .add_child(ResourceKind::Application);
    root
}

/// Append one `postgres-instance` node per name under the `postgres` group
///
/// Desired and current trees must be given the same names in the same order
/// to keep their shapes identical.
pub fn attach_database_instances(tree: &mut ResourceNode, names: &[String]) -> Result<()> {
    let root = tree.node_type.to_string();
    let group = tree
        .find_mut(ResourceKind::Postgres)
        .ok_or_else(|| TreeError::ShapeMismatch {
            path: root,
            reason: "tree has no postgres group".to_string(),
        })?;

    for name in names {
        group.add_child(ResourceNodeType::instance(ResourceKind::PostgresInstance, name));
    }

    log::debug!("Attached {} database instance(s)", names.len());
    Ok(())
}

/// Sorted union of declared and recorded database names
pub fn database_names<'a>(
    declared: impl IntoIterator<Item = &'a str>,
    existing: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    declared
        .into_iter()
        .chain(existing)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}
