//! State refreshers
//!
//! Some facts can only be trusted at the moment a node is reconciled, for
//! example whether a kubeconfig was written by an earlier node of the same
//! run. Refreshers recompute the current state of such nodes right before
//! dispatch. They report `Present` or `Absent`; the walk re-derives the
//! transition from that.

use crate::client::{
    Chart, ClusterAccessors, GithubRepositoryRecord, OutputDir, StateHandlers, artifacts,
};
use crate::current::found;
use crate::metadata::ClusterId;
use declaration::GithubRepository;
use resourcetree::{ResourceKind, ResourceNode, ResourceNodeState, StateRefresher, state_refresher};
use std::sync::Arc;

/// Present once the kubeconfig for the cluster has been written
pub fn cluster_refresher(output: Arc<dyn OutputDir>, id: &ClusterId) -> StateRefresher {
    let path = artifacts::kubeconfig(&id.cluster_name);
    state_refresher(move |_node: &ResourceNode| {
        Ok(ResourceNodeState::from_presence(output.exists(&path)))
    })
}

/// Present while the release is recorded and its helm values are written
///
/// Values left behind by a release that is gone do not count, and neither
/// does a recorded release whose values were removed.
pub fn load_balancer_controller_refresher(
    output: Arc<dyn OutputDir>,
    handlers: Arc<dyn StateHandlers>,
    id: &ClusterId,
) -> StateRefresher {
    let path = artifacts::load_balancer_controller_values(&id.cluster_name);
    let release_name = Chart::AwsLoadBalancerController.release_name();
    state_refresher(move |_node: &ResourceNode| {
        let release = found(handlers.get_helm_release(release_name))?;
        Ok(ResourceNodeState::from_presence(release.is_some() && output.exists(&path)))
    })
}

/// Present when external DNS is recorded against the current primary zone
///
/// A record pointing at another zone means the zone was recreated and
/// external DNS must be installed again.
pub fn external_dns_refresher(
    handlers: Arc<dyn StateHandlers>,
    accessors: Arc<dyn ClusterAccessors>,
) -> StateRefresher {
    state_refresher(move |_node: &ResourceNode| {
        let Some(zone_id) = accessors.primary_hosted_zone_id() else {
            return Ok(ResourceNodeState::Absent);
        };
        let record = found(handlers.get_external_dns())?;
        Ok(ResourceNodeState::from_presence(
            record.is_some_and(|record| record.hosted_zone_id == zone_id),
        ))
    })
}

/// Present when the identity pool authenticates under the current zone
pub fn identity_manager_refresher(
    handlers: Arc<dyn StateHandlers>,
    accessors: Arc<dyn ClusterAccessors>,
    id: &ClusterId,
) -> StateRefresher {
    let cluster_name = id.cluster_name.clone();
    state_refresher(move |_node: &ResourceNode| {
        let Some(domain) = accessors.primary_hosted_zone_domain() else {
            return Ok(ResourceNodeState::Absent);
        };
        let pool = found(handlers.get_identity_pool(&cluster_name))?;
        Ok(ResourceNodeState::from_presence(pool.is_some_and(|pool| {
            pool.auth_domain == domain || pool.auth_domain.ends_with(&format!(".{domain}"))
        })))
    })
}

/// Present when the declared repository is recorded
///
/// A recorded repository whose output path differs from the declaration is
/// updated in place, since the path is local configuration only.
pub fn github_refresher(
    accessors: Arc<dyn ClusterAccessors>,
    declared: GithubRepository,
) -> StateRefresher {
    state_refresher(move |_node: &ResourceNode| {
        let Some(recorded) = accessors.github_repository() else {
            return Ok(ResourceNodeState::Absent);
        };

        if recorded.organisation != declared.organisation
            || recorded.repository != declared.repository
        {
            return Ok(ResourceNodeState::Absent);
        }

        if recorded.output_path != declared.output_path {
            log::debug!(
                "Updating output path of {} to {}",
                recorded.full_name(),
                declared.output_path
            );
            accessors.save_github_repository(GithubRepositoryRecord {
                output_path: declared.output_path.clone(),
                ..recorded
            })?;
        }

        Ok(ResourceNodeState::Present)
    })
}

/// Present when argocd is recorded against the current primary zone
pub fn argocd_refresher(
    handlers: Arc<dyn StateHandlers>,
    accessors: Arc<dyn ClusterAccessors>,
) -> StateRefresher {
    state_refresher(move |_node: &ResourceNode| {
        let Some(zone) = accessors.primary_hosted_zone() else {
            return Ok(ResourceNodeState::Absent);
        };
        let record = found(handlers.get_argocd())?;
        Ok(ResourceNodeState::from_presence(
            record.is_some_and(|record| record.hosted_zone_id == zone.hosted_zone_id),
        ))
    })
}

/// Everything a cluster run needs to build its refreshers
pub struct RefresherSources {
    pub output: Arc<dyn OutputDir>,
    pub handlers: Arc<dyn StateHandlers>,
    pub accessors: Arc<dyn ClusterAccessors>,
    pub cluster_id: ClusterId,
    pub github: GithubRepository,
}

/// Attach every cluster refresher to `tree`
pub fn attach_cluster_refreshers(tree: &mut ResourceNode, sources: &RefresherSources) {
    let refreshers = [
        (
            ResourceKind::Cluster,
            cluster_refresher(Arc::clone(&sources.output), &sources.cluster_id),
        ),
        (
            ResourceKind::AwsLoadBalancerController,
            load_balancer_controller_refresher(
                Arc::clone(&sources.output),
                Arc::clone(&sources.handlers),
                &sources.cluster_id,
            ),
        ),
        (
            ResourceKind::ExternalDns,
            external_dns_refresher(Arc::clone(&sources.handlers), Arc::clone(&sources.accessors)),
        ),
        (
            ResourceKind::IdentityManager,
            identity_manager_refresher(
                Arc::clone(&sources.handlers),
                Arc::clone(&sources.accessors),
                &sources.cluster_id,
            ),
        ),
        (
            ResourceKind::Github,
            github_refresher(Arc::clone(&sources.accessors), sources.github.clone()),
        ),
        (
            ResourceKind::ArgoCd,
            argocd_refresher(Arc::clone(&sources.handlers), Arc::clone(&sources.accessors)),
        ),
    ];

    for (kind, refresher) in refreshers {
        let attached = tree.set_state_refresher(kind, refresher);
        log::debug!("Attached {kind} refresher to {attached} node(s)");
    }
}
