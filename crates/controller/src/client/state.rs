//! Recorded state of provisioned resources
//!
//! State handlers answer from locally persisted records of earlier service
//! calls, never from live cloud queries.

use crate::error::Result;
use declaration::User;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcRecord {
    pub vpc_id: String,
    pub cidr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub name: String,
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedZone {
    pub domain: String,
    pub hosted_zone_id: String,
    #[serde(default)]
    pub is_delegated: bool,
    #[serde(default)]
    pub name_servers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelmRelease {
    pub release_name: String,
    pub chart: String,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityPool {
    pub user_pool_id: String,
    pub auth_domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgoCdRecord {
    pub domain: String,
    pub hosted_zone_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalDnsRecord {
    pub domain: String,
    pub hosted_zone_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubRepositoryRecord {
    pub organisation: String,
    pub repository: String,
    pub output_path: String,
}

impl GithubRepositoryRecord {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.organisation, self.repository)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostgresDatabaseRecord {
    pub application_name: String,
    pub user_name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRepositoryRecord {
    pub name: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Read-only queries against recorded state, one per domain
///
/// Absence is reported as `Error::NotFound`; every other error is a real
/// failure.
pub trait StateHandlers: Send + Sync {
    fn get_vpc(&self, cluster_name: &str) -> Result<VpcRecord>;

    fn get_cluster(&self, cluster_name: &str) -> Result<ClusterRecord>;

    fn get_primary_hosted_zone(&self) -> Result<HostedZone>;

    fn get_helm_release(&self, release_name: &str) -> Result<HelmRelease>;

    fn get_identity_pool(&self, cluster_name: &str) -> Result<IdentityPool>;

    fn get_argocd(&self) -> Result<ArgoCdRecord>;

    fn get_external_dns(&self) -> Result<ExternalDnsRecord>;

    fn get_github_repository(&self) -> Result<GithubRepositoryRecord>;

    fn get_postgres_databases(&self) -> Result<Vec<PostgresDatabaseRecord>>;

    /// Users created in the identity pool; empty when there are none
    fn get_users(&self) -> Result<Vec<User>>;

    fn get_container_repository(&self, name: &str) -> Result<ContainerRepositoryRecord>;

    fn get_application(&self, name: &str) -> Result<ApplicationRecord>;
}

/// Cross-cutting values not owned by a single state handler
pub trait ClusterAccessors: Send + Sync {
    fn vpc_cidr(&self) -> Option<String>;

    fn primary_hosted_zone(&self) -> Option<HostedZone>;

    fn github_repository(&self) -> Option<GithubRepositoryRecord>;

    fn save_github_repository(&self, repository: GithubRepositoryRecord) -> Result<()>;

    fn primary_hosted_zone_domain(&self) -> Option<String> {
        self.primary_hosted_zone().map(|zone| zone.domain)
    }

    fn primary_hosted_zone_id(&self) -> Option<String> {
        self.primary_hosted_zone().map(|zone| zone.hosted_zone_id)
    }
}
