//! Service clients, one create/delete pair per resource family
//!
//! Every call is idempotent: creating something that exists, or deleting
//! something that is gone, succeeds without side effects.

use super::state::{
    ApplicationRecord, ArgoCdRecord, ClusterRecord, ContainerRepositoryRecord, ExternalDnsRecord,
    GithubRepositoryRecord, HelmRelease, HostedZone, IdentityPool, PostgresDatabaseRecord,
    VpcRecord,
};
use crate::context::Context;
use crate::error::Result;
use crate::metadata::ClusterId;
use declaration::{ApplicationDeclaration, User};
use resourcetree::ResourceKind;
use serde::Serialize;

/// Helm charts installed as cluster add-ons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Chart {
    ExternalSecrets,
    Autoscaler,
    Blockstorage,
    AwsLoadBalancerController,
    KubePrometheusStack,
    Loki,
    Promtail,
    Tempo,
}

impl Chart {
    pub const ALL: [Chart; 8] = [
        Chart::ExternalSecrets,
        Chart::Autoscaler,
        Chart::Blockstorage,
        Chart::AwsLoadBalancerController,
        Chart::KubePrometheusStack,
        Chart::Loki,
        Chart::Promtail,
        Chart::Tempo,
    ];

    /// Release name the chart is installed under
    pub fn release_name(&self) -> &'static str {
        match self {
            Self::ExternalSecrets => "external-secrets",
            Self::Autoscaler => "autoscaler",
            Self::Blockstorage => "blockstorage",
            Self::AwsLoadBalancerController => "aws-load-balancer-controller",
            Self::KubePrometheusStack => "kube-prometheus-stack",
            Self::Loki => "loki",
            Self::Promtail => "promtail",
            Self::Tempo => "tempo",
        }
    }

    /// Charts installed through a plain [`AddonService`]
    ///
    /// The monitoring stack needs the identity pool and has its own service.
    pub fn addons() -> impl Iterator<Item = Chart> {
        Self::ALL
            .into_iter()
            .filter(|chart| *chart != Self::KubePrometheusStack)
    }

    /// Node kind the chart is reconciled as
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::ExternalSecrets => ResourceKind::ExternalSecrets,
            Self::Autoscaler => ResourceKind::Autoscaler,
            Self::Blockstorage => ResourceKind::Blockstorage,
            Self::AwsLoadBalancerController => ResourceKind::AwsLoadBalancerController,
            Self::KubePrometheusStack => ResourceKind::KubePromStack,
            Self::Loki => ResourceKind::Loki,
            Self::Promtail => ResourceKind::Promtail,
            Self::Tempo => ResourceKind::Tempo,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePrimaryHostedZoneOpts {
    pub id: ClusterId,
    pub domain: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NameserverDelegationOpts {
    pub id: ClusterId,
    pub domain: String,
    pub name_servers: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateVpcOpts {
    pub id: ClusterId,
    pub cidr: String,
    pub high_availability: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateClusterOpts {
    pub id: ClusterId,
    pub cidr: String,
    pub vpc_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateExternalDnsOpts {
    pub id: ClusterId,
    pub hosted_zone_id: String,
    pub domain: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePostgresDatabaseOpts {
    pub id: ClusterId,
    pub application_name: String,
    pub user_name: String,
    pub namespace: String,
    pub vpc_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateIdentityPoolOpts {
    pub id: ClusterId,
    pub auth_domain: String,
    pub hosted_zone_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateGithubRepositoryOpts {
    pub id: ClusterId,
    pub organisation: String,
    pub repository: String,
    pub output_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateArgoCdOpts {
    pub id: ClusterId,
    pub domain: String,
    pub hosted_zone_id: String,
    pub user_pool_id: String,
    pub repository: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateKubePromStackOpts {
    pub id: ClusterId,
    pub domain: String,
    pub hosted_zone_id: String,
    pub user_pool_id: String,
}

pub trait ServiceQuotaService: Send + Sync {
    /// Verify the account has room for a new cluster
    fn check_quotas(&self, ctx: &Context, id: &ClusterId) -> Result<()>;
}

pub trait DomainService: Send + Sync {
    fn create_primary_hosted_zone(
        &self,
        ctx: &Context,
        opts: CreatePrimaryHostedZoneOpts,
    ) -> Result<HostedZone>;

    fn delete_primary_hosted_zone(&self, ctx: &Context, id: &ClusterId, domain: &str)
    -> Result<()>;

    /// Ask the outside world whether the zone's nameservers are delegated
    fn confirm_delegation(&self, ctx: &Context, id: &ClusterId, domain: &str) -> Result<bool>;
}

pub trait NameserverService: Send + Sync {
    fn create_nameserver_delegation(
        &self,
        ctx: &Context,
        opts: NameserverDelegationOpts,
    ) -> Result<()>;

    fn delete_nameserver_delegation(&self, ctx: &Context, id: &ClusterId, domain: &str)
    -> Result<()>;
}

pub trait VpcService: Send + Sync {
    fn create_vpc(&self, ctx: &Context, opts: CreateVpcOpts) -> Result<VpcRecord>;

    fn delete_vpc(&self, ctx: &Context, id: &ClusterId) -> Result<()>;
}

pub trait CleanupService: Send + Sync {
    /// Remove security groups left behind by load balancers
    fn delete_dangling_security_groups(&self, ctx: &Context, id: &ClusterId, vpc_id: &str)
    -> Result<()>;

    /// Remove load balancers created by ingresses
    fn delete_dangling_load_balancers(&self, ctx: &Context, id: &ClusterId) -> Result<()>;
}

pub trait ClusterService: Send + Sync {
    fn create_cluster(&self, ctx: &Context, opts: CreateClusterOpts) -> Result<ClusterRecord>;

    fn delete_cluster(&self, ctx: &Context, id: &ClusterId) -> Result<()>;
}

/// Installs and removes one helm chart
pub trait AddonService: Send + Sync {
    fn chart(&self) -> Chart;

    fn create(&self, ctx: &Context, id: &ClusterId) -> Result<HelmRelease>;

    fn delete(&self, ctx: &Context, id: &ClusterId) -> Result<()>;
}

pub trait ExternalDnsService: Send + Sync {
    fn create_external_dns(
        &self,
        ctx: &Context,
        opts: CreateExternalDnsOpts,
    ) -> Result<ExternalDnsRecord>;

    fn delete_external_dns(&self, ctx: &Context, id: &ClusterId) -> Result<()>;
}

pub trait PostgresService: Send + Sync {
    fn create_postgres_database(
        &self,
        ctx: &Context,
        opts: CreatePostgresDatabaseOpts,
    ) -> Result<PostgresDatabaseRecord>;

    fn delete_postgres_database(
        &self,
        ctx: &Context,
        id: &ClusterId,
        application_name: &str,
    ) -> Result<()>;
}

pub trait IdentityManagerService: Send + Sync {
    fn create_identity_pool(
        &self,
        ctx: &Context,
        opts: CreateIdentityPoolOpts,
    ) -> Result<IdentityPool>;

    fn delete_identity_pool(&self, ctx: &Context, id: &ClusterId) -> Result<()>;
}

pub trait GithubService: Send + Sync {
    fn create_github_repository(
        &self,
        ctx: &Context,
        opts: CreateGithubRepositoryOpts,
    ) -> Result<GithubRepositoryRecord>;

    fn delete_github_repository(&self, ctx: &Context, id: &ClusterId) -> Result<()>;
}

pub trait ArgoCdService: Send + Sync {
    fn create_argocd(&self, ctx: &Context, opts: CreateArgoCdOpts) -> Result<ArgoCdRecord>;

    fn delete_argocd(&self, ctx: &Context, id: &ClusterId) -> Result<()>;
}

pub trait UsersService: Send + Sync {
    fn create_users(&self, ctx: &Context, id: &ClusterId, users: &[User]) -> Result<()>;

    fn delete_users(&self, ctx: &Context, id: &ClusterId, users: &[User]) -> Result<()>;
}

pub trait KubePromStackService: Send + Sync {
    fn create_kube_prom_stack(
        &self,
        ctx: &Context,
        opts: CreateKubePromStackOpts,
    ) -> Result<HelmRelease>;

    fn delete_kube_prom_stack(&self, ctx: &Context, id: &ClusterId) -> Result<()>;
}

pub trait ApplicationService: Send + Sync {
    fn create_container_repository(
        &self,
        ctx: &Context,
        id: &ClusterId,
        name: &str,
    ) -> Result<ContainerRepositoryRecord>;

    fn delete_container_repository(&self, ctx: &Context, id: &ClusterId, name: &str)
    -> Result<()>;

    fn create_application(
        &self,
        ctx: &Context,
        id: &ClusterId,
        application: &ApplicationDeclaration,
    ) -> Result<ApplicationRecord>;

    fn delete_application(&self, ctx: &Context, id: &ClusterId, name: &str) -> Result<()>;
}

/// Every service the built-in reconcilers call, implemented by one client
pub trait ServiceSet:
    ServiceQuotaService
    + DomainService
    + NameserverService
    + VpcService
    + CleanupService
    + ClusterService
    + ExternalDnsService
    + PostgresService
    + IdentityManagerService
    + GithubService
    + ArgoCdService
    + UsersService
    + KubePromStackService
    + ApplicationService
{
}

impl<T> ServiceSet for T where
    T: ServiceQuotaService
        + DomainService
        + NameserverService
        + VpcService
        + CleanupService
        + ClusterService
        + ExternalDnsService
        + PostgresService
        + IdentityManagerService
        + GithubService
        + ArgoCdService
        + UsersService
        + KubePromStackService
        + ApplicationService
{
}
