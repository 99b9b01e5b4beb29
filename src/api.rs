//! Provisioning API client.
//!
//! Every service call is a JSON request to `<api_url>/<target>`: creates are
//! `POST`s, deletes are `DELETE`s addressed by query parameters. Calls are
//! idempotent on our side as well: `409 Conflict` on create fetches the
//! existing record, `404 Not Found` on delete counts as done. Each successful
//! call is recorded in the environment's [`StateStore`].

use crate::state::{EnvironmentState, StateStore};
use controller::client::{
    AddonService, ApplicationRecord, ApplicationService, ArgoCdRecord, ArgoCdService, Chart,
    CleanupService, ClusterRecord, ClusterService, ContainerRepositoryRecord, CreateArgoCdOpts,
    CreateClusterOpts, CreateExternalDnsOpts, CreateGithubRepositoryOpts, CreateIdentityPoolOpts,
    CreateKubePromStackOpts, CreatePostgresDatabaseOpts, CreatePrimaryHostedZoneOpts,
    CreateVpcOpts, DomainService, ExternalDnsRecord, ExternalDnsService, GithubRepositoryRecord,
    GithubService, HelmRelease, HostedZone, IdentityManagerService, IdentityPool,
    KubePromStackService, NameserverDelegationOpts, NameserverService, OutputDir,
    PostgresDatabaseRecord, PostgresService, ServiceQuotaService, UsersService, VpcRecord,
    VpcService, artifacts,
};
use controller::{ClusterId, Context, Error, Result};
use declaration::{ApplicationDeclaration, User};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound for a single request, before the run deadline is considered
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for every resource family, recording results in a [`StateStore`]
pub struct ApiClient {
    agent: ureq::Agent,
    api_base: String,
    state: Arc<StateStore>,
    output: Arc<dyn OutputDir>,
}

#[derive(Serialize)]
struct IdBody<'a> {
    id: &'a ClusterId,
}

#[derive(Serialize)]
struct NamedBody<'a> {
    id: &'a ClusterId,
    name: &'a str,
}

#[derive(Serialize)]
struct UsersBody<'a> {
    id: &'a ClusterId,
    users: &'a [User],
}

#[derive(Serialize)]
struct ApplicationBody<'a> {
    id: &'a ClusterId,
    application: &'a ApplicationDeclaration,
}

#[derive(Deserialize)]
struct Delegation {
    delegated: bool,
}

#[derive(Deserialize)]
struct ClusterResponse {
    #[serde(flatten)]
    cluster: ClusterRecord,
    kubeconfig: String,
}

#[derive(Deserialize)]
struct AddonResponse {
    #[serde(flatten)]
    release: HelmRelease,
    #[serde(default)]
    values: Option<String>,
}

impl ApiClient {
    pub fn new(
        api_base: impl Into<String>,
        state: Arc<StateStore>,
        output: Arc<dyn OutputDir>,
    ) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            api_base: api_base.into(),
            state,
            output,
        }
    }

    /// Get the API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// One addon service per helm chart, sharing this client
    pub fn addons(self: &Arc<Self>) -> Vec<Arc<dyn AddonService>> {
        Chart::addons()
            .map(|chart| {
                Arc::new(ApiAddon {
                    chart,
                    client: Arc::clone(self),
                }) as Arc<dyn AddonService>
            })
            .collect()
    }

    fn url(&self, target: &str) -> String {
        format!("{}/{}", self.api_base, target)
    }

    /// `POST` a body, returning nothing
    fn send<B: Serialize>(&self, ctx: &Context, target: &str, body: &B) -> Result<()> {
        let timeout = request_timeout(ctx)?;
        log::debug!("POST {target}");

        self.agent
            .post(&self.url(target))
            .config()
            .timeout_global(Some(timeout))
            .build()
            .send_json(body)
            .map_err(api_error)?;
        Ok(())
    }

    /// `POST` a body, falling back to the existing record on conflict
    fn create<B: Serialize, R: DeserializeOwned>(
        &self,
        ctx: &Context,
        target: &str,
        id: &ClusterId,
        name: Option<&str>,
        body: &B,
    ) -> Result<R> {
        let timeout = request_timeout(ctx)?;
        log::debug!("POST {target}");

        let response = self
            .agent
            .post(&self.url(target))
            .config()
            .timeout_global(Some(timeout))
            .build()
            .send_json(body);

        match response {
            Ok(mut response) => response.body_mut().read_json().map_err(api_error),
            Err(ureq::Error::StatusCode(409)) => {
                log::debug!("{target} already exists, fetching it");
                self.fetch(ctx, target, id, name)
            }
            Err(err) => Err(api_error(err)),
        }
    }

    fn fetch<R: DeserializeOwned>(
        &self,
        ctx: &Context,
        target: &str,
        id: &ClusterId,
        name: Option<&str>,
    ) -> Result<R> {
        let timeout = request_timeout(ctx)?;
        log::debug!("GET {target}");

        let mut request = self
            .agent
            .get(&self.url(target))
            .config()
            .timeout_global(Some(timeout))
            .build()
            .query("region", &id.region)
            .query("account_id", &id.account_id)
            .query("environment", &id.environment)
            .query("cluster_name", &id.cluster_name);
        if let Some(name) = name {
            request = request.query("name", name);
        }

        request
            .call()
            .map_err(api_error)?
            .body_mut()
            .read_json()
            .map_err(api_error)
    }

    /// `DELETE` a resource; one that is already gone counts as deleted
    fn remove(&self, ctx: &Context, target: &str, id: &ClusterId, name: Option<&str>) -> Result<()> {
        let timeout = request_timeout(ctx)?;
        log::debug!("DELETE {target}");

        let mut request = self
            .agent
            .delete(&self.url(target))
            .config()
            .timeout_global(Some(timeout))
            .build()
            .query("region", &id.region)
            .query("account_id", &id.account_id)
            .query("environment", &id.environment)
            .query("cluster_name", &id.cluster_name);
        if let Some(name) = name {
            request = request.query("name", name);
        }

        match request.call() {
            Ok(_) => Ok(()),
            Err(ureq::Error::StatusCode(404)) => {
                log::debug!("{target} was already deleted");
                Ok(())
            }
            Err(err) => Err(api_error(err)),
        }
    }

    fn record(&self, change: impl FnOnce(&mut EnvironmentState)) -> Result<()> {
        self.state.update(change)
    }
}

/// Per-request timeout: the fixed bound, or less when the run deadline is closer
fn request_timeout(ctx: &Context) -> Result<Duration> {
    ctx.check()?;
    Ok(ctx
        .remaining()
        .map_or(REQUEST_TIMEOUT, |remaining| remaining.min(REQUEST_TIMEOUT)))
}

/// Map transport and status errors; timeouts are worth another run
fn api_error(err: ureq::Error) -> Error {
    match err {
        ureq::Error::StatusCode(status @ (408 | 429 | 502 | 503 | 504)) => {
            Error::timeout(format!("API answered HTTP {status}"))
        }
        ureq::Error::StatusCode(status) => Error::Api {
            status,
            message: format!("HTTP {status}"),
        },
        err @ ureq::Error::Timeout(_) => Error::timeout(err.to_string()),
        ureq::Error::Io(err) => Error::Io(err),
        other => Error::Transport(other.to_string()),
    }
}

// ============================================================================
// Service implementations
// ============================================================================

impl ServiceQuotaService for ApiClient {
    fn check_quotas(&self, ctx: &Context, id: &ClusterId) -> Result<()> {
        self.send(ctx, "service-quotas/check", &IdBody { id })
    }
}

impl DomainService for ApiClient {
    fn create_primary_hosted_zone(
        &self,
        ctx: &Context,
        opts: CreatePrimaryHostedZoneOpts,
    ) -> Result<HostedZone> {
        let zone: HostedZone =
            self.create(ctx, "domains/primary", &opts.id, Some(&opts.domain), &opts)?;
        self.record(|s| s.hosted_zone = Some(zone.clone()))?;
        Ok(zone)
    }

    fn delete_primary_hosted_zone(&self, ctx: &Context, id: &ClusterId, domain: &str) -> Result<()> {
        self.remove(ctx, "domains/primary", id, Some(domain))?;
        self.record(|s| s.hosted_zone = None)
    }

    fn confirm_delegation(&self, ctx: &Context, id: &ClusterId, domain: &str) -> Result<bool> {
        let delegation: Delegation = self.fetch(ctx, "domains/delegation", id, Some(domain))?;
        Ok(delegation.delegated)
    }
}

impl NameserverService for ApiClient {
    fn create_nameserver_delegation(
        &self,
        ctx: &Context,
        opts: NameserverDelegationOpts,
    ) -> Result<()> {
        self.send(ctx, "nameservers", &opts)?;
        self.record(|s| {
            if let Some(zone) = s.hosted_zone.as_mut() {
                zone.is_delegated = true;
            }
        })
    }

    fn delete_nameserver_delegation(&self, ctx: &Context, id: &ClusterId, domain: &str) -> Result<()> {
        self.remove(ctx, "nameservers", id, Some(domain))?;
        self.record(|s| {
            if let Some(zone) = s.hosted_zone.as_mut() {
                zone.is_delegated = false;
            }
        })
    }
}

impl VpcService for ApiClient {
    fn create_vpc(&self, ctx: &Context, opts: CreateVpcOpts) -> Result<VpcRecord> {
        let vpc: VpcRecord = self.create(ctx, "vpcs", &opts.id, None, &opts)?;
        self.record(|s| s.vpc = Some(vpc.clone()))?;
        Ok(vpc)
    }

    fn delete_vpc(&self, ctx: &Context, id: &ClusterId) -> Result<()> {
        self.remove(ctx, "vpcs", id, None)?;
        self.record(|s| s.vpc = None)
    }
}

impl CleanupService for ApiClient {
    fn delete_dangling_security_groups(&self, ctx: &Context, id: &ClusterId, vpc_id: &str) -> Result<()> {
        self.remove(ctx, "cleanup/security-groups", id, Some(vpc_id))
    }

    fn delete_dangling_load_balancers(&self, ctx: &Context, id: &ClusterId) -> Result<()> {
        self.remove(ctx, "cleanup/load-balancers", id, None)
    }
}

impl ClusterService for ApiClient {
    fn create_cluster(&self, ctx: &Context, opts: CreateClusterOpts) -> Result<ClusterRecord> {
        let response: ClusterResponse = self.create(ctx, "clusters", &opts.id, None, &opts)?;

        self.output.write(
            &artifacts::kubeconfig(&opts.id.cluster_name),
            response.kubeconfig.as_bytes(),
        )?;
        self.record(|s| s.cluster = Some(response.cluster.clone()))?;
        Ok(response.cluster)
    }

    fn delete_cluster(&self, ctx: &Context, id: &ClusterId) -> Result<()> {
        self.remove(ctx, "clusters", id, None)?;
        self.output.remove(&artifacts::kubeconfig(&id.cluster_name))?;
        self.record(|s| s.cluster = None)
    }
}

impl ExternalDnsService for ApiClient {
    fn create_external_dns(
        &self,
        ctx: &Context,
        opts: CreateExternalDnsOpts,
    ) -> Result<ExternalDnsRecord> {
        let record: ExternalDnsRecord = self.create(ctx, "external-dns", &opts.id, None, &opts)?;
        self.record(|s| s.external_dns = Some(record.clone()))?;
        Ok(record)
    }

    fn delete_external_dns(&self, ctx: &Context, id: &ClusterId) -> Result<()> {
        self.remove(ctx, "external-dns", id, None)?;
        self.record(|s| s.external_dns = None)
    }
}

impl PostgresService for ApiClient {
    fn create_postgres_database(
        &self,
        ctx: &Context,
        opts: CreatePostgresDatabaseOpts,
    ) -> Result<PostgresDatabaseRecord> {
        let database: PostgresDatabaseRecord = self.create(
            ctx,
            "postgres",
            &opts.id,
            Some(&opts.application_name),
            &opts,
        )?;
        self.record(|s| {
            s.postgres
                .insert(database.application_name.clone(), database.clone());
        })?;
        Ok(database)
    }

    fn delete_postgres_database(
        &self,
        ctx: &Context,
        id: &ClusterId,
        application_name: &str,
    ) -> Result<()> {
        self.remove(ctx, "postgres", id, Some(application_name))?;
        self.record(|s| {
            s.postgres.remove(application_name);
        })
    }
}

impl IdentityManagerService for ApiClient {
    fn create_identity_pool(
        &self,
        ctx: &Context,
        opts: CreateIdentityPoolOpts,
    ) -> Result<IdentityPool> {
        let pool: IdentityPool = self.create(ctx, "identity-pools", &opts.id, None, &opts)?;
        self.record(|s| s.identity_pool = Some(pool.clone()))?;
        Ok(pool)
    }

    fn delete_identity_pool(&self, ctx: &Context, id: &ClusterId) -> Result<()> {
        self.remove(ctx, "identity-pools", id, None)?;
        self.record(|s| s.identity_pool = None)
    }
}

impl GithubService for ApiClient {
    fn create_github_repository(
        &self,
        ctx: &Context,
        opts: CreateGithubRepositoryOpts,
    ) -> Result<GithubRepositoryRecord> {
        let repository: GithubRepositoryRecord = self.create(
            ctx,
            "github/repositories",
            &opts.id,
            Some(&opts.repository),
            &opts,
        )?;
        self.record(|s| s.github = Some(repository.clone()))?;
        Ok(repository)
    }

    fn delete_github_repository(&self, ctx: &Context, id: &ClusterId) -> Result<()> {
        self.remove(ctx, "github/repositories", id, Some(&id.repository_name))?;
        self.record(|s| s.github = None)
    }
}

impl ArgoCdService for ApiClient {
    fn create_argocd(&self, ctx: &Context, opts: CreateArgoCdOpts) -> Result<ArgoCdRecord> {
        let argocd: ArgoCdRecord = self.create(ctx, "argocd", &opts.id, None, &opts)?;
        self.record(|s| s.argocd = Some(argocd.clone()))?;
        Ok(argocd)
    }

    fn delete_argocd(&self, ctx: &Context, id: &ClusterId) -> Result<()> {
        self.remove(ctx, "argocd", id, None)?;
        self.record(|s| s.argocd = None)
    }
}

impl UsersService for ApiClient {
    fn create_users(&self, ctx: &Context, id: &ClusterId, users: &[User]) -> Result<()> {
        self.send(ctx, "users", &UsersBody { id, users })?;
        self.record(|s| {
            for user in users {
                if !s.users.contains(user) {
                    s.users.push(user.clone());
                }
            }
        })
    }

    fn delete_users(&self, ctx: &Context, id: &ClusterId, users: &[User]) -> Result<()> {
        self.send(ctx, "users/remove", &UsersBody { id, users })?;
        self.record(|s| s.users.retain(|user| !users.contains(user)))
    }
}

impl KubePromStackService for ApiClient {
    fn create_kube_prom_stack(
        &self,
        ctx: &Context,
        opts: CreateKubePromStackOpts,
    ) -> Result<HelmRelease> {
        let release: HelmRelease =
            self.create(ctx, "helm/kube-prometheus-stack", &opts.id, None, &opts)?;
        self.record(|s| {
            s.helm_releases
                .insert(release.release_name.clone(), release.clone());
        })?;
        Ok(release)
    }

    fn delete_kube_prom_stack(&self, ctx: &Context, id: &ClusterId) -> Result<()> {
        self.remove(ctx, "helm/kube-prometheus-stack", id, None)?;
        self.record(|s| {
            s.helm_releases
                .remove(Chart::KubePrometheusStack.release_name());
        })
    }
}

impl ApplicationService for ApiClient {
    fn create_container_repository(
        &self,
        ctx: &Context,
        id: &ClusterId,
        name: &str,
    ) -> Result<ContainerRepositoryRecord> {
        let repository: ContainerRepositoryRecord = self.create(
            ctx,
            "container-repositories",
            id,
            Some(name),
            &NamedBody { id, name },
        )?;
        self.record(|s| {
            s.container_repositories
                .insert(repository.name.clone(), repository.clone());
        })?;
        Ok(repository)
    }

    fn delete_container_repository(&self, ctx: &Context, id: &ClusterId, name: &str) -> Result<()> {
        self.remove(ctx, "container-repositories", id, Some(name))?;
        self.record(|s| {
            s.container_repositories.remove(name);
        })
    }

    fn create_application(
        &self,
        ctx: &Context,
        id: &ClusterId,
        application: &ApplicationDeclaration,
    ) -> Result<ApplicationRecord> {
        let record: ApplicationRecord = self.create(
            ctx,
            "applications",
            id,
            Some(&application.metadata.name),
            &ApplicationBody { id, application },
        )?;
        self.record(|s| {
            s.applications.insert(record.name.clone(), record.clone());
        })?;
        Ok(record)
    }

    fn delete_application(&self, ctx: &Context, id: &ClusterId, name: &str) -> Result<()> {
        self.remove(ctx, "applications", id, Some(name))?;
        self.record(|s| {
            s.applications.remove(name);
        })
    }
}

/// One helm chart installed through the API
pub struct ApiAddon {
    chart: Chart,
    client: Arc<ApiClient>,
}

#[derive(Serialize)]
struct AddonBody<'a> {
    id: &'a ClusterId,
    chart: Chart,
}

impl ApiAddon {
    fn target(&self) -> String {
        format!("helm/{}", self.chart.release_name())
    }
}

impl AddonService for ApiAddon {
    fn chart(&self) -> Chart {
        self.chart
    }

    fn create(&self, ctx: &Context, id: &ClusterId) -> Result<HelmRelease> {
        let response: AddonResponse = self.client.create(
            ctx,
            &self.target(),
            id,
            None,
            &AddonBody {
                id,
                chart: self.chart,
            },
        )?;

        // The load balancer controller is only considered installed once its values exist
        if self.chart == Chart::AwsLoadBalancerController {
            let values = response.values.as_deref().unwrap_or_default();
            self.client.output.write(
                &artifacts::load_balancer_controller_values(&id.cluster_name),
                values.as_bytes(),
            )?;
        }

        let release = response.release;
        self.client.record(|s| {
            s.helm_releases
                .insert(release.release_name.clone(), release.clone());
        })?;
        Ok(release)
    }

    fn delete(&self, ctx: &Context, id: &ClusterId) -> Result<()> {
        self.client.remove(ctx, &self.target(), id, None)?;
        if self.chart == Chart::AwsLoadBalancerController {
            self.client
                .output
                .remove(&artifacts::load_balancer_controller_values(&id.cluster_name))?;
        }
        let name = self.chart.release_name();
        self.client.record(|s| {
            s.helm_releases.remove(name);
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
