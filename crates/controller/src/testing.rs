//! Fixtures and in-memory fakes shared by the unit tests

use crate::client::{
    AddonService, ApplicationRecord, ApplicationService, ArgoCdRecord, ArgoCdService, Chart,
    CleanupService, ClusterAccessors, ClusterRecord, ClusterService, ContainerRepositoryRecord,
    CreateArgoCdOpts, CreateClusterOpts, CreateExternalDnsOpts, CreateGithubRepositoryOpts,
    CreateIdentityPoolOpts, CreateKubePromStackOpts, CreatePostgresDatabaseOpts,
    CreatePrimaryHostedZoneOpts, CreateVpcOpts, DomainService, ExternalDnsRecord,
    ExternalDnsService, GithubRepositoryRecord, GithubService, HelmRelease, HostedZone,
    IdentityManagerService, IdentityPool, KubePromStackService, NameserverDelegationOpts,
    NameserverService, OutputDir, PostgresDatabaseRecord, PostgresService, ServiceQuotaService,
    StateHandlers, UsersService, VpcRecord, VpcService, artifacts,
};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::metadata::{ClusterId, CommonMetadata};
use crate::progress::{NoProgress, ProgressReporter};
use crate::reconciler::{CompositeReconciler, ReconcileResult, Reconciler};
use declaration::{
    ApplicationDeclaration, ApplicationMetadata, ClusterDeclaration, ClusterMetadata,
    ClusterReference, Databases, GithubRepository, Image, Integrations, PostgresDatabase, User,
    Vpc,
};
use resourcetree::{ResourceKind, ResourceNode};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const HOSTED_ZONE_ID: &str = "Z0STAGING";
pub const VPC_ID: &str = "vpc-0platform";
pub const USER_POOL_ID: &str = "eu-west-1_platform";

pub fn cluster_declaration() -> ClusterDeclaration {
    ClusterDeclaration {
        metadata: ClusterMetadata {
            name: "platform".to_string(),
            environment: "staging".to_string(),
            region: "eu-west-1".to_string(),
            account_id: "123456789012".to_string(),
        },
        cluster_root_domain: "staging.example.com".to_string(),
        github: GithubRepository {
            organisation: "example".to_string(),
            repository: "infra".to_string(),
            output_path: "infrastructure".to_string(),
        },
        vpc: Vpc {
            cidr: "192.168.0.0/20".to_string(),
            high_availability: true,
        },
        integrations: Integrations::default(),
        users: vec![User {
            email: "ops@example.com".to_string(),
        }],
        databases: Databases {
            postgres: vec![PostgresDatabase {
                name: "orders".to_string(),
                user: "orders_admin".to_string(),
                namespace: "shop".to_string(),
            }],
        },
    }
}

pub fn application_declaration() -> ApplicationDeclaration {
    ApplicationDeclaration {
        metadata: ApplicationMetadata {
            name: "web".to_string(),
            namespace: "shop".to_string(),
        },
        cluster: ClusterReference {
            environment: "staging".to_string(),
        },
        image: Image {
            name: Some("web".to_string()),
            uri: None,
        },
        subdomain: Some("web".to_string()),
        port: 8080,
        replicas: 2,
    }
}

pub fn cluster_id() -> ClusterId {
    ClusterId::from_declaration(&cluster_declaration())
}

pub fn metadata() -> CommonMetadata {
    CommonMetadata::for_cluster(Context::new(), cluster_declaration())
}

pub fn application_metadata() -> CommonMetadata {
    CommonMetadata::for_application(Context::new(), cluster_id(), application_declaration())
}

fn primary_zone(is_delegated: bool) -> HostedZone {
    HostedZone {
        domain: "staging.example.com".to_string(),
        hosted_zone_id: HOSTED_ZONE_ID.to_string(),
        is_delegated,
        name_servers: vec!["ns-1.example.net".to_string(), "ns-2.example.net".to_string()],
    }
}

/// Recorded state held by [`FakeState`]
#[derive(Debug, Clone, Default)]
pub struct StateData {
    pub hosted_zone: Option<HostedZone>,
    pub vpc: bool,
    pub cluster: bool,
    pub external_dns: Option<ExternalDnsRecord>,
    pub identity_pool: Option<IdentityPool>,
    pub github: Option<GithubRepositoryRecord>,
    pub argocd: Option<ArgoCdRecord>,
    pub helm_releases: BTreeSet<String>,
    pub postgres: Vec<PostgresDatabaseRecord>,
    pub users: Vec<User>,
    pub container_repositories: Vec<String>,
    pub applications: Vec<String>,
    /// Name of a query that fails with a state error
    pub fail_query: Option<String>,
}

/// In-memory state handlers and accessors
#[derive(Debug, Default)]
pub struct FakeState {
    data: Mutex<StateData>,
}

impl FakeState {
    /// State of a cluster where everything declared is recorded
    pub fn provisioned() -> Self {
        let data = StateData {
            hosted_zone: Some(primary_zone(true)),
            vpc: true,
            cluster: true,
            external_dns: Some(ExternalDnsRecord {
                domain: "staging.example.com".to_string(),
                hosted_zone_id: HOSTED_ZONE_ID.to_string(),
            }),
            identity_pool: Some(IdentityPool {
                user_pool_id: USER_POOL_ID.to_string(),
                auth_domain: "auth.staging.example.com".to_string(),
            }),
            github: Some(GithubRepositoryRecord {
                organisation: "example".to_string(),
                repository: "infra".to_string(),
                output_path: "infrastructure".to_string(),
            }),
            argocd: Some(ArgoCdRecord {
                domain: "argocd.staging.example.com".to_string(),
                hosted_zone_id: HOSTED_ZONE_ID.to_string(),
            }),
            helm_releases: Chart::ALL
                .iter()
                .map(|chart| chart.release_name().to_string())
                .collect(),
            postgres: vec![PostgresDatabaseRecord {
                application_name: "orders".to_string(),
                user_name: "orders_admin".to_string(),
                namespace: "shop".to_string(),
            }],
            users: cluster_declaration().users,
            ..StateData::default()
        };
        Self {
            data: Mutex::new(data),
        }
    }

    /// Read or change the recorded state
    pub fn with<R>(&self, f: impl FnOnce(&mut StateData) -> R) -> R {
        f(&mut self.data.lock().unwrap())
    }

    fn query<T>(&self, name: &str, f: impl FnOnce(&StateData) -> Option<T>) -> Result<T> {
        self.with(|data| {
            if data.fail_query.as_deref() == Some(name) {
                return Err(Error::State(format!("{name} failed")));
            }
            f(&*data).ok_or_else(|| Error::not_found(name.trim_start_matches("get_")))
        })
    }
}

impl StateHandlers for FakeState {
    fn get_vpc(&self, _cluster_name: &str) -> Result<VpcRecord> {
        self.query("get_vpc", |data| {
            data.vpc.then(|| VpcRecord {
                vpc_id: VPC_ID.to_string(),
                cidr: "192.168.0.0/20".to_string(),
            })
        })
    }

    fn get_cluster(&self, cluster_name: &str) -> Result<ClusterRecord> {
        self.query("get_cluster", |data| {
            data.cluster.then(|| ClusterRecord {
                name: cluster_name.to_string(),
                endpoint: None,
            })
        })
    }

    fn get_primary_hosted_zone(&self) -> Result<HostedZone> {
        self.query("get_primary_hosted_zone", |data| data.hosted_zone.clone())
    }

    fn get_helm_release(&self, release_name: &str) -> Result<HelmRelease> {
        self.query("get_helm_release", |data| {
            data.helm_releases.contains(release_name).then(|| HelmRelease {
                release_name: release_name.to_string(),
                chart: release_name.to_string(),
                namespace: "kube-system".to_string(),
            })
        })
    }

    fn get_identity_pool(&self, _cluster_name: &str) -> Result<IdentityPool> {
        self.query("get_identity_pool", |data| data.identity_pool.clone())
    }

    fn get_argocd(&self) -> Result<ArgoCdRecord> {
        self.query("get_argocd", |data| data.argocd.clone())
    }

    fn get_external_dns(&self) -> Result<ExternalDnsRecord> {
        self.query("get_external_dns", |data| data.external_dns.clone())
    }

    fn get_github_repository(&self) -> Result<GithubRepositoryRecord> {
        self.query("get_github_repository", |data| data.github.clone())
    }

    fn get_postgres_databases(&self) -> Result<Vec<PostgresDatabaseRecord>> {
        self.query("get_postgres_databases", |data| Some(data.postgres.clone()))
    }

    fn get_users(&self) -> Result<Vec<User>> {
        self.query("get_users", |data| Some(data.users.clone()))
    }

    fn get_container_repository(&self, name: &str) -> Result<ContainerRepositoryRecord> {
        self.query("get_container_repository", |data| {
            data.container_repositories
                .iter()
                .any(|repository| repository == name)
                .then(|| ContainerRepositoryRecord {
                    name: name.to_string(),
                    uri: format!("registry.example.com/{name}"),
                })
        })
    }

    fn get_application(&self, name: &str) -> Result<ApplicationRecord> {
        self.query("get_application", |data| {
            data.applications
                .iter()
                .any(|application| application == name)
                .then(|| ApplicationRecord {
                    name: name.to_string(),
                    namespace: "shop".to_string(),
                    url: None,
                })
        })
    }
}

impl ClusterAccessors for FakeState {
    fn vpc_cidr(&self) -> Option<String> {
        self.get_vpc("").ok().map(|vpc| vpc.cidr)
    }

    fn primary_hosted_zone(&self) -> Option<HostedZone> {
        self.with(|data| data.hosted_zone.clone())
    }

    fn github_repository(&self) -> Option<GithubRepositoryRecord> {
        self.with(|data| data.github.clone())
    }

    fn save_github_repository(&self, repository: GithubRepositoryRecord) -> Result<()> {
        self.with(|data| {
            if data.fail_query.as_deref() == Some("save_github_repository") {
                return Err(Error::State("save_github_repository failed".to_string()));
            }
            data.github = Some(repository);
            Ok(())
        })
    }
}

/// Output directory kept in memory
#[derive(Debug, Default)]
pub struct FakeOutputDir {
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
}

impl FakeOutputDir {
    pub fn clear(&self) {
        self.files.lock().unwrap().clear();
    }
}

impl OutputDir for FakeOutputDir {
    fn exists(&self, relative: &Path) -> bool {
        self.files.lock().unwrap().contains_key(relative)
    }

    fn read(&self, relative: &Path) -> Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(relative)
            .cloned()
            .ok_or_else(|| Error::not_found(relative.display().to_string()))
    }

    fn write(&self, relative: &Path, contents: &[u8]) -> Result<()> {
        self.files
            .lock()
            .unwrap()
            .insert(relative.to_path_buf(), contents.to_vec());
        Ok(())
    }

    fn remove(&self, relative: &Path) -> Result<()> {
        self.files.lock().unwrap().remove(relative);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Failure {
    Api,
    Timeout,
}

/// Service clients that record every call and update a [`FakeState`]
///
/// Calls are recorded as the method name, followed by the instance name for
/// per-instance services.
#[derive(Debug, Default)]
pub struct FakeServices {
    pub state: Arc<FakeState>,
    pub output: Arc<FakeOutputDir>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, Failure>>,
    delegated: AtomicBool,
}

impl FakeServices {
    /// Services over [`FakeState::provisioned`], with the artifacts written
    pub fn provisioned() -> Self {
        let services = Self {
            state: Arc::new(FakeState::provisioned()),
            ..Self::default()
        };
        let id = cluster_id();
        services
            .output
            .write(&artifacts::kubeconfig(&id.cluster_name), b"apiVersion: v1")
            .unwrap();
        services
            .output
            .write(&artifacts::load_balancer_controller_values(&id.cluster_name), b"")
            .unwrap();
        services
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Make `method` fail with an API error
    pub fn fail(&self, method: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(method.to_string(), Failure::Api);
    }

    /// Make `method` fail with a timeout
    pub fn time_out(&self, method: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(method.to_string(), Failure::Timeout);
    }

    /// What delegation checks answer
    pub fn set_delegated(&self, delegated: bool) {
        self.delegated.store(delegated, Ordering::SeqCst);
    }

    /// Addon service for one chart, sharing this recorder
    pub fn addon(self: &Arc<Self>, chart: Chart) -> Arc<dyn AddonService> {
        Arc::new(FakeAddon {
            chart,
            services: Arc::clone(self),
        })
    }

    fn call(&self, method: &str, instance: Option<&str>) -> Result<()> {
        let entry = match instance {
            Some(instance) => format!("{method} {instance}"),
            None => method.to_string(),
        };
        self.calls.lock().unwrap().push(entry);

        match self.failures.lock().unwrap().get(method) {
            Some(Failure::Api) => Err(Error::Api {
                status: 500,
                message: format!("{method} failed"),
            }),
            Some(Failure::Timeout) => Err(Error::timeout(method.to_string())),
            None => Ok(()),
        }
    }
}

impl ServiceQuotaService for FakeServices {
    fn check_quotas(&self, _ctx: &Context, _id: &ClusterId) -> Result<()> {
        self.call("check_quotas", None)
    }
}

impl DomainService for FakeServices {
    fn create_primary_hosted_zone(
        &self,
        _ctx: &Context,
        _opts: CreatePrimaryHostedZoneOpts,
    ) -> Result<HostedZone> {
        self.call("create_primary_hosted_zone", None)?;
        Ok(self
            .state
            .with(|s| s.hosted_zone.get_or_insert_with(|| primary_zone(false)).clone()))
    }

    fn delete_primary_hosted_zone(&self, _ctx: &Context, _id: &ClusterId, _domain: &str) -> Result<()> {
        self.call("delete_primary_hosted_zone", None)?;
        self.state.with(|s| s.hosted_zone = None);
        Ok(())
    }

    fn confirm_delegation(&self, _ctx: &Context, _id: &ClusterId, _domain: &str) -> Result<bool> {
        self.call("confirm_delegation", None)?;
        Ok(self.delegated.load(Ordering::SeqCst))
    }
}

impl NameserverService for FakeServices {
    fn create_nameserver_delegation(&self, _ctx: &Context, _opts: NameserverDelegationOpts) -> Result<()> {
        self.call("create_nameserver_delegation", None)?;
        self.state.with(|s| {
            if let Some(zone) = s.hosted_zone.as_mut() {
                zone.is_delegated = true;
            }
        });
        Ok(())
    }

    fn delete_nameserver_delegation(&self, _ctx: &Context, _id: &ClusterId, _domain: &str) -> Result<()> {
        self.call("delete_nameserver_delegation", None)?;
        self.state.with(|s| {
            if let Some(zone) = s.hosted_zone.as_mut() {
                zone.is_delegated = false;
            }
        });
        Ok(())
    }
}

impl VpcService for FakeServices {
    fn create_vpc(&self, _ctx: &Context, opts: CreateVpcOpts) -> Result<VpcRecord> {
        self.call("create_vpc", None)?;
        self.state.with(|s| s.vpc = true);
        Ok(VpcRecord {
            vpc_id: VPC_ID.to_string(),
            cidr: opts.cidr,
        })
    }

    fn delete_vpc(&self, _ctx: &Context, _id: &ClusterId) -> Result<()> {
        self.call("delete_vpc", None)?;
        self.state.with(|s| s.vpc = false);
        Ok(())
    }
}

impl CleanupService for FakeServices {
    fn delete_dangling_security_groups(&self, _ctx: &Context, _id: &ClusterId, _vpc_id: &str) -> Result<()> {
        self.call("delete_dangling_security_groups", None)
    }

    fn delete_dangling_load_balancers(&self, _ctx: &Context, _id: &ClusterId) -> Result<()> {
        self.call("delete_dangling_load_balancers", None)
    }
}

impl ClusterService for FakeServices {
    fn create_cluster(&self, _ctx: &Context, opts: CreateClusterOpts) -> Result<ClusterRecord> {
        self.call("create_cluster", None)?;
        self.state.with(|s| s.cluster = true);
        self.output
            .write(&artifacts::kubeconfig(&opts.id.cluster_name), b"apiVersion: v1")?;
        Ok(ClusterRecord {
            name: opts.id.cluster_name,
            endpoint: Some("https://platform.eks.example.com".to_string()),
        })
    }

    fn delete_cluster(&self, _ctx: &Context, id: &ClusterId) -> Result<()> {
        self.call("delete_cluster", None)?;
        self.state.with(|s| s.cluster = false);
        self.output.remove(&artifacts::kubeconfig(&id.cluster_name))
    }
}

impl ExternalDnsService for FakeServices {
    fn create_external_dns(&self, _ctx: &Context, opts: CreateExternalDnsOpts) -> Result<ExternalDnsRecord> {
        self.call("create_external_dns", None)?;
        let record = ExternalDnsRecord {
            domain: opts.domain,
            hosted_zone_id: opts.hosted_zone_id,
        };
        self.state.with(|s| s.external_dns = Some(record.clone()));
        Ok(record)
    }

    fn delete_external_dns(&self, _ctx: &Context, _id: &ClusterId) -> Result<()> {
        self.call("delete_external_dns", None)?;
        self.state.with(|s| s.external_dns = None);
        Ok(())
    }
}

impl PostgresService for FakeServices {
    fn create_postgres_database(
        &self,
        _ctx: &Context,
        opts: CreatePostgresDatabaseOpts,
    ) -> Result<PostgresDatabaseRecord> {
        self.call("create_postgres_database", Some(&opts.application_name))?;
        let record = PostgresDatabaseRecord {
            application_name: opts.application_name,
            user_name: opts.user_name,
            namespace: opts.namespace,
        };
        self.state.with(|s| {
            s.postgres.retain(|db| db.application_name != record.application_name);
            s.postgres.push(record.clone());
        });
        Ok(record)
    }

    fn delete_postgres_database(&self, _ctx: &Context, _id: &ClusterId, application_name: &str) -> Result<()> {
        self.call("delete_postgres_database", Some(application_name))?;
        self.state
            .with(|s| s.postgres.retain(|db| db.application_name != application_name));
        Ok(())
    }
}

impl IdentityManagerService for FakeServices {
    fn create_identity_pool(&self, _ctx: &Context, opts: CreateIdentityPoolOpts) -> Result<IdentityPool> {
        self.call("create_identity_pool", None)?;
        let pool = IdentityPool {
            user_pool_id: USER_POOL_ID.to_string(),
            auth_domain: opts.auth_domain,
        };
        self.state.with(|s| s.identity_pool = Some(pool.clone()));
        Ok(pool)
    }

    fn delete_identity_pool(&self, _ctx: &Context, _id: &ClusterId) -> Result<()> {
        self.call("delete_identity_pool", None)?;
        self.state.with(|s| s.identity_pool = None);
        Ok(())
    }
}

impl GithubService for FakeServices {
    fn create_github_repository(
        &self,
        _ctx: &Context,
        opts: CreateGithubRepositoryOpts,
    ) -> Result<GithubRepositoryRecord> {
        self.call("create_github_repository", None)?;
        let record = GithubRepositoryRecord {
            organisation: opts.organisation,
            repository: opts.repository,
            output_path: opts.output_path,
        };
        self.state.with(|s| s.github = Some(record.clone()));
        Ok(record)
    }

    fn delete_github_repository(&self, _ctx: &Context, _id: &ClusterId) -> Result<()> {
        self.call("delete_github_repository", None)?;
        self.state.with(|s| s.github = None);
        Ok(())
    }
}

impl ArgoCdService for FakeServices {
    fn create_argocd(&self, _ctx: &Context, opts: CreateArgoCdOpts) -> Result<ArgoCdRecord> {
        self.call("create_argocd", None)?;
        let record = ArgoCdRecord {
            domain: opts.domain,
            hosted_zone_id: opts.hosted_zone_id,
        };
        self.state.with(|s| s.argocd = Some(record.clone()));
        Ok(record)
    }

    fn delete_argocd(&self, _ctx: &Context, _id: &ClusterId) -> Result<()> {
        self.call("delete_argocd", None)?;
        self.state.with(|s| s.argocd = None);
        Ok(())
    }
}

impl UsersService for FakeServices {
    fn create_users(&self, _ctx: &Context, _id: &ClusterId, users: &[User]) -> Result<()> {
        self.call("create_users", None)?;
        self.state.with(|s| {
            for user in users {
                if !s.users.contains(user) {
                    s.users.push(user.clone());
                }
            }
        });
        Ok(())
    }

    fn delete_users(&self, _ctx: &Context, _id: &ClusterId, users: &[User]) -> Result<()> {
        let emails: Vec<_> = users.iter().map(|user| user.email.as_str()).collect();
        self.call("delete_users", Some(&emails.join(",")))?;
        self.state.with(|s| s.users.retain(|user| !users.contains(user)));
        Ok(())
    }
}

impl KubePromStackService for FakeServices {
    fn create_kube_prom_stack(&self, _ctx: &Context, _opts: CreateKubePromStackOpts) -> Result<HelmRelease> {
        self.call("create_kube_prom_stack", None)?;
        let name = Chart::KubePrometheusStack.release_name();
        self.state.with(|s| s.helm_releases.insert(name.to_string()));
        Ok(HelmRelease {
            release_name: name.to_string(),
            chart: name.to_string(),
            namespace: "monitoring".to_string(),
        })
    }

    fn delete_kube_prom_stack(&self, _ctx: &Context, _id: &ClusterId) -> Result<()> {
        self.call("delete_kube_prom_stack", None)?;
        self.state
            .with(|s| s.helm_releases.remove(Chart::KubePrometheusStack.release_name()));
        Ok(())
    }
}

impl ApplicationService for FakeServices {
    fn create_container_repository(
        &self,
        _ctx: &Context,
        _id: &ClusterId,
        name: &str,
    ) -> Result<ContainerRepositoryRecord> {
        self.call("create_container_repository", Some(name))?;
        self.state
            .with(|s| s.container_repositories.push(name.to_string()));
        Ok(ContainerRepositoryRecord {
            name: name.to_string(),
            uri: format!("registry.example.com/{name}"),
        })
    }

    fn delete_container_repository(&self, _ctx: &Context, _id: &ClusterId, name: &str) -> Result<()> {
        self.call("delete_container_repository", Some(name))?;
        self.state
            .with(|s| s.container_repositories.retain(|repository| repository != name));
        Ok(())
    }

    fn create_application(
        &self,
        _ctx: &Context,
        _id: &ClusterId,
        application: &ApplicationDeclaration,
    ) -> Result<ApplicationRecord> {
        let name = &application.metadata.name;
        self.call("create_application", Some(name))?;
        self.state.with(|s| s.applications.push(name.clone()));
        Ok(ApplicationRecord {
            name: name.clone(),
            namespace: application.metadata.namespace.clone(),
            url: application
                .subdomain
                .as_ref()
                .map(|subdomain| format!("https://{subdomain}.staging.example.com")),
        })
    }

    fn delete_application(&self, _ctx: &Context, _id: &ClusterId, name: &str) -> Result<()> {
        self.call("delete_application", Some(name))?;
        self.state
            .with(|s| s.applications.retain(|application| application != name));
        Ok(())
    }
}

/// One helm chart served through [`FakeServices`]
struct FakeAddon {
    chart: Chart,
    services: Arc<FakeServices>,
}

impl AddonService for FakeAddon {
    fn chart(&self) -> Chart {
        self.chart
    }

    fn create(&self, _ctx: &Context, id: &ClusterId) -> Result<HelmRelease> {
        let name = self.chart.release_name();
        self.services.call("create_addon", Some(name))?;
        self.services
            .state
            .with(|s| s.helm_releases.insert(name.to_string()));

        if self.chart == Chart::AwsLoadBalancerController {
            self.services
                .output
                .write(&artifacts::load_balancer_controller_values(&id.cluster_name), b"")?;
        }

        Ok(HelmRelease {
            release_name: name.to_string(),
            chart: name.to_string(),
            namespace: "kube-system".to_string(),
        })
    }

    fn delete(&self, _ctx: &Context, id: &ClusterId) -> Result<()> {
        let name = self.chart.release_name();
        self.services.call("delete_addon", Some(name))?;
        self.services.state.with(|s| s.helm_releases.remove(name));

        if self.chart == Chart::AwsLoadBalancerController {
            self.services
                .output
                .remove(&artifacts::load_balancer_controller_values(&id.cluster_name))?;
        }
        Ok(())
    }
}

/// Registry of built-in reconcilers over `services`
pub fn cluster_registry(services: &Arc<FakeServices>) -> CompositeReconciler {
    cluster_registry_with(services, Arc::new(NoProgress))
}

pub fn cluster_registry_with(
    services: &Arc<FakeServices>,
    progress: Arc<dyn ProgressReporter>,
) -> CompositeReconciler {
    let addons: Vec<_> = Chart::addons().map(|chart| services.addon(chart)).collect();
    CompositeReconciler::standard(services, addons, progress)
}

/// Reconciler that logs every node it is handed
pub struct RecordingReconciler {
    kind: ResourceKind,
    log: Arc<Mutex<Vec<String>>>,
    fail_on: Vec<String>,
    requeue: bool,
}

impl RecordingReconciler {
    pub fn new(kind: ResourceKind, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            kind,
            log,
            fail_on: Vec::new(),
            requeue: false,
        }
    }

    /// Fail for the node types named in `nodes`
    pub fn failing_on(mut self, nodes: &[&str]) -> Self {
        self.fail_on = nodes.iter().map(|node| (*node).to_string()).collect();
        self
    }

    /// Ask for another run after every node
    pub fn requeue(mut self) -> Self {
        self.requeue = true;
        self
    }
}

impl Reconciler for RecordingReconciler {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn set_common_metadata(&mut self, _metadata: Arc<CommonMetadata>) {}

    fn set_state_handlers(&mut self, _handlers: Arc<dyn StateHandlers>) {}

    fn reconcile(&self, node: &ResourceNode) -> Result<ReconcileResult> {
        let name = node.node_type.to_string();
        self.log.lock().unwrap().push(name.clone());

        if self.fail_on.contains(&name) {
            return Err(Error::Other(format!("{name} failed")));
        }
        Ok(ReconcileResult {
            requeue: self.requeue,
        })
    }
}

const ALL_KINDS: [ResourceKind; 26] = [
    ResourceKind::Group,
    ResourceKind::ServiceQuota,
    ResourceKind::Zone,
    ResourceKind::NameserverDelegator,
    ResourceKind::Vpc,
    ResourceKind::CleanupSecurityGroups,
    ResourceKind::Cluster,
    ResourceKind::CleanupLoadBalancers,
    ResourceKind::ExternalSecrets,
    ResourceKind::Autoscaler,
    ResourceKind::Blockstorage,
    ResourceKind::AwsLoadBalancerController,
    ResourceKind::ExternalDns,
    ResourceKind::Postgres,
    ResourceKind::PostgresInstance,
    ResourceKind::NameserversDelegatedTest,
    ResourceKind::IdentityManager,
    ResourceKind::Github,
    ResourceKind::ArgoCd,
    ResourceKind::Users,
    ResourceKind::KubePromStack,
    ResourceKind::Loki,
    ResourceKind::Promtail,
    ResourceKind::Tempo,
    ResourceKind::ContainerRepository,
    ResourceKind::Application,
];

/// Registry logging every dispatched node into `log`
pub fn recording_registry(log: &Arc<Mutex<Vec<String>>>, fail_on: &[&str]) -> CompositeReconciler {
    let mut registry = CompositeReconciler::default();
    for kind in ALL_KINDS {
        registry.register(Box::new(
            RecordingReconciler::new(kind, Arc::clone(log)).failing_on(fail_on),
        ));
    }
    registry
}

/// Progress reporter keeping every notification
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<String>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressReporter for RecordingProgress {
    fn start(&self, node: &ResourceNode) {
        self.events
            .lock()
            .unwrap()
            .push(format!("start {}", node.node_type));
    }

    fn stop(&self, node: &ResourceNode, success: bool) {
        let outcome = if success { "ok" } else { "failed" };
        self.events
            .lock()
            .unwrap()
            .push(format!("stop {} {outcome}", node.node_type));
    }
}
