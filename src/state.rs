//! Recorded state of one environment (`<output>/<environment>/state.toml`)
//!
//! The API client records the result of every successful service call here,
//! and the engine reads it back through [`StateHandlers`]. The file is
//! rewritten after each change so an interrupted run loses nothing.

use chrono::{DateTime, Utc};
use controller::client::{
    ApplicationRecord, ArgoCdRecord, ClusterAccessors, ClusterRecord, ContainerRepositoryRecord,
    ExternalDnsRecord, GithubRepositoryRecord, HelmRelease, HostedZone, IdentityPool,
    PostgresDatabaseRecord, StateHandlers, VpcRecord,
};
use controller::{ClusterId, Error, Result};
use declaration::User;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

// ============================================================================
// State Structures
// ============================================================================

/// Everything recorded for one environment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentState {
    /// Last time the state was written
    pub last_updated: Option<DateTime<Utc>>,

    /// Identity of the cluster, set by the first cluster apply
    pub cluster_id: Option<ClusterId>,
    pub hosted_zone: Option<HostedZone>,
    pub vpc: Option<VpcRecord>,
    pub cluster: Option<ClusterRecord>,
    pub external_dns: Option<ExternalDnsRecord>,
    pub identity_pool: Option<IdentityPool>,
    pub github: Option<GithubRepositoryRecord>,
    pub argocd: Option<ArgoCdRecord>,

    /// Helm releases by release name
    #[serde(default)]
    pub helm_releases: BTreeMap<String, HelmRelease>,

    /// Databases by application name
    #[serde(default)]
    pub postgres: BTreeMap<String, PostgresDatabaseRecord>,

    #[serde(default)]
    pub container_repositories: BTreeMap<String, ContainerRepositoryRecord>,

    #[serde(default)]
    pub applications: BTreeMap<String, ApplicationRecord>,

    /// Users of the identity pool, in creation order
    #[serde(default)]
    pub users: Vec<User>,
}

// ============================================================================
// StateStore
// ============================================================================

/// File-backed state of one environment
pub struct StateStore {
    path: PathBuf,
    state: Mutex<EnvironmentState>,
}

impl StateStore {
    /// Load `state.toml` from an environment directory, or start empty
    pub fn open(environment_dir: &Path) -> Result<Self> {
        let path = environment_dir.join("state.toml");

        let state = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| {
                Error::State(format!("failed to read state file {}: {e}", path.display()))
            })?;
            let state = toml::from_str(&content).map_err(|e| {
                Error::State(format!("failed to parse state file {}: {e}", path.display()))
            })?;
            log::debug!("Loaded state from {}", path.display());
            state
        } else {
            log::debug!("State file {} does not exist, using empty state", path.display());
            EnvironmentState::default()
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current state
    #[cfg(test)]
    pub fn snapshot(&self) -> EnvironmentState {
        self.lock().clone()
    }

    pub fn cluster_id(&self) -> Option<ClusterId> {
        self.lock().cluster_id.clone()
    }

    /// Change the state and write it to disk
    pub fn update<R>(&self, change: impl FnOnce(&mut EnvironmentState) -> R) -> Result<R> {
        let mut state = self.lock();
        let result = change(&mut state);
        state.last_updated = Some(Utc::now());
        self.save(&state)?;
        Ok(result)
    }

    fn save(&self, state: &EnvironmentState) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| {
                Error::State(format!("failed to create state directory {}: {e}", dir.display()))
            })?;
        }

        let content = toml::to_string_pretty(state)
            .map_err(|e| Error::State(format!("failed to serialize state: {e}")))?;
        fs::write(&self.path, content).map_err(|e| {
            Error::State(format!("failed to write state file {}: {e}", self.path.display()))
        })?;

        log::debug!("Saved state to {}", self.path.display());
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, EnvironmentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn get<T>(&self, what: &str, query: impl FnOnce(&EnvironmentState) -> Option<T>) -> Result<T> {
        query(&self.lock()).ok_or_else(|| Error::not_found(what))
    }
}

impl StateHandlers for StateStore {
    fn get_vpc(&self, cluster_name: &str) -> Result<VpcRecord> {
        self.get(&format!("vpc for {cluster_name}"), |s| s.vpc.clone())
    }

    fn get_cluster(&self, cluster_name: &str) -> Result<ClusterRecord> {
        self.get(&format!("cluster {cluster_name}"), |s| {
            s.cluster
                .clone()
                .filter(|cluster| cluster.name == cluster_name)
        })
    }

    fn get_primary_hosted_zone(&self) -> Result<HostedZone> {
        self.get("primary hosted zone", |s| s.hosted_zone.clone())
    }

    fn get_helm_release(&self, release_name: &str) -> Result<HelmRelease> {
        self.get(&format!("helm release {release_name}"), |s| {
            s.helm_releases.get(release_name).cloned()
        })
    }

    fn get_identity_pool(&self, cluster_name: &str) -> Result<IdentityPool> {
        self.get(&format!("identity pool for {cluster_name}"), |s| {
            s.identity_pool.clone()
        })
    }

    fn get_argocd(&self) -> Result<ArgoCdRecord> {
        self.get("argocd", |s| s.argocd.clone())
    }

    fn get_external_dns(&self) -> Result<ExternalDnsRecord> {
        self.get("external dns", |s| s.external_dns.clone())
    }

    fn get_github_repository(&self) -> Result<GithubRepositoryRecord> {
        self.get("github repository", |s| s.github.clone())
    }

    fn get_postgres_databases(&self) -> Result<Vec<PostgresDatabaseRecord>> {
        Ok(self.lock().postgres.values().cloned().collect())
    }

    fn get_users(&self) -> Result<Vec<User>> {
        Ok(self.lock().users.clone())
    }

    fn get_container_repository(&self, name: &str) -> Result<ContainerRepositoryRecord> {
        self.get(&format!("container repository {name}"), |s| {
            s.container_repositories.get(name).cloned()
        })
    }

    fn get_application(&self, name: &str) -> Result<ApplicationRecord> {
        self.get(&format!("application {name}"), |s| s.applications.get(name).cloned())
    }
}

impl ClusterAccessors for StateStore {
    fn vpc_cidr(&self) -> Option<String> {
        self.lock().vpc.as_ref().map(|vpc| vpc.cidr.clone())
    }

    fn primary_hosted_zone(&self) -> Option<HostedZone> {
        self.lock().hosted_zone.clone()
    }

    fn github_repository(&self) -> Option<GithubRepositoryRecord> {
        self.lock().github.clone()
    }

    fn save_github_repository(&self, repository: GithubRepositoryRecord) -> Result<()> {
        self.update(|s| s.github = Some(repository))
    }
}

// ============================================================================
// Tests
// ============================================================================
