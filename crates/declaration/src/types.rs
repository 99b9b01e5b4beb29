//! Declaration types
//!
//! A cluster declaration describes one environment: the cluster itself, the
//! add-ons to install on it and the databases and users it should have. An
//! application declaration describes one workload deployed onto such a
//! cluster.

use serde::{Deserialize, Serialize};

/// Declared state of one cluster environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterDeclaration {
    pub metadata: ClusterMetadata,

    /// Domain every public endpoint of the cluster lives under
    pub cluster_root_domain: String,

    pub github: GithubRepository,

    pub vpc: Vpc,

    #[serde(default)]
    pub integrations: Integrations,

    #[serde(default)]
    pub users: Vec<User>,

    #[serde(default)]
    pub databases: Databases,
}

impl ClusterDeclaration {
    /// Postgres databases, in declaration order
    pub fn postgres_databases(&self) -> &[PostgresDatabase] {
        &self.databases.postgres
    }

    /// Whether any user is declared
    pub fn has_users(&self) -> bool {
        !self.users.is_empty()
    }
}

/// Identity of the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMetadata {
    pub name: String,
    pub environment: String,
    pub region: String,
    /// Twelve digit cloud account number, kept as text to preserve leading zeros
    pub account_id: String,
}

/// Infrastructure repository the cluster is managed from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubRepository {
    pub organisation: String,
    pub repository: String,
    #[serde(default = "default_output_path")]
    pub output_path: String,
}

fn default_output_path() -> String {
    "infrastructure".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vpc {
    pub cidr: String,
    #[serde(default = "default_true")]
    pub high_availability: bool,
}

/// Optional components, each toggled independently
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Integrations {
    pub argocd: bool,
    pub autoscaler: bool,
    pub aws_load_balancer_controller: bool,
    pub blockstorage: bool,
    pub external_dns: bool,
    pub external_secrets: bool,
    pub identity_manager: bool,
    pub kube_prometheus_stack: bool,
    pub loki: bool,
    pub promtail: bool,
    pub tempo: bool,
}

impl Default for Integrations {
    fn default() -> Self {
        Self {
            argocd: true,
            autoscaler: true,
            aws_load_balancer_controller: true,
            blockstorage: true,
            external_dns: true,
            external_secrets: true,
            identity_manager: true,
            kube_prometheus_stack: true,
            loki: true,
            promtail: true,
            tempo: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Databases {
    #[serde(default)]
    pub postgres: Vec<PostgresDatabase>,
}

/// One postgres instance, keyed by `name`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostgresDatabase {
    pub name: String,
    pub user: String,
    pub namespace: String,
}

/// Declared state of one application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDeclaration {
    pub metadata: ApplicationMetadata,

    /// Cluster the application is deployed to
    pub cluster: ClusterReference,

    pub image: Image,

    /// Public subdomain under the cluster root domain, if exposed
    #[serde(default)]
    pub subdomain: Option<String>,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_replicas")]
    pub replicas: u32,
}

impl ApplicationDeclaration {
    /// Whether the image is built by us and needs a container repository
    pub fn needs_container_repository(&self) -> bool {
        self.image.uri.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationMetadata {
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterReference {
    pub environment: String,
}

/// Container image: either a repository we own (`name`) or an external `uri`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_port() -> u16 {
    80
}

fn default_replicas() -> u32 {
    1
}
