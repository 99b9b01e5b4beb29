//! Node discriminators and node states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Family of a managed resource
///
/// A kind names what a node is, independent of how many nodes of that kind
/// a tree holds. Reconcilers are registered per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// Structural node with no resource behind it
    Group,
    ServiceQuota,
    /// Primary hosted zone
    Zone,
    NameserverDelegator,
    Vpc,
    CleanupSecurityGroups,
    Cluster,
    CleanupLoadBalancers,
    ExternalSecrets,
    Autoscaler,
    Blockstorage,
    AwsLoadBalancerController,
    ExternalDns,
    /// Group holding one `PostgresInstance` per database
    Postgres,
    PostgresInstance,
    /// Gate for everything that needs certificates
    NameserversDelegatedTest,
    IdentityManager,
    Github,
    #[serde(rename = "argocd")]
    ArgoCd,
    Users,
    #[serde(rename = "kube-prometheus-stack")]
    KubePromStack,
    Loki,
    Promtail,
    Tempo,
    ContainerRepository,
    Application,
}

impl ResourceKind {
    /// Stable kebab-case name, used in logs and progress output
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::ServiceQuota => "service-quota",
            Self::Zone => "zone",
            Self::NameserverDelegator => "nameserver-delegator",
            Self::Vpc => "vpc",
            Self::CleanupSecurityGroups => "cleanup-security-groups",
            Self::Cluster => "cluster",
            Self::CleanupLoadBalancers => "cleanup-load-balancers",
            Self::ExternalSecrets => "external-secrets",
            Self::Autoscaler => "autoscaler",
            Self::Blockstorage => "blockstorage",
            Self::AwsLoadBalancerController => "aws-load-balancer-controller",
            Self::ExternalDns => "external-dns",
            Self::Postgres => "postgres",
            Self::PostgresInstance => "postgres-instance",
            Self::NameserversDelegatedTest => "nameservers-delegated-test",
            Self::IdentityManager => "identity-manager",
            Self::Github => "github",
            Self::ArgoCd => "argocd",
            Self::Users => "users",
            Self::KubePromStack => "kube-prometheus-stack",
            Self::Loki => "loki",
            Self::Promtail => "promtail",
            Self::Tempo => "tempo",
            Self::ContainerRepository => "container-repository",
            Self::Application => "application",
        }
    }

    /// Whether nodes of this kind come in keyed instances
    pub fn is_multiple(&self) -> bool {
        matches!(self, Self::PostgresInstance)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminator of a single node: a kind plus an optional instance key
///
/// Two nodes of the same multiple kind differ only by key, e.g.
/// `postgres-instance[orders]` and `postgres-instance[billing]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceNodeType {
    pub kind: ResourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl ResourceNodeType {
    /// Type of a singular node
    pub fn of(kind: ResourceKind) -> Self {
        Self { kind, key: None }
    }

    /// Type of one instance of a multiple kind
    pub fn instance(kind: ResourceKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: Some(key.into()),
        }
    }

    /// Instance key, if any
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

impl From<ResourceKind> for ResourceNodeType {
    fn from(kind: ResourceKind) -> Self {
        Self::of(kind)
    }
}

impl fmt::Display for ResourceNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}[{}]", self.kind, key),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// State of a node
///
/// Builders assign `Present` or `Absent`. `Noop` means the desired state is
/// already satisfied and is only produced by diffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceNodeState {
    /// Resource must exist
    #[default]
    Present,
    /// Resource must not exist
    Absent,
    /// Nothing to do
    Noop,
}

impl ResourceNodeState {
    /// State for a resource that either exists or not
    pub fn from_presence(present: bool) -> Self {
        if present { Self::Present } else { Self::Absent }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present)
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Noop)
    }
}

impl fmt::Display for ResourceNodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present => f.write_str("present"),
            Self::Absent => f.write_str("absent"),
            Self::Noop => f.write_str("noop"),
        }
    }
}
