//! Metadata shared by every reconciler of one run

use crate::context::Context;
use crate::error::{Error, Result};
use declaration::{ApplicationDeclaration, ClusterDeclaration};
use resourcetree::ResourceKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Stable identity of the target cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterId {
    pub region: String,
    pub account_id: String,
    pub environment: String,
    pub cluster_name: String,
    pub repository_name: String,
}

impl ClusterId {
    pub fn from_declaration(declaration: &ClusterDeclaration) -> Self {
        Self {
            region: declaration.metadata.region.clone(),
            account_id: declaration.metadata.account_id.clone(),
            environment: declaration.metadata.environment.clone(),
            cluster_name: declaration.metadata.name.clone(),
            repository_name: declaration.github.repository.clone(),
        }
    }
}

impl std::fmt::Display for ClusterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} ({}, {})",
            self.cluster_name, self.environment, self.region, self.account_id
        )
    }
}

/// The declaration a run reconciles
#[derive(Debug, Clone)]
pub enum Declaration {
    Cluster(Arc<ClusterDeclaration>),
    Application(Arc<ApplicationDeclaration>),
}

/// Immutable bundle handed to every reconciler before the walk
#[derive(Debug, Clone)]
pub struct CommonMetadata {
    pub context: Context,
    pub cluster_id: ClusterId,
    pub declaration: Declaration,
}

impl CommonMetadata {
    pub fn for_cluster(context: Context, declaration: ClusterDeclaration) -> Self {
        Self {
            context,
            cluster_id: ClusterId::from_declaration(&declaration),
            declaration: Declaration::Cluster(Arc::new(declaration)),
        }
    }

    pub fn for_application(
        context: Context,
        cluster_id: ClusterId,
        declaration: ApplicationDeclaration,
    ) -> Self {
        Self {
            context,
            cluster_id,
            declaration: Declaration::Application(Arc::new(declaration)),
        }
    }

    /// The cluster declaration, for reconcilers that only serve cluster runs
    pub fn cluster(&self, kind: ResourceKind) -> Result<&ClusterDeclaration> {
        match &self.declaration {
            Declaration::Cluster(declaration) => Ok(declaration),
            Declaration::Application(_) => Err(Error::InvalidMetadata {
                kind,
                message: "expected a cluster declaration".to_string(),
            }),
        }
    }

    /// The application declaration, for reconcilers that only serve application runs
    pub fn application(&self, kind: ResourceKind) -> Result<&ApplicationDeclaration> {
        match &self.declaration {
            Declaration::Application(declaration) => Ok(declaration),
            Declaration::Cluster(_) => Err(Error::InvalidMetadata {
                kind,
                message: "expected an application declaration".to_string(),
            }),
        }
    }
}
