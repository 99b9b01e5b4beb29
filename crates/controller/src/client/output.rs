//! Scoped view of the per-environment output directory

use crate::error::Result;
use std::path::Path;

/// Artifacts written by earlier runs, relative to the environment directory
pub trait OutputDir: Send + Sync {
    /// Whether `relative` exists inside the directory
    fn exists(&self, relative: &Path) -> bool;

    fn read(&self, relative: &Path) -> Result<Vec<u8>>;

    fn write(&self, relative: &Path, contents: &[u8]) -> Result<()>;

    /// Remove `relative`; a missing file is not an error
    fn remove(&self, relative: &Path) -> Result<()>;
}

/// Relative paths of artifacts the engine looks for
pub mod artifacts {
    use std::path::PathBuf;

    /// Kubeconfig written when the cluster is created
    pub fn kubeconfig(cluster_name: &str) -> PathBuf {
        PathBuf::from(cluster_name).join("kubeconfig")
    }

    /// Helm values written when the load balancer controller is installed
    pub fn load_balancer_controller_values(cluster_name: &str) -> PathBuf {
        PathBuf::from(cluster_name)
            .join("helm")
            .join("aws-load-balancer-controller")
            .join("values.yaml")
    }
}
