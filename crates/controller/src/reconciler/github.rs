use super::{Injected, ReconcileResult, Reconciler};
use crate::client::{CreateGithubRepositoryOpts, GithubService, StateHandlers};
use crate::error::{OperationContext, Result};
use crate::metadata::CommonMetadata;
use resourcetree::{ResourceKind, ResourceNode, ResourceNodeState};
use std::sync::Arc;

/// GitOps repository argocd syncs from
pub struct GithubReconciler {
    injected: Injected,
    client: Arc<dyn GithubService>,
}

impl GithubReconciler {
    pub fn new(client: Arc<dyn GithubService>) -> Self {
        Self {
            injected: Injected::default(),
            client,
        }
    }
}

impl Reconciler for GithubReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Github
    }

    fn set_common_metadata(&mut self, metadata: Arc<CommonMetadata>) {
        self.injected.set_metadata(metadata);
    }

    fn set_state_handlers(&mut self, handlers: Arc<dyn StateHandlers>) {
        self.injected.set_handlers(handlers);
    }

    fn reconcile(&self, node: &ResourceNode) -> Result<ReconcileResult> {
        match node.state {
            ResourceNodeState::Present => {
                let metadata = self.injected.metadata(self.kind())?;
                let github = &metadata.cluster(self.kind())?.github;

                let record = self
                    .client
                    .create_github_repository(
                        &metadata.context,
                        CreateGithubRepositoryOpts {
                            id: metadata.cluster_id.clone(),
                            organisation: github.organisation.clone(),
                            repository: github.repository.clone(),
                            output_path: github.output_path.clone(),
                        },
                    )
                    .operation("creating github repository")?;
                log::debug!("Repository {} ready", record.full_name());
            }
            ResourceNodeState::Absent => {
                let metadata = self.injected.metadata(self.kind())?;
                self.client
                    .delete_github_repository(&metadata.context, &metadata.cluster_id)
                    .operation("deleting github repository")?;
            }
            ResourceNodeState::Noop => {}
        }

        Ok(ReconcileResult::default())
    }
}
