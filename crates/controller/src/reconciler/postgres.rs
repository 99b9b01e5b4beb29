use super::{Injected, ReconcileResult, Reconciler};
use crate::client::{CreatePostgresDatabaseOpts, PostgresService, StateHandlers};
use crate::error::{Error, OperationContext, Result};
use crate::metadata::CommonMetadata;
use declaration::PostgresDatabase;
use resourcetree::{ResourceKind, ResourceNode, ResourceNodeState};
use std::sync::Arc;

/// One postgres database per `postgres-instance` node
///
/// Every instance is handled by the same reconciler. The database
/// definition travels on the node, so deletion works for databases that are
/// only recorded.
pub struct PostgresReconciler {
    injected: Injected,
    client: Arc<dyn PostgresService>,
}

impl PostgresReconciler {
    pub fn new(client: Arc<dyn PostgresService>) -> Self {
        Self {
            injected: Injected::default(),
            client,
        }
    }

    fn database<'a>(&self, node: &'a ResourceNode) -> Result<&'a PostgresDatabase> {
        node.metadata::<PostgresDatabase>()
            .ok_or_else(|| Error::InvalidMetadata {
                kind: self.kind(),
                message: format!("{} carries no database definition", node.node_type),
            })
    }
}

impl Reconciler for PostgresReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::PostgresInstance
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
                let database = self.database(node)?;
                let vpc = self
                    .injected
                    .handlers(self.kind())?
                    .get_vpc(&metadata.cluster_id.cluster_name)
                    .operation("getting vpc")?;

                self.client
                    .create_postgres_database(
                        &metadata.context,
                        CreatePostgresDatabaseOpts {
                            id: metadata.cluster_id.clone(),
                            application_name: database.name.clone(),
                            user_name: database.user.clone(),
                            namespace: database.namespace.clone(),
                            vpc_id: vpc.vpc_id,
                        },
                    )
                    .operation(format!("creating postgres database {}", database.name))?;
            }
            ResourceNodeState::Absent => {
                let metadata = self.injected.metadata(self.kind())?;
                let name = match node.node_type.key() {
                    Some(name) => name.to_string(),
                    None => self.database(node)?.name.clone(),
                };

                self.client
                    .delete_postgres_database(&metadata.context, &metadata.cluster_id, &name)
                    .operation(format!("deleting postgres database {name}"))?;
            }
            ResourceNodeState::Noop => {}
        }

        Ok(ReconcileResult::default())
    }
}
