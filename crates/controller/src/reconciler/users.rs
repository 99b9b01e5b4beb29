use super::{Injected, ReconcileResult, Reconciler};
use crate::client::{StateHandlers, UsersService};
use crate::error::{OperationContext, Result};
use crate::metadata::CommonMetadata;
use declaration::User;
use resourcetree::{ResourceKind, ResourceNode, ResourceNodeState};
use std::sync::Arc;

/// Declared users of the identity pool
///
/// Users recorded by earlier runs but no longer declared are deleted, all of
/// them when the node is absent.
pub struct UsersReconciler {
    injected: Injected,
    client: Arc<dyn UsersService>,
}

impl UsersReconciler {
    pub fn new(client: Arc<dyn UsersService>) -> Self {
        Self {
            injected: Injected::default(),
            client,
        }
    }
}

impl Reconciler for UsersReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Users
    }

    fn set_common_metadata(&mut self, metadata: Arc<CommonMetadata>) {
        self.injected.set_metadata(metadata);
    }

    fn set_state_handlers(&mut self, handlers: Arc<dyn StateHandlers>) {
        self.injected.set_handlers(handlers);
    }

    fn reconcile(&self, node: &ResourceNode) -> Result<ReconcileResult> {
        if node.state.is_noop() {
            return Ok(ReconcileResult::default());
        }

        let metadata = self.injected.metadata(self.kind())?;
        let declared = &metadata.cluster(self.kind())?.users;
        let recorded = self.injected.handlers(self.kind())?.get_users()?;

        let stale: Vec<User> = if node.state.is_present() {
            self.client
                .create_users(&metadata.context, &metadata.cluster_id, declared)
                .operation("creating users")?;
            recorded
                .into_iter()
                .filter(|user| !is_declared(declared, user))
                .collect()
        } else {
            recorded
        };

        if !stale.is_empty() {
            log::debug!("Deleting {} user(s) no longer declared", stale.len());
            self.client
                .delete_users(&metadata.context, &metadata.cluster_id, &stale)
                .operation("deleting users")?;
        }

        Ok(ReconcileResult::default())
    }
}

fn is_declared(declared: &[User], user: &User) -> bool {
    declared
        .iter()
        .any(|d| d.email.eq_ignore_ascii_case(&user.email))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeServices, metadata};
    use resourcetree::ResourceNodeState;

    fn reconciler(services: &Arc<FakeServices>) -> UsersReconciler {
        let mut users = UsersReconciler::new(services.clone());
        users.set_common_metadata(Arc::new(metadata()));
        users.set_state_handlers(services.state.clone());
        users
    }

    fn node(state: ResourceNodeState) -> ResourceNode {
        let mut node = ResourceNode::new(ResourceKind::Users);
        node.state = state;
        node
    }

    #[test]
    fn test_present_creates_declared_and_drops_stale() {
        let services = Arc::new(FakeServices::default());
        services.state.with(|s| {
            s.users.push(User {
                email: "former@example.com".to_string(),
            });
        });

        reconciler(&services)
            .reconcile(&node(ResourceNodeState::Present))
            .unwrap();

        assert_eq!(
            services.calls(),
            vec!["create_users", "delete_users former@example.com"]
        );
        let emails: Vec<_> = services
            .state
            .with(|s| s.users.iter().map(|user| user.email.clone()).collect());
        assert_eq!(emails, vec!["ops@example.com"]);
    }

    #[test]
    fn test_absent_deletes_recorded_users() {
        let services = Arc::new(FakeServices::provisioned());

        reconciler(&services)
            .reconcile(&node(ResourceNodeState::Absent))
            .unwrap();

        assert_eq!(services.calls(), vec!["delete_users ops@example.com"]);
        assert!(services.state.with(|s| s.users.is_empty()));
    }

    #[test]
    fn test_absent_without_recorded_users_does_nothing() {
        let services = Arc::new(FakeServices::default());
        reconciler(&services)
            .reconcile(&node(ResourceNodeState::Absent))
            .unwrap();
        assert!(services.calls().is_empty());
    }
}
