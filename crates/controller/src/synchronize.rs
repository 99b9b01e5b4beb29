//! Synchronization: plan a transition and walk it
//!
//! A run builds the current-state tree, diffs the caller's desired tree
//! against it and reconciles every node of the resulting transition tree.
//! Nodes that are created or kept are visited parents first; nodes that are
//! deleted are visited children first. Right before a node is dispatched its
//! current state is refreshed and its transition recomputed, since earlier
//! nodes of the same run may have changed what exists.
//!
//! The walk stops at the first failure. Nothing is rolled back.

use crate::client::{ClusterAccessors, OutputDir, StateHandlers};
use crate::current::{
    ExistingApplication, ExistingResources, create_application_current_state_graph,
    create_current_state_graph,
};
use crate::diff::{DiffSummary, create_transition_tree, transition};
use crate::error::{Error, Result};
use crate::metadata::{CommonMetadata, Declaration};
use crate::reconciler::{CompositeReconciler, Reconciler};
use crate::refresher::{RefresherSources, attach_cluster_refreshers};
use rayon::prelude::*;
use resourcetree::{ResourceKind, ResourceNode, ResourceNodeState, ResourceNodeType};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// What to do when a state refresher fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshErrorPolicy {
    /// Abort the walk with the refresh error
    #[default]
    Propagate,
    /// Log a warning and dispatch the planned state
    Warn,
}

/// Inputs for building a transition
pub struct PlanOpts {
    /// Tree annotated with the desired state
    pub desired: ResourceNode,
    pub metadata: Arc<CommonMetadata>,
    pub state_handlers: Arc<dyn StateHandlers>,
    pub accessors: Arc<dyn ClusterAccessors>,
    pub output_dir: Arc<dyn OutputDir>,
}

pub struct SynchronizeOpts<'a> {
    pub plan: PlanOpts,
    pub reconciler: &'a mut CompositeReconciler,
    pub refresh_policy: RefreshErrorPolicy,
    /// Siblings reconciled at once; 0 and 1 walk sequentially
    pub jobs: usize,
}

/// The three trees of one run
#[derive(Debug)]
pub struct Plan {
    pub desired: ResourceNode,
    /// Current state, with refreshers attached
    pub current: ResourceNode,
    pub transition: ResourceNode,
}

impl Plan {
    pub fn summary(&self) -> DiffSummary {
        DiffSummary::of(&self.transition)
    }
}

/// One create or delete performed by a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncAction {
    pub node: ResourceNodeType,
    pub state: ResourceNodeState,
}

/// Outcome of a successful run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Creates and deletes in the order they finished
    pub actions: Vec<SyncAction>,
    /// A reconciler asked for the run to be repeated
    pub requeue: bool,
}

impl SyncReport {
    pub fn created(&self) -> usize {
        self.actions.iter().filter(|a| a.state.is_present()).count()
    }

    pub fn deleted(&self) -> usize {
        self.actions.iter().filter(|a| a.state.is_absent()).count()
    }
}

/// Build the current-state tree and diff the desired tree against it
///
/// Database instances of the current tree mirror those of the desired tree,
/// so the desired tree must already include recorded databases.
pub fn plan(opts: &PlanOpts) -> Result<Plan> {
    let handlers = opts.state_handlers.as_ref();
    let metadata = &opts.metadata;

    let current = match &metadata.declaration {
        Declaration::Cluster(declaration) => {
            let existing =
                ExistingResources::identify(&metadata.cluster_id, &declaration.users, handlers)?;
            let mut current = create_current_state_graph(&existing, &instance_names(&opts.desired))?;

            attach_cluster_refreshers(
                &mut current,
                &RefresherSources {
                    output: Arc::clone(&opts.output_dir),
                    handlers: Arc::clone(&opts.state_handlers),
                    accessors: Arc::clone(&opts.accessors),
                    cluster_id: metadata.cluster_id.clone(),
                    github: declaration.github.clone(),
                },
            );
            current
        }
        Declaration::Application(declaration) => {
            let existing = ExistingApplication::identify(declaration, handlers)?;
            create_application_current_state_graph(existing)
        }
    };

    let transition = create_transition_tree(&opts.desired, &current)?;
    let plan = Plan {
        desired: opts.desired.clone(),
        current,
        transition,
    };

    let summary = plan.summary();
    log::debug!(
        "Planned {} create(s), {} delete(s), {} unchanged for {}",
        summary.create,
        summary.delete,
        summary.unchanged,
        metadata.cluster_id
    );
    Ok(plan)
}

/// Plan and reconcile every node, stopping at the first failure
pub fn synchronize(opts: SynchronizeOpts<'_>) -> Result<SyncReport> {
    let SynchronizeOpts {
        plan: plan_opts,
        reconciler,
        refresh_policy,
        jobs,
    } = opts;

    let Plan {
        desired,
        mut current,
        mut transition,
    } = plan(&plan_opts)?;

    reconciler.set_common_metadata(Arc::clone(&plan_opts.metadata));
    reconciler.set_state_handlers(Arc::clone(&plan_opts.state_handlers));

    let walker = Walker {
        reconciler,
        metadata: &plan_opts.metadata,
        policy: refresh_policy,
        jobs,
        halted: AtomicBool::new(false),
        requeue: AtomicBool::new(false),
        actions: Mutex::new(Vec::new()),
    };

    if jobs > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .map_err(|e| Error::Other(format!("building reconcile thread pool: {e}")))?;
        pool.install(|| walker.visit(&mut transition, &desired, &mut current))?;
    } else {
        walker.visit(&mut transition, &desired, &mut current)?;
    }

    let report = SyncReport {
        requeue: walker.requeue.load(Ordering::SeqCst),
        actions: walker
            .actions
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner),
    };
    log::info!(
        "Synchronized {}: {} created, {} deleted",
        plan_opts.metadata.cluster_id,
        report.created(),
        report.deleted()
    );
    Ok(report)
}

/// Keys of the database instances in `tree`, in tree order
fn instance_names(tree: &ResourceNode) -> Vec<String> {
    tree.find(ResourceKind::Postgres)
        .map(|group| {
            group
                .children
                .iter()
                .filter_map(|child| child.node_type.key().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

struct Walker<'a> {
    reconciler: &'a CompositeReconciler,
    metadata: &'a CommonMetadata,
    policy: RefreshErrorPolicy,
    jobs: usize,
    /// Set on the first failure; nothing starts afterwards
    halted: AtomicBool,
    requeue: AtomicBool,
    actions: Mutex<Vec<SyncAction>>,
}

impl Walker<'_> {
    /// Reconcile `planned` and its subtree, `desired` and `current` in lockstep
    fn visit(
        &self,
        planned: &mut ResourceNode,
        desired: &ResourceNode,
        current: &mut ResourceNode,
    ) -> Result<()> {
        if planned.state.is_absent() {
            self.visit_children(planned, desired, current)?;
            self.reconcile(planned, desired, current)
        } else {
            self.reconcile(planned, desired, current)?;
            self.visit_children(planned, desired, current)
        }
    }

    fn visit_children(
        &self,
        planned: &mut ResourceNode,
        desired: &ResourceNode,
        current: &mut ResourceNode,
    ) -> Result<()> {
        if self.jobs <= 1 || planned.children.len() < 2 {
            let children = planned
                .children
                .iter_mut()
                .zip(&desired.children)
                .zip(current.children.iter_mut());
            for ((planned, desired), current) in children {
                self.visit(planned, desired, current)?;
            }
            return Ok(());
        }

        let failures: Mutex<Vec<(usize, Error)>> = Mutex::new(Vec::new());
        planned
            .children
            .par_iter_mut()
            .zip(desired.children.par_iter())
            .zip(current.children.par_iter_mut())
            .enumerate()
            .for_each(|(index, ((planned, desired), current))| {
                if self.halted.load(Ordering::SeqCst) {
                    return;
                }
                if let Err(err) = self.visit(planned, desired, current) {
                    self.halted.store(true, Ordering::SeqCst);
                    match failures.lock() {
                        Ok(mut failures) => failures.push((index, err)),
                        Err(poisoned) => poisoned.into_inner().push((index, err)),
                    }
                }
            });

        match first_failure(failures.into_inner().unwrap_or_else(PoisonError::into_inner)) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn reconcile(
        &self,
        planned: &mut ResourceNode,
        desired: &ResourceNode,
        current: &mut ResourceNode,
    ) -> Result<()> {
        // Another branch failed; leave the rest untouched
        if self.halted.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.metadata.context.check()?;

        match current.refresh_state() {
            Ok(true) => {
                let state = transition(desired.state, current.state);
                if state != planned.state {
                    log::debug!(
                        "Refreshed {}: planned {}, now {}",
                        planned.node_type,
                        planned.state,
                        state
                    );
                }
                planned.state = state;
            }
            Ok(false) => {}
            Err(err) => match self.policy {
                RefreshErrorPolicy::Propagate => return Err(err.into()),
                RefreshErrorPolicy::Warn => {
                    log::warn!("{err}, reconciling {} as planned", planned.node_type);
                }
            },
        }

        let result = self
            .reconciler
            .reconcile(planned)
            .map_err(|source| Error::Reconcile {
                node: planned.node_type.clone(),
                source: Box::new(source),
            })?;

        if result.requeue {
            log::debug!("{} asked for another run", planned.node_type);
            self.requeue.store(true, Ordering::SeqCst);
        }

        if !planned.state.is_noop() {
            let action = SyncAction {
                node: planned.node_type.clone(),
                state: planned.state,
            };
            match self.actions.lock() {
                Ok(mut actions) => actions.push(action),
                Err(poisoned) => poisoned.into_inner().push(action),
            }
        }
        Ok(())
    }
}

/// The failure of the lowest-positioned sibling
fn first_failure(mut failures: Vec<(usize, Error)>) -> Option<Error> {
    failures.sort_by_key(|(index, _)| *index);
    failures.into_iter().next().map(|(_, err)| err)
}
