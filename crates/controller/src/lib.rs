//! # Controller
//!
//! Reconciliation engine for declared cluster environments.
//!
//! A run builds the resource dependency tree twice, once annotated with what
//! the declaration wants and once with what recorded state says exists,
//! diffs the two into a transition tree and walks it, handing every node to
//! the reconciler registered for its kind.
//!
//! ```text
//! declaration ──► desired tree ─┐
//!                               ├─► transition tree ──► reconcilers ──► services
//! state handlers ► current tree ┘
//! ```
//!
//! The engine never talks to a cloud provider itself: every side effect goes
//! through the service traits in [`client`].

pub mod client;
pub mod context;
pub mod current;
pub mod desired;
pub mod diff;
pub mod error;
pub mod graph;
pub mod metadata;
pub mod progress;
pub mod reconciler;
pub mod refresher;
pub mod synchronize;

#[cfg(test)]
mod testing;

pub use context::Context;
pub use diff::DiffSummary;
pub use error::{CancelReason, Error, ErrorCategory, OperationContext, Result};
pub use metadata::{ClusterId, CommonMetadata, Declaration};
pub use progress::{NoProgress, ProgressReporter};
pub use reconciler::{CompositeReconciler, ReconcileResult, Reconciler};
pub use synchronize::{
    Plan, PlanOpts, RefreshErrorPolicy, SyncAction, SyncReport, SynchronizeOpts, plan,
    synchronize,
};
