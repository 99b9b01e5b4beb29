//! Progress notifications during a walk
//!
//! Reporters only observe; they cannot influence the outcome of a run.

use resourcetree::ResourceNode;

/// Receives start/stop notifications for each dispatched node
pub trait ProgressReporter: Send + Sync {
    fn start(&self, node: &ResourceNode);

    fn stop(&self, node: &ResourceNode, success: bool);
}

/// Reporter that ignores everything
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn start(&self, _node: &ResourceNode) {}
    fn stop(&self, _node: &ResourceNode, _success: bool) {}
}
