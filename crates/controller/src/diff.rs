//! Desired/current diff
//!
//! Resources are managed as opaque units, so the diff only compares presence.

use resourcetree::{ResourceNode, ResourceNodeState, TreeError};
use serde::Serialize;

/// State a node must move to, given what is wanted and what exists
pub fn transition(desired: ResourceNodeState, current: ResourceNodeState) -> ResourceNodeState {
    if desired == current {
        ResourceNodeState::Noop
    } else {
        desired
    }
}

/// Collapse `desired` to `Noop` when it matches `current`
pub fn apply_current_state(desired: &mut ResourceNode, current: &ResourceNode) {
    desired.state = transition(desired.state, current.state);
}

/// Deep-copy the desired tree and diff it against the current tree
///
/// Neither input is modified.
pub fn create_transition_tree(
    desired: &ResourceNode,
    current: &ResourceNode,
) -> Result<ResourceNode, TreeError> {
    let mut transition = desired.clone();
    transition.apply_function(current, apply_current_state)?;
    Ok(transition)
}

/// Counts of planned actions in a transition tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub create: usize,
    pub delete: usize,
    pub unchanged: usize,
}

impl DiffSummary {
    pub fn of(transition: &ResourceNode) -> Self {
        let mut summary = Self::default();
        for node in transition.preorder() {
            match node.state {
                ResourceNodeState::Present => summary.create += 1,
                ResourceNodeState::Absent => summary.delete += 1,
                ResourceNodeState::Noop => summary.unchanged += 1,
            }
        }
        summary
    }

    pub fn has_changes(&self) -> bool {
        self.create + self.delete > 0
    }
}
