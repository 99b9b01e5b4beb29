//! Spinners for reconciled nodes.

use colored::Colorize;
use controller::ProgressReporter;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use resourcetree::{ResourceNode, ResourceNodeState};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// One spinner per node being reconciled
///
/// Unchanged nodes are not shown. Several spinners are visible at once when
/// siblings run in parallel.
#[derive(Default)]
pub struct SpinnerReporter {
    bars: MultiProgress,
    active: Mutex<HashMap<String, ProgressBar>>,
}

impl SpinnerReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressReporter for SpinnerReporter {
    fn start(&self, node: &ResourceNode) {
        let Some(verb) = verb(node.state) else {
            return;
        };

        let pb = self.bars.add(ProgressBar::new_spinner());
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("{verb} {}", node.node_type));
        pb.enable_steady_tick(Duration::from_millis(100));

        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(node.node_type.to_string(), pb);
    }

    fn stop(&self, node: &ResourceNode, success: bool) {
        let Some(pb) = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&node.node_type.to_string())
        else {
            return;
        };

        let line = match (success, node.state) {
            (true, ResourceNodeState::Absent) => format!("{} {}", "-".red(), node.node_type),
            (true, _) => format!("{} {}", "✓".green(), node.node_type),
            (false, _) => format!("{} {}", "✗".red(), node.node_type),
        };
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.finish_with_message(line);
    }
}

fn verb(state: ResourceNodeState) -> Option<&'static str> {
    match state {
        ResourceNodeState::Present => Some("Creating"),
        ResourceNodeState::Absent => Some("Deleting"),
        ResourceNodeState::Noop => None,
    }
}
