//! `keel diff`: plan without calling any service

use super::{Environment, Target};
use crate::Context;
use crate::cli::DiffArgs;
use anyhow::{Context as _, Result};
use colored::Colorize;
use controller::{Plan, SyncAction};
use resourcetree::{ResourceNode, ResourceNodeState};

pub fn run(ctx: &Context, target: Target, args: DiffArgs) -> Result<()> {
    let settings = super::settings(ctx)?;
    let env = Environment::load(target, &args.file, settings, controller::Context::new())?;
    let plan = controller::plan(&env.plan_opts())
        .with_context(|| format!("Could not plan {}", env.title()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&changes(&plan.transition))?);
    } else {
        display_plan(&env.title(), &plan);
    }
    Ok(())
}

/// Creates and deletes of a transition tree, parents before children
pub fn changes(transition: &ResourceNode) -> Vec<SyncAction> {
    transition
        .preorder()
        .filter(|node| !node.state.is_noop())
        .map(|node| SyncAction {
            node: node.node_type.clone(),
            state: node.state,
        })
        .collect()
}

/// Display a transition tree, keeping unchanged ancestors for context
pub fn display_plan(title: &str, plan: &Plan) {
    let summary = plan.summary();
    if !summary.has_changes() {
        println!();
        println!("  {} {} is up to date", "✓".green(), title);
        return;
    }

    println!();
    println!("┌─ {} ─────────────────────────────────────────┐", title.bold());
    println!("│");
    print_node(&plan.transition, 0);
    println!("│");
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} to create, {} to delete, {} unchanged",
        summary.create.to_string().green(),
        summary.delete.to_string().red(),
        summary.unchanged.to_string().dimmed()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

fn print_node(node: &ResourceNode, depth: usize) {
    if !subtree_changes(node) {
        return;
    }

    let symbol = match node.state {
        ResourceNodeState::Present => "+".green(),
        ResourceNodeState::Absent => "-".red(),
        ResourceNodeState::Noop => "·".dimmed(),
    };
    let name = node.node_type.to_string();
    let name = if node.state.is_noop() {
        name.dimmed()
    } else {
        name.normal()
    };
    println!("│ {}{} {}", "  ".repeat(depth + 1), symbol, name);

    for child in &node.children {
        print_node(child, depth + 1);
    }
}

/// Whether the node or anything below it changes
fn subtree_changes(node: &ResourceNode) -> bool {
    node.preorder().any(|n| !n.state.is_noop())
}

#[cfg(test)]
mod tests {
    use super::*;
    use resourcetree::{ResourceKind, ResourceNodeType};

    fn transition() -> ResourceNode {
        let mut root = ResourceNode::new(ResourceKind::ServiceQuota);
        root.state = ResourceNodeState::Noop;

        let vpc = root.add_child(ResourceKind::Vpc);
        vpc.state = ResourceNodeState::Noop;
        let cluster = vpc.add_child(ResourceKind::Cluster);
        cluster.state = ResourceNodeState::Present;

        let zone = root.add_child(ResourceKind::Zone);
        zone.state = ResourceNodeState::Noop;
        let postgres = zone.add_child(ResourceNodeType::instance(
            ResourceKind::PostgresInstance,
            "orders",
        ));
        postgres.state = ResourceNodeState::Absent;
        root
    }

    #[test]
    fn test_changes_skip_noop_nodes() {
        let changes = changes(&transition());
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].node, ResourceNodeType::of(ResourceKind::Cluster));
        assert_eq!(changes[0].state, ResourceNodeState::Present);
        assert_eq!(changes[1].node.key(), Some("orders"));
        assert_eq!(changes[1].state, ResourceNodeState::Absent);
    }

    #[test]
    fn test_subtree_changes() {
        let tree = transition();
        assert!(subtree_changes(&tree));
        assert!(subtree_changes(&tree.children[0]));

        let mut unchanged = ResourceNode::new(ResourceKind::Vpc);
        unchanged.state = ResourceNodeState::Noop;
        assert!(!subtree_changes(&unchanged));
    }

    #[test]
    fn test_changes_serialize_as_node_and_state() {
        let json = serde_json::to_value(changes(&transition())).unwrap();
        assert_eq!(json[0]["node"]["kind"], "cluster");
        assert_eq!(json[1]["node"]["key"], "orders");
        assert_eq!(json[1]["state"], "absent");
    }
}
