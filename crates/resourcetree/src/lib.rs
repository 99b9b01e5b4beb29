//! Resource dependency trees
//!
//! A tree describes the resources of one environment and the order they
//! depend on each other: a parent must exist before its children are created,
//! and children are removed before their parent. Three trees of the same
//! shape drive a reconciliation: the desired state, the current state, and
//! the transition between them.

pub mod error;
pub mod node;
pub mod types;

pub use error::{RefreshError, Result, TreeError};
pub use node::{Metadata, Preorder, ResourceNode, StateRefresher, state_refresher};
pub use types::{ResourceKind, ResourceNodeState, ResourceNodeType};
