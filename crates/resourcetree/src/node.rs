//! The resource node and its tree operations

use crate::error::{RefreshError, Result, TreeError};
use crate::types::{ResourceKind, ResourceNodeState, ResourceNodeType};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Computes the authoritative state of a node right before it is reconciled
///
/// Refreshers are shared by reference between every node of their kind and
/// between clones of a tree.
pub type StateRefresher =
    Arc<dyn Fn(&ResourceNode) -> std::result::Result<ResourceNodeState, RefreshError> + Send + Sync>;

/// Wrap a closure as a [`StateRefresher`]
pub fn state_refresher<F>(refresher: F) -> StateRefresher
where
    F: Fn(&ResourceNode) -> std::result::Result<ResourceNodeState, RefreshError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(refresher)
}

/// Opaque, type-specific data carried by a node
pub type Metadata = Arc<dyn Any + Send + Sync>;

/// One element of a resource dependency tree
///
/// A node exclusively owns its children. Cloning a node clones the whole
/// subtree; refreshers and metadata are shared.
#[derive(Clone)]
pub struct ResourceNode {
    pub node_type: ResourceNodeType,
    pub state: ResourceNodeState,
    pub children: Vec<ResourceNode>,
    refresher: Option<StateRefresher>,
    metadata: Option<Metadata>,
}

impl ResourceNode {
    /// Create a root node in the `Present` state
    pub fn new(node_type: impl Into<ResourceNodeType>) -> Self {
        Self {
            node_type: node_type.into(),
            state: ResourceNodeState::Present,
            children: Vec::new(),
            refresher: None,
            metadata: None,
        }
    }

    /// Kind of this node
    pub fn kind(&self) -> ResourceKind {
        self.node_type.kind
    }

    /// Append a new `Present` child and return it
    pub fn add_child(&mut self, node_type: impl Into<ResourceNodeType>) -> &mut ResourceNode {
        let index = self.children.len();
        self.children.push(ResourceNode::new(node_type));
        &mut self.children[index]
    }

    /// Attach typed metadata to this node
    pub fn set_metadata<T: Any + Send + Sync>(&mut self, value: T) {
        self.metadata = Some(Arc::new(value));
    }

    /// Typed metadata, if present and of type `T`
    pub fn metadata<T: Any>(&self) -> Option<&T> {
        self.metadata.as_deref()?.downcast_ref::<T>()
    }

    /// Attach `refresher` to every node of `kind` in this tree
    ///
    /// Returns how many nodes received it; zero is not an error.
    pub fn set_state_refresher(&mut self, kind: ResourceKind, refresher: StateRefresher) -> usize {
        let mut attached = 0;
        self.for_each_mut(&mut |node| {
            if node.kind() == kind {
                node.refresher = Some(Arc::clone(&refresher));
                attached += 1;
            }
        });
        attached
    }

    /// Whether a refresher is attached to this node
    pub fn has_refresher(&self) -> bool {
        self.refresher.is_some()
    }

    /// Run the attached refresher and overwrite `state` with its answer
    ///
    /// Returns `Ok(false)` when no refresher is attached. On failure the
    /// previous state is kept and the error is returned to the caller.
    pub fn refresh_state(&mut self) -> Result<bool> {
        let Some(refresher) = self.refresher.clone() else {
            return Ok(false);
        };

        let state = refresher(self).map_err(|source| TreeError::Refresh {
            node: self.node_type.clone(),
            source,
        })?;

        if state.is_noop() {
            return Err(TreeError::InvalidRefresh {
                node: self.node_type.clone(),
            });
        }

        if state != self.state {
            log::debug!("Refreshed {}: {} -> {}", self.node_type, self.state, state);
        }
        self.state = state;
        Ok(true)
    }

    /// Check that `other` has the same layout: same node types, same child
    /// counts, compared by position
    pub fn same_shape(&self, other: &ResourceNode) -> Result<()> {
        self.same_shape_at(other, &mut Vec::new())
    }

    fn same_shape_at(&self, other: &ResourceNode, path: &mut Vec<String>) -> Result<()> {
        path.push(self.node_type.to_string());

        if self.node_type != other.node_type {
            return Err(TreeError::ShapeMismatch {
                path: path.join("/"),
                reason: format!("expected {}, found {}", self.node_type, other.node_type),
            });
        }

        if self.children.len() != other.children.len() {
            return Err(TreeError::ShapeMismatch {
                path: path.join("/"),
                reason: format!(
                    "expected {} children, found {}",
                    self.children.len(),
                    other.children.len()
                ),
            });
        }

        for (mine, theirs) in self.children.iter().zip(&other.children) {
            mine.same_shape_at(theirs, path)?;
        }

        path.pop();
        Ok(())
    }

    /// Walk this tree and `other` in lockstep, preorder, calling `f` on each
    /// pair of nodes at the same position
    ///
    /// The shapes are verified before `f` runs, so a mismatch leaves both
    /// trees untouched. `f` must not add or remove children.
    pub fn apply_function<F>(&mut self, other: &ResourceNode, mut f: F) -> Result<()>
    where
        F: FnMut(&mut ResourceNode, &ResourceNode),
    {
        self.same_shape(other)?;
        self.apply_unchecked(other, &mut f);
        Ok(())
    }

    fn apply_unchecked<F>(&mut self, other: &ResourceNode, f: &mut F)
    where
        F: FnMut(&mut ResourceNode, &ResourceNode),
    {
        f(self, other);
        for (mine, theirs) in self.children.iter_mut().zip(&other.children) {
            mine.apply_unchecked(theirs, f);
        }
    }

    /// Visit every node mutably, parents before children
    pub fn for_each_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut ResourceNode),
    {
        f(self);
        for child in &mut self.children {
            child.for_each_mut(f);
        }
    }

    /// Iterate the tree in preorder
    pub fn preorder(&self) -> Preorder<'_> {
        Preorder { stack: vec![self] }
    }

    /// Number of nodes in this tree, the root included
    pub fn node_count(&self) -> usize {
        self.preorder().count()
    }

    /// First node of `kind` in preorder
    pub fn find(&self, kind: ResourceKind) -> Option<&ResourceNode> {
        self.preorder().find(|node| node.kind() == kind)
    }

    /// First node of `kind` in preorder, mutably
    pub fn find_mut(&mut self, kind: ResourceKind) -> Option<&mut ResourceNode> {
        if self.kind() == kind {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(kind))
    }

    /// Node with exactly this type, searched in preorder
    pub fn find_type(&self, node_type: &ResourceNodeType) -> Option<&ResourceNode> {
        self.preorder().find(|node| &node.node_type == node_type)
    }
}

impl fmt::Debug for ResourceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceNode")
            .field("node_type", &self.node_type)
            .field("state", &self.state)
            .field("children", &self.children)
            .field("refresher", &self.refresher.is_some())
            .field("metadata", &self.metadata.is_some())
            .finish()
    }
}

impl Serialize for ResourceNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut node = serializer.serialize_struct("ResourceNode", 3)?;
        node.serialize_field("type", &self.node_type)?;
        node.serialize_field("state", &self.state)?;
        node.serialize_field("children", &self.children)?;
        node.end()
    }
}

/// Preorder iterator over a tree
pub struct Preorder<'a> {
    stack: Vec<&'a ResourceNode>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a ResourceNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
