//! Snapshot binding.
//!
//! Bundles are bound to conversation-tree nodes. The variables "as of" a
//! node are those of its nearest bound ancestor (the node itself included),
//! so switching branches is a lookup and never a mutation.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::bundle::Bundle;
use crate::error::StoreError;

/// Identity under which one bundle is tracked (a character or a session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(pub String);

/// A node of the branching conversation tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

macro_rules! string_id {
    ($name:ident) => {
        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(ScopeId);
string_id!(NodeId);

/// Read access to the conversation tree owned by the host.
pub trait ConversationTree: Send + Sync {
    /// Parent of `node`, `None` for a root. Unknown nodes are an error.
    fn parent(&self, scope: &ScopeId, node: &NodeId) -> Result<Option<NodeId>, StoreError>;

    /// The node the host currently displays for `scope`.
    fn active_node(&self, scope: &ScopeId) -> Result<Option<NodeId>, StoreError>;
}

/// Storage of bound snapshots.
pub trait SnapshotStore: Send + Sync {
    /// Bind `bundle` to `node`, replacing any earlier binding of that node.
    fn bind(&self, scope: &ScopeId, node: &NodeId, bundle: Arc<Bundle>) -> Result<(), StoreError>;
    fn unbind(&self, scope: &ScopeId, node: &NodeId) -> Result<Option<Arc<Bundle>>, StoreError>;
    fn bound(&self, scope: &ScopeId, node: &NodeId) -> Result<Option<Arc<Bundle>>, StoreError>;
    /// Drop every snapshot of `scope`, returning how many were removed.
    fn remove_scope(&self, scope: &ScopeId) -> Result<usize, StoreError>;
}

/// Find the bundle bound to `node` or its nearest bound ancestor.
///
/// Returns `None` when no node on the way to the root is bound. The walk is
/// bounded by `max_walk` parent hops so a cyclic tree cannot hang the caller.
pub fn resolve_nearest<T, S>(
    tree: &T,
    store: &S,
    scope: &ScopeId,
    node: &NodeId,
    max_walk: usize,
) -> Result<Option<Arc<Bundle>>, StoreError>
where
    T: ConversationTree + ?Sized,
    S: SnapshotStore + ?Sized,
{
    let mut current = node.clone();
    for _ in 0..=max_walk {
        if let Some(bundle) = store.bound(scope, &current)? {
            return Ok(Some(bundle));
        }
        match tree.parent(scope, &current)? {
            Some(parent) => current = parent,
            None => return Ok(None),
        }
    }
    Err(StoreError::AncestorLimit(node.to_string(), max_walk))
}

/// In-memory [`SnapshotStore`].
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: DashMap<(ScopeId, NodeId), Arc<Bundle>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn bind(&self, scope: &ScopeId, node: &NodeId, bundle: Arc<Bundle>) -> Result<(), StoreError> {
        self.snapshots.insert((scope.clone(), node.clone()), bundle);
        Ok(())
    }

    fn unbind(&self, scope: &ScopeId, node: &NodeId) -> Result<Option<Arc<Bundle>>, StoreError> {
        Ok(self
            .snapshots
            .remove(&(scope.clone(), node.clone()))
            .map(|(_, bundle)| bundle))
    }

    fn bound(&self, scope: &ScopeId, node: &NodeId) -> Result<Option<Arc<Bundle>>, StoreError> {
        Ok(self
            .snapshots
            .get(&(scope.clone(), node.clone()))
            .map(|entry| Arc::clone(entry.value())))
    }

    fn remove_scope(&self, scope: &ScopeId) -> Result<usize, StoreError> {
        let before = self.snapshots.len();
        self.snapshots.retain(|(owner, _), _| owner != scope);
        Ok(before.saturating_sub(self.snapshots.len()))
    }
}

/// In-memory [`ConversationTree`] for hosts without their own store.
#[derive(Debug, Default)]
pub struct MemoryTree {
    parents: DashMap<(ScopeId, NodeId), Option<NodeId>>,
    active: DashMap<ScopeId, NodeId>,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `node` under `parent` (`None` for a root) and make it active.
    pub fn push(&self, scope: &ScopeId, node: &NodeId, parent: Option<&NodeId>) {
        self.parents
            .insert((scope.clone(), node.clone()), parent.cloned());
        self.active.insert(scope.clone(), node.clone());
    }

    pub fn set_active(&self, scope: &ScopeId, node: &NodeId) -> Result<(), StoreError> {
        if !self.parents.contains_key(&(scope.clone(), node.clone())) {
            return Err(StoreError::NodeNotFound(node.to_string()));
        }
        self.active.insert(scope.clone(), node.clone());
        Ok(())
    }
}

impl ConversationTree for MemoryTree {
    fn parent(&self, scope: &ScopeId, node: &NodeId) -> Result<Option<NodeId>, StoreError> {
        self.parents
            .get(&(scope.clone(), node.clone()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NodeNotFound(node.to_string()))
    }

    fn active_node(&self, scope: &ScopeId) -> Result<Option<NodeId>, StoreError> {
        Ok(self.active.get(scope).map(|entry| entry.value().clone()))
    }
}
