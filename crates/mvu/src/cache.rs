use std::sync::Arc;

use dashmap::DashMap;

use crate::bundle::Bundle;
use crate::snapshot::{NodeId, ScopeId};

/// The bundle currently visible for a scope and the node it was resolved at.
#[derive(Debug, Clone)]
pub struct CachedView {
    pub node: Option<NodeId>,
    pub bundle: Arc<Bundle>,
}

/// Per-scope view of the active node's variables.
///
/// Readers clone an `Arc` out of the map. Views are only put while the
/// scope's writer lock is held.
#[derive(Debug, Default)]
pub struct ScopedCache {
    views: DashMap<ScopeId, CachedView>,
}

impl ScopedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, scope: &ScopeId) -> Option<CachedView> {
        self.views.get(scope).map(|entry| entry.value().clone())
    }

    pub fn put(&self, scope: &ScopeId, view: CachedView) {
        self.views.insert(scope.clone(), view);
    }

    pub fn invalidate(&self, scope: &ScopeId) {
        self.views.remove(scope);
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}
