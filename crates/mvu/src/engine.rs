//! Engine entry points.
//!
//! The engine ties extraction, execution and snapshot binding together for
//! every scope. Writes to one scope are serialized; reads are served from
//! the scoped cache, and only a cache miss waits for a batch in flight.

use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use serde_json::Value;

use crate::bundle::Bundle;
use crate::cache::{CachedView, ScopedCache};
use crate::command::{normalize_all, Argument, Command, CommandKind};
use crate::config::EngineConfig;
use crate::error::{MvuResult, StoreError};
use crate::executor::{apply, apply_one, CommandResult, ExecuteOptions};
use crate::extract::{Diagnostic, Extractor};
use crate::snapshot::{resolve_nearest, ConversationTree, MemorySnapshotStore, NodeId, ScopeId, SnapshotStore};
use crate::value::Literal;

/// Result of processing one generated response.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    /// Variables as of the response node after this call.
    pub bundle: Arc<Bundle>,
    pub results: Vec<CommandResult>,
    /// Statements that were skipped, in source order.
    pub diagnostics: Vec<Diagnostic>,
    /// A new snapshot was bound to the node.
    pub committed: bool,
}

pub struct Engine<T, S = MemorySnapshotStore> {
    config: EngineConfig,
    extractor: Extractor,
    execute: ExecuteOptions,
    tree: T,
    store: S,
    cache: ScopedCache,
    writers: DashMap<ScopeId, Arc<Mutex<()>>>,
}

impl<T: ConversationTree> Engine<T> {
    pub fn new(tree: T, config: EngineConfig) -> MvuResult<Self> {
        Self::with_store(tree, MemorySnapshotStore::new(), config)
    }
}

impl<T: ConversationTree, S: SnapshotStore> Engine<T, S> {
    pub fn with_store(tree: T, store: S, config: EngineConfig) -> MvuResult<Self> {
        let extractor = Extractor::new((&config).into())?;
        let execute = ExecuteOptions::from(&config);
        Ok(Self {
            config,
            extractor,
            execute,
            tree,
            store,
            cache: ScopedCache::new(),
            writers: DashMap::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tree(&self) -> &T {
        &self.tree
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Process a finished response generated at `node`.
    ///
    /// The batch runs against the variables of the node's parent. A batch
    /// with at least one command binds its result to `node`, replacing what a
    /// previous generation of the same node bound; an empty batch unbinds it.
    #[tracing::instrument(level = "debug", skip_all, fields(scope = %scope, node = %node))]
    pub fn apply_response_variables(&self, scope: &ScopeId, node: &NodeId, text: &str) -> MvuResult<ApplyOutcome> {
        let writer = self.writer(scope);
        let _guard = writer.lock().unwrap_or_else(PoisonError::into_inner);

        let base = match self.tree.parent(scope, node)? {
            Some(parent) => self.resolve(scope, &parent)?,
            None => Arc::new(Bundle::default()),
        };

        let extraction = self.extractor.extract(text);
        let (commands, mut diagnostics) = normalize_all(&extraction.statements);
        diagnostics.extend(extraction.diagnostics);
        diagnostics.sort_by_key(|d| d.span.start);

        if commands.is_empty() {
            self.commit(scope, node, None)?;
            tracing::debug!(skipped = diagnostics.len(), "no commands, node unbound");
            return Ok(ApplyOutcome {
                bundle: base,
                results: Vec::new(),
                diagnostics,
                committed: false,
            });
        }

        let execution = apply(&base, &commands, &self.execute);
        let applied = execution.applied_count();
        let bundle = Arc::new(execution.bundle);
        self.commit(scope, node, Some(Arc::clone(&bundle)))?;
        tracing::info!(
            revision = bundle.revision,
            commands = commands.len(),
            applied,
            skipped = diagnostics.len(),
            "snapshot committed"
        );
        Ok(ApplyOutcome {
            bundle,
            results: execution.results,
            diagnostics,
            committed: true,
        })
    }

    /// Variables as of the scope's active node.
    pub fn get_variables(&self, scope: &ScopeId) -> MvuResult<Value> {
        Ok(self.snapshot(scope)?.stat_data.clone())
    }

    /// The bundle as of the scope's active node.
    pub fn snapshot(&self, scope: &ScopeId) -> MvuResult<Arc<Bundle>> {
        if let Some(view) = self.cache.get(scope) {
            return Ok(view.bundle);
        }
        // A miss fills the cache under the writer lock, so it cannot overwrite
        // a view put by a commit that finished after the resolve.
        let writer = self.writer(scope);
        let _guard = writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(view) = self.cache.get(scope) {
            return Ok(view.bundle);
        }
        self.refresh(scope)
    }

    pub fn get_variables_at_node(&self, scope: &ScopeId, node: &NodeId) -> MvuResult<Value> {
        Ok(self.resolve(scope, node)?.stat_data.clone())
    }

    /// Direct write at the active node, outside of any generated text.
    ///
    /// Commits only when the write was applied; a rejected write leaves the
    /// bound snapshots untouched. Response batches differ here: they commit a
    /// new snapshot even when every command in them failed.
    #[tracing::instrument(level = "debug", skip_all, fields(scope = %scope, path = %path))]
    pub fn set_variable(&self, scope: &ScopeId, path: &str, value: impl Into<Literal>) -> MvuResult<CommandResult> {
        let writer = self.writer(scope);
        let _guard = writer.lock().unwrap_or_else(PoisonError::into_inner);

        let node = self
            .tree
            .active_node(scope)?
            .ok_or_else(|| StoreError::NoActiveNode(scope.to_string()))?;
        let base = self.resolve(scope, &node)?;
        let command = Command::new(CommandKind::Set, path, vec![Argument::Value(value.into())]);
        let (bundle, result) = apply_one(&base, &command, &self.execute);
        if result.applied {
            self.commit(scope, &node, Some(Arc::new(bundle)))?;
        }
        Ok(result)
    }

    /// Bind initial variables to the scope's opening node.
    ///
    /// `$meta` annotations in `stat_data` are read into the schema and then
    /// removed from the data.
    #[tracing::instrument(level = "debug", skip_all, fields(scope = %scope, node = %node))]
    pub fn initialize_scope(&self, scope: &ScopeId, node: &NodeId, stat_data: Value) -> MvuResult<Arc<Bundle>> {
        let writer = self.writer(scope);
        let _guard = writer.lock().unwrap_or_else(PoisonError::into_inner);

        let bundle = Arc::new(Bundle::from_stat_data(stat_data, self.config.default_extensible));
        self.commit(scope, node, Some(Arc::clone(&bundle)))?;
        tracing::info!("scope initialized");
        Ok(bundle)
    }

    /// Drop every snapshot of a scope. Returns how many were removed.
    ///
    /// The scope's writer lock is kept: callers already queued on it must
    /// still exclude the ones that arrive after the delete.
    pub fn delete_scope(&self, scope: &ScopeId) -> MvuResult<usize> {
        let writer = self.writer(scope);
        let _guard = writer.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = self.store.remove_scope(scope)?;
        self.cache.invalidate(scope);
        tracing::info!(scope = %scope, removed, "scope deleted");
        Ok(removed)
    }

    /// Re-resolve the cached view after the host switched the active node.
    pub fn activate(&self, scope: &ScopeId) -> MvuResult<Arc<Bundle>> {
        let writer = self.writer(scope);
        let _guard = writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.refresh(scope)
    }

    fn writer(&self, scope: &ScopeId) -> Arc<Mutex<()>> {
        Arc::clone(self.writers.entry(scope.clone()).or_default().value())
    }

    fn resolve(&self, scope: &ScopeId, node: &NodeId) -> MvuResult<Arc<Bundle>> {
        let found = resolve_nearest(&self.tree, &self.store, scope, node, self.config.max_ancestor_walk)?;
        Ok(found.unwrap_or_default())
    }

    fn refresh(&self, scope: &ScopeId) -> MvuResult<Arc<Bundle>> {
        let node = self.tree.active_node(scope)?;
        let bundle = match &node {
            Some(node) => self.resolve(scope, node)?,
            None => Arc::new(Bundle::default()),
        };
        self.cache.put(
            scope,
            CachedView {
                node,
                bundle: Arc::clone(&bundle),
            },
        );
        Ok(bundle)
    }

    /// Bind (or unbind) `node` and refresh the cache. When the refresh fails
    /// the previous binding is restored.
    fn commit(&self, scope: &ScopeId, node: &NodeId, bundle: Option<Arc<Bundle>>) -> MvuResult<()> {
        let previous = self.store.bound(scope, node)?;
        match bundle {
            Some(bundle) => self.store.bind(scope, node, bundle)?,
            None => {
                self.store.unbind(scope, node)?;
            }
        }

        if let Err(err) = self.refresh(scope) {
            let restored = match previous {
                Some(previous) => self.store.bind(scope, node, previous),
                None => self.store.unbind(scope, node).map(|_| ()),
            };
            if let Err(restore_err) = restored {
                tracing::error!(error = %restore_err, "failed to restore previous binding");
            }
            self.cache.invalidate(scope);
            tracing::warn!(error = %err, "commit discarded");
            return Err(err);
        }
        Ok(())
    }
}
