//! One-shot application of a response to a stat-data document.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::error::MvuResult;
use crate::executor::{delta_data, CommandResult};
use crate::extract::Diagnostic;
use crate::snapshot::{MemoryTree, NodeId, ScopeId};

#[derive(Debug, Serialize)]
pub struct Report {
    pub stat_data: Value,
    pub delta: Map<String, Value>,
    pub results: Vec<CommandResult>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Apply the statements of `text` to the stat data in `document` (JSON,
/// `$meta` annotations allowed).
pub fn apply_response(document: &str, text: &str, config: EngineConfig) -> MvuResult<Report> {
    let stat_data: Value = serde_json::from_str(document)?;
    let engine = Engine::new(MemoryTree::new(), config)?;
    let scope = ScopeId::from("cli");
    let (root, reply) = (NodeId::from("initial"), NodeId::from("response"));

    engine.tree().push(&scope, &root, None);
    engine.initialize_scope(&scope, &root, stat_data)?;
    engine.tree().push(&scope, &reply, Some(&root));
    let outcome = engine.apply_response_variables(&scope, &reply, text)?;

    Ok(Report {
        stat_data: outcome.bundle.stat_data.clone(),
        delta: delta_data(&outcome.results),
        results: outcome.results,
        diagnostics: outcome.diagnostics,
    })
}

/// [`apply_response`] rendered as pretty JSON.
pub fn apply_response_json(document: &str, text: &str, config: EngineConfig) -> MvuResult<String> {
    let report = apply_response(document, text, config)?;
    Ok(serde_json::to_string_pretty(&report)?)
}
