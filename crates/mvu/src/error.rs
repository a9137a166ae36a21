//! Error kinds shared across the engine.
//!
//! Per-command failures are carried as data in
//! [`CommandResult`](crate::executor::CommandResult); only batch-boundary
//! failures surface as [`MvuError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of every failure the engine can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed statement syntax or unknown verb; the statement was skipped.
    ParseError,
    /// An argument matched no value grammar rule.
    ValueSyntaxError,
    /// A path could not be canonicalized.
    PathError,
    /// The current schema rejected the operation.
    SchemaViolation,
    /// A tree lookup or snapshot bind failed; the batch was not committed.
    PersistenceError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ParseError => "ParseError",
            ErrorKind::ValueSyntaxError => "ValueSyntaxError",
            ErrorKind::PathError => "PathError",
            ErrorKind::SchemaViolation => "SchemaViolation",
            ErrorKind::PersistenceError => "PersistenceError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of the conversation-tree store or the snapshot store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("node {0} not found")]
    NodeNotFound(String),
    #[error("ancestor walk from {0} exceeded {1} steps")]
    AncestorLimit(String, usize),
    #[error("scope {0} has no active node")]
    NoActiveNode(String),
    #[error("{0}")]
    Backend(String),
}

/// Batch-boundary failure.
#[derive(Debug, Error)]
pub enum MvuError {
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),
    #[error("config error: {0}")]
    Config(String),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl MvuError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            MvuError::Persistence(_) => Some(ErrorKind::PersistenceError),
            MvuError::Config(_) | MvuError::Json(_) => None,
        }
    }
}

pub type MvuResult<T> = Result<T, MvuError>;
