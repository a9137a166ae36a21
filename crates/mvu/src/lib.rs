//! Inline variable updates for LLM-driven conversations.
//!
//! Generated text carries statements such as
//! `_.set('角色.好感度', 10, 15);//reason` next to its prose. The engine pulls
//! them out of the text, parses their arguments as relaxed JSON literals,
//! checks each change against a schema inferred from the variables and binds
//! the resulting snapshot to the conversation-tree node that produced it.
//!
//! # Example
//!
//! ```
//! use mvu::{Engine, EngineConfig, MemoryTree, ScopeId, NodeId};
//! use serde_json::json;
//!
//! let engine = Engine::new(MemoryTree::new(), EngineConfig::default()).unwrap();
//! let scope = ScopeId::from("alice");
//! let (root, reply) = (NodeId::from("greeting"), NodeId::from("reply-1"));
//!
//! engine.tree().push(&scope, &root, None);
//! engine.initialize_scope(&scope, &root, json!({"hp": 10})).unwrap();
//!
//! engine.tree().push(&scope, &reply, Some(&root));
//! let outcome = engine
//!     .apply_response_variables(&scope, &reply, "Ouch. _.add('hp', -3);//hit")
//!     .unwrap();
//! assert_eq!(outcome.bundle.stat_data, json!({"hp": 7}));
//! ```

pub mod bundle;
pub mod cache;
pub mod cli;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod extract;
pub mod schema;
pub mod snapshot;
pub mod stat;
pub mod template;
pub mod value;

pub use bundle::Bundle;
pub use command::{normalize, normalize_all, Argument, Command, CommandError, CommandKind};
pub use config::EngineConfig;
pub use engine::{ApplyOutcome, Engine};
pub use error::{ErrorKind, MvuError, MvuResult, StoreError};
pub use executor::{apply, apply_one, delta_data, CommandResult, ExecuteOptions, Execution};
pub use extract::{Diagnostic, ExtractOptions, Extraction, Extractor, Span, Statement};
pub use schema::{infer_schema, infer_schema_with, SchemaNode};
pub use snapshot::{ConversationTree, MemorySnapshotStore, MemoryTree, NodeId, ScopeId, SnapshotStore};
pub use value::{parse_literal, parse_literal_with, Literal, LiteralOptions, ValueSyntaxError};
