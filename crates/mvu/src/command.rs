//! Verb normalization and the command model.

use std::borrow::Cow;
use std::fmt;

use mvu_path::{CanonicalPath, PathError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::error::ErrorKind;
use crate::extract::{Diagnostic, Statement};
use crate::schema::SchemaViolation;
use crate::value::{parse_literal, parse_literal_with, Literal, LiteralOptions, ValueSyntaxError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Set,
    Add,
    Delete,
    Insert,
}

impl CommandKind {
    /// Map a statement verb to its operation kind.
    pub fn from_verb(verb: &str) -> Option<Self> {
        match verb {
            "set" => Some(CommandKind::Set),
            "add" => Some(CommandKind::Add),
            "delete" | "remove" | "unset" => Some(CommandKind::Delete),
            "insert" | "assign" => Some(CommandKind::Insert),
            _ => None,
        }
    }

    /// Accepted argument counts, path included.
    pub fn arity(&self) -> (usize, Option<usize>) {
        match self {
            CommandKind::Set => (2, None),
            CommandKind::Add => (1, Some(2)),
            CommandKind::Delete => (1, Some(2)),
            CommandKind::Insert => (2, Some(3)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Set => "set",
            CommandKind::Add => "add",
            CommandKind::Delete => "delete",
            CommandKind::Insert => "insert",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command argument, either raw source text or an already typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Source(String),
    Value(Literal),
}

impl Argument {
    pub fn source(&self) -> Cow<'_, str> {
        match self {
            Argument::Source(src) => Cow::Borrowed(src),
            Argument::Value(literal) => Cow::Owned(literal.to_source()),
        }
    }

    pub fn resolve(&self, options: &LiteralOptions) -> Result<Literal, ValueSyntaxError> {
        match self {
            Argument::Source(src) => parse_literal_with(src, options),
            Argument::Value(literal) => Ok(literal.clone()),
        }
    }
}

impl Serialize for Argument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source())
    }
}

impl<'de> Deserialize<'de> for Argument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Argument::Source)
    }
}

/// One normalized mutation.
///
/// `path` is the unquoted path text; it is canonicalized when the command
/// runs so a malformed path fails that command only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub kind: CommandKind,
    pub path: String,
    /// Arguments after the path.
    pub args: Vec<Argument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Command {
    pub fn new(kind: CommandKind, path: impl Into<String>, args: Vec<Argument>) -> Self {
        Self {
            kind,
            path: path.into(),
            args,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn canonical_path(&self) -> Result<CanonicalPath, PathError> {
        CanonicalPath::parse(&self.path)
    }
}

/// Why a single command was not applied.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Value(#[from] ValueSyntaxError),
    #[error(transparent)]
    Schema(#[from] SchemaViolation),
}

impl CommandError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommandError::Path(_) => ErrorKind::PathError,
            CommandError::Value(_) => ErrorKind::ValueSyntaxError,
            CommandError::Schema(_) => ErrorKind::SchemaViolation,
        }
    }
}

/// Path text of the first statement argument.
///
/// A quoted path (`'a.b'`) is unquoted; anything else is used verbatim.
fn path_text(arg: &str) -> String {
    match parse_literal(arg) {
        Ok(Literal::Value(serde_json::Value::String(s))) => s,
        _ => arg.trim().to_string(),
    }
}

/// Turn a raw statement into a command.
pub fn normalize(statement: &Statement) -> Result<Command, Diagnostic> {
    let kind = CommandKind::from_verb(&statement.verb).ok_or_else(|| {
        Diagnostic::parse_error(
            statement.span.start..statement.span.end,
            format!("unknown verb {:?}", statement.verb),
        )
    })?;

    let count = statement.args.len();
    let (min, max) = kind.arity();
    if count < min || max.is_some_and(|max| count > max) {
        let expected = match max {
            Some(max) if max == min => format!("{min}"),
            Some(max) => format!("{min} to {max}"),
            None => format!("at least {min}"),
        };
        return Err(Diagnostic::parse_error(
            statement.span.start..statement.span.end,
            format!("{kind} takes {expected} arguments, got {count}"),
        ));
    }

    let mut args = statement.args.iter();
    let path = args.next().map(|raw| path_text(raw)).unwrap_or_default();
    Ok(Command {
        kind,
        path,
        args: args.map(|raw| Argument::Source(raw.clone())).collect(),
        reason: statement.reason.clone(),
    })
}

/// Normalize every statement, collecting diagnostics for dropped ones.
pub fn normalize_all(statements: &[Statement]) -> (Vec<Command>, Vec<Diagnostic>) {
    let mut commands = Vec::with_capacity(statements.len());
    let mut diagnostics = Vec::new();
    for statement in statements {
        match normalize(statement) {
            Ok(command) => commands.push(command),
            Err(diagnostic) => {
                tracing::warn!(verb = %statement.verb, message = %diagnostic.message, "dropping statement");
                diagnostics.push(diagnostic);
            }
        }
    }
    (commands, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Span;
    use serde_json::json;

    fn statement(verb: &str, args: &[&str]) -> Statement {
        Statement {
            verb: verb.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            reason: Some("因为".to_string()),
            span: Span { start: 0, end: 10 },
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!(CommandKind::from_verb("remove"), Some(CommandKind::Delete));
        assert_eq!(CommandKind::from_verb("unset"), Some(CommandKind::Delete));
        assert_eq!(CommandKind::from_verb("delete"), Some(CommandKind::Delete));
        assert_eq!(CommandKind::from_verb("assign"), Some(CommandKind::Insert));
        assert_eq!(CommandKind::from_verb("insert"), Some(CommandKind::Insert));
        assert_eq!(CommandKind::from_verb("add"), Some(CommandKind::Add));
        assert_eq!(CommandKind::from_verb("set"), Some(CommandKind::Set));
        assert_eq!(CommandKind::from_verb("push"), None);
    }

    #[test]
    fn test_normalize_set() {
        let command = normalize(&statement("set", &["'好感度'", "50", "60"])).unwrap();
        assert_eq!(command.kind, CommandKind::Set);
        assert_eq!(command.path, "好感度");
        assert_eq!(
            command.args,
            vec![Argument::Source("50".into()), Argument::Source("60".into())]
        );
        assert_eq!(command.reason.as_deref(), Some("因为"));
    }

    #[test]
    fn test_unquoted_path_is_kept() {
        let command = normalize(&statement("unset", &["a.b[0]"])).unwrap();
        assert_eq!(command.path, "a.b[0]");
    }

    #[test]
    fn test_unknown_verb() {
        let err = normalize(&statement("push", &["'a'", "1"])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ParseError);
        assert_eq!(err.message, "unknown verb \"push\"");
    }

    #[test]
    fn test_arity() {
        assert!(normalize(&statement("set", &["'a'"])).is_err());
        assert!(normalize(&statement("add", &["'a'"])).is_ok());
        assert!(normalize(&statement("add", &["'a'", "1", "2"])).is_err());
        assert!(normalize(&statement("assign", &["'a'", "'k'", "'v'"])).is_ok());
        assert!(normalize(&statement("insert", &["'a'"])).is_err());
        let err = normalize(&statement("delete", &[])).unwrap_err();
        assert_eq!(err.message, "delete takes 1 to 2 arguments, got 0");
    }

    #[test]
    fn test_normalize_all_keeps_order() {
        let (commands, diagnostics) = normalize_all(&[
            statement("set", &["'a'", "1"]),
            statement("bogus", &["'b'"]),
            statement("remove", &["'c'"]),
        ]);
        let kinds: Vec<_> = commands.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![CommandKind::Set, CommandKind::Delete]);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_argument_serde_as_source() {
        let command = Command::new(
            CommandKind::Set,
            "a",
            vec![Argument::Value(Literal::Value(json!({"k": 1})))],
        );
        let encoded = serde_json::to_value(&command).unwrap();
        assert_eq!(encoded, json!({"kind": "set", "path": "a", "args": ["{\"k\":1}"]}));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(CommandError::from(ValueSyntaxError::Empty).kind(), ErrorKind::ValueSyntaxError);
        assert_eq!(CommandError::from(PathError::PathTooDeep).kind(), ErrorKind::PathError);
        assert_eq!(
            CommandError::from(SchemaViolation::Root).kind(),
            ErrorKind::SchemaViolation
        );
    }
}
