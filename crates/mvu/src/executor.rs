//! Command executor.
//!
//! Applies an ordered command list to a working copy of a bundle. Every
//! command is checked against the schema before it touches the data; a
//! failing command leaves the working copy as it was and the batch goes on
//! with the next one.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeDelta, Utc};
use mvu_path::{exists, get, get_mut, CanonicalPath, PathStep};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::bundle::Bundle;
use crate::command::{Argument, Command, CommandError, CommandKind};
use crate::config::EngineConfig;
use crate::error::ErrorKind;
use crate::schema::{
    reconcile_schema, strip_meta, validate_delete, validate_insert, validate_set, SchemaNode, SchemaViolation,
};
use crate::stat::{coerce_number, described_value_mut, is_value_with_description, round_significant};
use crate::template::{apply_template, complete_element};
use crate::value::{number_value, Literal, LiteralOptions};

#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    pub literal: LiteralOptions,
    pub default_extensible: bool,
    pub number_precision: usize,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            literal: LiteralOptions::default(),
            default_extensible: true,
            number_precision: 12,
        }
    }
}

impl From<&EngineConfig> for ExecuteOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            literal: LiteralOptions {
                max_depth: config.max_literal_depth,
                bare_string_fallback: config.bare_string_fallback,
            },
            default_extensible: config.default_extensible,
            number_precision: config.number_precision,
        }
    }
}

/// Outcome of one command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub command: Command,
    /// Canonical path the change landed on, when the path could be parsed.
    pub path: Option<CanonicalPath>,
    pub applied: bool,
    pub error_kind: Option<ErrorKind>,
    pub error: Option<String>,
    pub previous_value: Option<Value>,
    pub new_value: Option<Value>,
}

impl CommandResult {
    fn failed(command: &Command, path: Option<CanonicalPath>, error: CommandError) -> Self {
        Self {
            command: command.clone(),
            path,
            applied: false,
            error_kind: Some(error.kind()),
            error: Some(error.to_string()),
            previous_value: None,
            new_value: None,
        }
    }
}

/// A new bundle plus one result per command, in command order.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub bundle: Bundle,
    pub results: Vec<CommandResult>,
}

impl Execution {
    pub fn applied_count(&self) -> usize {
        self.results.iter().filter(|r| r.applied).count()
    }
}

/// Apply `commands` in order to a copy of `bundle`.
///
/// The returned bundle always carries the next revision, whether or not any
/// command applied.
pub fn apply(bundle: &Bundle, commands: &[Command], options: &ExecuteOptions) -> Execution {
    let mut work = WorkingCopy {
        data: bundle.stat_data.clone(),
        schema: bundle.schema.clone(),
        options,
    };
    let results = commands.iter().map(|command| work.run(command)).collect();
    Execution {
        bundle: Bundle {
            stat_data: work.data,
            schema: work.schema,
            revision: bundle.revision + 1,
        },
        results,
    }
}

/// Apply a single command, as a direct host write does.
pub fn apply_one(bundle: &Bundle, command: &Command, options: &ExecuteOptions) -> (Bundle, CommandResult) {
    let mut work = WorkingCopy {
        data: bundle.stat_data.clone(),
        schema: bundle.schema.clone(),
        options,
    };
    let result = work.run(command);
    let next = Bundle {
        stat_data: work.data,
        schema: work.schema,
        revision: bundle.revision + 1,
    };
    (next, result)
}

/// Display map of applied changes: canonical path to `"old->new (reason)"`.
pub fn delta_data(results: &[CommandResult]) -> Map<String, Value> {
    let mut delta = Map::new();
    for result in results.iter().filter(|r| r.applied) {
        let Some(path) = result.path.as_ref().filter(|p| !p.is_root()) else {
            continue;
        };
        let mut line = format!(
            "{}->{}",
            display_value(result.previous_value.as_ref()),
            display_value(result.new_value.as_ref())
        );
        if let Some(reason) = &result.command.reason {
            line.push_str(&format!(" ({reason})"));
        }
        delta.insert(path.to_string(), Value::String(line));
    }
    delta
}

fn display_value(value: Option<&Value>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "undefined".to_string(),
    }
}

struct Change {
    path: CanonicalPath,
    previous: Option<Value>,
    new: Option<Value>,
}

struct WorkingCopy<'a> {
    data: Value,
    schema: SchemaNode,
    options: &'a ExecuteOptions,
}

fn not_found(path: &CanonicalPath) -> CommandError {
    SchemaViolation::NotFound(path.to_string()).into()
}

fn mismatch(path: &CanonicalPath, detail: impl Into<String>) -> CommandError {
    SchemaViolation::TypeMismatch {
        path: path.to_string(),
        detail: detail.into(),
    }
    .into()
}

fn key_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Keep numbers numbers: a numeric string replacing a number is converted.
fn coerce_like(old: &Value, new: Value) -> Value {
    if old.is_number() && new.is_string() {
        if let Some(n) = coerce_number(&new) {
            if let Ok(number) = number_value(n) {
                return number;
            }
        }
    }
    new
}

/// A value written over a described leaf replaces the whole leaf only when it
/// brings a description of its own.
fn carries_description(value: &Value) -> bool {
    match value {
        Value::Object(fields) => fields.contains_key("description"),
        other => is_value_with_description(other),
    }
}

/// `{value: v}` written over a described leaf stands for `v`.
fn unwrap_value_field(value: Value) -> Value {
    match value {
        Value::Object(mut fields) if fields.len() == 1 => match fields.remove("value") {
            Some(inner) => inner,
            None => Value::Object(fields),
        },
        other => other,
    }
}

fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn shift_date(date: DateTime<Utc>, millis: f64) -> Option<String> {
    let delta = TimeDelta::try_milliseconds(millis.round() as i64)?;
    let shifted = date.checked_add_signed(delta)?;
    Some(shifted.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Remove the node at `path` from its parent.
fn remove_node(data: &mut Value, path: &CanonicalPath) -> Option<Value> {
    let (parent, last) = path.split_last()?;
    match get_mut(data, parent.steps())? {
        Value::Object(map) => map.shift_remove(last.as_key().as_ref()),
        Value::Array(items) => {
            let index = last.as_index()?;
            (index < items.len()).then(|| items.remove(index))
        }
        _ => None,
    }
}

fn empty_container(array: bool) -> Value {
    if array {
        Value::Array(Vec::new())
    } else {
        Value::Object(Map::new())
    }
}

/// Child at `step`, creating an empty container when it is missing.
fn child_or_create<'v>(container: &'v mut Value, step: &PathStep, array: bool) -> Option<&'v mut Value> {
    match container {
        Value::Object(map) => Some(
            map.entry(step.as_key().into_owned())
                .or_insert_with(|| empty_container(array)),
        ),
        Value::Array(items) => {
            let index = step.as_index()?;
            if index == items.len() {
                items.push(empty_container(array));
            }
            items.get_mut(index)
        }
        _ => None,
    }
}

/// Write `value` at `path`, creating missing containers on the way.
fn create_at(data: &mut Value, path: &[PathStep], value: Value) -> Option<()> {
    let (last, parents) = path.split_last()?;
    let mut current = data;
    for (i, step) in parents.iter().enumerate() {
        let next = parents.get(i + 1).unwrap_or(last);
        current = child_or_create(current, step, next.is_index())?;
    }
    match current {
        Value::Object(map) => {
            map.insert(last.as_key().into_owned(), value);
        }
        Value::Array(items) => {
            let index = last.as_index()?;
            if index == items.len() {
                items.push(value);
            } else {
                *items.get_mut(index)? = value;
            }
        }
        _ => return None,
    }
    Some(())
}

impl<'a> WorkingCopy<'a> {
    fn run(&mut self, command: &Command) -> CommandResult {
        let path = match command.canonical_path() {
            Ok(path) => path,
            Err(err) => {
                tracing::warn!(kind = %command.kind, path = %command.path, error = %err, "invalid path");
                return CommandResult::failed(command, None, err.into());
            }
        };

        let outcome = match command.kind {
            CommandKind::Set => self.set(&path, &command.args),
            CommandKind::Add => self.add(&path, &command.args),
            CommandKind::Delete => self.delete(&path, &command.args),
            CommandKind::Insert => self.insert(&path, &command.args),
        };

        match outcome {
            Ok(mut change) => {
                reconcile_schema(
                    &mut self.schema,
                    &mut self.data,
                    change.path.steps(),
                    self.options.default_extensible,
                );
                if let Some(new) = change.new.as_mut() {
                    strip_meta(new);
                }
                tracing::debug!(kind = %command.kind, path = %change.path, "applied command");
                CommandResult {
                    command: command.clone(),
                    path: Some(change.path),
                    applied: true,
                    error_kind: None,
                    error: None,
                    previous_value: change.previous,
                    new_value: change.new,
                }
            }
            Err(err) => {
                tracing::warn!(kind = %command.kind, path = %path, error = %err, "command not applied");
                CommandResult::failed(command, Some(path), err)
            }
        }
    }

    fn resolve(&self, arg: &Argument) -> Result<Literal, CommandError> {
        Ok(arg.resolve(&self.options.literal)?)
    }

    fn resolve_value(&self, path: &CanonicalPath, arg: &Argument) -> Result<Value, CommandError> {
        self.resolve(arg)?
            .into_value()
            .ok_or_else(|| mismatch(path, "undefined cannot be stored here"))
    }

    fn declared_template(&self, path: &CanonicalPath) -> Option<Value> {
        self.schema.at(path.steps()).and_then(SchemaNode::template).cloned()
    }

    /// `set(path, [advisory..., ] value)`: the last argument is the value.
    fn set(&mut self, path: &CanonicalPath, args: &[Argument]) -> Result<Change, CommandError> {
        let Some((last, advisory)) = args.split_last() else {
            return Err(mismatch(path, "set needs a value"));
        };
        if !advisory.is_empty() {
            let hints: Vec<_> = advisory.iter().map(|a| a.source().into_owned()).collect();
            tracing::debug!(path = %path, ?hints, "ignoring advisory set arguments");
        }
        let literal = self.resolve(last)?;

        if path.is_root() {
            return self.set_root(path, literal);
        }
        if !exists(&self.data, path.steps()) {
            return self.create(path, literal);
        }
        let new = match literal {
            Literal::Undefined => return self.unset(path),
            Literal::Value(new) => new,
        };

        let current = get_mut(&mut self.data, path.steps()).ok_or_else(|| not_found(path))?;
        let (slot, new) = if is_value_with_description(current) && !carries_description(&new) {
            let slot = described_value_mut(current).ok_or_else(|| not_found(path))?;
            (slot, unwrap_value_field(new))
        } else {
            (current, new)
        };
        let new = coerce_like(slot, new);
        let previous = std::mem::replace(slot, new.clone());
        Ok(Change {
            path: path.clone(),
            previous: Some(previous),
            new: Some(new),
        })
    }

    /// Merge an object into the root.
    fn set_root(&mut self, path: &CanonicalPath, literal: Literal) -> Result<Change, CommandError> {
        let Literal::Value(Value::Object(fields)) = literal else {
            return Err(mismatch(path, "the root can only be set to an object"));
        };
        for key in fields.keys() {
            validate_set(&self.schema, &self.data, &[PathStep::Key(key.clone())])?;
        }
        let previous = self.data.clone();
        let Value::Object(root) = &mut self.data else {
            return Err(mismatch(path, "the root is not an object"));
        };
        for (key, value) in fields {
            root.insert(key, value);
        }
        Ok(Change {
            path: path.clone(),
            previous: Some(previous),
            new: Some(self.data.clone()),
        })
    }

    fn create(&mut self, path: &CanonicalPath, literal: Literal) -> Result<Change, CommandError> {
        let Literal::Value(value) = literal else {
            return Err(not_found(path));
        };
        validate_set(&self.schema, &self.data, path.steps())?;
        create_at(&mut self.data, path.steps(), value.clone()).ok_or_else(|| not_found(path))?;
        Ok(Change {
            path: path.clone(),
            previous: None,
            new: Some(value),
        })
    }

    /// `set(path, undefined)`: removes an object field, nulls an array slot.
    fn unset(&mut self, path: &CanonicalPath) -> Result<Change, CommandError> {
        let in_array = path
            .split_last()
            .is_some_and(|(parent, _)| matches!(get(&self.data, parent.steps()), Some(Value::Array(_))));
        if !in_array {
            return self.delete_node(path);
        }
        let slot = get_mut(&mut self.data, path.steps()).ok_or_else(|| not_found(path))?;
        let previous = std::mem::replace(slot, Value::Null);
        Ok(Change {
            path: path.clone(),
            previous: Some(previous),
            new: Some(Value::Null),
        })
    }

    /// `add(path[, delta])`: numbers and dates are shifted, arrays get the
    /// delta appended.
    fn add(&mut self, path: &CanonicalPath, args: &[Argument]) -> Result<Change, CommandError> {
        let delta = match args.first() {
            Some(arg) => self.resolve(arg)?,
            None => Literal::Value(Value::from(1)),
        };
        let current = get(&self.data, path.steps()).ok_or_else(|| not_found(path))?;

        if current.is_array() && !is_value_with_description(current) {
            if args.is_empty() {
                return Err(mismatch(path, "add on an array needs a value to append"));
            }
            let element = delta
                .into_value()
                .ok_or_else(|| mismatch(path, "undefined cannot be appended"))?;
            return self.append(path, element);
        }

        let amount = delta
            .as_value()
            .and_then(coerce_number)
            .ok_or_else(|| mismatch(path, "delta must be a number"))?;
        let precision = self.options.number_precision;

        let current = get_mut(&mut self.data, path.steps()).ok_or_else(|| not_found(path))?;
        let slot = if is_value_with_description(current) {
            described_value_mut(current).ok_or_else(|| not_found(path))?
        } else {
            current
        };

        let new = if let Some(old) = slot.as_f64() {
            number_value(round_significant(old + amount, precision))?
        } else if let Some(date) = slot.as_str().and_then(parse_date) {
            let shifted = shift_date(date, amount).ok_or_else(|| mismatch(path, "date out of range"))?;
            Value::String(shifted)
        } else {
            return Err(mismatch(path, format!("cannot add to {}", type_name(slot))));
        };
        let previous = std::mem::replace(slot, new.clone());
        Ok(Change {
            path: path.clone(),
            previous: Some(previous),
            new: Some(new),
        })
    }

    /// `delete(path)` removes the node; `delete(path, target)` removes a key,
    /// an index or the first equal element inside it.
    fn delete(&mut self, path: &CanonicalPath, args: &[Argument]) -> Result<Change, CommandError> {
        let Some(arg) = args.first() else {
            return self.delete_node(path);
        };
        let target = self
            .resolve(arg)?
            .into_value()
            .ok_or_else(|| mismatch(path, "undefined names nothing to delete"))?;

        let step = match get(&self.data, path.steps()) {
            Some(Value::Array(items)) => {
                let index = match &target {
                    Value::Number(n) => n
                        .as_u64()
                        .and_then(|i| usize::try_from(i).ok())
                        .filter(|i| *i < items.len()),
                    other => items.iter().position(|item| item == other),
                };
                PathStep::Index(index.ok_or_else(|| {
                    CommandError::from(SchemaViolation::NotFound(format!("{path} contains no {target}")))
                })?)
            }
            Some(Value::Object(_)) => PathStep::Key(key_text(&target)),
            Some(_) => return Err(SchemaViolation::PrimitiveParent(path.to_string()).into()),
            None => return Err(not_found(path)),
        };
        self.delete_node(&path.child(step))
    }

    fn delete_node(&mut self, path: &CanonicalPath) -> Result<Change, CommandError> {
        validate_delete(&self.schema, &self.data, path.steps())?;
        let previous = remove_node(&mut self.data, path).ok_or_else(|| not_found(path))?;
        Ok(Change {
            path: path.clone(),
            previous: Some(previous),
            new: None,
        })
    }

    /// `insert(path, value)` appends to an array or merges into an object;
    /// `insert(path, key, value)` places the value at a key or index.
    fn insert(&mut self, path: &CanonicalPath, args: &[Argument]) -> Result<Change, CommandError> {
        let is_array = match get(&self.data, path.steps()) {
            Some(Value::Array(_)) => true,
            Some(Value::Object(_)) => false,
            Some(_) => return Err(SchemaViolation::PrimitiveParent(path.to_string()).into()),
            None => return Err(not_found(path)),
        };

        match args {
            [value] => {
                let value = self.resolve_value(path, value)?;
                if is_array {
                    self.append(path, value)
                } else {
                    self.merge(path, value)
                }
            }
            [key, value] => {
                let key = self.resolve_value(path, key)?;
                let value = self.resolve_value(path, value)?;
                if is_array {
                    let index = match &key {
                        Value::Number(n) => n.as_u64().and_then(|i| usize::try_from(i).ok()),
                        Value::String(s) => PathStep::Key(s.clone()).as_index(),
                        _ => None,
                    }
                    .ok_or_else(|| CommandError::from(SchemaViolation::NotAnIndex(key_text(&key))))?;
                    self.insert_element(path, index, value)
                } else {
                    self.insert_field(path, key_text(&key), value)
                }
            }
            _ => Err(mismatch(path, "insert takes a value, or a key and a value")),
        }
    }

    fn append(&mut self, path: &CanonicalPath, element: Value) -> Result<Change, CommandError> {
        let len = match get(&self.data, path.steps()) {
            Some(Value::Array(items)) => items.len(),
            _ => return Err(not_found(path)),
        };
        self.insert_element(path, len, element)
    }

    fn insert_element(&mut self, path: &CanonicalPath, index: usize, element: Value) -> Result<Change, CommandError> {
        let step = PathStep::Index(index);
        validate_insert(&self.schema, &self.data, path.steps(), &step)?;
        let declared = self.declared_template(path);
        let Some(Value::Array(items)) = get_mut(&mut self.data, path.steps()) else {
            return Err(not_found(path));
        };
        let element = complete_element(element, declared.as_ref(), items, index);
        items.insert(index, element.clone());
        Ok(Change {
            path: path.child(step),
            previous: None,
            new: Some(element),
        })
    }

    fn insert_field(&mut self, path: &CanonicalPath, key: String, value: Value) -> Result<Change, CommandError> {
        let step = PathStep::Key(key);
        validate_insert(&self.schema, &self.data, path.steps(), &step)?;
        let declared = self.declared_template(path);
        let Some(Value::Object(map)) = get_mut(&mut self.data, path.steps()) else {
            return Err(not_found(path));
        };
        let key = step.as_key().into_owned();
        let value = match declared {
            Some(template) if !map.contains_key(&key) => apply_template(value, &template),
            _ => value,
        };
        let previous = map.insert(key, value.clone());
        Ok(Change {
            path: path.child(step),
            previous,
            new: Some(value),
        })
    }

    fn merge(&mut self, path: &CanonicalPath, value: Value) -> Result<Change, CommandError> {
        let Value::Object(fields) = value else {
            return Err(mismatch(path, "only an object can be merged into an object"));
        };
        for key in fields.keys() {
            validate_insert(&self.schema, &self.data, path.steps(), &PathStep::Key(key.clone()))?;
        }
        let declared = self.declared_template(path);
        let Some(Value::Object(map)) = get_mut(&mut self.data, path.steps()) else {
            return Err(not_found(path));
        };
        let previous = Value::Object(map.clone());
        for (key, value) in fields {
            let value = match &declared {
                Some(template) if !map.contains_key(&key) => apply_template(value, template),
                _ => value,
            };
            map.insert(key, value);
        }
        Ok(Change {
            path: path.clone(),
            previous: Some(previous),
            new: Some(Value::Object(map.clone())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::parse_literal;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn cmd(kind: CommandKind, path: &str, args: &[&str]) -> Command {
        Command::new(
            kind,
            path,
            args.iter().map(|a| Argument::Source(a.to_string())).collect(),
        )
    }

    fn run(data: Value, commands: &[Command]) -> Execution {
        let bundle = Bundle::from_stat_data(data, true);
        apply(&bundle, commands, &ExecuteOptions::default())
    }

    #[test]
    fn test_set_keeps_description_record() {
        let out = run(
            json!({"好感度": {"value": 50, "description": "好感度"}}),
            &[cmd(CommandKind::Set, "好感度", &["50", "60"])],
        );
        assert_eq!(out.bundle.stat_data, json!({"好感度": {"value": 60, "description": "好感度"}}));
        let result = &out.results[0];
        assert!(result.applied);
        assert_eq!(result.previous_value, Some(json!(50)));
        assert_eq!(result.new_value, Some(json!(60)));
    }

    #[test]
    fn test_set_keeps_description_pair_and_coerces() {
        let out = run(json!({"hp": [10, "生命值"]}), &[cmd(CommandKind::Set, "hp", &["'25'"])]);
        assert_eq!(out.bundle.stat_data, json!({"hp": [25, "生命值"]}));
    }

    #[test]
    fn test_set_new_description_replaces_leaf() {
        let out = run(
            json!({"x": {"value": 1, "description": "old"}}),
            &[cmd(CommandKind::Set, "x", &["{value: 2, description: 'new'}"])],
        );
        assert_eq!(out.bundle.stat_data, json!({"x": {"value": 2, "description": "new"}}));
    }

    #[test]
    fn test_set_value_field_keeps_description() {
        let out = run(
            json!({"好感度": {"value": 50, "description": "好感度"}, "p": [1, "d"]}),
            &[
                cmd(CommandKind::Set, "好感度", &["{value: 70}"]),
                cmd(CommandKind::Set, "p", &["{value: '2'}"]),
            ],
        );
        assert!(out.results.iter().all(|r| r.applied));
        assert_eq!(
            out.bundle.stat_data,
            json!({"好感度": {"value": 70, "description": "好感度"}, "p": [2, "d"]})
        );
    }

    #[test]
    fn test_set_plain_object_over_described_leaf_keeps_description() {
        let out = run(
            json!({"x": {"value": 1, "description": "d"}}),
            &[cmd(CommandKind::Set, "x", &["{a: 1}"])],
        );
        assert_eq!(out.bundle.stat_data, json!({"x": {"value": {"a": 1}, "description": "d"}}));
    }

    #[test]
    fn test_set_creates_missing_path() {
        let out = run(json!({}), &[cmd(CommandKind::Set, "a.b[0].c", &["true"])]);
        assert_eq!(out.bundle.stat_data, json!({"a": {"b": [{"c": true}]}}));
        assert!(out.bundle.schema.at(&mvu_path::parse_path("a.b[0].c").unwrap()).is_some());
    }

    #[test]
    fn test_set_rejected_by_closed_object() {
        let data = json!({"角色": {"$meta": {"extensible": false}, "名字": "艾琳"}});
        let out = run(data, &[cmd(CommandKind::Set, "角色.年龄", &["20"])]);
        assert!(!out.results[0].applied);
        assert_eq!(out.results[0].error_kind, Some(ErrorKind::SchemaViolation));
        assert_eq!(out.bundle.stat_data, json!({"角色": {"名字": "艾琳"}}));
    }

    #[test]
    fn test_set_undefined() {
        let out = run(
            json!({"a": 1, "list": [1, 2]}),
            &[
                cmd(CommandKind::Set, "a", &["undefined"]),
                cmd(CommandKind::Set, "list[0]", &["undefined"]),
            ],
        );
        assert_eq!(out.bundle.stat_data, json!({"list": [null, 2]}));
    }

    #[test]
    fn test_set_missing_value_fails() {
        let out = run(json!({"a": 1}), &[cmd(CommandKind::Set, "a", &[""])]);
        assert!(!out.results[0].applied);
        assert_eq!(out.results[0].error_kind, Some(ErrorKind::ValueSyntaxError));
        assert_eq!(out.bundle.stat_data, json!({"a": 1}));
    }

    #[test]
    fn test_invalid_path() {
        let out = run(json!({"a": 1}), &[cmd(CommandKind::Set, "a[0", &["1"])]);
        assert_eq!(out.results[0].error_kind, Some(ErrorKind::PathError));
        assert_eq!(out.results[0].path, None);
    }

    #[test]
    fn test_add_numbers() {
        let out = run(
            json!({"金币": 10, "概率": 0.1, "好感": [5, "d"]}),
            &[
                cmd(CommandKind::Add, "金币", &["5"]),
                cmd(CommandKind::Add, "概率", &["0.2"]),
                cmd(CommandKind::Add, "好感", &["-2"]),
                cmd(CommandKind::Add, "金币", &[]),
            ],
        );
        assert_eq!(out.bundle.stat_data, json!({"金币": 16, "概率": 0.3, "好感": [3, "d"]}));
    }

    #[test]
    fn test_add_date() {
        let out = run(
            json!({"时间": "2024-01-01T00:00:00.000Z"}),
            &[cmd(CommandKind::Add, "时间", &["3600000"])],
        );
        assert_eq!(out.bundle.stat_data, json!({"时间": "2024-01-01T01:00:00.000Z"}));
    }

    #[test]
    fn test_add_appends_to_array_with_sibling_template() {
        let out = run(
            json!({"背包": [{"名称": "剑", "数量": 1}]}),
            &[cmd(CommandKind::Add, "背包", &["{名称: '盾'}"])],
        );
        assert_eq!(
            out.bundle.stat_data,
            json!({"背包": [{"名称": "剑", "数量": 1}, {"名称": "盾", "数量": 1}]})
        );
        assert_eq!(out.results[0].path.as_ref().unwrap().as_str(), "背包[1]");
    }

    #[test]
    fn test_two_item_string_list_grows() {
        let out = run(
            json!({"背包": ["剑", "盾"]}),
            &[
                cmd(CommandKind::Insert, "背包", &["'弓'"]),
                cmd(CommandKind::Add, "背包", &["'箭'"]),
            ],
        );
        assert!(out.results.iter().all(|r| r.applied));
        assert_eq!(out.bundle.stat_data, json!({"背包": ["剑", "盾", "弓", "箭"]}));
        assert_eq!(out.results[1].path.as_ref().unwrap().as_str(), "背包[3]");
    }

    #[test]
    fn test_add_type_mismatch() {
        let out = run(json!({"name": "x"}), &[cmd(CommandKind::Add, "name", &["1"])]);
        assert!(!out.results[0].applied);
        assert_eq!(out.results[0].error_kind, Some(ErrorKind::SchemaViolation));
    }

    #[test]
    fn test_delete_forms() {
        let out = run(
            json!({"a": 1, "obj": {"k": 1, "j": 2}, "list": ["x", "y", "z"]}),
            &[
                cmd(CommandKind::Delete, "a", &[]),
                cmd(CommandKind::Delete, "obj", &["'k'"]),
                cmd(CommandKind::Delete, "list", &["'y'"]),
                cmd(CommandKind::Delete, "list", &["0"]),
            ],
        );
        assert_eq!(out.bundle.stat_data, json!({"obj": {"j": 2}, "list": ["z"]}));
        assert_eq!(out.applied_count(), 4);
    }

    #[test]
    fn test_delete_missing_and_required() {
        let out = run(
            json!({"角色": {"$meta": {"required": ["名字"]}, "名字": "艾琳"}}),
            &[
                cmd(CommandKind::Delete, "不存在", &[]),
                cmd(CommandKind::Delete, "角色.名字", &[]),
            ],
        );
        assert_eq!(out.applied_count(), 0);
        assert!(out.results.iter().all(|r| r.error_kind == Some(ErrorKind::SchemaViolation)));
    }

    #[test]
    fn test_insert_forms() {
        let out = run(
            json!({"list": [1, 3], "obj": {"a": 1}}),
            &[
                cmd(CommandKind::Insert, "list", &["1", "2"]),
                cmd(CommandKind::Insert, "list", &["4"]),
                cmd(CommandKind::Insert, "obj", &["{b: 2}"]),
                cmd(CommandKind::Insert, "obj", &["'c'", "3"]),
                cmd(CommandKind::Insert, "list", &["9", "0"]),
            ],
        );
        assert_eq!(out.bundle.stat_data, json!({"list": [1, 2, 3, 4], "obj": {"a": 1, "b": 2, "c": 3}}));
        assert_eq!(out.results[4].error_kind, Some(ErrorKind::SchemaViolation));
    }

    #[test]
    fn test_insert_uses_declared_template() {
        let data = json!({
            "任务": [
                {"$arrayMeta": true, "$meta": {"template": {"状态": "进行中", "进度": 0}}},
                {"名称": "主线", "状态": "完成", "进度": 100}
            ]
        });
        let out = run(data, &[cmd(CommandKind::Insert, "任务", &["{名称: '支线'}"])]);
        assert_eq!(
            out.bundle.stat_data["任务"][1],
            json!({"状态": "进行中", "进度": 0, "名称": "支线"})
        );
    }

    #[test]
    fn test_closed_array_rejects_insert() {
        let data = json!({"fixed": [{"$arrayMeta": true, "$meta": {"extensible": false}}, 1]});
        let out = run(data, &[cmd(CommandKind::Insert, "fixed", &["2"])]);
        assert!(!out.results[0].applied);
        assert_eq!(out.bundle.stat_data, json!({"fixed": [1]}));
    }

    #[test]
    fn test_partial_failure_isolation() {
        let out = run(
            json!({"a": 1, "b": 2}),
            &[
                cmd(CommandKind::Set, "a", &["10"]),
                cmd(CommandKind::Add, "missing", &["1"]),
                cmd(CommandKind::Set, "b", &["20"]),
            ],
        );
        assert_eq!(out.bundle.stat_data, json!({"a": 10, "b": 20}));
        let applied: Vec<_> = out.results.iter().map(|r| r.applied).collect();
        assert_eq!(applied, vec![true, false, true]);
    }

    #[test]
    fn test_schema_follows_structural_edits() {
        let out = run(
            json!({"list": []}),
            &[
                cmd(CommandKind::Insert, "list", &["{k: 1}"]),
                cmd(CommandKind::Set, "list[0].k", &["2"]),
            ],
        );
        assert_eq!(out.applied_count(), 2);
        assert_eq!(out.bundle.stat_data, json!({"list": [{"k": 2}]}));
    }

    #[test]
    fn test_revision_and_empty_batch() {
        let bundle = Bundle::default();
        let out = apply(&bundle, &[], &ExecuteOptions::default());
        assert_eq!(out.bundle.revision, 1);
        assert_eq!(out.bundle.stat_data, bundle.stat_data);
    }

    #[test]
    fn test_typed_argument() {
        let literal = parse_literal("[1, 2]").unwrap();
        let command = Command::new(CommandKind::Set, "x", vec![Argument::Value(literal)]);
        let out = run(json!({}), &[command]);
        assert_eq!(out.bundle.stat_data, json!({"x": [1, 2]}));
    }

    #[test]
    fn test_delta_data() {
        let out = run(
            json!({"金币": 10, "a": 1}),
            &[
                cmd(CommandKind::Add, "金币", &["5"]).with_reason("获得金币"),
                cmd(CommandKind::Delete, "a", &[]),
                cmd(CommandKind::Add, "missing", &[]),
            ],
        );
        let delta = delta_data(&out.results);
        assert_eq!(
            Value::Object(delta),
            json!({"金币": "10->15 (获得金币)", "a": "1->undefined"})
        );
    }
}
