use mvu_path::{exists, format_path, get, resolved_prefix_len, PathStep};
use serde_json::Value;
use thiserror::Error;

use super::SchemaNode;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaViolation {
    #[error("path {0:?} does not exist")]
    NotFound(String),
    #[error("{0:?} is a primitive value and has no children")]
    PrimitiveParent(String),
    #[error("index {index} is out of bounds for {path:?} of length {len}")]
    IndexOutOfBounds { path: String, index: usize, len: usize },
    #[error("{0:?} is not an array index")]
    NotAnIndex(String),
    #[error("object {0:?} does not accept new field {1:?}")]
    ClosedObject(String, String),
    #[error("array {0:?} does not accept inserts or deletes")]
    ClosedArray(String),
    #[error("array {path:?} is limited to {max} elements")]
    MaxLength { path: String, max: usize },
    #[error("field {1:?} of {0:?} is required")]
    Required(String, String),
    #[error("cannot delete the root")]
    Root,
    #[error("{path:?}: {detail}")]
    TypeMismatch { path: String, detail: String },
}

/// Check that a new member `step` may be added under `parent`.
///
/// Objects accept a new field unless closed; an existing field is a plain
/// overwrite. Arrays accept any index up to and including their length.
pub fn validate_insert(
    schema: &SchemaNode,
    data: &Value,
    parent: &[PathStep],
    step: &PathStep,
) -> Result<(), SchemaViolation> {
    let parent_text = format_path(parent);
    let container = get(data, parent).ok_or_else(|| SchemaViolation::NotFound(parent_text.clone()))?;
    let container_schema = schema.at(parent);

    match container {
        Value::Object(map) => {
            let key = step.as_key();
            if map.contains_key(key.as_ref()) {
                return Ok(());
            }
            match container_schema {
                Some(SchemaNode::Object(obj)) if !obj.extensible => {
                    Err(SchemaViolation::ClosedObject(parent_text, key.into_owned()))
                }
                _ => Ok(()),
            }
        }
        Value::Array(items) => {
            let index = step
                .as_index()
                .ok_or_else(|| SchemaViolation::NotAnIndex(step.as_key().into_owned()))?;
            if let Some(SchemaNode::Array(arr)) = container_schema {
                if !arr.extensible {
                    return Err(SchemaViolation::ClosedArray(parent_text));
                }
                if let Some(max) = arr.max_len {
                    if items.len() >= max {
                        return Err(SchemaViolation::MaxLength { path: parent_text, max });
                    }
                }
            }
            if index > items.len() {
                return Err(SchemaViolation::IndexOutOfBounds {
                    path: parent_text,
                    index,
                    len: items.len(),
                });
            }
            Ok(())
        }
        _ => Err(SchemaViolation::PrimitiveParent(parent_text)),
    }
}

/// Check a `Set` at `path`.
///
/// Overwriting an existing node is always allowed. Creating a node is an
/// insert at the first missing step; deeper missing steps become new
/// containers and need no further checks.
pub fn validate_set(schema: &SchemaNode, data: &Value, path: &[PathStep]) -> Result<(), SchemaViolation> {
    if exists(data, path) {
        return Ok(());
    }
    let resolved = resolved_prefix_len(data, path);
    validate_insert(schema, data, &path[..resolved], &path[resolved])?;
    for depth in resolved + 1..path.len() {
        if let PathStep::Index(index) = path[depth] {
            if index != 0 {
                return Err(SchemaViolation::IndexOutOfBounds {
                    path: format_path(&path[..depth]),
                    index,
                    len: 0,
                });
            }
        }
    }
    Ok(())
}

/// Check that the node at `path` may be removed.
pub fn validate_delete(schema: &SchemaNode, data: &Value, path: &[PathStep]) -> Result<(), SchemaViolation> {
    let Some((last, parent)) = path.split_last() else {
        return Err(SchemaViolation::Root);
    };
    if !exists(data, path) {
        return Err(SchemaViolation::NotFound(format_path(path)));
    }
    match (get(data, parent), schema.at(parent)) {
        (Some(Value::Object(_)), Some(SchemaNode::Object(obj))) => {
            let key = last.as_key();
            if obj.required.contains(key.as_ref()) || !obj.extensible {
                return Err(SchemaViolation::Required(format_path(parent), key.into_owned()));
            }
            Ok(())
        }
        (Some(Value::Array(_)), Some(SchemaNode::Array(arr))) if !arr.extensible => {
            Err(SchemaViolation::ClosedArray(format_path(parent)))
        }
        _ => Ok(()),
    }
}
