//! Structural schema over stat data.
//!
//! A [`SchemaNode`] is inferred from the data (plus optional `$meta`
//! annotations) and consulted before every structural edit. After an edit
//! only the changed subtree is re-inferred.

mod infer;
mod validate;

pub use infer::{infer_schema, infer_schema_with, reconcile_schema, strip_meta};
pub use validate::{validate_delete, validate_insert, validate_set, SchemaViolation};

use indexmap::{IndexMap, IndexSet};
use mvu_path::PathStep;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key holding schema annotations inside an object.
pub const META_KEY: &str = "$meta";

/// Marker key of the annotation element inside an array.
pub const ARRAY_META_KEY: &str = "$arrayMeta";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SchemaNode {
    Object(ObjectSchema),
    Array(ArraySchema),
    Primitive(PrimitiveSchema),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectSchema {
    pub properties: IndexMap<String, SchemaNode>,
    /// Accepts fields that are not in `properties`.
    pub extensible: bool,
    /// Nested containers inherit extensibility.
    #[serde(default)]
    pub recursive_extensible: bool,
    #[serde(default, skip_serializing_if = "IndexSet::is_empty")]
    pub required: IndexSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArraySchema {
    /// Element shape, `None` while the array is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<Box<SchemaNode>>,
    pub extensible: bool,
    #[serde(default)]
    pub recursive_extensible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_len: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimitiveSchema {
    pub kind: PrimitiveKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    String,
    Number,
    Boolean,
    Null,
    Any,
}

impl PrimitiveKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => PrimitiveKind::String,
            Value::Number(_) => PrimitiveKind::Number,
            Value::Bool(_) => PrimitiveKind::Boolean,
            Value::Null => PrimitiveKind::Null,
            Value::Array(_) | Value::Object(_) => PrimitiveKind::Any,
        }
    }
}

impl Default for SchemaNode {
    /// Schema of an empty, extensible root object.
    fn default() -> Self {
        SchemaNode::Object(ObjectSchema {
            extensible: true,
            ..ObjectSchema::default()
        })
    }
}

impl SchemaNode {
    fn child(&self, step: &PathStep) -> Option<&SchemaNode> {
        match self {
            SchemaNode::Object(obj) => obj.properties.get(step.as_key().as_ref()),
            SchemaNode::Array(arr) => {
                step.as_index()?;
                arr.element.as_deref()
            }
            SchemaNode::Primitive(_) => None,
        }
    }

    fn child_mut(&mut self, step: &PathStep) -> Option<&mut SchemaNode> {
        match self {
            SchemaNode::Object(obj) => obj.properties.get_mut(step.as_key().as_ref()),
            SchemaNode::Array(arr) => {
                step.as_index()?;
                arr.element.as_deref_mut()
            }
            SchemaNode::Primitive(_) => None,
        }
    }

    /// Schema of the node addressed by `path`. Every array index maps to the
    /// element schema.
    pub fn at(&self, path: &[PathStep]) -> Option<&SchemaNode> {
        path.iter().try_fold(self, |node, step| node.child(step))
    }

    pub fn at_mut(&mut self, path: &[PathStep]) -> Option<&mut SchemaNode> {
        let mut node = self;
        for step in path {
            node = node.child_mut(step)?;
        }
        Some(node)
    }

    pub fn template(&self) -> Option<&Value> {
        match self {
            SchemaNode::Object(obj) => obj.template.as_ref(),
            SchemaNode::Array(arr) => arr.template.as_ref(),
            SchemaNode::Primitive(_) => None,
        }
    }

    /// Children inherit extensibility when both flags are set.
    pub(crate) fn passes_extensible(&self) -> bool {
        match self {
            SchemaNode::Object(obj) => obj.extensible && obj.recursive_extensible,
            SchemaNode::Array(arr) => arr.extensible && arr.recursive_extensible,
            SchemaNode::Primitive(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mvu_path::parse_path;
    use serde_json::json;

    #[test]
    fn test_lookup_through_arrays() {
        let schema = infer_schema(&json!({"背包": [{"名称": "剑"}]}));
        let node = schema.at(&parse_path("背包[3].名称").unwrap()).unwrap();
        assert_eq!(node, &SchemaNode::Primitive(PrimitiveSchema { kind: PrimitiveKind::String }));
        assert!(schema.at(&parse_path("背包.x").unwrap()).is_none());
        assert!(schema.at(&parse_path("missing").unwrap()).is_none());
    }

    #[test]
    fn test_serde_tagging() {
        let schema = infer_schema(&json!({"a": 1}));
        let encoded = serde_json::to_value(&schema).unwrap();
        assert_eq!(
            encoded,
            json!({
                "type": "object",
                "properties": {"a": {"type": "primitive", "kind": "number"}},
                "extensible": true,
                "recursive_extensible": false
            })
        );
        let decoded: SchemaNode = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, schema);
    }
}
