use mvu_path::{get, get_mut, PathStep};
use serde_json::{Map, Value};

use super::{ArraySchema, ObjectSchema, PrimitiveKind, PrimitiveSchema, SchemaNode, ARRAY_META_KEY, META_KEY};
use crate::stat::is_value_with_description;

/// Infer a schema from stat data with default options.
pub fn infer_schema(data: &Value) -> SchemaNode {
    infer_schema_with(data, None, true)
}

/// Infer a schema, inheriting flags, required fields and templates from `old`
/// where the shapes still agree.
///
/// `$meta` annotations in `data` override both the defaults and `old`.
pub fn infer_schema_with(data: &Value, old: Option<&SchemaNode>, default_extensible: bool) -> SchemaNode {
    Inference { default_extensible }.node(data, old, false)
}

/// Remove `$meta` keys and `$arrayMeta` elements from `data`.
pub fn strip_meta(data: &mut Value) {
    match data {
        Value::Object(map) => {
            map.shift_remove(META_KEY);
            for child in map.values_mut() {
                strip_meta(child);
            }
        }
        Value::Array(items) => {
            items.retain(|item| !is_array_meta(item));
            for child in items.iter_mut() {
                strip_meta(child);
            }
        }
        _ => {}
    }
}

/// Re-infer the schema for the subtree changed by an edit at `changed`.
///
/// Element schemas depend on every element, so an edit below an array
/// re-infers from that array down. A path that no longer resolves removes the
/// field from its parent. Annotations in the re-inferred data are stripped.
pub fn reconcile_schema(
    schema: &mut SchemaNode,
    data: &mut Value,
    changed: &[PathStep],
    default_extensible: bool,
) {
    let inference = Inference { default_extensible };

    let mut target_len = changed.len();
    let mut current = Some(&*data);
    for (i, step) in changed.iter().enumerate() {
        let Some(value) = current else {
            break;
        };
        if value.is_array() {
            target_len = i;
            break;
        }
        current = get(value, std::slice::from_ref(step));
    }
    let target = &changed[..target_len];

    if !reconcile_at(&inference, schema, data, target) {
        let old = std::mem::take(schema);
        *schema = inference.node(data, Some(&old), false);
        strip_meta(data);
    }
}

/// Re-infer at `target`, or at its nearest ancestor whose parent has an
/// object schema. Returns `false` when only the whole tree can be re-inferred.
fn reconcile_at(inference: &Inference, schema: &mut SchemaNode, data: &mut Value, mut target: &[PathStep]) -> bool {
    let (last, parent_path) = loop {
        let Some((last, parent_path)) = target.split_last() else {
            return false;
        };
        if matches!(schema.at(parent_path), Some(SchemaNode::Object(_))) {
            break (last, parent_path);
        }
        target = parent_path;
    };
    let inherited = schema.at(parent_path).is_some_and(SchemaNode::passes_extensible);
    let Some(SchemaNode::Object(parent)) = schema.at_mut(parent_path) else {
        return false;
    };
    let key = last.as_key();
    match get_mut(data, target) {
        Some(value) => {
            let node = inference.node(value, parent.properties.get(key.as_ref()), inherited);
            strip_meta(value);
            parent.properties.insert(key.into_owned(), node);
        }
        None => {
            parent.properties.shift_remove(key.as_ref());
        }
    }
    true
}

fn is_array_meta(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|m| m.contains_key(ARRAY_META_KEY) && m.contains_key(META_KEY))
}

struct Inference {
    default_extensible: bool,
}

impl Inference {
    fn node(&self, data: &Value, old: Option<&SchemaNode>, inherited: bool) -> SchemaNode {
        match data {
            Value::Object(map) => SchemaNode::Object(self.object(data, map, old, inherited)),
            Value::Array(items) => SchemaNode::Array(self.array(data, items, old, inherited)),
            _ => SchemaNode::Primitive(PrimitiveSchema {
                kind: PrimitiveKind::of(data),
            }),
        }
    }

    fn object(&self, data: &Value, map: &Map<String, Value>, old: Option<&SchemaNode>, inherited: bool) -> ObjectSchema {
        let old = match old {
            Some(SchemaNode::Object(obj)) => Some(obj),
            _ => None,
        };
        let mut schema = match old {
            Some(o) => ObjectSchema {
                properties: Default::default(),
                extensible: o.extensible,
                recursive_extensible: o.recursive_extensible,
                required: o.required.clone(),
                template: o.template.clone(),
            },
            None => ObjectSchema {
                extensible: self.default_extensible || inherited,
                recursive_extensible: inherited,
                ..ObjectSchema::default()
            },
        };

        if let Some(Value::Object(meta)) = map.get(META_KEY) {
            if let Some(flag) = meta.get("extensible").and_then(Value::as_bool) {
                schema.extensible = flag;
            }
            if let Some(flag) = meta.get("recursiveExtensible").and_then(Value::as_bool) {
                schema.recursive_extensible = flag;
                schema.extensible |= flag;
            }
            if let Some(Value::Array(keys)) = meta.get("required") {
                schema
                    .required
                    .extend(keys.iter().filter_map(Value::as_str).map(str::to_string));
            }
            if let Some(template) = meta.get("template") {
                schema.template = Some(template.clone());
            }
        }

        if is_value_with_description(data) {
            schema.extensible = false;
            schema.required.insert("value".to_string());
            schema.required.insert("description".to_string());
        }

        let pass = schema.extensible && schema.recursive_extensible;
        for (key, child) in map {
            if key == META_KEY {
                continue;
            }
            let old_child = old.and_then(|o| o.properties.get(key));
            schema
                .properties
                .insert(key.clone(), self.node(child, old_child, pass));
        }
        schema
    }

    fn array(&self, data: &Value, items: &[Value], old: Option<&SchemaNode>, inherited: bool) -> ArraySchema {
        let old = match old {
            Some(SchemaNode::Array(arr)) => Some(arr),
            _ => None,
        };
        let mut schema = match old {
            Some(a) => ArraySchema {
                element: None,
                extensible: a.extensible,
                recursive_extensible: a.recursive_extensible,
                max_len: a.max_len,
                template: a.template.clone(),
            },
            None => ArraySchema {
                extensible: self.default_extensible || inherited,
                recursive_extensible: inherited,
                ..ArraySchema::default()
            },
        };

        let meta = items
            .iter()
            .find(|item| is_array_meta(item))
            .and_then(|item| item.get(META_KEY))
            .and_then(Value::as_object);
        if let Some(meta) = meta {
            if let Some(flag) = meta.get("extensible").and_then(Value::as_bool) {
                schema.extensible = flag;
            }
            if let Some(flag) = meta.get("recursiveExtensible").and_then(Value::as_bool) {
                schema.recursive_extensible = flag;
                schema.extensible |= flag;
            }
            if let Some(template) = meta.get("template") {
                schema.template = Some(template.clone());
            }
            if let Some(max) = meta.get("maxLength").and_then(Value::as_u64) {
                schema.max_len = usize::try_from(max).ok();
            }
        }

        if is_value_with_description(data) {
            schema.extensible = false;
        }

        let pass = schema.extensible && schema.recursive_extensible;
        let old_element = old.and_then(|a| a.element.as_deref());
        schema.element = items
            .iter()
            .find(|item| !is_array_meta(item))
            .map(|first| Box::new(self.node(first, old_element, pass)));
        schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mvu_path::parse_path;
    use serde_json::json;

    fn object(node: &SchemaNode) -> &ObjectSchema {
        match node {
            SchemaNode::Object(obj) => obj,
            other => panic!("expected object schema, got {other:?}"),
        }
    }

    fn array(node: &SchemaNode) -> &ArraySchema {
        match node {
            SchemaNode::Array(arr) => arr,
            other => panic!("expected array schema, got {other:?}"),
        }
    }

    #[test]
    fn test_infer_shapes() {
        let schema = infer_schema(&json!({"n": 1, "s": "x", "b": true, "z": null, "list": [1, 2], "empty": []}));
        let root = object(&schema);
        assert!(root.extensible);
        assert_eq!(
            root.properties.keys().collect::<Vec<_>>(),
            vec!["n", "s", "b", "z", "list", "empty"]
        );
        assert_eq!(
            root.properties["list"],
            SchemaNode::Array(ArraySchema {
                element: Some(Box::new(SchemaNode::Primitive(PrimitiveSchema {
                    kind: PrimitiveKind::Number
                }))),
                extensible: true,
                ..ArraySchema::default()
            })
        );
        assert!(array(&root.properties["empty"]).element.is_none());
    }

    #[test]
    fn test_meta_annotations() {
        let data = json!({
            "角色": {
                "$meta": {"extensible": false, "required": ["名字"]},
                "名字": "艾琳",
                "年龄": 20
            },
            "背包": [
                {"$arrayMeta": true, "$meta": {"extensible": true, "maxLength": 3, "template": {"数量": 1}}},
                {"名称": "剑", "数量": 1}
            ]
        });
        let schema = infer_schema(&data);
        let root = object(&schema);
        let role = object(&root.properties["角色"]);
        assert!(!role.extensible);
        assert!(role.required.contains("名字"));
        assert!(!role.properties.contains_key("$meta"));
        let bag = array(&root.properties["背包"]);
        assert_eq!(bag.max_len, Some(3));
        assert_eq!(bag.template, Some(json!({"数量": 1})));
        assert!(matches!(bag.element.as_deref(), Some(SchemaNode::Object(_))));
    }

    #[test]
    fn test_recursive_extensible_flows_down() {
        let data = json!({
            "$meta": {"extensible": false, "recursiveExtensible": true},
            "a": {"b": {}}
        });
        let schema = infer_schema_with(&data, None, false);
        let b = schema.at(&parse_path("a.b").unwrap()).unwrap();
        assert!(object(b).extensible);

        let plain = infer_schema_with(&json!({"a": {}}), None, false);
        assert!(!object(plain.at(&parse_path("a").unwrap()).unwrap()).extensible);
    }

    #[test]
    fn test_value_with_description_is_closed() {
        let schema = infer_schema(&json!({"好感度": {"value": 50, "description": "好感度"}, "p": [1, "d"]}));
        let leaf = object(schema.at(&parse_path("好感度").unwrap()).unwrap());
        assert!(!leaf.extensible);
        assert!(leaf.required.contains("description"));
        let pair = array(schema.at(&parse_path("p").unwrap()).unwrap());
        assert!(!pair.extensible);
        assert_eq!(pair.max_len, None);
    }

    #[test]
    fn test_two_item_string_list_stays_open() {
        let schema = infer_schema(&json!({"背包": ["剑", "盾"]}));
        let bag = array(schema.at(&parse_path("背包").unwrap()).unwrap());
        assert!(bag.extensible);
        assert_eq!(bag.max_len, None);
    }

    #[test]
    fn test_old_schema_is_inherited() {
        let first = infer_schema(&json!({"a": {"$meta": {"extensible": false}, "x": 1}}));
        let second = infer_schema_with(&json!({"a": {"x": 2}}), Some(&first), true);
        assert!(!object(second.at(&parse_path("a").unwrap()).unwrap()).extensible);
    }

    #[test]
    fn test_strip_meta() {
        let mut data = json!({
            "$meta": {"extensible": true},
            "a": [{"$arrayMeta": true, "$meta": {}}, {"$meta": {}, "b": 1}]
        });
        strip_meta(&mut data);
        assert_eq!(data, json!({"a": [{"b": 1}]}));
    }

    #[test]
    fn test_reconcile_changed_field() {
        let mut data = json!({"a": {"x": 1}, "b": 2});
        let mut schema = infer_schema(&data);
        data["a"]["y"] = json!({"$meta": {"extensible": false}, "z": true});
        reconcile_schema(&mut schema, &mut data, &parse_path("a.y").unwrap(), true);
        assert!(!object(schema.at(&parse_path("a.y").unwrap()).unwrap()).extensible);
        assert_eq!(data["a"]["y"], json!({"z": true}));
    }

    #[test]
    fn test_reconcile_removed_field() {
        let mut data = json!({"a": 1, "b": 2});
        let mut schema = infer_schema(&data);
        data.as_object_mut().unwrap().shift_remove("a");
        reconcile_schema(&mut schema, &mut data, &parse_path("a").unwrap(), true);
        assert_eq!(object(&schema).properties.keys().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_reconcile_below_array_reinfers_array() {
        let mut data = json!({"list": []});
        let mut schema = infer_schema(&data);
        data["list"] = json!([{"k": 1}]);
        reconcile_schema(&mut schema, &mut data, &parse_path("list[0].k").unwrap(), true);
        assert!(schema.at(&parse_path("list[0].k").unwrap()).is_some());
    }

    #[test]
    fn test_reconcile_new_subtree_under_missing_schema() {
        let mut data = json!({"keep": {"$meta": {"extensible": false}, "x": 1}});
        let mut schema = infer_schema(&data);
        data["a"] = json!({"b": {"c": 1}});
        reconcile_schema(&mut schema, &mut data, &parse_path("a.b.c").unwrap(), true);
        assert!(schema.at(&parse_path("a.b.c").unwrap()).is_some());
        assert!(!object(schema.at(&parse_path("keep").unwrap()).unwrap()).extensible);
    }
}
