//! Template applicator.
//!
//! New array elements and new object fields are completed from a template
//! before they reach the stat data: the schema's `$meta.template` when one is
//! declared, otherwise the nearest existing sibling element.

use serde_json::{Map, Value};

/// Overlay `value` on `template`; fields of `value` win.
///
/// - object on object template: deep merge, arrays in `value` replace
/// - array on array template: template elements are appended
/// - primitive on array template: wrapped as `[value, ...template]`
/// - any other combination leaves `value` unchanged
pub fn apply_template(value: Value, template: &Value) -> Value {
    match (value, template) {
        (Value::Object(fields), Value::Object(base)) => Value::Object(deep_merge(base.clone(), fields)),
        (Value::Array(mut items), Value::Array(extra)) => {
            items.extend(extra.iter().cloned());
            Value::Array(items)
        }
        (Value::Object(fields), Value::Array(_)) => {
            tracing::warn!("object value does not match array template");
            Value::Object(fields)
        }
        (Value::Array(items), Value::Object(_)) => {
            tracing::warn!("array value does not match object template");
            Value::Array(items)
        }
        (primitive, Value::Array(extra)) => {
            let mut items = Vec::with_capacity(extra.len() + 1);
            items.push(primitive);
            items.extend(extra.iter().cloned());
            Value::Array(items)
        }
        (value, _) => value,
    }
}

/// Complete a new array element inserted at `index` into `siblings`.
///
/// A declared template takes precedence. Otherwise an object element is
/// merged over a clone of the element before the insertion point (the first
/// element when inserting at the front).
pub fn complete_element(value: Value, declared: Option<&Value>, siblings: &[Value], index: usize) -> Value {
    if let Some(template) = declared {
        return apply_template(value, template);
    }
    let sibling = if index > 0 {
        siblings.get(index - 1)
    } else {
        siblings.first()
    };
    match (value, sibling) {
        (Value::Object(fields), Some(Value::Object(base))) => Value::Object(deep_merge(base.clone(), fields)),
        (value, _) => value,
    }
}

fn deep_merge(mut base: Map<String, Value>, overlay: Map<String, Value>) -> Map<String, Value> {
    for (key, incoming) in overlay {
        if let Some(slot) = base.get_mut(&key) {
            merge_into(slot, incoming);
        } else {
            base.insert(key, incoming);
        }
    }
    base
}

fn merge_into(slot: &mut Value, incoming: Value) {
    match (slot, incoming) {
        (Value::Object(inner), Value::Object(fields)) => {
            let merged = deep_merge(std::mem::take(inner), fields);
            *inner = merged;
        }
        (slot, incoming) => *slot = incoming,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_merge_supplied_wins() {
        let template = json!({"名称": "", "数量": 1, "属性": {"耐久": 100, "稀有": false}, "标签": ["a"]});
        let value = json!({"名称": "剑", "属性": {"稀有": true}, "标签": ["b", "c"]});
        assert_eq!(
            apply_template(value, &template),
            json!({"名称": "剑", "数量": 1, "属性": {"耐久": 100, "稀有": true}, "标签": ["b", "c"]})
        );
    }

    #[test]
    fn test_array_templates() {
        assert_eq!(apply_template(json!([1]), &json!([2, 3])), json!([1, 2, 3]));
        assert_eq!(apply_template(json!("x"), &json!(["y"])), json!(["x", "y"]));
        assert_eq!(apply_template(json!({"a": 1}), &json!([1])), json!({"a": 1}));
        assert_eq!(apply_template(json!(5), &json!({"a": 1})), json!(5));
    }

    #[test]
    fn test_sibling_template() {
        let siblings = vec![json!({"名称": "剑", "数量": 1, "品质": "普通"})];
        assert_eq!(
            complete_element(json!({"名称": "盾"}), None, &siblings, 1),
            json!({"名称": "盾", "数量": 1, "品质": "普通"})
        );
        assert_eq!(complete_element(json!(7), None, &siblings, 1), json!(7));
        assert_eq!(complete_element(json!({"a": 1}), None, &[], 0), json!({"a": 1}));
    }

    #[test]
    fn test_declared_template_wins_over_sibling() {
        let siblings = vec![json!({"名称": "剑", "数量": 3})];
        let declared = json!({"数量": 1});
        assert_eq!(
            complete_element(json!({"名称": "盾"}), Some(&declared), &siblings, 1),
            json!({"数量": 1, "名称": "盾"})
        );
    }
}
