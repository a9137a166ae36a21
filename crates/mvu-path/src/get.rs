use serde_json::Value;

use crate::types::PathStep;

fn step_in<'a>(current: &'a Value, step: &PathStep) -> Option<&'a Value> {
    match current {
        Value::Array(arr) => arr.get(step.as_index()?),
        Value::Object(map) => map.get(step.as_key().as_ref()),
        _ => None,
    }
}

fn step_in_mut<'a>(current: &'a mut Value, step: &PathStep) -> Option<&'a mut Value> {
    match current {
        Value::Array(arr) => arr.get_mut(step.as_index()?),
        Value::Object(map) => map.get_mut(step.as_key().as_ref()),
        _ => None,
    }
}

/// Get a value from a stat-data document by path.
pub fn get<'a>(val: &'a Value, path: &[PathStep]) -> Option<&'a Value> {
    path.iter().try_fold(val, step_in)
}

/// Get a mutable reference to a value in a stat-data document by path.
pub fn get_mut<'a>(val: &'a mut Value, path: &[PathStep]) -> Option<&'a mut Value> {
    let mut current = val;
    for step in path {
        current = step_in_mut(current, step)?;
    }
    Some(current)
}

/// Check whether a path currently resolves to a value.
pub fn exists(val: &Value, path: &[PathStep]) -> bool {
    get(val, path).is_some()
}

/// Length of the longest prefix of `path` that resolves in `val`.
pub fn resolved_prefix_len(val: &Value, path: &[PathStep]) -> usize {
    let mut current = val;
    for (depth, step) in path.iter().enumerate() {
        match step_in(current, step) {
            Some(next) => current = next,
            None => return depth,
        }
    }
    path.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_path;
    use serde_json::json;

    #[test]
    fn test_get_nested() {
        let doc = json!({"a": {"b": [10, 20, {"c": true}]}});
        assert_eq!(get(&doc, &parse_path("a.b[1]").unwrap()), Some(&json!(20)));
        assert_eq!(get(&doc, &parse_path("a.b[2].c").unwrap()), Some(&json!(true)));
        assert_eq!(get(&doc, &parse_path("a.b[9]").unwrap()), None);
        assert_eq!(get(&doc, &parse_path("").unwrap()), Some(&doc));
    }

    #[test]
    fn test_index_step_on_object_reads_key() {
        let doc = json!({"0": "zero"});
        assert_eq!(get(&doc, &[PathStep::Index(0)]), Some(&json!("zero")));
    }

    #[test]
    fn test_key_step_on_array_reads_index() {
        let doc = json!(["x", "y"]);
        assert_eq!(get(&doc, &[PathStep::from("1")]), Some(&json!("y")));
        assert_eq!(get(&doc, &[PathStep::from("one")]), None);
    }

    #[test]
    fn test_get_mut() {
        let mut doc = json!({"a": [1, 2]});
        *get_mut(&mut doc, &parse_path("a[0]").unwrap()).unwrap() = json!(5);
        assert_eq!(doc, json!({"a": [5, 2]}));
    }

    #[test]
    fn test_resolved_prefix_len() {
        let doc = json!({"a": {"b": 1}});
        assert_eq!(resolved_prefix_len(&doc, &parse_path("a.b").unwrap()), 2);
        assert_eq!(resolved_prefix_len(&doc, &parse_path("a.x.y").unwrap()), 1);
        assert_eq!(resolved_prefix_len(&doc, &parse_path("a.b.c").unwrap()), 2);
    }
}
