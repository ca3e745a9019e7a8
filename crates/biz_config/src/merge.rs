//! Recursive JSON merge
//!
//! The override layers are sparse JSON trees; resolution folds them onto the
//! built-in defaults. Objects merge key-wise, arrays merge index-wise (the
//! longer side keeps its tail), and any other pairing lets the later value
//! win, `null` included.

use serde_json::Value;

/// Merges `overlay` onto `base`, consuming both.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (Value::Array(base_items), Value::Array(overlay_items)) => {
            let mut base_iter = base_items.into_iter();
            let mut merged: Vec<Value> = overlay_items
                .into_iter()
                .map(|overlay_item| match base_iter.next() {
                    Some(base_item) => deep_merge(base_item, overlay_item),
                    None => overlay_item,
                })
                .collect();
            merged.extend(base_iter);
            Value::Array(merged)
        }
        (_, overlay) => overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn later_scalars_win() {
        let merged = deep_merge(json!({"a": 1, "b": 1}), json!({"b": 2, "c": 2}));
        assert_eq!(merged, json!({"a": 1, "b": 2, "c": 2}));
    }

    #[test]
    fn nested_objects_merge_key_wise() {
        let base = json!({"premium": {"calculateMode": "formula", "minimum": 0.1}});
        let overlay = json!({"premium": {"calculateMode": "fixed", "fixed": 50}});
        assert_eq!(
            deep_merge(base, overlay),
            json!({"premium": {"calculateMode": "fixed", "fixed": 50, "minimum": 0.1}})
        );
    }

    #[test]
    fn arrays_merge_index_wise() {
        let base = json!({"ranges": [{"start": 0, "end": 10}, {"start": 11, "end": 365}]});
        let overlay = json!({"ranges": [{"end": 5}]});
        assert_eq!(
            deep_merge(base, overlay),
            json!({"ranges": [{"start": 0, "end": 5}, {"start": 11, "end": 365}]})
        );
    }

    #[test]
    fn overlay_array_tail_is_kept() {
        let merged = deep_merge(json!([1, 2]), json!([9, 8, 7]));
        assert_eq!(merged, json!([9, 8, 7]));
    }

    #[test]
    fn null_overwrites() {
        let merged = deep_merge(json!({"a": {"b": 1}}), json!({"a": null}));
        assert_eq!(merged, json!({"a": null}));
    }

    #[test]
    fn merge_is_deterministic() {
        let base = json!({"x": {"y": [1, 2, 3]}, "z": true});
        let overlay = json!({"x": {"y": [4]}, "w": "s"});
        let a = deep_merge(base.clone(), overlay.clone());
        let b = deep_merge(base, overlay);
        assert_eq!(a, b);
    }
}
