//! Structural merge for order metadata

use serde_json::Value;

/// Merge `patch` into `target`.
///
/// Objects merge key by key, recursively. Any other value in `patch`
/// replaces the one in `target`. Keys absent from `patch` are kept, and a
/// `null` in `patch` is ignored rather than erasing data.
pub fn deep_merge(target: &mut Value, patch: Value) {
    match (target, patch) {
        (_, Value::Null) => {}
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        if !value.is_null() {
                            base.insert(key, value);
                        }
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unrelated_keys_survive() {
        let mut meta = json!({
            "custom": { "note": "fragile" },
            "lastStatusUpdate": { "status": "ACCEPTED", "webhookId": "W-1" }
        });
        deep_merge(
            &mut meta,
            json!({ "lastStatusUpdate": { "status": "READY", "webhookId": "W-2" } }),
        );
        assert_eq!(meta["custom"]["note"], "fragile");
        assert_eq!(meta["lastStatusUpdate"]["status"], "READY");
    }

    #[test]
    fn nested_objects_merge_recursively() {
        let mut meta = json!({ "provider": { "partnerId": 7, "courier": { "name": "A" } } });
        deep_merge(
            &mut meta,
            json!({ "provider": { "courier": { "phone": "555" } } }),
        );
        assert_eq!(meta["provider"]["partnerId"], 7);
        assert_eq!(meta["provider"]["courier"]["name"], "A");
        assert_eq!(meta["provider"]["courier"]["phone"], "555");
    }

    #[test]
    fn null_patch_values_are_ignored() {
        let mut meta = json!({ "reason": "late" });
        deep_merge(&mut meta, json!({ "reason": null, "extra": null }));
        assert_eq!(meta, json!({ "reason": "late" }));
    }

    #[test]
    fn non_object_target_is_replaced() {
        let mut meta = Value::Null;
        deep_merge(&mut meta, json!({ "a": 1 }));
        assert_eq!(meta, json!({ "a": 1 }));
    }
}
