//! Minimal merge patches
//!
//! Builds JSON merge patches (RFC 7386) that carry only what changed between
//! two versions of a record. Submitting a partial update instead of the whole
//! object leaves fields written concurrently by other actors alone.

use crate::node::Node;
use crate::Result;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Content type of the payloads produced here
pub const MERGE_PATCH_CONTENT_TYPE: &str = "application/merge-patch+json";

/// Compute a merge patch turning `original` into `modified`
///
/// Objects are compared key by key and recursively; keys missing from
/// `modified` become `null`; any other differing value is replaced whole.
/// Returns `None` when both values are structurally equal.
pub fn create_two_way_merge_patch(original: &Value, modified: &Value) -> Option<Value> {
    match (original, modified) {
        (Value::Object(orig), Value::Object(modi)) => {
            let mut patch = Map::new();

            for (key, new_value) in modi {
                match orig.get(key) {
                    None => {
                        patch.insert(key.clone(), new_value.clone());
                    }
                    Some(old_value) => {
                        if let Some(sub) = create_two_way_merge_patch(old_value, new_value) {
                            patch.insert(key.clone(), sub);
                        }
                    }
                }
            }

            for key in orig.keys() {
                if !modi.contains_key(key) {
                    patch.insert(key.clone(), Value::Null);
                }
            }

            (!patch.is_empty()).then_some(Value::Object(patch))
        }
        _ if original == modified => None,
        _ => Some(modified.clone()),
    }
}

/// Build the patch for a node whose labels were reconciled
///
/// Returns `Ok(None)` when the label mappings are structurally equal, in
/// which case nothing needs to be submitted.
pub fn build_node_patch(original: &Node, modified: &Node) -> Result<Option<Value>> {
    if original.labels() == modified.labels() {
        return Ok(None);
    }

    let original = serde_json::to_value(original)?;
    let modified = serde_json::to_value(modified)?;
    Ok(create_two_way_merge_patch(&original, &modified))
}

/// Label keys touched by a node patch
pub fn patched_label_keys(patch: &Value) -> BTreeSet<String> {
    patch
        .pointer("/metadata/labels")
        .and_then(Value::as_object)
        .map(|labels| labels.keys().cloned().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Frequency;
    use serde_json::json;

    #[test]
    fn test_equal_values_yield_no_patch() {
        let value = json!({ "a": 1, "b": { "c": [1, 2] } });
        assert_eq!(create_two_way_merge_patch(&value, &value), None);
    }

    #[test]
    fn test_nested_changes_only() {
        let original = json!({
            "metadata": { "name": "n1", "labels": { "keep": "x", "drop": "y" } },
            "spec": { "unschedulable": false }
        });
        let modified = json!({
            "metadata": { "name": "n1", "labels": { "keep": "x", "new": "true" } },
            "spec": { "unschedulable": false }
        });

        let patch = create_two_way_merge_patch(&original, &modified).unwrap();
        assert_eq!(
            patch,
            json!({ "metadata": { "labels": { "new": "true", "drop": null } } })
        );
    }

    #[test]
    fn test_scalar_and_array_replaced_whole() {
        let original = json!({ "list": [1, 2], "n": 1 });
        let modified = json!({ "list": [1, 3], "n": 1 });

        let patch = create_two_way_merge_patch(&original, &modified).unwrap();
        assert_eq!(patch, json!({ "list": [1, 3] }));
    }

    #[test]
    fn test_node_patch_skipped_when_labels_equal() {
        let node = Node::new("n1").with_label("zone", "a");
        assert!(build_node_patch(&node, &node.clone()).unwrap().is_none());
    }

    #[test]
    fn test_node_patch_touches_only_changed_labels() {
        let f1000 = Frequency::new(1000).unwrap();
        let f900 = Frequency::new(900).unwrap();
        let original = Node::new("n1")
            .with_tsc_frequency(f1000)
            .with_frequency_label(f900)
            .with_label("zone", "a");

        let mut modified = original.clone();
        modified.labels_mut().remove(&f900.to_label());
        modified.labels_mut().insert(f1000.to_label(), "true");

        let patch = build_node_patch(&original, &modified).unwrap().unwrap();

        let keys = patched_label_keys(&patch);
        let expected: BTreeSet<String> = [f1000.to_label(), f900.to_label()].into_iter().collect();
        assert_eq!(keys, expected);
        assert_eq!(patch["metadata"]["labels"][f900.to_label()], Value::Null);
        assert!(patch["metadata"].get("name").is_none());
    }
}
