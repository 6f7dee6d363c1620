//! Merge/collapse of values gathered from several roots, and keyed list updates.

use indexmap::IndexMap;
use serde_json::Value;

use crate::path::{broadcast, DocPath};
use crate::utils::{MappingError, Result};

/// Gather `search` under every root and flatten the hits into one list.
///
/// Roots are visited in order. A list result is spliced in (one level only:
/// lists inside it stay as elements), any other value is appended as a single
/// element, and a missing root or a `null` hit contributes nothing.
pub fn merge_collapse(document: &Value, roots: &[DocPath], search: &DocPath) -> Vec<Value> {
    let mut combined = Vec::new();
    for root in roots {
        match broadcast(document, root, search) {
            None | Some(Value::Null) => {
                tracing::trace!(root = %root, search = %search, "merge root contributes nothing");
            }
            Some(Value::Array(items)) => combined.extend(items),
            Some(value) => combined.push(value),
        }
    }
    combined
}

/// Update a list of records keyed by `key`.
///
/// Records from `new` replace records in `old` with an equal key and keep the
/// position where that key was first seen; unseen keys are appended.
pub fn merge_by_key(key: &str, old: &[Value], new: &[Value]) -> Result<Vec<Value>> {
    let mut lookup: IndexMap<String, Value> = IndexMap::new();
    for record in old.iter().chain(new) {
        let id = record.get(key).ok_or_else(|| MappingError::MissingMergeKey {
            key: key.to_string(),
        })?;
        lookup.insert(id.to_string(), record.clone());
    }
    Ok(lookup.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paths(raw: &[&str]) -> Vec<DocPath> {
        raw.iter().map(|r| DocPath::new(r)).collect()
    }

    #[test]
    fn test_root_order_splice_then_append() {
        let doc = json!({"a": {"x": [1, 2]}, "b": {"x": 3}});
        assert_eq!(
            merge_collapse(&doc, &paths(&["a", "b"]), &DocPath::new("x")),
            vec![json!(1), json!(2), json!(3)]
        );
    }

    #[test]
    fn test_missing_root_contributes_nothing() {
        let doc = json!({"a": {"x": [1]}});
        assert_eq!(
            merge_collapse(&doc, &paths(&["a", "missing"]), &DocPath::new("x")),
            vec![json!(1)]
        );
    }

    #[test]
    fn test_scalar_strings_are_collected() {
        let doc = json!({
            "items": {"identical": "value to be combined"},
            "items2": {"identical": "second value to be combined"}
        });
        assert_eq!(
            merge_collapse(&doc, &paths(&["items", "items2"]), &DocPath::new("identical")),
            vec![json!("value to be combined"), json!("second value to be combined")]
        );
    }

    #[test]
    fn test_mapping_hit_appended_whole() {
        let doc = json!({"a": {"addr": {"city": "Boca"}}});
        assert_eq!(
            merge_collapse(&doc, &paths(&["a"]), &DocPath::new("addr")),
            vec![json!({"city": "Boca"})]
        );
    }

    #[test]
    fn test_null_hit_contributes_nothing() {
        let doc = json!({"a": {"x": null}, "b": {"x": 1}});
        assert_eq!(
            merge_collapse(&doc, &paths(&["a", "b"]), &DocPath::new("x")),
            vec![json!(1)]
        );
    }

    #[test]
    fn test_list_roots_broadcast() {
        let doc = json!({
            "line_items": {
                "physical_items": [{"sku": "085423"}, {"sku": "130622"}],
                "digital_items": [{"sku": "721312"}],
                "gift_certificates": []
            }
        });
        let roots = paths(&[
            "line_items.physical_items",
            "line_items.digital_items",
            "line_items.gift_certificates",
            "line_items.custom_items",
        ]);
        assert_eq!(
            merge_collapse(&doc, &roots, &DocPath::new("sku")),
            vec![json!("085423"), json!("130622"), json!("721312")]
        );
    }

    #[test]
    fn test_empty_search_merges_root_lists() {
        let doc = json!({"physical": [{"id": 1}], "digital": [{"id": 2}, {"id": 3}]});
        assert_eq!(
            merge_collapse(&doc, &paths(&["physical", "digital"]), &DocPath::root()),
            vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})]
        );
    }

    #[test]
    fn test_flattens_one_level_only() {
        let doc = json!({
            "a": [{"discounts": [1, 2]}, {"discounts": [3]}],
            "b": {"discounts": [[4, 5]]}
        });
        assert_eq!(
            merge_collapse(&doc, &paths(&["a", "b"]), &DocPath::new("discounts")),
            vec![json!([1, 2]), json!([3]), json!([4, 5])]
        );
    }

    #[test]
    fn test_merge_by_key_updates_in_place() {
        let old = vec![
            json!({"id": 1, "street": "Fulton Rd."}),
            json!({"id": 2, "street": "Maverick Dr."}),
        ];
        let new = vec![
            json!({"id": 2, "street": "Fulton Cir."}),
            json!({"id": 3, "street": "Main St."}),
        ];
        assert_eq!(
            merge_by_key("id", &old, &new).unwrap(),
            vec![
                json!({"id": 1, "street": "Fulton Rd."}),
                json!({"id": 2, "street": "Fulton Cir."}),
                json!({"id": 3, "street": "Main St."}),
            ]
        );
    }

    #[test]
    fn test_merge_by_key_distinguishes_key_types() {
        let old = vec![json!({"id": 1, "v": "number"})];
        let new = vec![json!({"id": "1", "v": "string"})];
        assert_eq!(merge_by_key("id", &old, &new).unwrap().len(), 2);
    }

    #[test]
    fn test_merge_by_key_missing_key() {
        let err = merge_by_key("id", &[json!({"name": "x"})], &[]).unwrap_err();
        assert!(matches!(err, MappingError::MissingMergeKey { key } if key == "id"));
    }

    #[test]
    fn test_merge_by_key_empty() {
        assert!(merge_by_key("id", &[], &[]).unwrap().is_empty());
    }
}
