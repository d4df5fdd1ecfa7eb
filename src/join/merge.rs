//! Merge and filter
//!
//! Splices returned documents back onto the originating records. Each
//! document is re-keyed with the right-hand accessors and routed through the
//! stage's composite key index to the positions that asked for it.
//!
//! Multiplicity rule for the new field: absent becomes the document, a
//! single document becomes `[old, new]`, an array gets the document appended.
//! Each returned copy attaches at most once per record; copies of the same
//! document from different batches each attach.

use serde::Serialize;
use serde_json::Value;

use super::accessor::Accessor;
use super::index::CompositeKeyIndex;
use super::stage::JoinType;

/// Counters from one merge pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    /// Documents attached to at least one record
    pub merged_documents: usize,
    /// Documents whose key reached no leaf
    pub unmatched_documents: usize,
    /// Attachments performed (document × record)
    pub attachments: usize,
    /// Records removed by an inner join
    pub removed_records: usize,
}

/// Merge `documents` into `records` under `new_key`.
///
/// Documents whose key cannot be resolved, or resolves to no leaf, are
/// skipped. With [`JoinType::Inner`] records left without the field are then
/// removed, preserving the relative order of the rest.
pub fn merge(
    records: &mut Vec<Value>,
    documents: Vec<Value>,
    index: &CompositeKeyIndex,
    right_accessors: &[Accessor],
    new_key: &str,
    join_type: JoinType,
) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();

    for document in documents {
        if document.is_null() {
            continue;
        }

        let positions = match right_accessors
            .iter()
            .map(|accessor| accessor.get(&document))
            .collect::<Option<Vec<Value>>>()
        {
            Some(key) => index.matching_positions(&key),
            None => Vec::new(),
        };

        let mut attached = 0;
        for position in positions {
            if let Some(record) = records.get_mut(position) {
                if attach(record, new_key, document.clone()) {
                    attached += 1;
                }
            }
        }

        if attached > 0 {
            outcome.merged_documents += 1;
            outcome.attachments += attached;
        } else {
            outcome.unmatched_documents += 1;
        }
    }

    if join_type == JoinType::Inner {
        let before = records.len();
        records.retain(|record| has_field(record, new_key));
        outcome.removed_records = before - records.len();
    }

    outcome
}

/// Attach one document to a record. Non-object records are left untouched.
fn attach(record: &mut Value, new_key: &str, document: Value) -> bool {
    let Value::Object(fields) = record else {
        return false;
    };

    let slot = fields.entry(new_key.to_string()).or_insert(Value::Null);
    if slot.is_null() {
        *slot = document;
    } else if let Value::Array(matches) = &mut *slot {
        matches.push(document);
    } else {
        let first = slot.take();
        *slot = Value::Array(vec![first, document]);
    }
    true
}

fn has_field(record: &Value, key: &str) -> bool {
    record.get(key).is_some_and(|value| !value.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn index_on(records: &[Value], path: &str) -> CompositeKeyIndex {
        CompositeKeyIndex::build(records, &[Accessor::from_path(path)])
    }

    #[test]
    fn test_single_match_is_scalar() {
        let mut records = vec![json!({"fk": 1})];
        let index = index_on(&records, "fk");

        let outcome = merge(
            &mut records,
            vec![json!({"pk": 1, "v": "a"})],
            &index,
            &[Accessor::from_path("pk")],
            "joined",
            JoinType::Left,
        );

        assert_eq!(records[0]["joined"], json!({"pk": 1, "v": "a"}));
        assert_eq!(outcome.merged_documents, 1);
        assert_eq!(outcome.attachments, 1);
    }

    #[test]
    fn test_two_matches_become_list_in_arrival_order() {
        let mut records = vec![json!({"fk": 1})];
        let index = index_on(&records, "fk");

        merge(
            &mut records,
            vec![json!({"pk": 1, "v": "a"}), json!({"pk": 1, "v": "b"})],
            &index,
            &[Accessor::from_path("pk")],
            "joined",
            JoinType::Left,
        );

        assert_eq!(
            records[0]["joined"],
            json!([{"pk": 1, "v": "a"}, {"pk": 1, "v": "b"}])
        );
    }

    #[test]
    fn test_third_match_appends() {
        let mut records = vec![json!({"fk": 1})];
        let index = index_on(&records, "fk");
        let docs = (0..3).map(|i| json!({"pk": 1, "i": i})).collect();

        merge(&mut records, docs, &index, &[Accessor::from_path("pk")], "j", JoinType::Left);

        assert_eq!(records[0]["j"].as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn test_unrelated_document_skipped() {
        let mut records = vec![json!({"fk": 1})];
        let index = index_on(&records, "fk");

        let outcome = merge(
            &mut records,
            vec![json!({"pk": 99}), json!({"other": 1})],
            &index,
            &[Accessor::from_path("pk")],
            "joined",
            JoinType::Left,
        );

        assert!(records[0].get("joined").is_none());
        assert_eq!(outcome.unmatched_documents, 2);
    }

    #[test]
    fn test_inner_join_removes_unmatched_in_order() {
        let mut records = vec![
            json!({"id": "a", "fk": 1}),
            json!({"id": "b", "fk": 2}),
            json!({"id": "c", "fk": 3}),
        ];
        let index = index_on(&records, "fk");

        let outcome = merge(
            &mut records,
            vec![json!({"pk": 3}), json!({"pk": 1})],
            &index,
            &[Accessor::from_path("pk")],
            "joined",
            JoinType::Inner,
        );

        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["id"], "a");
        assert_eq!(records[1]["id"], "c");
        assert_eq!(outcome.removed_records, 1);
    }

    #[test]
    fn test_left_join_keeps_unmatched_without_field() {
        let mut records = vec![json!({"fk": 1}), json!({"fk": 2})];
        let index = index_on(&records, "fk");

        merge(
            &mut records,
            vec![json!({"pk": 2})],
            &index,
            &[Accessor::from_path("pk")],
            "joined",
            JoinType::Left,
        );

        assert_eq!(records.len(), 2);
        assert!(records[0].get("joined").is_none());
        assert_eq!(records[1]["joined"], json!({"pk": 2}));
    }

    #[test]
    fn test_null_field_treated_as_absent() {
        let mut records = vec![json!({"fk": 1, "joined": null})];
        let index = index_on(&records, "fk");

        merge(
            &mut records,
            vec![json!({"pk": 1})],
            &index,
            &[Accessor::from_path("pk")],
            "joined",
            JoinType::Left,
        );

        assert_eq!(records[0]["joined"], json!({"pk": 1}));
    }

    #[test]
    fn test_array_right_key_single_copy_attaches_once() {
        let mut records = vec![json!({"fk": [1, 2]})];
        let index = index_on(&records, "fk");

        merge(
            &mut records,
            vec![json!({"pk": [1, 2]})],
            &index,
            &[Accessor::from_path("pk")],
            "joined",
            JoinType::Left,
        );

        assert_eq!(records[0]["joined"], json!({"pk": [1, 2]}));
    }

    #[test]
    fn test_composite_key_routing() {
        let mut records = vec![
            json!({"a": 1, "b": "x"}),
            json!({"a": 1, "b": "y"}),
        ];
        let accessors = [Accessor::from_path("a"), Accessor::from_path("b")];
        let index = CompositeKeyIndex::build(&records, &accessors);

        merge(
            &mut records,
            vec![json!({"ra": 1, "rb": "y"})],
            &index,
            &[Accessor::from_path("ra"), Accessor::from_path("rb")],
            "joined",
            JoinType::Inner,
        );

        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["b"], "y");
    }
}
