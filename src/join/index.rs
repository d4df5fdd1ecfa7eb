//! Composite key index
//!
//! A tree with one level per composite-key position. Each node carries the
//! literal key value that reached it (its tag); leaves hold the positions of
//! the left-hand records that produced the full key tuple.
//!
//! # Invariants
//!
//! - A record with any absent key position contributes nothing.
//! - A position appears at most once per leaf.
//! - Tags are never lost; query compilation rebuilds tuples from them.

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;

use super::accessor::{literals, Accessor};

/// Node of the composite key index
#[derive(Debug, Clone, PartialEq)]
pub enum KeyIndexNode {
    /// Internal node for a non-final key position
    Branch {
        tag: Value,
        children: BTreeMap<String, KeyIndexNode>,
    },
    /// Final key position: originating record positions
    Leaf { tag: Value, positions: Vec<usize> },
}

impl KeyIndexNode {
    /// The literal key value this node represents
    pub fn tag(&self) -> &Value {
        match self {
            Self::Branch { tag, .. } | Self::Leaf { tag, .. } => tag,
        }
    }

    fn empty(tag: &Value, leaf: bool) -> Self {
        if leaf {
            Self::Leaf {
                tag: tag.clone(),
                positions: Vec::new(),
            }
        } else {
            Self::Branch {
                tag: tag.clone(),
                children: BTreeMap::new(),
            }
        }
    }
}

/// Map key for a literal. Compact JSON keeps `1` and `"1"` apart.
pub fn literal_key(value: &Value) -> String {
    value.to_string()
}

/// Index from composite key tuples to record positions
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeKeyIndex {
    arity: usize,
    roots: BTreeMap<String, KeyIndexNode>,
    indexed_records: usize,
}

impl CompositeKeyIndex {
    /// Creates an empty index for keys of the given arity
    pub fn new(arity: usize) -> Self {
        Self {
            arity,
            roots: BTreeMap::new(),
            indexed_records: 0,
        }
    }

    /// Builds an index over a working record set
    pub fn build(records: &[Value], accessors: &[Accessor]) -> Self {
        let mut index = Self::new(accessors.len());
        for (position, record) in records.iter().enumerate() {
            index.insert(record, position, accessors);
        }
        index
    }

    /// Inserts one record under every key tuple it produces.
    ///
    /// All accessors are evaluated first; if any is absent the record is
    /// skipped entirely. Array values fan out into one branch per element.
    pub fn insert(&mut self, record: &Value, position: usize, accessors: &[Accessor]) {
        if accessors.is_empty() || accessors.len() != self.arity {
            return;
        }

        let Some(values) = accessors
            .iter()
            .map(|accessor| accessor.get(record))
            .collect::<Option<Vec<Value>>>()
        else {
            return;
        };

        if insert_at(&mut self.roots, &values, 0, position) {
            self.indexed_records += 1;
        }
    }

    /// Positions stored at the leaf reached by an exact key path
    pub fn positions(&self, path: &[Value]) -> Option<&[usize]> {
        if path.len() != self.arity || path.is_empty() {
            return None;
        }

        let mut children = &self.roots;
        for (depth, literal) in path.iter().enumerate() {
            match children.get(&literal_key(literal))? {
                KeyIndexNode::Leaf { positions, .. } if depth + 1 == self.arity => {
                    return Some(positions.as_slice());
                }
                KeyIndexNode::Branch { children: next, .. } => children = next,
                KeyIndexNode::Leaf { .. } => return None,
            }
        }
        None
    }

    /// Positions matching a key whose values may themselves be arrays.
    ///
    /// Each array value is expanded into its elements; the union of the
    /// reached leaves is returned without duplicates, in leaf order.
    pub fn matching_positions(&self, key: &[Value]) -> Vec<usize> {
        let mut found = Vec::new();
        if key.len() != self.arity || key.is_empty() {
            return found;
        }

        // a single leaf holds no duplicates
        let single_leaf = key.iter().all(|value| literals(value).len() <= 1);
        let mut seen = if single_leaf { None } else { Some(HashSet::new()) };
        collect_matching(&self.roots, key, 0, &mut found, &mut seen);
        found
    }

    /// Depth-first walk over every complete key tuple.
    ///
    /// Visits tuples in deterministic (ordered map) order, passing the tag
    /// path and the leaf positions.
    pub fn for_each_tuple<F>(&self, mut visit: F)
    where
        F: FnMut(&[&Value], &[usize]),
    {
        let mut path = Vec::with_capacity(self.arity);
        walk(&self.roots, &mut path, &mut visit);
    }

    /// Key arity
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Number of records that produced at least one key tuple
    pub fn indexed_records(&self) -> usize {
        self.indexed_records
    }

    /// Number of distinct key tuples
    pub fn tuple_count(&self) -> usize {
        let mut count = 0;
        self.for_each_tuple(|_, _| count += 1);
        count
    }

    /// Returns true if no tuple has been indexed
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

fn insert_at(
    children: &mut BTreeMap<String, KeyIndexNode>,
    values: &[Value],
    depth: usize,
    position: usize,
) -> bool {
    let is_last = depth + 1 == values.len();
    let mut inserted = false;

    for literal in literals(&values[depth]) {
        let key = literal_key(literal);
        let node = children
            .entry(key.clone())
            .or_insert_with(|| KeyIndexNode::empty(literal, is_last));

        let reached_leaf = match node {
            // positions arrive in ascending order, so a repeat is always the last entry
            KeyIndexNode::Leaf { positions, .. } => {
                if positions.last() != Some(&position) {
                    positions.push(position);
                }
                true
            }
            KeyIndexNode::Branch { children, .. } => {
                insert_at(children, values, depth + 1, position)
            }
        };

        // an empty array further down leaves a dangling branch
        let dangling = matches!(node, KeyIndexNode::Branch { children, .. } if children.is_empty());
        if dangling {
            children.remove(&key);
        }
        inserted |= reached_leaf;
    }

    inserted
}

fn collect_matching(
    children: &BTreeMap<String, KeyIndexNode>,
    key: &[Value],
    depth: usize,
    found: &mut Vec<usize>,
    seen: &mut Option<HashSet<usize>>,
) {
    for literal in literals(&key[depth]) {
        match children.get(&literal_key(literal)) {
            Some(KeyIndexNode::Leaf { positions, .. }) if depth + 1 == key.len() => match seen.as_mut() {
                Some(seen) => found.extend(positions.iter().filter(|p| seen.insert(**p))),
                None => found.extend_from_slice(positions),
            },
            Some(KeyIndexNode::Branch { children: next, .. }) if depth + 1 < key.len() => {
                collect_matching(next, key, depth + 1, found, seen);
            }
            _ => {}
        }
    }
}

fn walk<'a, F>(children: &'a BTreeMap<String, KeyIndexNode>, path: &mut Vec<&'a Value>, visit: &mut F)
where
    F: FnMut(&[&Value], &[usize]),
{
    for node in children.values() {
        path.push(node.tag());
        match node {
            KeyIndexNode::Leaf { positions, .. } => visit(path.as_slice(), positions),
            KeyIndexNode::Branch { children, .. } => walk(children, path, visit),
        }
        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn accessors(paths: &[&str]) -> Vec<Accessor> {
        paths.iter().map(|p| Accessor::from_path(p)).collect()
    }

    #[test]
    fn test_single_key_scalar() {
        let records = vec![json!({"fk": 1}), json!({"fk": 2}), json!({"fk": 1})];
        let index = CompositeKeyIndex::build(&records, &accessors(&["fk"]));

        assert_eq!(index.positions(&[json!(1)]), Some(&[0, 2][..]));
        assert_eq!(index.positions(&[json!(2)]), Some(&[1][..]));
        assert_eq!(index.positions(&[json!(3)]), None);
        assert_eq!(index.tuple_count(), 2);
    }

    #[test]
    fn test_same_position_inserted_once() {
        let mut index = CompositeKeyIndex::new(1);
        let keys = accessors(&["fk"]);
        let record = json!({"fk": 7});

        index.insert(&record, 0, &keys);
        index.insert(&record, 0, &keys);

        assert_eq!(index.positions(&[json!(7)]), Some(&[0][..]));
    }

    #[test]
    fn test_repeated_array_element_inserted_once() {
        let records = vec![json!({"fk": [10, 10, 20]})];
        let index = CompositeKeyIndex::build(&records, &accessors(&["fk"]));

        assert_eq!(index.positions(&[json!(10)]), Some(&[0][..]));
        assert_eq!(index.positions(&[json!(20)]), Some(&[0][..]));
    }

    #[test]
    fn test_absent_key_is_skipped() {
        let records = vec![json!({"a": 1}), json!({"a": 2, "b": 3})];
        let index = CompositeKeyIndex::build(&records, &accessors(&["a", "b"]));

        assert_eq!(index.tuple_count(), 1);
        assert_eq!(index.indexed_records(), 1);
        assert_eq!(index.positions(&[json!(2), json!(3)]), Some(&[1][..]));
    }

    #[test]
    fn test_absent_later_key_inside_fan_out_indexes_nothing() {
        let records = vec![json!({"a": [1, 2, 3]})];
        let index = CompositeKeyIndex::build(&records, &accessors(&["a", "missing"]));

        assert!(index.is_empty());
        assert_eq!(index.indexed_records(), 0);
    }

    #[test]
    fn test_non_final_fan_out() {
        let records = vec![json!({"a": [1, 2], "b": "x"})];
        let index = CompositeKeyIndex::build(&records, &accessors(&["a", "b"]));

        assert_eq!(index.positions(&[json!(1), json!("x")]), Some(&[0][..]));
        assert_eq!(index.positions(&[json!(2), json!("x")]), Some(&[0][..]));
        assert_eq!(index.tuple_count(), 2);
    }

    #[test]
    fn test_fan_out_through_subdocuments() {
        let records = vec![json!({
            "payments": [{"id": "p1"}, {"id": "p2"}],
            "account": 9
        })];
        let index = CompositeKeyIndex::build(&records, &accessors(&["account", "payments.id"]));

        assert_eq!(index.positions(&[json!(9), json!("p1")]), Some(&[0][..]));
        assert_eq!(index.positions(&[json!(9), json!("p2")]), Some(&[0][..]));
    }

    #[test]
    fn test_literal_types_are_distinct() {
        let records = vec![json!({"fk": 1}), json!({"fk": "1"})];
        let index = CompositeKeyIndex::build(&records, &accessors(&["fk"]));

        assert_eq!(index.positions(&[json!(1)]), Some(&[0][..]));
        assert_eq!(index.positions(&[json!("1")]), Some(&[1][..]));
    }

    #[test]
    fn test_tags_preserved_through_walk() {
        let records = vec![json!({"a": "x", "b": 1}), json!({"a": "y", "b": 2})];
        let index = CompositeKeyIndex::build(&records, &accessors(&["a", "b"]));

        let mut tuples = Vec::new();
        index.for_each_tuple(|path, positions| {
            tuples.push((path.iter().map(|v| (*v).clone()).collect::<Vec<_>>(), positions.to_vec()));
        });

        assert_eq!(
            tuples,
            vec![
                (vec![json!("x"), json!(1)], vec![0]),
                (vec![json!("y"), json!(2)], vec![1]),
            ]
        );
    }

    #[test]
    fn test_matching_positions_fans_out_right_keys() {
        let records = vec![json!({"fk": 1}), json!({"fk": 2}), json!({"fk": [1, 2]})];
        let index = CompositeKeyIndex::build(&records, &accessors(&["fk"]));

        assert_eq!(index.matching_positions(&[json!([1, 2])]), vec![0, 2, 1]);
        assert_eq!(index.matching_positions(&[json!(3)]), Vec::<usize>::new());
        assert!(index.matching_positions(&[json!(1), json!(2)]).is_empty());
    }

    #[test]
    fn test_shared_key_scales_linearly() {
        let records: Vec<Value> = (0..50_000).map(|_| json!({"fk": 1})).collect();
        let started = std::time::Instant::now();

        let index = CompositeKeyIndex::build(&records, &accessors(&["fk"]));
        let matched = index.matching_positions(&[json!(1)]);
        let fanned = index.matching_positions(&[json!([1, 1, 2])]);

        assert_eq!(index.positions(&[json!(1)]).map(<[usize]>::len), Some(50_000));
        assert_eq!(matched.len(), 50_000);
        assert_eq!(fanned.len(), 50_000);
        assert_eq!(matched.first(), Some(&0));
        assert_eq!(matched.last(), Some(&49_999));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn test_repeated_non_final_element_inserted_once() {
        let records = vec![json!({"a": [1, 2, 1], "b": "x"})];
        let index = CompositeKeyIndex::build(&records, &accessors(&["a", "b"]));

        assert_eq!(index.positions(&[json!(1), json!("x")]), Some(&[0][..]));
        assert_eq!(index.matching_positions(&[json!([1, 2]), json!("x")]), vec![0]);
    }
}
