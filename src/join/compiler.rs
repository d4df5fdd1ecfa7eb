//! Query compilation
//!
//! Walks a [`CompositeKeyIndex`] to produce the exact-match key tuples and,
//! aligned index-for-index, the per-position value lists used for the cheap
//! set-membership pre-filter. The tuple list is then paged into [`Batch`]es
//! so that no lookup exceeds the store's practical request size.
//!
//! A batch refines candidates in a fixed order: membership constraints
//! first, the tuple disjunction second, the extra filter last.

use serde_json::{json, Map, Value};

use super::accessor::{literals, lookup_path};
use super::index::CompositeKeyIndex;
use crate::store::{Filter, Projection};

/// Tuples and membership domains compiled from an index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledLookup {
    /// Right-hand field path per key position
    pub right_keys: Vec<String>,
    /// Values per key position, appended in tuple order (may repeat)
    pub domains: Vec<Vec<Value>>,
    /// Exact-match key tuples
    pub tuples: Vec<Vec<Value>>,
}

impl CompiledLookup {
    /// Number of exact tuples
    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    /// Returns true if there is nothing to look up
    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }
}

/// Compile an index into exact tuples and membership domains
pub fn compile(index: &CompositeKeyIndex, right_keys: &[String]) -> CompiledLookup {
    let mut compiled = CompiledLookup {
        right_keys: right_keys.to_vec(),
        domains: vec![Vec::new(); right_keys.len()],
        tuples: Vec::new(),
    };

    if index.arity() != right_keys.len() {
        return compiled;
    }

    index.for_each_tuple(|path, _| {
        let tuple: Vec<Value> = path.iter().map(|value| (*value).clone()).collect();
        for (domain, value) in compiled.domains.iter_mut().zip(&tuple) {
            domain.push(value.clone());
        }
        compiled.tuples.push(tuple);
    });

    compiled
}

/// Split compiled tuples into pages of `page_size` tuples.
///
/// Domains are sliced with the same bounds so every batch constrains exactly
/// the values of its own tuples. A zero page size is treated as one.
pub fn paginate(
    compiled: &CompiledLookup,
    page_size: usize,
    filter: Option<&Filter>,
    projection: Option<&Projection>,
) -> Vec<Batch> {
    let page_size = page_size.max(1);
    let filter = filter.filter(|f| !f.is_empty()).cloned();

    (0..compiled.tuples.len())
        .step_by(page_size)
        .map(|from| {
            let to = (from + page_size).min(compiled.tuples.len());
            Batch {
                right_keys: compiled.right_keys.clone(),
                domains: compiled
                    .domains
                    .iter()
                    .map(|domain| domain[from..to].to_vec())
                    .collect(),
                tuples: compiled.tuples[from..to].to_vec(),
                filter: filter.clone(),
                projection: projection.cloned(),
            }
        })
        .collect()
}

/// One page of lookup constraints
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    right_keys: Vec<String>,
    domains: Vec<Vec<Value>>,
    tuples: Vec<Vec<Value>>,
    filter: Option<Filter>,
    projection: Option<Projection>,
}

impl Batch {
    /// Right-hand field path per key position
    pub fn right_keys(&self) -> &[String] {
        &self.right_keys
    }

    /// Allowed values per key position
    pub fn domains(&self) -> &[Vec<Value>] {
        &self.domains
    }

    /// Exact-match tuples of this page
    pub fn tuples(&self) -> &[Vec<Value>] {
        &self.tuples
    }

    /// Extra filter, applied last
    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Fields the store should return
    pub fn projection(&self) -> Option<&Projection> {
        self.projection.as_ref()
    }

    /// Evaluate the batch against a document.
    ///
    /// A document field that resolves to an array matches a constraint when
    /// any of its elements does.
    pub fn matches(&self, doc: &Value) -> bool {
        let Some(keys) = self
            .right_keys
            .iter()
            .map(|path| lookup_path(doc, path))
            .collect::<Option<Vec<Value>>>()
        else {
            return false;
        };

        let in_domains = keys
            .iter()
            .zip(&self.domains)
            .all(|(key, domain)| literals(key).into_iter().any(|v| domain.contains(v)));
        if !in_domains {
            return false;
        }

        let in_tuples = self.tuples.iter().any(|tuple| {
            tuple
                .iter()
                .zip(&keys)
                .all(|(expected, key)| literals(key).contains(&expected))
        });
        if !in_tuples {
            return false;
        }

        self.filter.as_ref().map_or(true, |filter| filter.matches(doc))
    }

    /// Render the batch as a document-store aggregation pipeline
    pub fn describe(&self) -> Value {
        let mut membership = Map::new();
        for (key, domain) in self.right_keys.iter().zip(&self.domains) {
            membership.insert(key.clone(), json!({ "$in": domain }));
        }

        let disjunction: Vec<Value> = self
            .tuples
            .iter()
            .map(|tuple| {
                let mut clause = Map::new();
                for (key, value) in self.right_keys.iter().zip(tuple) {
                    clause.insert(key.clone(), value.clone());
                }
                Value::Object(clause)
            })
            .collect();

        let mut stages = vec![
            json!({ "$match": membership }),
            json!({ "$match": { "$or": disjunction } }),
        ];
        if let Some(filter) = &self.filter {
            stages.push(json!({ "$match": filter.to_store_query() }));
        }
        if let Some(projection) = &self.projection {
            let fields: Map<String, Value> = projection
                .fields()
                .iter()
                .map(|field| (field.clone(), json!(1)))
                .collect();
            stages.push(json!({ "$project": fields }));
        }
        Value::Array(stages)
    }
}
