//! Initial fetch request and projection

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::filter::Filter;

/// Top-level fields to keep in returned documents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Projection {
    fields: Vec<String>,
}

impl Projection {
    /// Create a projection over the given top-level fields
    pub fn new(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut projection = Self::default();
        for field in fields {
            projection.include(field);
        }
        projection
    }

    /// Add a field; dotted paths keep their root field
    pub fn include(&mut self, field: impl Into<String>) {
        let field = field.into();
        let root = field.split('.').next().unwrap_or_default().to_string();
        if !root.is_empty() && !self.fields.contains(&root) {
            self.fields.push(root);
        }
    }

    /// Kept fields in declaration order
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Apply to a document. Non-object documents pass through unchanged.
    pub fn apply(&self, doc: &Value) -> Value {
        let Value::Object(map) = doc else {
            return doc.clone();
        };

        let mut projected = Map::new();
        for field in &self.fields {
            if let Some(value) = map.get(field) {
                projected.insert(field.clone(), value.clone());
            }
        }
        Value::Object(projected)
    }
}

/// Options for the initial fetch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOptions {
    /// Documents to skip before collecting
    #[serde(default)]
    pub skip: usize,

    /// Maximum documents to return
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Initial fetch request: filter, shape and options for one collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchSpec {
    pub collection: String,

    #[serde(default)]
    pub filter: Filter,

    #[serde(default)]
    pub projection: Option<Projection>,

    #[serde(default)]
    pub options: FetchOptions,
}

impl FetchSpec {
    /// Fetch every document of a collection
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: Filter::all(),
            projection: None,
            options: FetchOptions::default(),
        }
    }

    /// Set the filter
    pub fn filter(mut self, filter: impl Into<Filter>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Set the projection
    pub fn projection(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    /// Skip the first `skip` matches
    pub fn skip(mut self, skip: usize) -> Self {
        self.options.skip = skip;
        self
    }

    /// Cap the number of returned documents
    pub fn limit(mut self, limit: usize) -> Self {
        self.options.limit = Some(limit);
        self
    }
}
