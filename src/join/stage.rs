//! Join stage specification
//!
//! A stage names the collection to join against, the composite key (left
//! key specs paired positionally with right field paths), the field that
//! receives matches, and how unmatched records are treated.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::accessor::KeySpec;
use super::errors::{JoinError, JoinResult};
use crate::store::{Filter, Projection};

/// Default number of exact tuples per lookup
pub const DEFAULT_PAGE_SIZE: usize = 25;

/// How records without a match are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    /// Keep every record; unmatched ones have no new field
    #[default]
    Left,
    /// Drop records that received no match
    Inner,
}

impl JoinType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinType::Left => "left",
            JoinType::Inner => "inner",
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-stage completion callback.
///
/// Receives the cumulative working set as it stands right after the stage,
/// or the error that aborted it.
pub type StageCallback = Arc<dyn Fn(Result<&[Value], &JoinError>) + Send + Sync>;

/// One join stage
#[derive(Clone)]
pub struct JoinStageSpec {
    pub collection: String,
    pub left_keys: Vec<KeySpec>,
    pub right_keys: Vec<String>,
    pub new_key: String,
    /// `None` falls back to the engine default
    pub join_type: Option<JoinType>,
    /// Extra filter, applied after the key constraints
    pub filter: Option<Filter>,
    /// Fields to fetch from joined documents; right keys are always added
    pub projection: Option<Projection>,
    /// `None` falls back to the engine default
    pub page_size: Option<usize>,
    pub callback: Option<StageCallback>,
}

impl JoinStageSpec {
    /// Start a stage against `collection`
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            left_keys: Vec::new(),
            right_keys: Vec::new(),
            new_key: String::new(),
            join_type: None,
            filter: None,
            projection: None,
            page_size: None,
            callback: None,
        }
    }

    /// Append a left key (path or custom accessor)
    pub fn left_key(mut self, key: impl Into<KeySpec>) -> Self {
        self.left_keys.push(key.into());
        self
    }

    /// Append several left keys
    pub fn left_keys<K: Into<KeySpec>>(mut self, keys: impl IntoIterator<Item = K>) -> Self {
        self.left_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Append a right field path
    pub fn right_key(mut self, key: impl Into<String>) -> Self {
        self.right_keys.push(key.into());
        self
    }

    /// Append several right field paths
    pub fn right_keys<K: Into<String>>(mut self, keys: impl IntoIterator<Item = K>) -> Self {
        self.right_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Field that receives the matched document(s)
    pub fn new_key(mut self, key: impl Into<String>) -> Self {
        self.new_key = key.into();
        self
    }

    pub fn join_type(mut self, join_type: JoinType) -> Self {
        self.join_type = Some(join_type);
        self
    }

    /// Shorthand for an inner join
    pub fn inner(self) -> Self {
        self.join_type(JoinType::Inner)
    }

    pub fn filter(mut self, filter: impl Into<Filter>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn projection(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Register a completion callback for this stage
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(Result<&[Value], &JoinError>) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Composite key arity
    pub fn arity(&self) -> usize {
        self.left_keys.len()
    }

    /// Projection sent to the store, widened with the right key roots
    pub fn effective_projection(&self) -> Option<Projection> {
        self.projection.clone().map(|mut projection| {
            for key in &self.right_keys {
                projection.include(key.as_str());
            }
            projection
        })
    }

    /// Check the stage shape. Runs before any store call.
    pub fn validate(&self) -> JoinResult<()> {
        if self.collection.trim().is_empty() {
            return Err(JoinError::shape("collection must not be empty"));
        }
        if self.left_keys.is_empty() {
            return Err(JoinError::shape(format!(
                "stage '{}' has no left keys",
                self.collection
            )));
        }
        if self.left_keys.len() != self.right_keys.len() {
            return Err(JoinError::shape(format!(
                "stage '{}' key arity mismatch: {} left keys, {} right keys",
                self.collection,
                self.left_keys.len(),
                self.right_keys.len()
            )));
        }
        if let Some(key) = self.left_keys.iter().find(|key| key.is_empty_path()) {
            return Err(JoinError::shape(format!(
                "stage '{}' has an empty left key '{}'",
                self.collection,
                key.label()
            )));
        }
        if self.right_keys.iter().any(|key| key.trim().is_empty()) {
            return Err(JoinError::shape(format!(
                "stage '{}' has an empty right key",
                self.collection
            )));
        }
        if self.new_key.trim().is_empty() {
            return Err(JoinError::shape(format!(
                "stage '{}' has no new key",
                self.collection
            )));
        }
        if self.page_size == Some(0) {
            return Err(JoinError::shape(format!(
                "stage '{}' page size must be > 0",
                self.collection
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for JoinStageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinStageSpec")
            .field("collection", &self.collection)
            .field("left_keys", &self.left_keys)
            .field("right_keys", &self.right_keys)
            .field("new_key", &self.new_key)
            .field("join_type", &self.join_type)
            .field("filter", &self.filter)
            .field("projection", &self.projection)
            .field("page_size", &self.page_size)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// One key or a list of keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(key) => vec![key],
            OneOrMany::Many(keys) => keys,
        }
    }
}

/// Serializable stage description (plan files, CLI).
///
/// Accepts both snake_case and the camelCase option names
/// (`leftKeys`/`leftKey`, `rightKeys`/`rightKey`, `joinQuery`, `joinType`,
/// `newKey`, `pageSize`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagePlan {
    #[serde(alias = "joinCollection")]
    pub collection: String,

    #[serde(alias = "leftKeys", alias = "leftKey", alias = "left_key")]
    pub left_keys: OneOrMany,

    #[serde(
        alias = "rightKeys",
        alias = "rightKey",
        alias = "right_key",
        alias = "rightKeyPropertyPaths"
    )]
    pub right_keys: OneOrMany,

    #[serde(alias = "newKey")]
    pub new_key: String,

    #[serde(default, alias = "joinType")]
    pub join_type: Option<JoinType>,

    #[serde(default, alias = "joinQuery")]
    pub filter: Option<Filter>,

    #[serde(default, alias = "fields")]
    pub projection: Option<Projection>,

    #[serde(default, alias = "pageSize")]
    pub page_size: Option<usize>,
}

impl StagePlan {
    /// Convert into a stage specification and validate it
    pub fn into_spec(self) -> JoinResult<JoinStageSpec> {
        let mut spec = JoinStageSpec::new(self.collection)
            .left_keys(self.left_keys.into_vec())
            .right_keys(self.right_keys.into_vec())
            .new_key(self.new_key);
        spec.join_type = self.join_type;
        spec.filter = self.filter;
        spec.projection = self.projection;
        spec.page_size = self.page_size;
        spec.validate()?;
        Ok(spec)
    }
}
