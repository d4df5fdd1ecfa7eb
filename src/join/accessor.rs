//! Key accessor resolution
//!
//! A key is either a dotted field path or a caller-supplied extraction
//! function. Paths are resolved into accessors that fan out through arrays:
//! when the traversal meets an array with path segments still left, every
//! element is resolved with the remaining segments and the results are
//! concatenated (one level of flattening).
//!
//! Missing segments, non-object parents and trailing `null` all resolve to
//! absent (`None`). Resolution never fails.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Extraction function signature
pub type AccessorFn = dyn Fn(&Value) -> Option<Value> + Send + Sync;

/// A pure function from a record to its key value
#[derive(Clone)]
pub struct Accessor {
    label: String,
    extract: Arc<AccessorFn>,
}

impl Accessor {
    /// Build an accessor from a dotted path such as `customer.address.zip`
    pub fn from_path(path: &str) -> Self {
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        Self {
            label: path.to_string(),
            extract: Arc::new(move |record| traverse(record, &segments)),
        }
    }

    /// Wrap a custom extraction function
    pub fn from_fn<F>(label: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            extract: Arc::new(f),
        }
    }

    /// Resolve a key specification. Custom accessors are returned unchanged.
    pub fn resolve(spec: &KeySpec) -> Self {
        match spec {
            KeySpec::Path(path) => Self::from_path(path),
            KeySpec::Custom(accessor) => accessor.clone(),
        }
    }

    /// Evaluate against a record
    pub fn get(&self, record: &Value) -> Option<Value> {
        (self.extract)(record)
    }

    /// Path or label used for diagnostics
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor").field("label", &self.label).finish()
    }
}

/// Key specification: dotted path or extraction function
#[derive(Debug, Clone)]
pub enum KeySpec {
    Path(String),
    Custom(Accessor),
}

impl KeySpec {
    /// Create a custom key from a closure
    pub fn custom<F>(label: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        Self::Custom(Accessor::from_fn(label, f))
    }

    /// Path or label used for diagnostics
    pub fn label(&self) -> &str {
        match self {
            Self::Path(path) => path,
            Self::Custom(accessor) => accessor.label(),
        }
    }

    /// Returns true for an empty path (never resolvable)
    pub fn is_empty_path(&self) -> bool {
        matches!(self, Self::Path(path) if path.trim().is_empty())
    }
}

impl From<&str> for KeySpec {
    fn from(path: &str) -> Self {
        Self::Path(path.to_string())
    }
}

impl From<String> for KeySpec {
    fn from(path: String) -> Self {
        Self::Path(path)
    }
}

impl From<Accessor> for KeySpec {
    fn from(accessor: Accessor) -> Self {
        Self::Custom(accessor)
    }
}

/// Resolve a dotted path against a value without building an accessor
pub fn lookup_path(record: &Value, path: &str) -> Option<Value> {
    let segments: Vec<String> = path.split('.').map(str::to_string).collect();
    traverse(record, &segments)
}

/// Expand a key value into the literals it stands for.
///
/// Arrays contribute each non-null element; scalars contribute themselves.
pub fn literals(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().filter(|v| !v.is_null()).collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn traverse(current: &Value, segments: &[String]) -> Option<Value> {
    let Some((head, rest)) = segments.split_first() else {
        return match current {
            Value::Null => None,
            other => Some(other.clone()),
        };
    };

    match current {
        Value::Array(items) => {
            let mut fanned = Vec::new();
            for item in items {
                match traverse(item, segments) {
                    Some(Value::Array(inner)) => fanned.extend(inner),
                    Some(value) => fanned.push(value),
                    None => {}
                }
            }
            Some(Value::Array(fanned))
        }
        Value::Object(map) => map.get(head).and_then(|next| traverse(next, rest)),
        _ => None,
    }
}
