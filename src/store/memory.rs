//! In-memory document store
//!
//! Holds collections as JSON arrays in insertion order and evaluates
//! fetches and batch lookups exactly as a remote store would. Used by the
//! CLI (loaded from a directory of `<collection>.json` files) and by tests.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use serde_json::Value;

use super::errors::{StoreError, StoreResult};
use super::fetch::FetchSpec;
use super::{DocumentStore, StoreFuture};
use crate::join::Batch;

/// Collections of JSON documents held in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Value>>>,
    /// Injected lookup failures by collection
    failures: RwLock<HashMap<String, String>>,
    fetches: AtomicU64,
    lookups: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style collection registration
    pub fn with_collection(self, name: impl Into<String>, documents: Vec<Value>) -> Self {
        self.insert_collection(name, documents);
        self
    }

    /// Replace (or create) a collection
    pub fn insert_collection(&self, name: impl Into<String>, documents: Vec<Value>) {
        if let Ok(mut collections) = self.collections.write() {
            collections.insert(name.into(), documents);
        }
    }

    /// Append one document to a collection, creating it if needed
    pub fn insert(&self, name: &str, document: Value) {
        if let Ok(mut collections) = self.collections.write() {
            collections.entry(name.to_string()).or_default().push(document);
        }
    }

    /// Make every lookup against `collection` fail with `message`
    pub fn fail_lookups(&self, collection: impl Into<String>, message: impl Into<String>) {
        if let Ok(mut failures) = self.failures.write() {
            failures.insert(collection.into(), message.into());
        }
    }

    /// Remove an injected failure
    pub fn clear_failure(&self, collection: &str) {
        if let Ok(mut failures) = self.failures.write() {
            failures.remove(collection);
        }
    }

    /// Load every `*.json` file in a directory as a collection named after
    /// the file stem. Each file must hold a JSON array.
    pub fn load_dir(dir: &Path) -> StoreResult<Self> {
        let store = Self::new();
        let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<Result<_, _>>()?;
        entries.sort_by_key(|entry| entry.path());

        for entry in entries {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let content = fs::read_to_string(&path)?;
            let documents = match serde_json::from_str::<Value>(&content)? {
                Value::Array(documents) => documents,
                _ => {
                    return Err(StoreError::Json(format!(
                        "{} must contain a JSON array",
                        path.display()
                    )))
                }
            };
            store.insert_collection(name, documents);
        }

        Ok(store)
    }

    /// Names of the loaded collections, sorted
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .collections
            .read()
            .map(|collections| collections.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Number of fetches served
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Number of batch lookups served (including failed ones)
    pub fn lookup_count(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    fn run_fetch(&self, spec: &FetchSpec) -> StoreResult<Vec<Value>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);

        let collections = self
            .collections
            .read()
            .map_err(|_| StoreError::backend("collection lock poisoned"))?;
        let documents = collections
            .get(&spec.collection)
            .ok_or_else(|| StoreError::UnknownCollection(spec.collection.clone()))?;

        let matching = documents
            .iter()
            .filter(|doc| spec.filter.matches(doc))
            .skip(spec.options.skip)
            .take(spec.options.limit.unwrap_or(usize::MAX));

        Ok(match &spec.projection {
            Some(projection) => matching.map(|doc| projection.apply(doc)).collect(),
            None => matching.cloned().collect(),
        })
    }

    fn run_lookup(&self, collection: &str, batch: &Batch) -> StoreResult<Vec<Value>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);

        if let Some(message) = self
            .failures
            .read()
            .ok()
            .and_then(|failures| failures.get(collection).cloned())
        {
            return Err(StoreError::Backend(message));
        }

        let collections = self
            .collections
            .read()
            .map_err(|_| StoreError::backend("collection lock poisoned"))?;
        let documents = collections
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;

        let matching = documents.iter().filter(|doc| batch.matches(doc));
        Ok(match batch.projection() {
            Some(projection) => matching.map(|doc| projection.apply(doc)).collect(),
            None => matching.cloned().collect(),
        })
    }
}

impl DocumentStore for MemoryStore {
    fn fetch<'a>(&'a self, spec: &'a FetchSpec) -> StoreFuture<'a, Vec<Value>> {
        Box::pin(async move { self.run_fetch(spec) })
    }

    fn lookup<'a>(&'a self, collection: &'a str, batch: &'a Batch) -> StoreFuture<'a, Vec<Value>> {
        Box::pin(async move {
            // yield so concurrent lookups interleave like remote calls
            tokio::task::yield_now().await;
            self.run_lookup(collection, batch)
        })
    }
}
