//! Document store boundary
//!
//! The join engine needs exactly two capabilities from a store:
//!
//! 1. `fetch`: run an initial filter/shape request and return a
//!    materialized list of documents.
//! 2. `lookup`: run one compiled [`Batch`] (set-membership constraints, an
//!    exact-tuple disjunction and an optional extra filter) and return every
//!    matching document.
//!
//! Lookups are issued concurrently; implementations must be `Send + Sync`
//! and must not drop matches.

mod errors;
mod fetch;
mod filter;
mod memory;

pub use errors::{StoreError, StoreResult};
pub use fetch::{FetchOptions, FetchSpec, Projection};
pub use filter::{Filter, FilterExpr, FilterOperator};
pub use memory::MemoryStore;

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::join::Batch;

/// Boxed future returned by store operations
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

/// Capabilities the join engine requires from a document store
pub trait DocumentStore: Send + Sync {
    /// Initial fetch
    fn fetch<'a>(&'a self, spec: &'a FetchSpec) -> StoreFuture<'a, Vec<Value>>;

    /// Disjunctive batch lookup against `collection`
    fn lookup<'a>(&'a self, collection: &'a str, batch: &'a Batch) -> StoreFuture<'a, Vec<Value>>;
}
