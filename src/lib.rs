//! docjoin - composite-key hash joins over a document store
//!
//! Enriches an in-memory record set with documents from a store that has no
//! native multi-collection join, across a pipeline of sequential stages.
//!
//! - `join`: accessors, key index, query compiler, executor, merge, pipeline
//! - `store`: the store boundary, filters, and an in-memory store
//! - `observability`: JSON logging, metrics, stage hook
//! - `config`: engine defaults
//! - `cli`: command-line surface

pub mod cli;
pub mod config;
pub mod join;
pub mod observability;
pub mod store;
