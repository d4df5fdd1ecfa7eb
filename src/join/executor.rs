//! Subquery executor
//!
//! Issues one lookup per batch concurrently and gathers the responses.
//! Each lookup runs in its own task and reports through a channel to a
//! single aggregator (this function) that owns the accumulator and the
//! response counter. Completion is the barrier `received == batches`.
//!
//! The first failed lookup short-circuits the barrier: the stage fails and
//! the remaining in-flight lookups are aborted.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use super::compiler::Batch;
use super::errors::{JoinError, JoinResult};
use crate::store::{DocumentStore, StoreResult};

/// Result of running every batch of a stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionOutput {
    /// Documents in arrival order
    pub documents: Vec<Value>,
    /// Lookups issued
    pub batches: usize,
}

/// Runs compiled batches against a store
#[derive(Clone)]
pub struct SubqueryExecutor {
    store: Arc<dyn DocumentStore>,
}

impl SubqueryExecutor {
    /// Creates an executor over the given store
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Executes every batch concurrently against `collection`.
    ///
    /// No batches means no store calls and an empty result. Response order
    /// is whatever order the lookups complete in.
    pub async fn execute(&self, collection: &str, batches: Vec<Batch>) -> JoinResult<ExecutionOutput> {
        let total = batches.len();
        if total == 0 {
            return Ok(ExecutionOutput::default());
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<StoreResult<Vec<Value>>>();
        let mut lookups = JoinSet::new();

        for batch in batches {
            let store = Arc::clone(&self.store);
            let collection = collection.to_string();
            let tx = tx.clone();
            lookups.spawn(async move {
                let response = store.lookup(&collection, &batch).await;
                // receiver gone means the stage already failed
                let _ = tx.send(response);
            });
        }
        drop(tx);

        let mut documents = Vec::new();
        let mut received = 0;
        while received < total {
            match rx.recv().await {
                Some(Ok(batch_documents)) => {
                    documents.extend(batch_documents);
                    received += 1;
                }
                Some(Err(source)) => {
                    lookups.abort_all();
                    return Err(JoinError::store(collection, source));
                }
                None => {
                    lookups.abort_all();
                    return Err(JoinError::internal(format!(
                        "lookup task ended without a response ({} of {} received)",
                        received, total
                    )));
                }
            }
        }

        Ok(ExecutionOutput {
            documents,
            batches: total,
        })
    }
}
