//! Composite-key hash join
//!
//! Enriches an in-memory record set with documents from a [`DocumentStore`]
//! across a pipeline of sequential stages. Per stage:
//!
//! 1. Left keys resolve to accessors; every record's key tuple goes into a
//!    [`CompositeKeyIndex`] (record position is the correlation handle).
//! 2. The index compiles into exact tuples plus per-position value domains,
//!    paged into [`Batch`]es. A tuple is never split across batches.
//! 3. Batches run concurrently; a single aggregator gathers responses.
//! 4. Each returned document is re-keyed with the right keys and attached to
//!    every record position its key reaches.
//!
//! ```ignore
//! let records = JoinEngine::new(store)
//!     .query(FetchSpec::new("orders"))
//!     .join(JoinStageSpec::new("items").left_key("item_ids").right_key("_id").new_key("items"))
//!     .exec()
//!     .await?;
//! ```
//!
//! [`DocumentStore`]: crate::store::DocumentStore

pub mod accessor;
mod compiler;
mod errors;
mod executor;
mod index;
mod merge;
mod pipeline;
mod stage;

pub use accessor::{Accessor, KeySpec};
pub use compiler::{compile, paginate, Batch, CompiledLookup};
pub use errors::{JoinError, JoinResult};
pub use executor::{ExecutionOutput, SubqueryExecutor};
pub use index::{CompositeKeyIndex, KeyIndexNode};
pub use merge::{merge, MergeOutcome};
pub use pipeline::{JoinEngine, JoinQuery};
pub use stage::{JoinStageSpec, JoinType, OneOrMany, StageCallback, StagePlan, DEFAULT_PAGE_SIZE};
