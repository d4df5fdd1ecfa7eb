//! Observability for the join engine
//!
//! - Structured logging (JSON lines)
//! - Atomic counters
//! - Stage boundary hook
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on join results
//! 3. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use docjoin::observability::{LoggingObserver, Severity};
//!
//! let engine = JoinEngine::new(store)
//!     .with_observer(Arc::new(LoggingObserver::new(Severity::Info)));
//! ```

mod hook;
mod logger;
mod metrics;

pub use hook::{
    LoggingObserver, NoOpObserver, PipelineInfo, StageInfo, StageObserver, StageReport,
};
pub use logger::{Logger, Severity};
pub use metrics::{JoinMetrics, MetricsSnapshot};
