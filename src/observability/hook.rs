//! Stage observation hook
//!
//! Instrumentation is injected at pipeline and stage boundaries only; the
//! join algorithm itself never logs or times anything.

use std::io::{self, Write};
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use super::logger::{Logger, Severity};
use crate::join::{JoinError, JoinType};

/// Describes one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineInfo {
    pub run_id: Uuid,
    /// Source collection, or `records` for a literal record list
    pub source: String,
    pub stages: usize,
}

/// Describes a stage about to run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageInfo {
    pub run_id: Uuid,
    /// 1-based position in the pipeline
    pub ordinal: usize,
    pub total: usize,
    pub collection: String,
    pub new_key: String,
    pub join_type: JoinType,
    pub page_size: usize,
    pub input_records: usize,
}

/// What a completed stage did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageReport {
    /// Records that produced at least one key tuple
    pub indexed_records: usize,
    /// Distinct exact-match key tuples
    pub tuples: usize,
    pub batches: usize,
    /// Documents returned by the store
    pub documents: usize,
    pub merged_documents: usize,
    pub unmatched_documents: usize,
    pub removed_records: usize,
    pub output_records: usize,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
}

fn as_millis<S: serde::Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(elapsed.as_millis() as u64)
}

/// Receives pipeline and stage boundary notifications.
///
/// Every method defaults to a no-op.
pub trait StageObserver: Send + Sync {
    fn on_pipeline_start(&self, _pipeline: &PipelineInfo) {}

    fn on_stage_start(&self, _stage: &StageInfo) {}

    fn on_stage_end(&self, _stage: &StageInfo, _outcome: Result<&StageReport, &JoinError>) {}

    /// `outcome` carries the final record count on success
    fn on_pipeline_end(&self, _pipeline: &PipelineInfo, _outcome: Result<usize, &JoinError>) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpObserver;

impl StageObserver for NoOpObserver {}

/// Observer that writes JSON log lines for every boundary
pub struct LoggingObserver {
    min_severity: Severity,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl LoggingObserver {
    /// Log to stderr (stdout is reserved for results)
    pub fn new(min_severity: Severity) -> Self {
        Self::with_writer(min_severity, Box::new(io::stderr()))
    }

    /// Log to an arbitrary writer
    pub fn with_writer(min_severity: Severity, writer: Box<dyn Write + Send>) -> Self {
        Self {
            min_severity,
            sink: Mutex::new(writer),
        }
    }

    fn emit(&self, severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if severity < self.min_severity {
            return;
        }
        if let Ok(mut sink) = self.sink.lock() {
            Logger::log_to_writer(severity, event, fields, &mut *sink);
        }
    }
}

impl StageObserver for LoggingObserver {
    fn on_pipeline_start(&self, pipeline: &PipelineInfo) {
        let run_id = pipeline.run_id.to_string();
        let stages = pipeline.stages.to_string();
        self.emit(
            Severity::Info,
            "JOIN_PIPELINE_BEGIN",
            &[("run_id", &run_id), ("source", &pipeline.source), ("stages", &stages)],
        );
    }

    fn on_stage_start(&self, stage: &StageInfo) {
        let run_id = stage.run_id.to_string();
        let ordinal = stage.ordinal.to_string();
        let input = stage.input_records.to_string();
        let page_size = stage.page_size.to_string();
        self.emit(
            Severity::Trace,
            "JOIN_STAGE_BEGIN",
            &[
                ("run_id", &run_id),
                ("stage", &ordinal),
                ("collection", &stage.collection),
                ("join_type", stage.join_type.as_str()),
                ("input_records", &input),
                ("page_size", &page_size),
            ],
        );
    }

    fn on_stage_end(&self, stage: &StageInfo, outcome: Result<&StageReport, &JoinError>) {
        let run_id = stage.run_id.to_string();
        let ordinal = stage.ordinal.to_string();
        match outcome {
            Ok(report) => {
                let tuples = report.tuples.to_string();
                let batches = report.batches.to_string();
                let documents = report.documents.to_string();
                let merged = report.merged_documents.to_string();
                let unmatched = report.unmatched_documents.to_string();
                let removed = report.removed_records.to_string();
                let output = report.output_records.to_string();
                let elapsed = report.elapsed.as_millis().to_string();
                self.emit(
                    Severity::Info,
                    "JOIN_STAGE_COMPLETE",
                    &[
                        ("run_id", &run_id),
                        ("stage", &ordinal),
                        ("collection", &stage.collection),
                        ("new_key", &stage.new_key),
                        ("tuples", &tuples),
                        ("batches", &batches),
                        ("documents", &documents),
                        ("merged_documents", &merged),
                        ("unmatched_documents", &unmatched),
                        ("removed_records", &removed),
                        ("output_records", &output),
                        ("elapsed_ms", &elapsed),
                    ],
                );
                if report.unmatched_documents > 0 {
                    self.emit(
                        Severity::Warn,
                        "JOIN_STAGE_UNMATCHED_DOCUMENTS",
                        &[("run_id", &run_id), ("stage", &ordinal), ("count", &unmatched)],
                    );
                }
            }
            Err(err) => {
                let reason = err.to_string();
                self.emit(
                    Severity::Error,
                    "JOIN_STAGE_FAILED",
                    &[
                        ("run_id", &run_id),
                        ("stage", &ordinal),
                        ("collection", &stage.collection),
                        ("code", err.code()),
                        ("reason", &reason),
                    ],
                );
            }
        }
    }

    fn on_pipeline_end(&self, pipeline: &PipelineInfo, outcome: Result<usize, &JoinError>) {
        let run_id = pipeline.run_id.to_string();
        match outcome {
            Ok(records) => {
                let records = records.to_string();
                self.emit(
                    Severity::Info,
                    "JOIN_PIPELINE_COMPLETE",
                    &[("run_id", &run_id), ("records", &records)],
                );
            }
            Err(err) => {
                let reason = err.to_string();
                self.emit(
                    Severity::Error,
                    "JOIN_PIPELINE_FAILED",
                    &[("run_id", &run_id), ("code", err.code()), ("reason", &reason)],
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Shared buffer so the test can read what the observer wrote
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn lines(&self) -> Vec<serde_json::Value> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        }
    }

    fn stage() -> StageInfo {
        StageInfo {
            run_id: Uuid::nil(),
            ordinal: 1,
            total: 1,
            collection: "products".into(),
            new_key: "product".into(),
            join_type: JoinType::Left,
            page_size: 25,
            input_records: 3,
        }
    }

    #[test]
    fn test_min_severity_filters_trace() {
        let buffer = SharedBuffer::default();
        let observer = LoggingObserver::with_writer(Severity::Info, Box::new(buffer.clone()));

        observer.on_stage_start(&stage());
        assert!(buffer.lines().is_empty());

        let verbose = LoggingObserver::with_writer(Severity::Trace, Box::new(buffer.clone()));
        verbose.on_stage_start(&stage());
        assert_eq!(buffer.lines()[0]["event"], "JOIN_STAGE_BEGIN");
    }

    #[test]
    fn test_stage_complete_fields() {
        let buffer = SharedBuffer::default();
        let observer = LoggingObserver::with_writer(Severity::Info, Box::new(buffer.clone()));
        let report = StageReport {
            tuples: 4,
            batches: 1,
            documents: 5,
            merged_documents: 4,
            unmatched_documents: 1,
            output_records: 3,
            ..StageReport::default()
        };

        observer.on_stage_end(&stage(), Ok(&report));

        let lines = buffer.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "JOIN_STAGE_COMPLETE");
        assert_eq!(lines[0]["batches"], "1");
        assert_eq!(lines[1]["event"], "JOIN_STAGE_UNMATCHED_DOCUMENTS");
    }

    #[test]
    fn test_stage_failure_logged() {
        let buffer = SharedBuffer::default();
        let observer = LoggingObserver::with_writer(Severity::Info, Box::new(buffer.clone()));

        observer.on_stage_end(&stage(), Err(&JoinError::internal("boom")));

        let lines = buffer.lines();
        assert_eq!(lines[0]["event"], "JOIN_STAGE_FAILED");
        assert_eq!(lines[0]["severity"], "ERROR");
        assert_eq!(lines[0]["code"], "JOIN_INTERNAL");
    }

    #[test]
    fn test_report_serializes_elapsed_ms() {
        let report = StageReport {
            elapsed: Duration::from_millis(42),
            ..StageReport::default()
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["elapsed_ms"], 42);
    }
}
