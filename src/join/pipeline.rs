//! Join pipeline controller
//!
//! `JoinEngine::query` (or `from_records`) starts a builder, `join` queues
//! stages in FIFO order, `exec` runs them. Stages are strictly sequential;
//! the working record set is the loop state of an iterative driver, so the
//! output of stage N is the input of stage N+1.
//!
//! Per stage: index (left keys) → compile → paginate → concurrent lookups →
//! merge (right keys) → callback with the cumulative working set.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use uuid::Uuid;

use super::accessor::Accessor;
use super::compiler::{compile, paginate};
use super::errors::{JoinError, JoinResult};
use super::executor::SubqueryExecutor;
use super::index::CompositeKeyIndex;
use super::merge::merge;
use super::stage::JoinStageSpec;
use crate::config::JoinConfig;
use crate::observability::{
    JoinMetrics, LoggingObserver, NoOpObserver, PipelineInfo, StageInfo, StageObserver,
    StageReport,
};
use crate::store::{DocumentStore, FetchSpec};

/// Entry point: binds a store, configuration, an observer and metrics
#[derive(Clone)]
pub struct JoinEngine {
    store: Arc<dyn DocumentStore>,
    executor: SubqueryExecutor,
    config: JoinConfig,
    observer: Arc<dyn StageObserver>,
    metrics: Arc<JoinMetrics>,
}

impl JoinEngine {
    /// Engine with default configuration and no instrumentation
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::from_config(store, JoinConfig::default())
    }

    /// Engine configured from `config`; attaches a [`LoggingObserver`] when
    /// `log_stages` is set
    pub fn from_config(store: Arc<dyn DocumentStore>, config: JoinConfig) -> Self {
        let observer: Arc<dyn StageObserver> = if config.log_stages {
            Arc::new(LoggingObserver::new(config.log_level))
        } else {
            Arc::new(NoOpObserver)
        };

        Self {
            executor: SubqueryExecutor::new(Arc::clone(&store)),
            store,
            config,
            observer,
            metrics: Arc::new(JoinMetrics::new()),
        }
    }

    pub fn with_config(mut self, config: JoinConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn StageObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &JoinConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<JoinMetrics> {
        &self.metrics
    }

    /// Start a pipeline whose input is an initial fetch
    pub fn query(&self, spec: FetchSpec) -> JoinQuery {
        JoinQuery::new(self.clone(), Source::Fetch(spec))
    }

    /// Start a pipeline over an already materialized record list
    pub fn from_records(&self, records: Vec<Value>) -> JoinQuery {
        JoinQuery::new(self.clone(), Source::Records(records))
    }

    async fn load(&self, source: Source) -> JoinResult<Vec<Value>> {
        match source {
            Source::Records(records) => Ok(records),
            Source::Fetch(spec) => self
                .store
                .fetch(&spec)
                .await
                .map_err(|source| JoinError::store(spec.collection.as_str(), source)),
        }
    }

    async fn drive(
        &self,
        run_id: Uuid,
        source: Source,
        mut stages: VecDeque<JoinStageSpec>,
        invalid: Option<(usize, JoinError)>,
    ) -> JoinResult<Vec<Value>> {
        if let Some((position, err)) = invalid {
            notify(stages.get(position), Err(&err));
            return Err(err);
        }

        let mut records = match self.load(source).await {
            Ok(records) => records,
            Err(err) => {
                notify(stages.front(), Err(&err));
                return Err(err);
            }
        };

        let total = stages.len();
        let mut ordinal = 0;
        while let Some(stage) = stages.pop_front() {
            ordinal += 1;
            let info = StageInfo {
                run_id,
                ordinal,
                total,
                collection: stage.collection.clone(),
                new_key: stage.new_key.clone(),
                join_type: stage.join_type.unwrap_or(self.config.default_join_type),
                page_size: stage.page_size.unwrap_or(self.config.default_page_size),
                input_records: records.len(),
            };
            self.observer.on_stage_start(&info);

            let started = Instant::now();
            match self.run_stage(&stage, &info, &mut records).await {
                Ok(mut report) => {
                    report.elapsed = started.elapsed();
                    self.metrics.increment_stages_completed();
                    self.observer.on_stage_end(&info, Ok(&report));
                    notify(Some(&stage), Ok(&records));
                }
                Err(err) => {
                    self.metrics.increment_stage_failures();
                    self.observer.on_stage_end(&info, Err(&err));
                    notify(Some(&stage), Err(&err));
                    return Err(err);
                }
            }
        }

        Ok(records)
    }

    async fn run_stage(
        &self,
        stage: &JoinStageSpec,
        info: &StageInfo,
        records: &mut Vec<Value>,
    ) -> JoinResult<StageReport> {
        let left: Vec<Accessor> = stage.left_keys.iter().map(Accessor::resolve).collect();
        let index = CompositeKeyIndex::build(records.as_slice(), &left);

        let compiled = compile(&index, &stage.right_keys);
        let projection = stage.effective_projection();
        let batches = paginate(
            &compiled,
            info.page_size,
            stage.filter.as_ref(),
            projection.as_ref(),
        );
        self.metrics.add_batches(batches.len() as u64);

        let output = self.executor.execute(&stage.collection, batches).await?;
        let documents = output.documents.len();
        self.metrics.add_documents_fetched(documents as u64);

        let right: Vec<Accessor> = stage
            .right_keys
            .iter()
            .map(|key| Accessor::from_path(key))
            .collect();
        let outcome = merge(
            records,
            output.documents,
            &index,
            &right,
            &stage.new_key,
            info.join_type,
        );
        self.metrics.add_documents_merged(outcome.merged_documents as u64);
        self.metrics.add_documents_unmatched(outcome.unmatched_documents as u64);
        self.metrics.add_records_dropped(outcome.removed_records as u64);

        Ok(StageReport {
            indexed_records: index.indexed_records(),
            tuples: compiled.len(),
            batches: output.batches,
            documents,
            merged_documents: outcome.merged_documents,
            unmatched_documents: outcome.unmatched_documents,
            removed_records: outcome.removed_records,
            output_records: records.len(),
            elapsed: Default::default(),
        })
    }
}

fn notify(stage: Option<&JoinStageSpec>, outcome: Result<&[Value], &JoinError>) {
    if let Some(callback) = stage.and_then(|stage| stage.callback.as_ref()) {
        callback(outcome);
    }
}

/// Where the first stage's records come from
#[derive(Debug, Clone)]
enum Source {
    Fetch(FetchSpec),
    Records(Vec<Value>),
}

impl Source {
    fn label(&self) -> String {
        match self {
            Source::Fetch(spec) => spec.collection.clone(),
            Source::Records(_) => "records".to_string(),
        }
    }
}

/// Pipeline builder
pub struct JoinQuery {
    engine: JoinEngine,
    source: Source,
    stages: VecDeque<JoinStageSpec>,
    /// First invalid stage (queue position and error)
    invalid: Option<(usize, JoinError)>,
}

impl JoinQuery {
    fn new(engine: JoinEngine, source: Source) -> Self {
        Self {
            engine,
            source,
            stages: VecDeque::new(),
            invalid: None,
        }
    }

    /// Queue a stage. Its shape is checked now and reported by `exec`.
    pub fn join(mut self, stage: JoinStageSpec) -> Self {
        if self.invalid.is_none() {
            if let Err(err) = stage.validate() {
                self.invalid = Some((self.stages.len(), err));
            }
        }
        self.stages.push_back(stage);
        self
    }

    /// Queued stages
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Run the pipeline and return the enriched records
    pub async fn exec(self) -> JoinResult<Vec<Value>> {
        let JoinQuery {
            engine,
            source,
            stages,
            invalid,
        } = self;

        let pipeline = PipelineInfo {
            run_id: Uuid::new_v4(),
            source: source.label(),
            stages: stages.len(),
        };
        engine.metrics.increment_pipelines();
        engine.observer.on_pipeline_start(&pipeline);

        let result = engine.drive(pipeline.run_id, source, stages, invalid).await;
        match &result {
            Ok(records) => engine.observer.on_pipeline_end(&pipeline, Ok(records.len())),
            Err(err) => {
                engine.metrics.increment_pipeline_failures();
                engine.observer.on_pipeline_end(&pipeline, Err(err));
            }
        }
        result
    }

    /// Run the pipeline and hand the outcome to `continuation`
    pub async fn exec_with<F>(self, continuation: F)
    where
        F: FnOnce(JoinResult<Vec<Value>>),
    {
        continuation(self.exec().await);
    }
}
