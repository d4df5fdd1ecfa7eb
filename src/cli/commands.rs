//! CLI command implementations
//!
//! The CLI is a thin client over the library: it loads a plan file and a
//! data directory into a [`MemoryStore`], builds a pipeline and prints one
//! JSON response.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::JoinConfig;
use crate::join::{compile, paginate, Accessor, CompositeKeyIndex, JoinEngine, JoinStageSpec, StagePlan};
use crate::store::{DocumentStore, FetchSpec, MemoryStore};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};

/// Plan file: where the records come from and the stages to run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanFile {
    /// Initial fetch
    #[serde(default, alias = "query")]
    pub source: Option<FetchSpec>,

    /// Literal starting records, instead of a fetch
    #[serde(default)]
    pub records: Option<Vec<Value>>,

    #[serde(default)]
    pub stages: Vec<StagePlan>,
}

impl PlanFile {
    /// Load and validate a plan file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::plan_invalid(format!("Failed to read plan: {}", e)))?;

        let plan: PlanFile = serde_json::from_str(&content)
            .map_err(|e| CliError::plan_invalid(format!("Invalid plan JSON: {}", e)))?;

        plan.validate()?;

        Ok(plan)
    }

    fn validate(&self) -> CliResult<()> {
        match (&self.source, &self.records) {
            (Some(_), Some(_)) => Err(CliError::plan_invalid(
                "plan must set either 'source' or 'records', not both",
            )),
            (None, None) => Err(CliError::plan_invalid(
                "plan must set 'source' or 'records'",
            )),
            _ => Ok(()),
        }
    }

    /// Convert every stage, failing on the first invalid one
    pub fn stage_specs(&self) -> CliResult<Vec<JoinStageSpec>> {
        self.stages
            .iter()
            .cloned()
            .map(|stage| stage.into_spec().map_err(CliError::from))
            .collect()
    }
}

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run a command and print its response
pub fn run_command(cmd: Command) -> CliResult<()> {
    let result = match cmd {
        Command::Run { plan, data, config } => run_plan(&plan, &data, config.as_deref()),
        Command::Explain { plan, data, config } => explain(&plan, &data, config.as_deref()),
        Command::Check { plan } => check(&plan),
    };

    match result {
        Ok(data) => write_response(data),
        Err(err) => {
            write_error(err.code_str(), err.message())?;
            Err(err)
        }
    }
}

/// Execute a plan and return the enriched records
pub fn run_plan(plan_path: &Path, data_dir: &Path, config_path: Option<&Path>) -> CliResult<Value> {
    let plan = PlanFile::load(plan_path)?;
    let stages = plan.stage_specs()?;
    let config = load_config(config_path)?;
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::load_dir(data_dir)?);

    let engine = JoinEngine::from_config(store, config);
    let mut query = match plan.source {
        Some(spec) => engine.query(spec),
        None => engine.from_records(plan.records.unwrap_or_default()),
    };
    for stage in stages {
        query = query.join(stage);
    }

    let records = runtime()?.block_on(query.exec())?;
    Ok(Value::Array(records))
}

/// Compile the first stage against the plan's input without issuing lookups
pub fn explain(plan_path: &Path, data_dir: &Path, config_path: Option<&Path>) -> CliResult<Value> {
    let plan = PlanFile::load(plan_path)?;
    let stages = plan.stage_specs()?;
    let config = load_config(config_path)?;
    let store = MemoryStore::load_dir(data_dir)?;

    let Some(stage) = stages.first() else {
        return Err(CliError::plan_invalid("plan has no stages"));
    };

    let records = match &plan.source {
        Some(spec) => runtime()?.block_on(store.fetch(spec))?,
        None => plan.records.clone().unwrap_or_default(),
    };

    let left: Vec<Accessor> = stage.left_keys.iter().map(Accessor::resolve).collect();
    let index = CompositeKeyIndex::build(&records, &left);
    let compiled = compile(&index, &stage.right_keys);
    let projection = stage.effective_projection();
    let page_size = stage.page_size.unwrap_or(config.default_page_size);
    let batches = paginate(&compiled, page_size, stage.filter.as_ref(), projection.as_ref());

    Ok(json!({
        "collection": stage.collection,
        "records": records.len(),
        "indexed_records": index.indexed_records(),
        "tuples": compiled.len(),
        "page_size": page_size,
        "batches": batches.iter().map(|batch| batch.describe()).collect::<Vec<_>>(),
    }))
}

/// Validate a plan
pub fn check(plan_path: &Path) -> CliResult<Value> {
    let plan = PlanFile::load(plan_path)?;
    let stages = plan.stage_specs()?;

    Ok(json!({
        "valid": true,
        "stages": stages
            .iter()
            .map(|stage| json!({
                "collection": stage.collection,
                "arity": stage.arity(),
                "new_key": stage.new_key,
            }))
            .collect::<Vec<_>>(),
    }))
}

fn load_config(path: Option<&Path>) -> CliResult<JoinConfig> {
    match path {
        Some(path) => Ok(JoinConfig::load(path)?),
        None => Ok(JoinConfig::default()),
    }
}

fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::io_error(format!("Failed to create tokio runtime: {}", e)))
}
