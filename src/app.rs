//! Assembles a [`PromptExecutor`] from a discovered [`Config`].

use std::sync::Arc;

use promptrun_config::Config;
use promptrun_dispatch::executors_from_config;
use promptrun_engine::{EngineSettings, PromptExecutor};
use promptrun_store::{
    ExecutionLogSink, FanoutLogSink, JsonlLogSink, PromptLibrary, TracingLogSink,
    replay_execution_stats,
};
use promptrun_utils::error::PromptRunError;
use promptrun_validation::ValidationScorer;
use tracing::warn;

/// Load the prompt library named by `[storage] library`, with run stats
/// from the execution log added to the ones stored in the file.
///
/// An unreadable execution log only costs the stats; it is logged and skipped.
///
/// # Errors
///
/// `PromptRunError::Store` when the library file is missing or malformed.
pub fn load_library(config: &Config) -> Result<PromptLibrary, PromptRunError> {
    let mut library = PromptLibrary::load(&config.library_path())?;
    let log_path = config.execution_log_path();
    match replay_execution_stats(&log_path) {
        Ok(stats) => library.merge_stats(&stats),
        Err(e) => warn!(error = %e, path = %log_path.display(), "Execution log not replayed"),
    }
    Ok(library)
}

/// Execution log sink used by the CLI: the JSONL file plus tracing events.
#[must_use]
pub fn default_sink(config: &Config) -> Arc<dyn ExecutionLogSink> {
    Arc::new(FanoutLogSink::new(vec![
        Arc::new(JsonlLogSink::new(config.execution_log_path())),
        Arc::new(TracingLogSink),
    ]))
}

/// Wire stores, LLM client, tool executors, scorer and limits from `config`.
///
/// # Errors
///
/// - library load failures
/// - `PromptRunError::Llm` when the provider cannot be configured
/// - `PromptRunError::Unexpected` when the tool HTTP client cannot be built
pub fn build_executor(config: &Config) -> Result<PromptExecutor, PromptRunError> {
    let (prompts, catalog) = load_library(config)?.into_stores();
    let llm = promptrun_llm::from_config(config)?;
    let executors = executors_from_config(config).map_err(PromptRunError::unexpected)?;
    let scorer = ValidationScorer::from_config(llm.clone(), config);

    Ok(PromptExecutor::new(
        Arc::new(prompts),
        Arc::new(catalog),
        llm,
        default_sink(config),
    )
    .with_executors(executors)
    .with_scorer(Arc::new(scorer))
    .with_settings(EngineSettings::from_config(config)))
}
