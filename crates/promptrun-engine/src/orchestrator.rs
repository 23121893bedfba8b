use std::fmt;
use std::sync::Arc;
use tracing::{Instrument, debug, info, warn};
use uuid::Uuid;

use promptrun_catalog::{CatalogResolver, CatalogStore, ResolvedCatalog};
use promptrun_dispatch::{DispatchContext, ExecutorSet, ToolDispatcher};
use promptrun_llm::{LlmClient, LlmRequest, ResponseFormat, ToolChoice};
use promptrun_prompt_template::{apply_defaults, interpolate, validate_variables};
use promptrun_store::{ExecutionLogSink, PromptDefinition, PromptStore};
use promptrun_utils::error::PromptRunError;
use promptrun_utils::logging::execution_span;
use promptrun_utils::redaction::redact_error_message;
use promptrun_utils::trace::TraceContext;
use promptrun_utils::types::{
    ExecutionLogEntry, LlmResponse, LlmSettings, Message, ToolResultMessage, ValidationScore,
    VariableKind,
};
use promptrun_validation::{ResponseScorer, ScoringInput, ValidationScorer};

use crate::budget::CallBudget;
use crate::request::{EffectiveLimits, EngineSettings, ExecutionRequest, ExecutionResponse};

const RESPONSE_SCHEMA_NAME: &str = "response";

/// Orchestrator states, used for transition logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Init,
    LlmCall,
    ToolDispatch,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Init => "INIT",
            Self::LlmCall => "LLM_CALL",
            Self::ToolDispatch => "TOOL_DISPATCH",
            Self::Done => "DONE",
        })
    }
}

/// Settled attempt that reached DONE.
struct AttemptOutcome {
    response: LlmResponse,
    validation_passed: Option<bool>,
    score: Option<ValidationScore>,
    llm_calls: u32,
    tool_calls: u32,
    entry_id: String,
}

/// Runs stored prompts: the LLM-call/tool-dispatch loop, optional scoring,
/// and the validation gate around whole attempts.
///
/// Every attempt, successful or not, appends exactly one
/// [`ExecutionLogEntry`] to the sink.
pub struct PromptExecutor {
    prompts: Arc<dyn PromptStore>,
    catalog: Arc<dyn CatalogStore>,
    resolver: CatalogResolver,
    dispatcher: ToolDispatcher,
    llm: Arc<dyn LlmClient>,
    scorer: Arc<dyn ResponseScorer>,
    sink: Arc<dyn ExecutionLogSink>,
    settings: EngineSettings,
}

impl PromptExecutor {
    /// Executor with no tool backends and an LLM-graded scorer on `llm`.
    pub fn new(
        prompts: Arc<dyn PromptStore>,
        catalog: Arc<dyn CatalogStore>,
        llm: Arc<dyn LlmClient>,
        sink: Arc<dyn ExecutionLogSink>,
    ) -> Self {
        let scorer_settings = LlmSettings {
            temperature: Some(0.0),
            ..LlmSettings::default()
        };
        Self {
            resolver: CatalogResolver::new(catalog.clone()),
            dispatcher: ToolDispatcher::new(catalog.clone(), ExecutorSet::new())
                .with_sink(sink.clone()),
            scorer: Arc::new(ValidationScorer::new(llm.clone(), scorer_settings)),
            prompts,
            catalog,
            llm,
            sink,
            settings: EngineSettings::default(),
        }
    }

    #[must_use]
    pub fn with_executors(mut self, executors: ExecutorSet) -> Self {
        self.dispatcher =
            ToolDispatcher::new(self.catalog.clone(), executors).with_sink(self.sink.clone());
        self
    }

    #[must_use]
    pub fn with_scorer(mut self, scorer: Arc<dyn ResponseScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Execute a stored prompt.
    ///
    /// # Errors
    ///
    /// - `PromptNotFound` / `PromptInactive` before any attempt
    /// - `Variable` or `Catalog` errors before the first LLM call
    /// - `Budget` when a call cap or the wall-clock budget is hit
    /// - `Llm` for provider failures
    /// - `ValidationGateFailed` once gate retries are exhausted, carrying the
    ///   last response and score
    pub async fn execute(
        &self,
        request: ExecutionRequest,
    ) -> Result<ExecutionResponse, PromptRunError> {
        let root = request
            .trace
            .clone()
            .unwrap_or_else(|| TraceContext::new_root("execution"));
        let request_id = request
            .request_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let span = execution_span(&request.prompt_id, &request_id, &root);

        self.execute_attempts(&request, &request_id, &root)
            .instrument(span)
            .await
    }

    async fn execute_attempts(
        &self,
        request: &ExecutionRequest,
        request_id: &str,
        root: &TraceContext,
    ) -> Result<ExecutionResponse, PromptRunError> {
        let prompt = match self.load_prompt(&request.prompt_id).await {
            Ok(prompt) => prompt,
            Err(err) => {
                let mut entry = self.blank_entry(&request.prompt_id, request, request_id, 1, root);
                entry.error_message = Some(redact_error_message(&err.to_string()));
                self.persist(&entry).await;
                return Err(err);
            }
        };

        let gated = prompt.gated();
        let attempts = if gated {
            self.settings.gate_retries.max(1)
        } else {
            1
        };

        let mut last = None;
        for attempt in 1..=attempts {
            let outcome = self
                .run_attempt(&prompt, request, request_id, root, attempt)
                .await?;

            if !gated || outcome.validation_passed == Some(true) {
                return Ok(ExecutionResponse {
                    response: outcome.response,
                    validation_passed: outcome.validation_passed,
                    validation_results: outcome.score,
                    attempts: attempt,
                    llm_call_count: outcome.llm_calls,
                    tool_call_count: outcome.tool_calls,
                    execution_log_id: outcome.entry_id,
                    request_id: request_id.to_string(),
                    trace_id: root.trace_id.clone(),
                });
            }

            warn!(
                attempt,
                attempts,
                overall_score = outcome.score.as_ref().map(|s| s.overall_score),
                "Validation gate rejected attempt"
            );
            last = Some(outcome);
        }

        let last = last.ok_or_else(|| PromptRunError::unexpected("validation gate ran no attempts"))?;
        warn!(attempts, prompt_id = %prompt.id, "Validation gate exhausted");
        Err(PromptRunError::ValidationGateFailed {
            attempts,
            last_response: Box::new(last.response),
            last_score: last.score.map(Box::new),
        })
    }

    async fn load_prompt(&self, prompt_id: &str) -> Result<PromptDefinition, PromptRunError> {
        let prompt = self
            .prompts
            .get(prompt_id)
            .await?
            .ok_or_else(|| PromptRunError::PromptNotFound {
                prompt_id: prompt_id.to_string(),
            })?;
        if !prompt.is_executable() {
            return Err(PromptRunError::PromptInactive {
                prompt_id: prompt.id,
                status: prompt.status,
            });
        }
        Ok(prompt)
    }

    /// INIT..DONE once, then scoring, then the log entry.
    async fn run_attempt(
        &self,
        prompt: &PromptDefinition,
        request: &ExecutionRequest,
        request_id: &str,
        root: &TraceContext,
        attempt: u32,
    ) -> Result<AttemptOutcome, PromptRunError> {
        let limits = self.settings.limits_for(&request.limits);
        let trace = root.child(format!("attempt-{attempt}"));
        let mut entry = self.blank_entry(&prompt.id, request, request_id, attempt, &trace);
        let mut budget = CallBudget::new(
            limits.max_llm_calls,
            limits.max_tool_calls,
            limits.max_total_execution,
        );
        info!(attempt, prompt_id = %prompt.id, "Execution attempt started");

        let driven = self
            .drive(prompt, request, request_id, &limits, trace, &mut budget, &mut entry)
            .await;
        // Scoring is out of band and does not count toward the attempt's time.
        let elapsed = budget.elapsed();
        let result = match driven {
            Ok((response, cursor)) => {
                let (passed, score) = if prompt.validation_required {
                    self.score(request, &entry, &response, &cursor).await
                } else {
                    (None, None)
                };
                Ok((response, passed, score))
            }
            Err(err) => Err(err),
        };

        entry.llm_call_count = budget.llm_calls();
        entry.tool_call_count = budget.tool_calls();
        entry.elapsed_ms = elapsed.as_millis() as u64;
        match &result {
            Ok((response, passed, _)) => {
                entry.successful = true;
                entry.final_response = Some(response.content.clone());
                entry.validation_passed = *passed;
            }
            Err(err) => {
                entry.error_message = Some(redact_error_message(&err.to_string()));
            }
        }

        self.persist(&entry).await;
        if entry.successful
            && let Err(e) = self.prompts.record_stats(&prompt.id, entry.elapsed_ms).await
        {
            warn!(error = %e, prompt_id = %prompt.id, "Failed to update prompt stats");
        }
        info!(
            attempt,
            successful = entry.successful,
            llm_calls = entry.llm_call_count,
            tool_calls = entry.tool_call_count,
            elapsed_ms = entry.elapsed_ms,
            "Execution attempt finished"
        );

        let (response, validation_passed, score) = result?;
        Ok(AttemptOutcome {
            response,
            validation_passed,
            score,
            llm_calls: entry.llm_call_count,
            tool_calls: entry.tool_call_count,
            entry_id: entry.id,
        })
    }

    /// The call/dispatch loop. Returns the final response and the trace
    /// cursor of the call that produced it.
    #[allow(clippy::too_many_arguments)]
    async fn drive(
        &self,
        prompt: &PromptDefinition,
        request: &ExecutionRequest,
        request_id: &str,
        limits: &EffectiveLimits,
        mut cursor: TraceContext,
        budget: &mut CallBudget,
        entry: &mut ExecutionLogEntry,
    ) -> Result<(LlmResponse, TraceContext), PromptRunError> {
        debug!(state = %Phase::Init, "Preparing prompt");

        let mut system_vars = request.system_variables.clone();
        apply_defaults(&mut system_vars, &prompt.system_variables);
        validate_variables(&system_vars, &prompt.system_variables, VariableKind::System)?;
        let mut user_vars = request.user_variables.clone();
        apply_defaults(&mut user_vars, &prompt.user_variables);
        validate_variables(&user_vars, &prompt.user_variables, VariableKind::User)?;

        let system_prompt = interpolate(&prompt.system_prompt_template, &system_vars)?;
        let user_prompt = match (&request.user_prompt, &prompt.user_prompt_template) {
            (Some(text), _) => Some(text.clone()),
            (None, Some(template)) => Some(interpolate(template, &user_vars)?),
            (None, None) => None,
        };
        entry.system_variables = system_vars;
        entry.user_variables = user_vars;
        entry.system_prompt = Some(system_prompt.clone());
        entry.user_prompt = user_prompt.clone();

        let catalog = if prompt.declares_callables() {
            self.resolver
                .resolve_all(&prompt.tool_ids, &prompt.activity_ids, &prompt.workflow_ids)
                .await?
        } else {
            ResolvedCatalog::default()
        };

        let mut settings = self
            .settings
            .llm_defaults
            .merged_with(&prompt.default_llm_settings);
        if let Some(overrides) = &request.llm_settings {
            settings = settings.merged_with(overrides);
        }
        entry.llm_settings = settings.clone();

        let tools = catalog.tool_definitions();
        let response_format = prompt.response_schema.as_ref().map_or(
            ResponseFormat::Text,
            |schema| ResponseFormat::JsonSchema {
                name: RESPONSE_SCHEMA_NAME.to_string(),
                schema: schema.clone(),
            },
        );
        let env = Arc::new(self.settings.env_for(&request.env));
        let mut transcript: Option<Vec<Message>> = None;

        loop {
            debug!(
                state = %Phase::LlmCall,
                call = budget.llm_calls() + 1,
                span_id = %cursor.span_display(),
                "Requesting completion"
            );
            budget
                .begin_llm_call()
                .inspect_err(|e| warn!(error = %e, "LLM call budget exhausted"))?;

            let mut llm_request = LlmRequest::new(settings.clone(), cursor.clone());
            match transcript.take() {
                None => {
                    llm_request.system_prompt = Some(system_prompt.clone());
                    llm_request.user_prompt = user_prompt.clone();
                    llm_request.message_history = request.message_history.clone();
                }
                Some(history) => llm_request.message_history = history,
            }
            llm_request.tool_choice = if tools.is_empty() {
                ToolChoice::None
            } else {
                ToolChoice::Auto
            };
            llm_request.tools = tools.clone();
            llm_request.response_format = response_format.clone();
            llm_request.request_metadata = request.request_metadata.clone();

            let response = self.llm.complete(llm_request).await?;
            entry.usage.accumulate(&response.usage);

            if !response.has_tool_calls() {
                debug!(state = %Phase::Done, "Final response received");
                return Ok((response, cursor));
            }

            debug!(
                state = %Phase::ToolDispatch,
                batch_size = response.tool_calls.len(),
                "Dispatching tool calls"
            );
            budget
                .reserve_tool_calls(response.tool_calls.len())
                .inspect_err(|e| warn!(error = %e, "Tool call budget exhausted"))?;

            let ctx = DispatchContext {
                env: env.clone(),
                trace: &cursor,
                timeout: limits.tool_timeout,
                request_id: Some(request_id),
            };
            let outcome = self
                .dispatcher
                .execute_parallel(&response.tool_calls, &catalog, &ctx)
                .await?;

            let mut history = response.message_history;
            history.extend(outcome.results.iter().map(ToolResultMessage::to_message));
            entry.tool_call_logs.extend(outcome.logs);
            transcript = Some(history);
            cursor.advance();
        }
    }

    /// Scorer failures count as a failed verdict without a score.
    async fn score(
        &self,
        request: &ExecutionRequest,
        entry: &ExecutionLogEntry,
        response: &LlmResponse,
        cursor: &TraceContext,
    ) -> (Option<bool>, Option<ValidationScore>) {
        let input = ScoringInput {
            system_prompt: entry.system_prompt.as_deref(),
            user_prompt: entry.user_prompt.as_deref(),
            tool_calls: &entry.tool_call_logs,
            final_response: &response.content,
            trace: cursor,
            request_metadata: &request.request_metadata,
        };
        match self.scorer.score(input).await {
            Ok(score) => (Some(score.passed), Some(score)),
            Err(e) => {
                warn!(error = %redact_error_message(&e.to_string()), "Validation scoring failed");
                (Some(false), None)
            }
        }
    }

    fn blank_entry(
        &self,
        prompt_id: &str,
        request: &ExecutionRequest,
        request_id: &str,
        attempt: u32,
        trace: &TraceContext,
    ) -> ExecutionLogEntry {
        let mut entry = ExecutionLogEntry::new(prompt_id, attempt, trace.clone());
        entry.request_id = Some(request_id.to_string());
        entry.system_variables = request.system_variables.clone();
        entry.user_variables = request.user_variables.clone();
        entry.request_metadata = request.request_metadata.clone();
        entry
    }

    async fn persist(&self, entry: &ExecutionLogEntry) {
        if let Err(e) = self.sink.append(entry).await {
            warn!(error = %e, entry_id = %entry.id, "Failed to persist execution log entry");
        }
    }
}
