use chrono::Utc;
use futures::future::join_all;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use promptrun_catalog::{CallTarget, CatalogStore, ResolvedCatalog, ToolDescriptor};
use promptrun_store::ExecutionLogSink;
use promptrun_utils::error::{CatalogError, ToolCallError};
use promptrun_utils::logging::tool_call_span;
use promptrun_utils::redaction::redact_error_message;
use promptrun_utils::trace::TraceContext;
use promptrun_utils::types::{
    BatchSummary, Namespace, ToolCall, ToolCallLog, ToolCallLogRecord, ToolLogEvent,
    ToolResultContent, ToolResultMessage,
};

use crate::executor::{ExecutorSet, ToolInvocation, ToolOutput};

/// Per-batch inputs shared by every call in the batch.
#[derive(Debug, Clone)]
pub struct DispatchContext<'a> {
    pub env: Arc<BTreeMap<String, String>>,
    /// Caller's current span; the batch span is minted beneath it.
    pub trace: &'a TraceContext,
    pub timeout: Duration,
    pub request_id: Option<&'a str>,
}

/// Settled batch. `results[i]` and `logs[i]` belong to `calls[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub results: Vec<ToolResultMessage>,
    pub logs: Vec<ToolCallLog>,
}

impl BatchOutcome {
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.content.successful).count()
    }
}

struct SettledCall {
    result: ToolResultMessage,
    log: ToolCallLog,
    trace: TraceContext,
}

/// Runs one batch of model tool calls concurrently.
#[derive(Clone)]
pub struct ToolDispatcher {
    catalog: Arc<dyn CatalogStore>,
    executors: ExecutorSet,
    sink: Option<Arc<dyn ExecutionLogSink>>,
}

impl ToolDispatcher {
    pub fn new(catalog: Arc<dyn CatalogStore>, executors: ExecutorSet) -> Self {
        Self {
            catalog,
            executors,
            sink: None,
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ExecutionLogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub fn executors(&self) -> &ExecutorSet {
        &self.executors
    }

    /// Execute `calls` concurrently and collect their results in input order.
    ///
    /// Descriptors are fetched with one lookup per namespace present in the
    /// batch. Each call races its own timeout; a call that fails or times out
    /// yields a failed result without affecting its siblings.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::UnknownToolCall`] when a call names nothing in `routes`
    /// - [`CatalogError::NotFound`] when a routed descriptor is gone from the store
    pub async fn execute_parallel(
        &self,
        calls: &[ToolCall],
        routes: &ResolvedCatalog,
        ctx: &DispatchContext<'_>,
    ) -> Result<BatchOutcome, CatalogError> {
        if calls.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let batch_trace = ctx.trace.child("tool_batch");
        let started = Instant::now();

        let targets = calls
            .iter()
            .map(|call| {
                routes
                    .route(&call.name)
                    .cloned()
                    .ok_or_else(|| CatalogError::UnknownToolCall {
                        name: call.name.clone(),
                    })
            })
            .collect::<Result<Vec<CallTarget>, _>>()?;

        let descriptors = self.lookup(calls, &targets).await?;

        debug!(
            batch_size = calls.len(),
            trace_id = %batch_trace.trace_id,
            span_id = %batch_trace.span_display(),
            "Dispatching tool batch"
        );

        let pending = calls
            .iter()
            .zip(&targets)
            .zip(descriptors)
            .map(|((call, target), descriptor)| {
                self.run_call(call, target.namespace(), descriptor, &batch_trace, ctx)
            });
        let settled = join_all(pending).await;

        let mut outcome = BatchOutcome {
            results: Vec::with_capacity(settled.len()),
            logs: Vec::with_capacity(settled.len()),
        };
        for call in settled {
            self.emit(&call.trace, ctx.request_id, ToolLogEvent::Call(call.log.clone()))
                .await;
            outcome.results.push(call.result);
            outcome.logs.push(call.log);
        }

        let summary = BatchSummary {
            call_count: outcome.results.len(),
            failed_count: outcome.failed_count(),
            elapsed_ms: started.elapsed().as_millis() as u64,
            tool_names: calls.iter().map(|c| c.name.clone()).collect(),
        };
        info!(
            call_count = summary.call_count,
            failed_count = summary.failed_count,
            elapsed_ms = summary.elapsed_ms,
            "Tool batch settled"
        );
        self.emit(&batch_trace, ctx.request_id, ToolLogEvent::Batch(summary))
            .await;

        Ok(outcome)
    }

    /// One `find_by_external_names` per namespace present in the batch.
    /// Returns one descriptor per call, in call order.
    async fn lookup(
        &self,
        calls: &[ToolCall],
        targets: &[CallTarget],
    ) -> Result<Vec<ToolDescriptor>, CatalogError> {
        let mut wanted: BTreeMap<Namespace, Vec<String>> = BTreeMap::new();
        for (call, target) in calls.iter().zip(targets) {
            let names = wanted.entry(target.namespace()).or_default();
            if !names.contains(&call.name) {
                names.push(call.name.clone());
            }
        }

        let mut found = HashMap::new();
        for (namespace, names) in wanted {
            let descriptors = self.catalog.find_by_external_names(namespace, &names).await?;
            for descriptor in descriptors {
                found.insert((namespace, descriptor.external_name.clone()), descriptor);
            }
            let missing: Vec<String> = names
                .into_iter()
                .filter(|n| !found.contains_key(&(namespace, n.clone())))
                .collect();
            if !missing.is_empty() {
                return Err(CatalogError::NotFound { namespace, missing });
            }
        }

        calls
            .iter()
            .zip(targets)
            .map(|(call, target)| {
                found
                    .get(&(target.namespace(), call.name.clone()))
                    .cloned()
                    .ok_or_else(|| CatalogError::NotFound {
                        namespace: target.namespace(),
                        missing: vec![call.name.clone()],
                    })
            })
            .collect()
    }

    async fn run_call(
        &self,
        call: &ToolCall,
        namespace: Namespace,
        descriptor: ToolDescriptor,
        batch_trace: &TraceContext,
        ctx: &DispatchContext<'_>,
    ) -> SettledCall {
        let trace = batch_trace.child(format!("tool:{}", call.name));
        let span = tool_call_span(&call.name, &trace);
        let started = Instant::now();
        let description = descriptor.description.clone();

        let outcome = self
            .invoke(call, namespace, descriptor, &trace, ctx)
            .instrument(span.clone())
            .await;
        let execution_time_ms = started.elapsed().as_millis() as u64;

        let content = match outcome {
            Ok(output) => {
                span.in_scope(|| {
                    debug!(
                        successful = output.success,
                        execution_time_ms,
                        "Tool call settled"
                    );
                });
                ToolResultContent {
                    name: call.name.clone(),
                    error: (!output.success).then(|| "tool reported failure".to_string()),
                    successful: output.success,
                    output: output.output,
                }
            }
            Err(err) => {
                let message = redact_error_message(&err.to_string());
                span.in_scope(|| warn!(error = %message, execution_time_ms, "Tool call failed"));
                ToolResultContent {
                    name: call.name.clone(),
                    output: json!({ "error": message }),
                    successful: false,
                    error: Some(message),
                }
            }
        };

        let log = ToolCallLog {
            tool_name: call.name.clone(),
            input_arguments: call.arguments.clone(),
            output: content.output.clone(),
            execution_time_ms,
            description,
            successful: content.successful,
        };

        SettledCall {
            result: ToolResultMessage {
                tool_call_id: call.id.clone(),
                content,
            },
            log,
            trace,
        }
    }

    async fn invoke(
        &self,
        call: &ToolCall,
        namespace: Namespace,
        descriptor: ToolDescriptor,
        trace: &TraceContext,
        ctx: &DispatchContext<'_>,
    ) -> Result<ToolOutput, ToolCallError> {
        let Some(executor) = self.executors.get(namespace) else {
            return Err(ToolCallError::NamespaceDisabled {
                tool: call.name.clone(),
                namespace,
            });
        };

        let cancel = CancellationToken::new();
        let invocation = ToolInvocation {
            namespace,
            descriptor,
            arguments: call.arguments.clone(),
            env: ctx.env.clone(),
            timeout: ctx.timeout,
            trace: trace.clone(),
            cancel: cancel.clone(),
        };

        match tokio::time::timeout(ctx.timeout, executor.invoke(invocation)).await {
            Ok(result) => result,
            Err(_) => {
                cancel.cancel();
                Err(ToolCallError::Timeout {
                    tool: call.name.clone(),
                    timeout_ms: ctx.timeout.as_millis() as u64,
                })
            }
        }
    }

    async fn emit(&self, trace: &TraceContext, request_id: Option<&str>, event: ToolLogEvent) {
        let Some(sink) = &self.sink else {
            return;
        };
        let record = ToolCallLogRecord {
            trace: trace.clone(),
            request_id: request_id.map(str::to_string),
            event,
            recorded_at: Utc::now(),
        };
        if let Err(e) = sink.append_tool_call_log(&record).await {
            warn!(error = %e, "Failed to record tool call log");
        }
    }
}
