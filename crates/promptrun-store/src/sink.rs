use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use promptrun_utils::error::StoreError;
use promptrun_utils::types::{ExecutionLogEntry, ToolCallLogRecord, ToolLogEvent};

use crate::prompt::PromptStats;

/// Destination for execution history and tool-call telemetry.
#[async_trait]
pub trait ExecutionLogSink: Send + Sync {
    async fn append(&self, entry: &ExecutionLogEntry) -> Result<(), StoreError>;

    async fn append_tool_call_log(&self, record: &ToolCallLogRecord) -> Result<(), StoreError>;
}

/// Keeps everything in memory; used by tests and embedders.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    entries: Mutex<Vec<ExecutionLogEntry>>,
    tool_calls: Mutex<Vec<ToolCallLogRecord>>,
}

impl MemoryLogSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ExecutionLogEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn tool_call_records(&self) -> Vec<ToolCallLogRecord> {
        self.tool_calls.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ExecutionLogSink for MemoryLogSink {
    async fn append(&self, entry: &ExecutionLogEntry) -> Result<(), StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Backend("log sink lock poisoned".into()))?
            .push(entry.clone());
        Ok(())
    }

    async fn append_tool_call_log(&self, record: &ToolCallLogRecord) -> Result<(), StoreError> {
        self.tool_calls
            .lock()
            .map_err(|_| StoreError::Backend("log sink lock poisoned".into()))?
            .push(record.clone());
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum LogLine<'a> {
    Execution(&'a ExecutionLogEntry),
    ToolCall(&'a ToolCallLogRecord),
}

/// Append-only JSON Lines file, one record per line.
///
/// Lines carry a `record` tag of `execution` or `tool_call`.
#[derive(Debug)]
pub struct JsonlLogSink {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlLogSink {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_line(&self, line: &LogLine<'_>) -> Result<(), StoreError> {
        let io_err = |e: std::io::Error| StoreError::Io {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        };

        let mut bytes = serde_json::to_vec(line).map_err(|e| StoreError::Parse {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        bytes.push(b'\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(io_err)?;
        file.write_all(&bytes).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;
        Ok(())
    }
}

#[async_trait]
impl ExecutionLogSink for JsonlLogSink {
    async fn append(&self, entry: &ExecutionLogEntry) -> Result<(), StoreError> {
        self.write_line(&LogLine::Execution(entry)).await
    }

    async fn append_tool_call_log(&self, record: &ToolCallLogRecord) -> Result<(), StoreError> {
        self.write_line(&LogLine::ToolCall(record)).await
    }
}

/// Fields of an `execution` line needed to rebuild prompt stats.
#[derive(Deserialize)]
struct ExecutionSample {
    record: String,
    #[serde(default)]
    prompt_id: String,
    #[serde(default)]
    successful: bool,
    #[serde(default)]
    elapsed_ms: u64,
}

/// Rebuild per-prompt stats from the successful `execution` lines of a JSONL log.
///
/// A missing file yields no stats. Lines that do not parse are skipped, so a
/// torn final write does not hide earlier history.
///
/// # Errors
///
/// [`StoreError::Io`] if the file exists but cannot be read.
pub fn replay_execution_stats(path: &Path) -> Result<BTreeMap<String, PromptStats>, StoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => {
            return Err(StoreError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            });
        }
    };

    let mut stats: BTreeMap<String, PromptStats> = BTreeMap::new();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let sample: ExecutionSample = match serde_json::from_str(line) {
            Ok(sample) => sample,
            Err(e) => {
                warn!(line = index + 1, error = %e, "Skipping unreadable execution log line");
                continue;
            }
        };
        if sample.record == "execution" && sample.successful {
            stats
                .entry(sample.prompt_id)
                .or_default()
                .record(sample.elapsed_ms);
        }
    }
    Ok(stats)
}

/// Emits records as structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

#[async_trait]
impl ExecutionLogSink for TracingLogSink {
    async fn append(&self, entry: &ExecutionLogEntry) -> Result<(), StoreError> {
        info!(
            entry_id = %entry.id,
            prompt_id = %entry.prompt_id,
            attempt = entry.attempt,
            successful = entry.successful,
            llm_calls = entry.llm_call_count,
            tool_calls = entry.tool_call_count,
            elapsed_ms = entry.elapsed_ms,
            total_tokens = entry.usage.total_tokens,
            validation_passed = ?entry.validation_passed,
            trace_id = %entry.trace.trace_id,
            error = entry.error_message.as_deref().unwrap_or(""),
            "Execution logged"
        );
        Ok(())
    }

    async fn append_tool_call_log(&self, record: &ToolCallLogRecord) -> Result<(), StoreError> {
        match &record.event {
            ToolLogEvent::Call(call) => info!(
                tool = %call.tool_name,
                successful = call.successful,
                execution_time_ms = call.execution_time_ms,
                trace_id = %record.trace.trace_id,
                span_id = %record.trace.span_display(),
                "Tool call logged"
            ),
            ToolLogEvent::Batch(summary) => info!(
                call_count = summary.call_count,
                failed_count = summary.failed_count,
                elapsed_ms = summary.elapsed_ms,
                tools = %summary.tool_names.join(","),
                trace_id = %record.trace.trace_id,
                span_id = %record.trace.span_display(),
                "Tool batch logged"
            ),
        }
        Ok(())
    }
}

/// Forwards every record to each inner sink.
///
/// All sinks are attempted; the first failure is returned after the rest ran.
#[derive(Clone, Default)]
pub struct FanoutLogSink {
    sinks: Vec<Arc<dyn ExecutionLogSink>>,
}

impl FanoutLogSink {
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn ExecutionLogSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl ExecutionLogSink for FanoutLogSink {
    async fn append(&self, entry: &ExecutionLogEntry) -> Result<(), StoreError> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.append(entry).await {
                warn!(error = %e, "Execution log sink failed");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    async fn append_tool_call_log(&self, record: &ToolCallLogRecord) -> Result<(), StoreError> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.append_tool_call_log(record).await {
                warn!(error = %e, "Tool call log sink failed");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use promptrun_utils::trace::TraceContext;
    use promptrun_utils::types::{BatchSummary, ToolCallLog};
    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn entry(prompt_id: &str) -> ExecutionLogEntry {
        let mut entry = ExecutionLogEntry::new(prompt_id, 1, TraceContext::new_root("execution"));
        entry.successful = true;
        entry
    }

    fn call_record() -> ToolCallLogRecord {
        ToolCallLogRecord {
            trace: TraceContext::new_root("tool_call"),
            request_id: Some("req-1".into()),
            event: ToolLogEvent::Call(ToolCallLog {
                tool_name: "calc".into(),
                input_arguments: json!({"a": 1}),
                output: json!(2),
                execution_time_ms: 3,
                description: "adds".into(),
                successful: true,
            }),
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_jsonl_sink_appends_tagged_lines() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("logs").join("executions.jsonl");
        let sink = JsonlLogSink::new(&path);

        sink.append(&entry("p1")).await.unwrap();
        sink.append_tool_call_log(&call_record()).await.unwrap();
        sink.append(&entry("p2")).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["record"], "execution");
        assert_eq!(lines[0]["prompt_id"], "p1");
        assert_eq!(lines[1]["record"], "tool_call");
        assert_eq!(lines[1]["event"]["kind"], "call");
        assert_eq!(lines[2]["prompt_id"], "p2");
    }

    #[tokio::test]
    async fn test_replay_counts_successful_executions_only() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("executions.jsonl");
        let sink = JsonlLogSink::new(&path);

        let mut fast = entry("p1");
        fast.elapsed_ms = 100;
        let mut slow = entry("p1");
        slow.elapsed_ms = 300;
        let mut failed = entry("p1");
        failed.successful = false;
        failed.elapsed_ms = 5_000;

        sink.append(&fast).await.unwrap();
        sink.append_tool_call_log(&call_record()).await.unwrap();
        sink.append(&slow).await.unwrap();
        sink.append(&failed).await.unwrap();
        sink.append(&entry("p2")).await.unwrap();
        tokio::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .unwrap()
            .write_all(b"{\"record\":\"execu")
            .await
            .unwrap();

        let stats = replay_execution_stats(&path).unwrap();
        assert_eq!(stats["p1"].execution_count, 2);
        assert!((stats["p1"].avg_response_time_ms - 200.0).abs() < 1e-9);
        assert_eq!(stats["p2"].execution_count, 1);
    }

    #[test]
    fn test_replay_missing_log_is_empty() {
        let temp = TempDir::new().unwrap();
        let stats = replay_execution_stats(&temp.path().join("absent.jsonl")).unwrap();
        assert!(stats.is_empty());
    }

    #[tokio::test]
    async fn test_fanout_reaches_every_sink() {
        let a = Arc::new(MemoryLogSink::new());
        let b = Arc::new(MemoryLogSink::new());
        let fanout = FanoutLogSink::new(vec![a.clone(), b.clone(), Arc::new(TracingLogSink)]);

        fanout.append(&entry("p")).await.unwrap();
        fanout
            .append_tool_call_log(&ToolCallLogRecord {
                event: ToolLogEvent::Batch(BatchSummary {
                    call_count: 2,
                    failed_count: 0,
                    elapsed_ms: 5,
                    tool_names: vec!["a".into(), "b".into()],
                }),
                ..call_record()
            })
            .await
            .unwrap();

        assert_eq!(a.entries().len(), 1);
        assert_eq!(b.tool_call_records().len(), 1);
    }
}
