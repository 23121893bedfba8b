//! Shared data model for prompt execution.
//!
//! These types cross crate boundaries: the LLM client produces them, the
//! dispatcher and orchestrator fold them into history, and the log sinks
//! persist them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::trace::TraceContext;

/// Flat name -> value map used for template variables and request metadata.
pub type VariableMap = serde_json::Map<String, Value>;

/// Lifecycle status of a prompt definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PromptStatus {
    #[default]
    Draft,
    Active,
    Archived,
}

impl PromptStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Active => "ACTIVE",
            Self::Archived => "ARCHIVED",
        }
    }
}

impl fmt::Display for PromptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callable namespace a descriptor belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Tool,
    Activity,
    Workflow,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [Namespace::Tool, Namespace::Activity, Namespace::Workflow];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tool => "tool",
            Self::Activity => "activity",
            Self::Workflow => "workflow",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which prompt template a variable set belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    System,
    User,
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
        }
    }
}

/// Source of a configuration value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Cli,
    Config,
    Programmatic,
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cli => write!(f, "cli"),
            Self::Config => write!(f, "config"),
            Self::Programmatic => write!(f, "programmatic"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions
    System,
    /// User input
    User,
    /// Assistant response
    Assistant,
    /// Result of a tool call, addressed to the call id
    Tool,
}

/// A tool invocation requested by the model.
///
/// `name` is the descriptor's external name, the key used to route the call
/// back to its executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Assistant turn that requested tool calls.
    #[must_use]
    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::new(Role::Assistant, content)
        }
    }

    /// Tool result addressed to the call that produced it.
    #[must_use]
    pub fn tool(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
            ..Self::new(Role::Tool, content)
        }
    }
}

/// Token accounting for one or more LLM calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    #[must_use]
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Function-calling definition advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Model configuration for a call. Every field is optional so prompt defaults,
/// request overrides, and config defaults can be layered.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

impl LlmSettings {
    /// Layer `overrides` on top of `self`; set fields in `overrides` win.
    #[must_use]
    pub fn merged_with(&self, overrides: &LlmSettings) -> LlmSettings {
        LlmSettings {
            provider: overrides.provider.clone().or_else(|| self.provider.clone()),
            model: overrides.model.clone().or_else(|| self.model.clone()),
            temperature: overrides.temperature.or(self.temperature),
            max_tokens: overrides.max_tokens.or(self.max_tokens),
            top_p: overrides.top_p.or(self.top_p),
        }
    }
}

/// Result of one LLM call.
///
/// `message_history` is the full transcript after the call, including the
/// assistant turn that produced `content`/`tool_calls`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub usage: TokenUsage,
    #[serde(default)]
    pub message_history: Vec<Message>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub provider: String,
}

impl LlmResponse {
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Normalized outcome of one tool call, as fed back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultContent {
    pub name: String,
    pub output: Value,
    pub successful: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultMessage {
    pub tool_call_id: String,
    pub content: ToolResultContent,
}

impl ToolResultMessage {
    /// Convert into a `tool` role message carrying the JSON-encoded content.
    #[must_use]
    pub fn to_message(&self) -> Message {
        let body = serde_json::to_string(&self.content)
            .unwrap_or_else(|_| self.content.output.to_string());
        Message::tool(&self.tool_call_id, &self.content.name, body)
    }
}

/// One executed tool call, accumulated across an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallLog {
    pub tool_name: String,
    pub input_arguments: Value,
    pub output: Value,
    pub execution_time_ms: u64,
    pub description: String,
    pub successful: bool,
}

/// Summary emitted once after a whole batch settles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub call_count: usize,
    pub failed_count: usize,
    pub elapsed_ms: u64,
    pub tool_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolLogEvent {
    Call(ToolCallLog),
    Batch(BatchSummary),
}

/// Record handed to the execution log sink by the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallLogRecord {
    pub trace: TraceContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub event: ToolLogEvent,
    pub recorded_at: DateTime<Utc>,
}

/// Per-dimension quality ratings, each 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub relevance: f64,
    pub tool_usage: f64,
    pub clarity: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationExplanations {
    #[serde(default)]
    pub relevance: String,
    #[serde(default)]
    pub tool_usage: String,
    #[serde(default)]
    pub clarity: String,
    #[serde(default)]
    pub accuracy: String,
}

/// Quality verdict for one final response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationScore {
    pub metrics: ValidationMetrics,
    pub explanations: ValidationExplanations,
    pub critical_issues: Vec<String>,
    pub overall_score: f64,
    pub passed: bool,
}

/// Persisted record of one top-level execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub id: String,
    pub prompt_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub attempt: u32,
    pub system_variables: VariableMap,
    pub user_variables: VariableMap,
    pub llm_settings: LlmSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_response: Option<String>,
    pub usage: TokenUsage,
    pub successful: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub tool_call_logs: Vec<ToolCallLog>,
    pub llm_call_count: u32,
    pub tool_call_count: u32,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_passed: Option<bool>,
    pub trace: TraceContext,
    pub request_metadata: VariableMap,
    pub created_at: DateTime<Utc>,
}

impl ExecutionLogEntry {
    /// Blank entry for one attempt, stamped with a fresh id and the current time.
    #[must_use]
    pub fn new(prompt_id: impl Into<String>, attempt: u32, trace: TraceContext) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            prompt_id: prompt_id.into(),
            request_id: None,
            attempt,
            system_variables: VariableMap::new(),
            user_variables: VariableMap::new(),
            llm_settings: LlmSettings::default(),
            system_prompt: None,
            user_prompt: None,
            final_response: None,
            usage: TokenUsage::default(),
            successful: false,
            error_message: None,
            tool_call_logs: Vec::new(),
            llm_call_count: 0,
            tool_call_count: 0,
            elapsed_ms: 0,
            validation_passed: None,
            trace,
            request_metadata: VariableMap::new(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_settings_override_precedence() {
        let base = LlmSettings {
            model: Some("base-model".into()),
            temperature: Some(0.2),
            max_tokens: Some(512),
            ..Default::default()
        };
        let overrides = LlmSettings {
            model: Some("override-model".into()),
            ..Default::default()
        };

        let merged = base.merged_with(&overrides);
        assert_eq!(merged.model.as_deref(), Some("override-model"));
        assert_eq!(merged.temperature, Some(0.2));
        assert_eq!(merged.max_tokens, Some(512));
    }

    #[test]
    fn test_tool_result_to_message() {
        let result = ToolResultMessage {
            tool_call_id: "call_1".into(),
            content: ToolResultContent {
                name: "calc".into(),
                output: json!({"value": 4}),
                successful: true,
                error: None,
            },
        };

        let msg = result.to_message();
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.name.as_deref(), Some("calc"));

        let body: Value = serde_json::from_str(&msg.content).unwrap();
        assert_eq!(body["output"]["value"], 4);
        assert_eq!(body["successful"], true);
        assert!(body.get("error").is_none());
    }

    #[test]
    fn test_usage_accumulates() {
        let mut total = TokenUsage::default();
        total.accumulate(&TokenUsage::new(10, 5));
        total.accumulate(&TokenUsage::new(3, 2));
        assert_eq!(total, TokenUsage::new(13, 7));
    }

    #[test]
    fn test_prompt_status_wire_format() {
        let status: PromptStatus = serde_json::from_str("\"ACTIVE\"").unwrap();
        assert_eq!(status, PromptStatus::Active);
        assert_eq!(PromptStatus::Archived.to_string(), "ARCHIVED");
    }

    #[test]
    fn test_tool_log_event_is_tagged() {
        let event = ToolLogEvent::Batch(BatchSummary {
            call_count: 2,
            failed_count: 1,
            elapsed_ms: 12,
            tool_names: vec!["a".into(), "b".into()],
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], "batch");
        assert_eq!(value["call_count"], 2);
    }
}
