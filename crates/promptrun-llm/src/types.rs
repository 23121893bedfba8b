use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use promptrun_utils::error::LlmError;
use promptrun_utils::trace::TraceContext;
use promptrun_utils::types::{
    LlmResponse, LlmSettings, Message, ToolDefinition, VariableMap,
};

/// How the model may use the offered tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Required,
}

impl ToolChoice {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::None => "none",
            Self::Required => "required",
        }
    }
}

/// Shape the model's final content must take.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    Text,
    JsonSchema { name: String, schema: Value },
}

/// One LLM call.
///
/// On the first call of an execution `system_prompt`/`user_prompt` are set and
/// `message_history` holds any prior conversation supplied by the caller. Once
/// tool exchange begins both prompt fields are `None` and the transcript in
/// `message_history` is authoritative.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    pub settings: LlmSettings,
    pub system_prompt: Option<String>,
    pub user_prompt: Option<String>,
    pub message_history: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
    pub response_format: ResponseFormat,
    pub trace: TraceContext,
    pub request_metadata: VariableMap,
    /// Per-call timeout; the client default applies when `None`
    pub timeout: Option<Duration>,
}

impl LlmRequest {
    #[must_use]
    pub fn new(settings: LlmSettings, trace: TraceContext) -> Self {
        Self {
            settings,
            system_prompt: None,
            user_prompt: None,
            message_history: Vec::new(),
            tools: Vec::new(),
            tool_choice: ToolChoice::None,
            response_format: ResponseFormat::Text,
            trace,
            request_metadata: VariableMap::new(),
            timeout: None,
        }
    }

    /// Transcript to send: system prompt, prior history, then user prompt.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        let mut out = Vec::with_capacity(self.message_history.len() + 2);
        if let Some(system) = &self.system_prompt {
            out.push(Message::system(system.clone()));
        }
        out.extend(self.message_history.iter().cloned());
        if let Some(user) = &self.user_prompt {
            out.push(Message::user(user.clone()));
        }
        out
    }
}

/// Capability for completing one chat turn against an LLM provider.
///
/// Implementations return the full transcript after the call in
/// [`LlmResponse::message_history`], ending with the assistant turn.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Provider label used in logs and responses.
    fn provider(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptrun_utils::types::Role;

    #[test]
    fn test_first_call_transcript_wraps_history() {
        let mut request = LlmRequest::new(LlmSettings::default(), TraceContext::new_root("t"));
        request.system_prompt = Some("You are a tutor".into());
        request.user_prompt = Some("2+2?".into());
        request.message_history = vec![Message::user("earlier"), Message::assistant("reply")];

        let roles: Vec<Role> = request.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(request.messages()[3].content, "2+2?");
    }

    #[test]
    fn test_history_only_transcript() {
        let mut request = LlmRequest::new(LlmSettings::default(), TraceContext::new_root("t"));
        request.message_history = vec![Message::system("s"), Message::user("u")];
        assert_eq!(request.messages(), request.message_history);
    }

    #[test]
    fn test_response_format_wire_shape() {
        let format = ResponseFormat::JsonSchema {
            name: "answer".into(),
            schema: serde_json::json!({"type": "object"}),
        };
        let value = serde_json::to_value(&format).unwrap();
        assert_eq!(value["type"], "json_schema");
        assert_eq!(value["name"], "answer");
    }
}
