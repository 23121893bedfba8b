//! OpenAI-compatible chat-completions client
//!
//! Speaks the `/chat/completions` dialect shared by OpenAI, OpenRouter, and
//! most self-hosted gateways: function tools, `tool_choice`, and JSON-schema
//! response formats.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use promptrun_utils::error::LlmError;
use promptrun_utils::types::{
    LlmResponse, LlmSettings, Message, Role, TokenUsage, ToolCall,
};

use crate::http_client::HttpClient;
use crate::types::{LlmClient, LlmRequest, ResponseFormat};

/// Default OpenRouter endpoint
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

const OPENROUTER_TITLE: &str = "promptrun";

/// HTTP client for any OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    http: HttpClient,
    provider_name: String,
    base_url: String,
    api_key: String,
    defaults: LlmSettings,
    default_timeout: Duration,
    extra_headers: Vec<(&'static str, String)>,
}

impl std::fmt::Debug for OpenAiCompatibleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleClient")
            .field("provider_name", &self.provider_name)
            .field("base_url", &self.base_url)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatibleClient {
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the HTTP client cannot be constructed
    pub fn new(
        provider_name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        defaults: LlmSettings,
        default_timeout: Duration,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            http: HttpClient::new()?,
            provider_name: provider_name.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            defaults,
            default_timeout,
            extra_headers: Vec::new(),
        })
    }

    /// Attach the attribution headers OpenRouter asks clients to send.
    #[must_use]
    pub fn with_openrouter_headers(mut self) -> Self {
        self.extra_headers
            .push(("X-Title", OPENROUTER_TITLE.to_string()));
        self
    }

    /// Request body for `request`, with defaults layered under its settings.
    pub(crate) fn build_body(&self, request: &LlmRequest) -> Result<Value, LlmError> {
        let settings = self.defaults.merged_with(&request.settings);
        let model = settings.model.clone().ok_or_else(|| {
            LlmError::Misconfiguration(format!(
                "no model configured for provider '{}'",
                self.provider_name
            ))
        })?;

        let body = ChatRequest {
            model,
            messages: request.messages().iter().map(WireMessage::from).collect(),
            tools: request
                .tools
                .iter()
                .map(|tool| WireTool {
                    kind: "function",
                    function: WireFunction {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: tool.parameters.clone(),
                    },
                })
                .collect(),
            tool_choice: (!request.tools.is_empty()).then(|| request.tool_choice.as_str()),
            response_format: match &request.response_format {
                ResponseFormat::Text => None,
                ResponseFormat::JsonSchema { name, schema } => Some(json!({
                    "type": "json_schema",
                    "json_schema": { "name": name, "schema": schema, "strict": true },
                })),
            },
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            top_p: settings.top_p,
            stream: false,
        };

        serde_json::to_value(&body)
            .map_err(|e| LlmError::InvalidResponse(format!("failed to encode request: {e}")))
    }

    /// Turn a decoded response body into an [`LlmResponse`].
    pub(crate) fn parse_response(
        &self,
        body: ChatResponse,
        mut transcript: Vec<Message>,
        requested_model: &str,
    ) -> Result<LlmResponse, LlmError> {
        let choice = body.choices.into_iter().next().ok_or_else(|| {
            LlmError::InvalidResponse(format!("{} response missing choices[0]", self.provider_name))
        })?;

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| {
                let arguments = serde_json::from_str(&call.function.arguments)
                    .unwrap_or(Value::String(call.function.arguments));
                ToolCall::new(call.id, call.function.name, arguments)
            })
            .collect();

        let content = choice.message.content.unwrap_or_default();
        if content.is_empty() && tool_calls.is_empty() {
            return Err(LlmError::InvalidResponse(format!(
                "{} returned neither content nor tool calls",
                self.provider_name
            )));
        }

        transcript.push(Message::assistant_with_tool_calls(
            content.clone(),
            tool_calls.clone(),
        ));

        let usage = body
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            tool_calls,
            usage,
            message_history: transcript,
            model: body.model.unwrap_or_else(|| requested_model.to_string()),
            provider: self.provider_name.clone(),
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let body = self.build_body(&request)?;
        let model = body["model"].as_str().unwrap_or_default().to_string();
        let timeout = request.timeout.unwrap_or(self.default_timeout);

        debug!(
            provider = %self.provider_name,
            model = %model,
            tools = request.tools.len(),
            trace_id = %request.trace.trace_id,
            span_id = %request.trace.span_display(),
            "Invoking LLM"
        );

        let mut builder = self
            .http
            .inner()
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&body);
        for (name, value) in &self.extra_headers {
            builder = builder.header(*name, value);
        }

        let response = self
            .http
            .execute_with_retry(builder, timeout, &self.provider_name)
            .await?;

        let decoded: ChatResponse = response.json().await.map_err(|e| {
            LlmError::InvalidResponse(format!(
                "failed to parse {} response: {e}",
                self.provider_name
            ))
        })?;

        let result = self.parse_response(decoded, request.messages(), &model)?;

        debug!(
            provider = %self.provider_name,
            tool_calls = result.tool_calls.len(),
            total_tokens = result.usage.total_tokens,
            "LLM call completed"
        );

        Ok(result)
    }

    fn provider(&self) -> &str {
        &self.provider_name
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCallOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl From<&Message> for WireMessage {
    fn from(msg: &Message) -> Self {
        let role = match msg.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        // Assistant turns that only carry tool calls send null content.
        let content = if msg.role == Role::Assistant
            && msg.content.is_empty()
            && !msg.tool_calls.is_empty()
        {
            None
        } else {
            Some(msg.content.clone())
        };
        Self {
            role,
            content,
            tool_calls: msg
                .tool_calls
                .iter()
                .map(|call| WireToolCallOut {
                    id: call.id.clone(),
                    kind: "function",
                    function: WireFunctionCall {
                        name: call.name.clone(),
                        arguments: match &call.arguments {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        },
                    },
                })
                .collect(),
            tool_call_id: msg.tool_call_id.clone(),
            name: if msg.role == Role::Tool { msg.name.clone() } else { None },
        }
    }
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
struct WireToolCallOut {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCallIn>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCallIn {
    id: String,
    function: WireFunctionCall,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolChoice;
    use promptrun_utils::trace::TraceContext;
    use promptrun_utils::types::ToolDefinition;

    fn client() -> OpenAiCompatibleClient {
        OpenAiCompatibleClient::new(
            "openai-compatible",
            "http://localhost:1/v1/chat/completions",
            "test-key",
            LlmSettings {
                model: Some("default-model".into()),
                temperature: Some(0.2),
                ..LlmSettings::default()
            },
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_body_for_first_call_with_tools() {
        let mut request = LlmRequest::new(
            LlmSettings {
                model: Some("override".into()),
                ..LlmSettings::default()
            },
            TraceContext::new_root("llm_call"),
        );
        request.system_prompt = Some("sys".into());
        request.user_prompt = Some("hi".into());
        request.tools = vec![ToolDefinition {
            name: "calc".into(),
            description: "adds".into(),
            parameters: json!({"type": "object"}),
        }];
        request.tool_choice = ToolChoice::Auto;

        let body = client().build_body(&request).unwrap();
        assert_eq!(body["model"], "override");
        assert_eq!(body["temperature"], json!(0.2f32));
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "calc");
        assert_eq!(body["tool_choice"], "auto");
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_body_for_history_with_tool_turns() {
        let mut request = LlmRequest::new(LlmSettings::default(), TraceContext::new_root("x"));
        request.message_history = vec![
            Message::user("q"),
            Message::assistant_with_tool_calls(
                "",
                vec![ToolCall::new("call_1", "calc", json!({"a": 1}))],
            ),
            Message::tool("call_1", "calc", "{\"output\":2}"),
        ];
        request.response_format = ResponseFormat::JsonSchema {
            name: "answer".into(),
            schema: json!({"type": "object"}),
        };

        let body = client().build_body(&request).unwrap();
        let assistant = &body["messages"][1];
        assert!(assistant["content"].is_null());
        assert_eq!(assistant["tool_calls"][0]["function"]["arguments"], "{\"a\":1}");
        assert_eq!(body["messages"][2]["tool_call_id"], "call_1");
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn test_parse_tool_call_response() {
        let body: ChatResponse = serde_json::from_value(json!({
            "model": "m-1",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "calc", "arguments": "{\"x\": 3}"}
                    }]
                }
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 4}
        }))
        .unwrap();

        let response = client()
            .parse_response(body, vec![Message::user("q")], "fallback")
            .unwrap();

        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].arguments["x"], 3);
        assert_eq!(response.usage.total_tokens, 16);
        assert_eq!(response.model, "m-1");
        assert_eq!(response.message_history.len(), 2);
        assert_eq!(response.message_history[1].tool_calls[0].id, "call_9");
    }

    #[test]
    fn test_parse_empty_choice_is_invalid() {
        let body: ChatResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        let err = client().parse_response(body, Vec::new(), "m").unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }

    #[test]
    fn test_missing_model_is_misconfiguration() {
        let bare = OpenAiCompatibleClient::new(
            "p",
            "http://localhost:1",
            "k",
            LlmSettings::default(),
            Duration::from_secs(1),
        )
        .unwrap();
        let request = LlmRequest::new(LlmSettings::default(), TraceContext::new_root("x"));
        assert!(matches!(
            bare.build_body(&request),
            Err(LlmError::Misconfiguration(_))
        ));
    }
}
