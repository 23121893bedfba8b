//! Scripted [`LlmClient`] for tests.
//!
//! Replies are consumed in order; once the script runs out the optional
//! fallback reply repeats forever. Every request is recorded for assertions.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use promptrun_utils::error::LlmError;
use promptrun_utils::types::{LlmResponse, Message, TokenUsage, ToolCall};

use crate::types::{LlmClient, LlmRequest};

/// One scripted model turn.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    ToolCalls(Vec<ToolCall>),
    Error(LlmError),
    /// Sleep before answering with the inner reply
    Delayed(Duration, Box<ScriptedReply>),
}

#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    script: Mutex<VecDeque<ScriptedReply>>,
    fallback: Option<ScriptedReply>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlmClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn then_text(self, content: impl Into<String>) -> Self {
        self.then(ScriptedReply::Text(content.into()))
    }

    #[must_use]
    pub fn then_tool_calls(self, calls: Vec<ToolCall>) -> Self {
        self.then(ScriptedReply::ToolCalls(calls))
    }

    #[must_use]
    pub fn then_error(self, error: LlmError) -> Self {
        self.then(ScriptedReply::Error(error))
    }

    #[must_use]
    pub fn then(self, reply: ScriptedReply) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(reply);
        }
        self
    }

    /// Reply used once the script is exhausted.
    #[must_use]
    pub fn otherwise(mut self, reply: ScriptedReply) -> Self {
        self.fallback = Some(reply);
        self
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    fn next_reply(&self) -> Option<ScriptedReply> {
        let mut script = self.script.lock().ok()?;
        script.pop_front().or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let mut reply = self.next_reply().ok_or_else(|| {
            LlmError::InvalidResponse("scripted client ran out of replies".to_string())
        })?;

        let (content, tool_calls) = loop {
            match reply {
                ScriptedReply::Text(text) => break (text, Vec::new()),
                ScriptedReply::ToolCalls(calls) => break (String::new(), calls),
                ScriptedReply::Error(err) => return Err(err),
                ScriptedReply::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
            }
        };

        let mut history = request.messages();
        history.push(Message::assistant_with_tool_calls(
            content.clone(),
            tool_calls.clone(),
        ));

        Ok(LlmResponse {
            content,
            tool_calls,
            usage: TokenUsage::new(10, 5),
            message_history: history,
            model: request
                .settings
                .model
                .clone()
                .unwrap_or_else(|| "scripted-model".to_string()),
            provider: "scripted".to_string(),
        })
    }

    fn provider(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptrun_utils::trace::TraceContext;
    use promptrun_utils::types::LlmSettings;
    use serde_json::json;

    fn request() -> LlmRequest {
        let mut req = LlmRequest::new(LlmSettings::default(), TraceContext::new_root("t"));
        req.user_prompt = Some("hi".into());
        req
    }

    #[tokio::test]
    async fn test_script_then_fallback() {
        let client = ScriptedLlmClient::new()
            .then_tool_calls(vec![ToolCall::new("c1", "calc", json!({}))])
            .otherwise(ScriptedReply::Text("done".into()));

        let first = client.complete(request()).await.unwrap();
        assert!(first.has_tool_calls());
        assert_eq!(first.message_history.len(), 2);

        for _ in 0..2 {
            let next = client.complete(request()).await.unwrap();
            assert_eq!(next.content, "done");
        }
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_script_errors() {
        let client = ScriptedLlmClient::new();
        assert!(client.complete(request()).await.is_err());
    }
}
