//! Executor that forwards calls to an HTTP tool gateway.
//!
//! `POST {base_url}/{namespace}/{descriptor_id}/invoke` with
//! `{"arguments": ..., "env": {...}}`; the gateway answers `{"success", "output"}`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::debug;

use promptrun_utils::error::ToolCallError;
use promptrun_utils::redaction::redact_error_message;

use crate::executor::{ToolExecutor, ToolInvocation, ToolOutput};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct InvokeBody<'a> {
    arguments: &'a Value,
    env: &'a BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct InvokeReply {
    success: bool,
    #[serde(default)]
    output: Value,
}

#[derive(Debug, Clone)]
pub struct HttpToolExecutor {
    client: Client,
    base_url: String,
}

impl HttpToolExecutor {
    /// # Errors
    ///
    /// `ToolCallError::Execution` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ToolCallError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ToolCallError::Execution {
                tool: "<http executor>".to_string(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn endpoint(&self, invocation: &ToolInvocation) -> String {
        format!(
            "{}/{}/{}/invoke",
            self.base_url, invocation.namespace, invocation.descriptor.id
        )
    }

    async fn send(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolCallError> {
        let tool = invocation.descriptor.external_name.clone();
        let failed = |message: String| ToolCallError::Execution {
            tool: tool.clone(),
            message: redact_error_message(&message),
        };

        let url = self.endpoint(invocation);
        debug!(url = %url, "Invoking tool over HTTP");

        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .timeout(invocation.timeout)
            .json(&InvokeBody {
                arguments: &invocation.arguments,
                env: &invocation.env,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolCallError::Timeout {
                        tool: tool.clone(),
                        timeout_ms: invocation.timeout.as_millis() as u64,
                    }
                } else {
                    failed(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(failed(format!("gateway returned {status}: {body}")));
        }

        let reply: InvokeReply = response
            .json()
            .await
            .map_err(|e| failed(format!("invalid gateway reply: {e}")))?;

        Ok(ToolOutput {
            success: reply.success,
            output: reply.output,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}

#[async_trait]
impl ToolExecutor for HttpToolExecutor {
    async fn invoke(&self, invocation: ToolInvocation) -> Result<ToolOutput, ToolCallError> {
        let cancel = invocation.cancel.clone();
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ToolCallError::Execution {
                tool: invocation.descriptor.external_name.clone(),
                message: "cancelled".to_string(),
            }),
            result = self.send(&invocation) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptrun_catalog::ToolDescriptor;
    use promptrun_utils::trace::TraceContext;
    use promptrun_utils::types::Namespace;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn invocation(namespace: Namespace) -> ToolInvocation {
        ToolInvocation {
            namespace,
            descriptor: ToolDescriptor::new("wf-42", "ship_order"),
            arguments: serde_json::json!({}),
            env: Arc::new(BTreeMap::new()),
            timeout: Duration::from_millis(100),
            trace: TraceContext::new_root("test"),
            cancel: CancellationToken::new(),
        }
    }

    #[test]
    fn test_endpoint_layout() {
        let executor = HttpToolExecutor::new("http://gateway:8080/").unwrap();
        assert_eq!(
            executor.endpoint(&invocation(Namespace::Workflow)),
            "http://gateway:8080/workflow/wf-42/invoke"
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        // Unroutable address; cancellation wins before any connect attempt resolves.
        let executor = HttpToolExecutor::new("http://10.255.255.1:9").unwrap();
        let call = invocation(Namespace::Tool);
        call.cancel.cancel();
        let err = executor.invoke(call).await.unwrap_err();
        assert!(matches!(err, ToolCallError::Execution { ref message, .. } if message == "cancelled"));
    }
}
