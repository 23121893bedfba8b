//! Trace context propagated by value through an execution.
//!
//! The trace id is fixed for the whole execution. Every LLM call and every tool
//! call gets its own span, whose parent is the span of its logical predecessor.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Distributed-tracing coordinates for one hop of an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    pub trace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_name: Option<String>,
}

impl TraceContext {
    /// Start a new trace with a fresh root span.
    #[must_use]
    pub fn new_root(span_name: impl Into<String>) -> Self {
        Self {
            trace_id: new_trace_id(),
            parent_span_id: None,
            span_id: Some(new_span_id()),
            span_name: Some(span_name.into()),
        }
    }

    /// Continue an existing trace supplied by a caller.
    #[must_use]
    pub fn from_trace_id(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            parent_span_id: None,
            span_id: Some(new_span_id()),
            span_name: None,
        }
    }

    /// Mint a child span whose parent is this context's current span.
    #[must_use]
    pub fn child(&self, span_name: impl Into<String>) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            parent_span_id: self.span_id.clone(),
            span_id: Some(new_span_id()),
            span_name: Some(span_name.into()),
        }
    }

    /// Move to the next hop: the current span becomes the parent of a new span.
    pub fn advance(&mut self) {
        self.parent_span_id = self.span_id.take();
        self.span_id = Some(new_span_id());
    }

    /// Span id as a display string (`-` when absent).
    #[must_use]
    pub fn span_display(&self) -> &str {
        self.span_id.as_deref().unwrap_or("-")
    }
}

fn new_trace_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn new_span_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(16);
    id
}
