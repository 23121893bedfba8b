//! Response quality scoring
//!
//! A secondary LLM call grades the final answer of an execution on four
//! dimensions. The weighted overall score plus the list of critical issues
//! decide whether the response passes.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};

use promptrun_config::{Config, DEFAULT_VALIDATION_THRESHOLD};
use promptrun_llm::{LlmClient, LlmRequest, ResponseFormat, ToolChoice};
use promptrun_utils::error::LlmError;
use promptrun_utils::trace::TraceContext;
use promptrun_utils::types::{
    LlmSettings, ToolCallLog, ValidationExplanations, ValidationMetrics, ValidationScore,
    VariableMap,
};

pub const RELEVANCE_WEIGHT: f64 = 0.35;
pub const TOOL_USAGE_WEIGHT: f64 = 0.15;
pub const CLARITY_WEIGHT: f64 = 0.25;
pub const ACCURACY_WEIGHT: f64 = 0.25;

const SCORER_INSTRUCTIONS: &str = "You review answers produced by another assistant. \
Rate the final response on four dimensions, each an integer from 0 to 100:\n\
- relevance: does it address the request completely\n\
- tool_usage: were tools called when useful and their results used correctly \
(score 100 if no tools were needed)\n\
- clarity: is it well organised and easy to follow\n\
- accuracy: is it factually correct and consistent with the tool outputs\n\
Give a one-sentence explanation per dimension. List critical issues only for \
problems that make the response unusable (wrong facts, ignored instructions, \
unsafe content); otherwise return an empty list.";

/// Exchange handed to the scorer.
#[derive(Debug, Clone)]
pub struct ScoringInput<'a> {
    pub system_prompt: Option<&'a str>,
    pub user_prompt: Option<&'a str>,
    pub tool_calls: &'a [ToolCallLog],
    pub final_response: &'a str,
    /// Current execution span; the scorer call runs in a child span.
    pub trace: &'a TraceContext,
    pub request_metadata: &'a VariableMap,
}

/// Grades one final response.
#[async_trait]
pub trait ResponseScorer: Send + Sync {
    async fn score(&self, input: ScoringInput<'_>) -> Result<ValidationScore, LlmError>;
}

/// Weighted sum of the four dimension scores.
#[must_use]
pub fn overall_score(metrics: &ValidationMetrics) -> f64 {
    metrics.relevance * RELEVANCE_WEIGHT
        + metrics.tool_usage * TOOL_USAGE_WEIGHT
        + metrics.clarity * CLARITY_WEIGHT
        + metrics.accuracy * ACCURACY_WEIGHT
}

/// Build a score from raw dimension ratings, clamping each to 0..=100.
#[must_use]
pub fn assemble_score(
    metrics: ValidationMetrics,
    explanations: ValidationExplanations,
    critical_issues: Vec<String>,
    threshold: f64,
) -> ValidationScore {
    let clamp = |v: f64| if v.is_finite() { v.clamp(0.0, 100.0) } else { 0.0 };
    let metrics = ValidationMetrics {
        relevance: clamp(metrics.relevance),
        tool_usage: clamp(metrics.tool_usage),
        clarity: clamp(metrics.clarity),
        accuracy: clamp(metrics.accuracy),
    };
    let overall = overall_score(&metrics);
    ValidationScore {
        passed: overall >= threshold && critical_issues.is_empty(),
        metrics,
        explanations,
        critical_issues,
        overall_score: overall,
    }
}

#[derive(Debug, Deserialize)]
struct RawScore {
    relevance: f64,
    tool_usage: f64,
    clarity: f64,
    accuracy: f64,
    #[serde(default)]
    explanations: ValidationExplanations,
    #[serde(default)]
    critical_issues: Vec<String>,
}

/// [`ResponseScorer`] backed by one structured-output LLM call.
#[derive(Clone)]
pub struct ValidationScorer {
    llm: Arc<dyn LlmClient>,
    settings: LlmSettings,
    threshold: f64,
}

impl ValidationScorer {
    pub fn new(llm: Arc<dyn LlmClient>, settings: LlmSettings) -> Self {
        Self {
            llm,
            settings,
            threshold: DEFAULT_VALIDATION_THRESHOLD,
        }
    }

    /// Scorer using the `[validation]` threshold and model override.
    pub fn from_config(llm: Arc<dyn LlmClient>, config: &Config) -> Self {
        let mut settings = promptrun_llm::default_settings(config);
        if let Some(model) = &config.validation.model {
            settings.model = Some(model.clone());
        }
        settings.temperature = Some(0.0);
        Self::new(llm, settings).with_threshold(config.validation_threshold())
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn build_request(&self, input: &ScoringInput<'_>) -> LlmRequest {
        let mut request = LlmRequest::new(self.settings.clone(), input.trace.child("validation"));
        request.system_prompt = Some(SCORER_INSTRUCTIONS.to_string());
        request.user_prompt = Some(render_exchange(input));
        request.tool_choice = ToolChoice::None;
        request.response_format = ResponseFormat::JsonSchema {
            name: "validation_score".to_string(),
            schema: score_schema(),
        };
        request.request_metadata = input.request_metadata.clone();
        request
    }
}

#[async_trait]
impl ResponseScorer for ValidationScorer {
    async fn score(&self, input: ScoringInput<'_>) -> Result<ValidationScore, LlmError> {
        let request = self.build_request(&input);
        debug!(
            trace_id = %request.trace.trace_id,
            span_id = %request.trace.span_display(),
            "Scoring final response"
        );

        let response = self.llm.complete(request).await?;
        let raw: RawScore = serde_json::from_str(strip_code_fence(&response.content))
            .map_err(|e| LlmError::InvalidResponse(format!("unparseable validation score: {e}")))?;

        let score = assemble_score(
            ValidationMetrics {
                relevance: raw.relevance,
                tool_usage: raw.tool_usage,
                clarity: raw.clarity,
                accuracy: raw.accuracy,
            },
            raw.explanations,
            raw.critical_issues,
            self.threshold,
        );
        info!(
            overall_score = score.overall_score,
            passed = score.passed,
            critical_issues = score.critical_issues.len(),
            "Response scored"
        );
        Ok(score)
    }
}

fn render_exchange(input: &ScoringInput<'_>) -> String {
    let mut out = String::new();
    out.push_str("## System prompt\n");
    out.push_str(input.system_prompt.unwrap_or("(none)"));
    out.push_str("\n\n## User prompt\n");
    out.push_str(input.user_prompt.unwrap_or("(none)"));
    out.push_str("\n\n## Tool calls\n");
    if input.tool_calls.is_empty() {
        out.push_str("(none)\n");
    }
    for (i, call) in input.tool_calls.iter().enumerate() {
        let status = if call.successful { "ok" } else { "failed" };
        out.push_str(&format!(
            "{}. {} [{status}]\n   arguments: {}\n   output: {}\n",
            i + 1,
            call.tool_name,
            call.input_arguments,
            call.output
        ));
    }
    out.push_str("\n## Final response\n");
    out.push_str(input.final_response);
    out
}

fn score_schema() -> Value {
    let rating = json!({ "type": "number", "minimum": 0, "maximum": 100 });
    let text = json!({ "type": "string" });
    json!({
        "type": "object",
        "properties": {
            "relevance": rating,
            "tool_usage": rating,
            "clarity": rating,
            "accuracy": rating,
            "explanations": {
                "type": "object",
                "properties": {
                    "relevance": text,
                    "tool_usage": text,
                    "clarity": text,
                    "accuracy": text
                },
                "required": ["relevance", "tool_usage", "clarity", "accuracy"],
                "additionalProperties": false
            },
            "critical_issues": { "type": "array", "items": text }
        },
        "required": ["relevance", "tool_usage", "clarity", "accuracy", "explanations", "critical_issues"],
        "additionalProperties": false
    })
}

/// Drop a surrounding ```json fence if the model added one.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
