use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use promptrun_config::{
    Config, DEFAULT_MAX_LLM_CALLS, DEFAULT_MAX_TOOL_CALLS, DEFAULT_TOOL_TIMEOUT_MS,
    DEFAULT_VALIDATION_GATE_RETRIES,
};
use promptrun_utils::trace::TraceContext;
use promptrun_utils::types::{LlmResponse, LlmSettings, Message, ValidationScore, VariableMap};

/// Per-request limit overrides. Unset fields fall back to [`EngineSettings`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptLimits {
    pub max_llm_calls: Option<u32>,
    pub max_tool_calls: Option<u32>,
    pub tool_timeout_ms: Option<u64>,
    pub max_total_execution_ms: Option<u64>,
}

/// Limits in force for one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveLimits {
    pub max_llm_calls: u32,
    pub max_tool_calls: u32,
    pub tool_timeout: Duration,
    pub max_total_execution: Option<Duration>,
}

/// One invocation of a stored prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRequest {
    pub prompt_id: String,
    pub system_variables: VariableMap,
    pub user_variables: VariableMap,
    /// Literal user prompt; takes precedence over the prompt's user template.
    pub user_prompt: Option<String>,
    pub request_id: Option<String>,
    pub request_metadata: VariableMap,
    pub llm_settings: Option<LlmSettings>,
    pub limits: PromptLimits,
    /// Caller trace to continue; a new root trace is minted when absent.
    pub trace: Option<TraceContext>,
    /// Prior conversation placed between the system and user prompt.
    pub message_history: Vec<Message>,
    /// Tool environment overrides, layered over `[tools.env]`.
    pub env: BTreeMap<String, String>,
}

impl ExecutionRequest {
    #[must_use]
    pub fn new(prompt_id: impl Into<String>) -> Self {
        Self {
            prompt_id: prompt_id.into(),
            system_variables: VariableMap::new(),
            user_variables: VariableMap::new(),
            user_prompt: None,
            request_id: None,
            request_metadata: VariableMap::new(),
            llm_settings: None,
            limits: PromptLimits::default(),
            trace: None,
            message_history: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn system_var(mut self, name: impl Into<String>, value: Value) -> Self {
        self.system_variables.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn user_var(mut self, name: impl Into<String>, value: Value) -> Self {
        self.user_variables.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn user_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.user_prompt = Some(prompt.into());
        self
    }

    #[must_use]
    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn limits(mut self, limits: PromptLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn llm_settings(mut self, settings: LlmSettings) -> Self {
        self.llm_settings = Some(settings);
        self
    }

    #[must_use]
    pub fn trace(mut self, trace: TraceContext) -> Self {
        self.trace = Some(trace);
        self
    }
}

/// Engine-wide defaults, normally taken from [`Config`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub max_llm_calls: u32,
    pub max_tool_calls: u32,
    pub tool_timeout: Duration,
    pub max_total_execution: Option<Duration>,
    pub gate_retries: u32,
    pub llm_defaults: LlmSettings,
    pub tool_env: BTreeMap<String, String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_llm_calls: DEFAULT_MAX_LLM_CALLS,
            max_tool_calls: DEFAULT_MAX_TOOL_CALLS,
            tool_timeout: Duration::from_millis(DEFAULT_TOOL_TIMEOUT_MS),
            max_total_execution: None,
            gate_retries: DEFAULT_VALIDATION_GATE_RETRIES,
            llm_defaults: LlmSettings::default(),
            tool_env: BTreeMap::new(),
        }
    }
}

impl EngineSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_llm_calls: config.max_llm_calls(),
            max_tool_calls: config.max_tool_calls(),
            tool_timeout: Duration::from_millis(config.tool_timeout_ms()),
            max_total_execution: config.max_total_execution_ms().map(Duration::from_millis),
            gate_retries: config.validation_gate_retries(),
            llm_defaults: promptrun_llm::default_settings(config),
            tool_env: config.tools.env.clone(),
        }
    }

    #[must_use]
    pub fn limits_for(&self, overrides: &PromptLimits) -> EffectiveLimits {
        EffectiveLimits {
            max_llm_calls: overrides.max_llm_calls.unwrap_or(self.max_llm_calls),
            max_tool_calls: overrides.max_tool_calls.unwrap_or(self.max_tool_calls),
            tool_timeout: overrides
                .tool_timeout_ms
                .map_or(self.tool_timeout, Duration::from_millis),
            max_total_execution: overrides
                .max_total_execution_ms
                .map(Duration::from_millis)
                .or(self.max_total_execution),
        }
    }

    #[must_use]
    pub fn env_for(&self, overrides: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut env = self.tool_env.clone();
        env.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }
}

/// Caller-facing result: the final LLM response plus execution facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResponse {
    #[serde(flatten)]
    pub response: LlmResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_passed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_results: Option<ValidationScore>,
    pub attempts: u32,
    pub llm_call_count: u32,
    pub tool_call_count: u32,
    pub execution_log_id: String,
    pub request_id: String,
    pub trace_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_limits_override_defaults() {
        let settings = EngineSettings {
            max_total_execution: Some(Duration::from_secs(60)),
            ..EngineSettings::default()
        };
        let limits = settings.limits_for(&PromptLimits {
            max_llm_calls: Some(2),
            tool_timeout_ms: Some(250),
            ..PromptLimits::default()
        });
        assert_eq!(limits.max_llm_calls, 2);
        assert_eq!(limits.max_tool_calls, DEFAULT_MAX_TOOL_CALLS);
        assert_eq!(limits.tool_timeout, Duration::from_millis(250));
        assert_eq!(limits.max_total_execution, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_request_env_layers_over_config_env() {
        let settings = EngineSettings {
            tool_env: BTreeMap::from([
                ("REGION".into(), "eu".into()),
                ("TIER".into(), "free".into()),
            ]),
            ..EngineSettings::default()
        };
        let env = settings.env_for(&BTreeMap::from([("TIER".into(), "pro".into())]));
        assert_eq!(env["REGION"], "eu");
        assert_eq!(env["TIER"], "pro");
    }

    #[test]
    fn test_response_serializes_flat() {
        let response = ExecutionResponse {
            response: LlmResponse {
                content: "4".into(),
                ..LlmResponse::default()
            },
            validation_passed: None,
            validation_results: None,
            attempts: 1,
            llm_call_count: 1,
            tool_call_count: 0,
            execution_log_id: "e1".into(),
            request_id: "r1".into(),
            trace_id: "t1".into(),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["content"], "4");
        assert_eq!(value["attempts"], 1);
        assert!(value.get("validation_passed").is_none());
    }
}
