use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::types::{LlmResponse, Namespace, PromptStatus, ValidationScore, VariableKind};

/// Library-level error type for prompt execution.
///
/// `PromptRunError` is returned by every orchestrator entry point. It provides:
/// - Detailed variants for programmatic handling
/// - User-friendly messages with context and suggestions
/// - An HTTP-like status code and a uniform [`ErrorEnvelope`] for callers
///
/// # Taxonomy
///
/// | Kind | Variants | Status |
/// |------|----------|--------|
/// | Validation | `Variable`, `PromptInactive`, `Budget` | 400 |
/// | Not found | `PromptNotFound`, `Catalog` (missing ids) | 404 |
/// | Validation gate | `ValidationGateFailed` | 422 |
/// | Unexpected | `Llm`, `Store`, `Config`, `Unexpected` | 500 |
///
/// Per-tool-call failures ([`ToolCallError`]) never surface here: they are
/// isolated inside a batch and reported back to the model as failed results.
#[derive(Error, Debug)]
pub enum PromptRunError {
    #[error("Variable error: {0}")]
    Variable(#[from] VariableError),

    #[error("Prompt not found: {prompt_id}")]
    PromptNotFound { prompt_id: String },

    #[error("Prompt {prompt_id} is not active (status: {status})")]
    PromptInactive {
        prompt_id: String,
        status: PromptStatus,
    },

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Budget exceeded: {0}")]
    Budget(#[from] BudgetError),

    #[error("LLM backend error: {0}")]
    Llm(#[from] LlmError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Validation gate failed after {attempts} attempt(s)")]
    ValidationGateFailed {
        attempts: u32,
        last_response: Box<LlmResponse>,
        last_score: Option<Box<ValidationScore>>,
    },

    #[error("Unexpected error: {message}")]
    Unexpected { message: String },
}

/// Uniform error payload surfaced to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEnvelope {
    pub status: u16,
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl PromptRunError {
    /// HTTP-like status for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Variable(_) | Self::PromptInactive { .. } | Self::Budget(_) => 400,
            Self::PromptNotFound { .. } => 404,
            Self::Catalog(err) => match err {
                CatalogError::NotFound { .. } | CatalogError::UnknownToolCall { .. } => 404,
                CatalogError::ToolUnavailable { .. }
                | CatalogError::DuplicateExternalName { .. } => 400,
                CatalogError::Store(_) => 500,
            },
            Self::ValidationGateFailed { .. } => 422,
            Self::Llm(_) | Self::Config(_) | Self::Store(_) | Self::Unexpected { .. } => 500,
        }
    }

    /// Stable kind label for the error envelope.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Variable(_) | Self::PromptInactive { .. } => "validation_error",
            Self::PromptNotFound { .. } => "not_found_error",
            Self::Catalog(err) => match err {
                CatalogError::NotFound { .. } | CatalogError::UnknownToolCall { .. } => {
                    "not_found_error"
                }
                CatalogError::ToolUnavailable { .. }
                | CatalogError::DuplicateExternalName { .. } => "validation_error",
                CatalogError::Store(_) => "unexpected_error",
            },
            Self::Budget(_) => "budget_exceeded_error",
            Self::ValidationGateFailed { .. } => "validation_gate_failure",
            Self::Llm(LlmError::Timeout { .. }) => "timeout_error",
            Self::Llm(_) | Self::Config(_) | Self::Store(_) | Self::Unexpected { .. } => {
                "unexpected_error"
            }
        }
    }

    /// Build the caller-facing envelope. Gate failures carry the last
    /// response and score so near-miss results are not lost.
    #[must_use]
    pub fn to_envelope(&self) -> ErrorEnvelope {
        let details = match self {
            Self::Variable(err) => Some(json!({ "variable": err.variable_name() })),
            Self::PromptNotFound { prompt_id } | Self::PromptInactive { prompt_id, .. } => {
                Some(json!({ "prompt_id": prompt_id }))
            }
            Self::Catalog(CatalogError::NotFound { namespace, missing }) => {
                Some(json!({ "namespace": namespace, "missing_ids": missing }))
            }
            Self::Catalog(CatalogError::ToolUnavailable { names }) => {
                Some(json!({ "unavailable": names }))
            }
            Self::Budget(err) => Some(err.details()),
            Self::ValidationGateFailed {
                attempts,
                last_response,
                last_score,
            } => Some(json!({
                "attempts": attempts,
                "last_response": last_response,
                "last_score": last_score,
            })),
            _ => None,
        };

        ErrorEnvelope {
            status: self.status_code(),
            kind: self.kind(),
            message: self.user_message(),
            details,
        }
    }

    /// Wrap any other failure, keeping its message chain.
    pub fn unexpected(err: impl std::fmt::Display) -> Self {
        Self::Unexpected {
            message: err.to_string(),
        }
    }
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Validation,
    NotFound,
    ResourceLimits,
    ToolExecution,
    LlmIntegration,
    Storage,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::Validation => write!(f, "Validation"),
            Self::NotFound => write!(f, "Not Found"),
            Self::ResourceLimits => write!(f, "Resource Limits"),
            Self::ToolExecution => write!(f, "Tool Execution"),
            Self::LlmIntegration => write!(f, "LLM Integration"),
            Self::Storage => write!(f, "Storage"),
            Self::Internal => write!(f, "Internal"),
        }
    }
}

impl UserFriendlyError for PromptRunError {
    fn user_message(&self) -> String {
        match self {
            Self::Variable(err) => err.user_message(),
            Self::PromptNotFound { prompt_id } => format!("Prompt '{prompt_id}' does not exist"),
            Self::PromptInactive { prompt_id, status } => {
                format!("Prompt '{prompt_id}' cannot be executed while {status}")
            }
            Self::Catalog(err) => err.user_message(),
            Self::Budget(err) => err.user_message(),
            Self::Llm(err) => err.user_message(),
            Self::Config(err) => err.user_message(),
            Self::Store(err) => err.user_message(),
            Self::ValidationGateFailed { attempts, .. } => format!(
                "Response did not pass the validation gate after {attempts} attempt(s)"
            ),
            Self::Unexpected { message } => format!("Unexpected error: {message}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Variable(err) => err.context(),
            Self::PromptInactive { .. } => {
                Some("Only prompts with status ACTIVE can be executed.".to_string())
            }
            Self::Catalog(err) => err.context(),
            Self::Budget(err) => err.context(),
            Self::Llm(err) => err.context(),
            Self::Config(err) => err.context(),
            Self::ValidationGateFailed { .. } => Some(
                "Each gate attempt re-runs the full exchange and scores the final answer."
                    .to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Variable(err) => err.suggestions(),
            Self::PromptNotFound { .. } => vec![
                "Check the prompt id for typos".to_string(),
                "Run 'promptrun prompts' to list available prompts".to_string(),
            ],
            Self::PromptInactive { .. } => {
                vec!["Set the prompt status to ACTIVE in the prompt library".to_string()]
            }
            Self::Catalog(err) => err.suggestions(),
            Self::Budget(err) => err.suggestions(),
            Self::Llm(err) => err.suggestions(),
            Self::Config(err) => err.suggestions(),
            Self::ValidationGateFailed { .. } => vec![
                "Inspect the critical issues in the last score".to_string(),
                "Tighten the prompt templates or lower [validation] threshold".to_string(),
            ],
            _ => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Variable(_) | Self::PromptInactive { .. } | Self::ValidationGateFailed { .. } => {
                ErrorCategory::Validation
            }
            Self::PromptNotFound { .. } => ErrorCategory::NotFound,
            Self::Catalog(err) => err.category(),
            Self::Budget(_) => ErrorCategory::ResourceLimits,
            Self::Llm(_) => ErrorCategory::LlmIntegration,
            Self::Config(_) => ErrorCategory::Configuration,
            Self::Store(_) => ErrorCategory::Storage,
            Self::Unexpected { .. } => ErrorCategory::Internal,
        }
    }
}

/// Template variable errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VariableError {
    #[error("Missing variable '{name}' referenced by template")]
    MissingVariable { name: String },

    #[error("Missing required {kind} variable '{name}'")]
    MissingRequiredVariable { name: String, kind: VariableKind },

    #[error("Type mismatch for {kind} variable '{name}': expected {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        kind: VariableKind,
        expected: String,
        actual: String,
    },
}

impl VariableError {
    #[must_use]
    pub fn variable_name(&self) -> &str {
        match self {
            Self::MissingVariable { name }
            | Self::MissingRequiredVariable { name, .. }
            | Self::TypeMismatch { name, .. } => name,
        }
    }
}

impl UserFriendlyError for VariableError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::MissingVariable { .. } => Some(
                "Every ${name} placeholder in a template must resolve; there is no empty fallback."
                    .to_string(),
            ),
            Self::MissingRequiredVariable { .. } | Self::TypeMismatch { .. } => Some(
                "Variables are checked against the prompt's declared variable spec.".to_string(),
            ),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::MissingVariable { name } | Self::MissingRequiredVariable { name, .. } => {
                vec![format!("Pass a value for '{name}' (e.g. --var {name}=...)")]
            }
            Self::TypeMismatch { name, expected, .. } => {
                vec![format!("Pass '{name}' as a JSON {expected}")]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Validation
    }
}

/// Tool/activity/workflow catalog errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("{namespace} descriptor(s) not found: {}", missing.join(", "))]
    NotFound {
        namespace: Namespace,
        missing: Vec<String>,
    },

    #[error("Tool(s) not available for execution: {}", names.join(", "))]
    ToolUnavailable { names: Vec<String> },

    #[error("External name '{name}' is declared in both {first} and {second} namespaces")]
    DuplicateExternalName {
        name: String,
        first: Namespace,
        second: Namespace,
    },

    #[error("Model requested unknown tool '{name}'")]
    UnknownToolCall { name: String },

    #[error("Catalog store failure: {0}")]
    Store(String),
}

impl UserFriendlyError for CatalogError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::NotFound { .. } => Some(
                "Every tool, activity, and workflow id declared on a prompt must exist.".to_string(),
            ),
            Self::ToolUnavailable { .. } => {
                Some("Tools must be ACTIVE or DEPLOYED to be offered to the model.".to_string())
            }
            Self::DuplicateExternalName { .. } => Some(
                "External names route model tool calls and must be unique per execution."
                    .to_string(),
            ),
            Self::UnknownToolCall { .. } => Some(
                "The model returned a call that does not match any offered descriptor.".to_string(),
            ),
            Self::Store(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::NotFound { missing, .. } => {
                vec![format!("Register or remove ids: {}", missing.join(", "))]
            }
            Self::ToolUnavailable { names } => {
                vec![format!("Activate or deploy: {}", names.join(", "))]
            }
            Self::DuplicateExternalName { name, .. } => {
                vec![format!("Rename one of the descriptors exposing '{name}'")]
            }
            _ => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } | Self::UnknownToolCall { .. } => ErrorCategory::NotFound,
            Self::ToolUnavailable { .. } | Self::DuplicateExternalName { .. } => {
                ErrorCategory::Validation
            }
            Self::Store(_) => ErrorCategory::Storage,
        }
    }
}

/// Per-execution budget errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BudgetError {
    #[error("Max LLM calls exceeded: attempted call {attempted}, limit is {limit}")]
    MaxLlmCallsExceeded { limit: u32, attempted: u32 },

    #[error("Max tool calls exceeded: {attempted} requested in total, limit is {limit}")]
    MaxToolCallsExceeded { limit: u32, attempted: u32 },

    #[error("Total execution time exceeded: {elapsed_ms}ms elapsed, limit is {limit_ms}ms")]
    TotalTimeExceeded { limit_ms: u64, elapsed_ms: u64 },
}

impl BudgetError {
    fn details(&self) -> Value {
        match self {
            Self::MaxLlmCallsExceeded { limit, attempted } => {
                json!({ "budget": "max_llm_calls", "limit": limit, "attempted": attempted })
            }
            Self::MaxToolCallsExceeded { limit, attempted } => {
                json!({ "budget": "max_tool_calls", "limit": limit, "attempted": attempted })
            }
            Self::TotalTimeExceeded {
                limit_ms,
                elapsed_ms,
            } => json!({
                "budget": "max_total_execution_ms",
                "limit": limit_ms,
                "elapsed_ms": elapsed_ms,
            }),
        }
    }
}

impl UserFriendlyError for BudgetError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        Some("Budgets bound the LLM-call/tool-call loop of a single execution.".to_string())
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::MaxLlmCallsExceeded { .. } => {
                vec!["Raise max_llm_calls in the request or [defaults]".to_string()]
            }
            Self::MaxToolCallsExceeded { .. } => {
                vec!["Raise max_tool_calls in the request or [defaults]".to_string()]
            }
            Self::TotalTimeExceeded { .. } => {
                vec!["Raise max_total_execution_ms or reduce tool latency".to_string()]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::ResourceLimits
    }
}

/// Failure of a single tool call inside a batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolCallError {
    #[error("Tool '{tool}' timed out after {timeout_ms}ms")]
    Timeout { tool: String, timeout_ms: u64 },

    #[error("Tool '{tool}' failed: {message}")]
    Execution { tool: String, message: String },

    #[error("Tool '{tool}' routes to the {namespace} namespace, which is disabled")]
    NamespaceDisabled { tool: String, namespace: Namespace },
}

impl UserFriendlyError for ToolCallError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        Some("Failed tool calls are returned to the model as failed results.".to_string())
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Timeout { .. } => vec!["Raise tool_timeout_ms or speed up the tool".to_string()],
            Self::Execution { .. } => Vec::new(),
            Self::NamespaceDisabled { namespace, .. } => {
                vec![format!("Set [tools] enable_{namespace}s = true to execute these calls")]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::ToolExecution
    }
}

/// Error type for LLM backend operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// Transport-level failure (HTTP connectivity)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider authentication failure (401, 403, missing API key)
    #[error("Provider authentication error: {0}")]
    ProviderAuth(String),

    /// Provider quota/rate limit exceeded (429)
    #[error("Provider quota exceeded: {0}")]
    ProviderQuota(String),

    /// Provider service outage (5xx errors)
    #[error("Provider outage: {0}")]
    ProviderOutage(String),

    /// Invocation timed out
    #[error("Timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// Provider answered but the payload could not be used
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration error
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),

    /// Unsupported feature or provider
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl UserFriendlyError for LlmError {
    fn user_message(&self) -> String {
        match self {
            Self::Transport(msg) => format!("LLM transport error: {msg}"),
            Self::ProviderAuth(msg) => format!("LLM provider authentication failed: {msg}"),
            Self::ProviderQuota(msg) => format!("LLM provider quota exceeded: {msg}"),
            Self::ProviderOutage(msg) => format!("LLM provider service outage: {msg}"),
            Self::Timeout { duration } => format!("LLM call timed out after {duration:?}"),
            Self::InvalidResponse(msg) => format!("LLM returned an unusable response: {msg}"),
            Self::Misconfiguration(msg) => format!("LLM configuration error: {msg}"),
            Self::Unsupported(msg) => format!("LLM feature not supported: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Transport(_) => {
                Some("Transport errors occur when the LLM endpoint cannot be reached.".to_string())
            }
            Self::ProviderAuth(_) => Some(
                "Authentication errors indicate missing or invalid API keys or credentials."
                    .to_string(),
            ),
            Self::ProviderQuota(_) => Some(
                "Quota errors occur when rate limits or usage limits are exceeded.".to_string(),
            ),
            Self::ProviderOutage(_) => {
                Some("Provider outages are temporary service disruptions.".to_string())
            }
            Self::Timeout { .. } => Some(
                "Timeouts occur when LLM calls take longer than [llm] timeout_secs.".to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::ProviderAuth(_) => vec![
                "Check that the API key environment variable named by [llm] api_key_env is set"
                    .to_string(),
            ],
            Self::ProviderQuota(_) => vec!["Wait and retry, or check your plan limits".to_string()],
            Self::ProviderOutage(_) | Self::Transport(_) => {
                vec!["Retry later or check [llm] base_url".to_string()]
            }
            Self::Timeout { .. } => vec!["Increase [llm] timeout_secs".to_string()],
            Self::Misconfiguration(_) | Self::Unsupported(_) => {
                vec!["Review the [llm] section of .promptrun/config.toml".to_string()]
            }
            Self::InvalidResponse(_) => vec!["Retry with a more capable model".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::LlmIntegration
    }
}

/// Configuration-related errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },

    #[error("Configuration discovery failed: {reason}")]
    DiscoveryFailed { reason: String },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("Configuration file has invalid format: {reason}")
            }
            Self::MissingRequired(key) => format!("Required configuration '{key}' is missing"),
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::NotFound { path } => format!("Configuration file not found: {path}"),
            Self::DiscoveryFailed { reason } => {
                format!("Failed to discover configuration: {reason}")
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::NotFound { .. } | Self::DiscoveryFailed { .. } => Some(
                "promptrun searches for .promptrun/config.toml starting from the current directory upward."
                    .to_string(),
            ),
            Self::InvalidFile(_) => Some("Configuration files must be valid TOML.".to_string()),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec!["Check the TOML syntax".to_string()],
            Self::MissingRequired(key) => {
                vec![format!("Add '{key}' to .promptrun/config.toml")]
            }
            Self::InvalidValue { .. } => {
                vec!["Remove the option to use the default value".to_string()]
            }
            Self::NotFound { .. } | Self::DiscoveryFailed { .. } => vec![
                "Create .promptrun/config.toml in your project root".to_string(),
                "Use --config <path> to specify the file explicitly".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// Prompt store and log sink errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("I/O failure at {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("Store backend failure: {0}")]
    Backend(String),
}

impl UserFriendlyError for StoreError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        None
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Io { path, .. } => vec![format!("Check that '{path}' is readable and writable")],
            Self::Parse { path, .. } => vec![format!("Fix the syntax of '{path}'")],
            Self::Backend(_) => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_taxonomy() {
        let missing = PromptRunError::Variable(VariableError::MissingRequiredVariable {
            name: "role".into(),
            kind: VariableKind::System,
        });
        assert_eq!(missing.status_code(), 400);
        assert_eq!(missing.kind(), "validation_error");

        let not_found = PromptRunError::PromptNotFound {
            prompt_id: "p".into(),
        };
        assert_eq!(not_found.status_code(), 404);

        let catalog = PromptRunError::Catalog(CatalogError::NotFound {
            namespace: Namespace::Tool,
            missing: vec!["t1".into()],
        });
        assert_eq!(catalog.status_code(), 404);
        assert_eq!(catalog.kind(), "not_found_error");

        let budget = PromptRunError::Budget(BudgetError::MaxLlmCallsExceeded {
            limit: 2,
            attempted: 3,
        });
        assert_eq!(budget.status_code(), 400);
        assert_eq!(budget.kind(), "budget_exceeded_error");

        let unexpected = PromptRunError::unexpected("boom");
        assert_eq!(unexpected.status_code(), 500);
    }

    #[test]
    fn test_gate_failure_envelope_carries_last_attempt() {
        let err = PromptRunError::ValidationGateFailed {
            attempts: 3,
            last_response: Box::new(LlmResponse {
                content: "near miss".into(),
                ..Default::default()
            }),
            last_score: Some(Box::new(ValidationScore {
                overall_score: 64.0,
                ..Default::default()
            })),
        };

        let envelope = err.to_envelope();
        assert_eq!(envelope.status, 422);
        assert_eq!(envelope.kind, "validation_gate_failure");

        let details = envelope.details.unwrap();
        assert_eq!(details["attempts"], 3);
        assert_eq!(details["last_response"]["content"], "near miss");
        assert_eq!(details["last_score"]["overall_score"], 64.0);
    }

    #[test]
    fn test_catalog_not_found_lists_missing_ids() {
        let err = CatalogError::NotFound {
            namespace: Namespace::Activity,
            missing: vec!["a1".into(), "a2".into()],
        };
        assert_eq!(err.to_string(), "activity descriptor(s) not found: a1, a2");
    }

    #[test]
    fn test_llm_timeout_kind() {
        let err = PromptRunError::Llm(LlmError::Timeout {
            duration: Duration::from_secs(3),
        });
        assert_eq!(err.kind(), "timeout_error");
        assert!(!err.suggestions().is_empty());
    }
}
