//! Exit code constants and error mapping for the promptrun CLI.
//!
//! # Exit Code Table
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Execution completed successfully |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments or configuration |
//! | 3 | `INVALID_INPUT` | Variable validation or inactive prompt |
//! | 4 | `NOT_FOUND` | Prompt or catalog descriptor missing |
//! | 5 | `BUDGET_EXCEEDED` | A per-execution budget was exhausted |
//! | 6 | `VALIDATION_GATE` | Response never passed the validation gate |
//! | 70 | `LLM_FAILURE` | LLM provider invocation failed |

use crate::error::{CatalogError, LlmError, PromptRunError};

/// Exit codes matching the documented exit code table.
///
/// Use [`as_i32()`](Self::as_i32) to get the numeric value for
/// `std::process::exit()`.
///
/// ```rust
/// use promptrun_utils::exit_codes::ExitCode;
///
/// assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
/// assert_eq!(ExitCode::VALIDATION_GATE, ExitCode::from_i32(6));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success - execution completed successfully
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// CLI arguments error - invalid arguments or configuration
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// Invalid input - variables failed validation or prompt not executable
    pub const INVALID_INPUT: ExitCode = ExitCode(3);

    /// Not found - prompt or declared descriptor does not exist
    pub const NOT_FOUND: ExitCode = ExitCode(4);

    /// Budget exceeded - LLM calls, tool calls, or total time
    pub const BUDGET_EXCEEDED: ExitCode = ExitCode(5);

    /// Validation gate - every gate attempt scored below threshold
    pub const VALIDATION_GATE: ExitCode = ExitCode(6);

    /// LLM failure - provider invocation failed
    pub const LLM_FAILURE: ExitCode = ExitCode(70);

    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<i32> for ExitCode {
    fn from(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

impl PromptRunError {
    /// Map this error to a CLI exit code.
    #[must_use]
    pub fn to_exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) => ExitCode::CLI_ARGS,
            Self::Variable(_) | Self::PromptInactive { .. } => ExitCode::INVALID_INPUT,
            Self::PromptNotFound { .. } => ExitCode::NOT_FOUND,
            Self::Catalog(err) => match err {
                CatalogError::NotFound { .. } | CatalogError::UnknownToolCall { .. } => {
                    ExitCode::NOT_FOUND
                }
                CatalogError::ToolUnavailable { .. }
                | CatalogError::DuplicateExternalName { .. } => ExitCode::INVALID_INPUT,
                CatalogError::Store(_) => ExitCode::INTERNAL,
            },
            Self::Budget(_) => ExitCode::BUDGET_EXCEEDED,
            Self::ValidationGateFailed { .. } => ExitCode::VALIDATION_GATE,
            Self::Llm(llm_err) => match llm_err {
                LlmError::Misconfiguration(_) | LlmError::Unsupported(_) => ExitCode::CLI_ARGS,
                _ => ExitCode::LLM_FAILURE,
            },
            Self::Store(_) | Self::Unexpected { .. } => ExitCode::INTERNAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BudgetError, ConfigError, VariableError};
    use crate::types::{LlmResponse, VariableKind};

    #[test]
    fn test_exit_code_values_are_stable() {
        assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
        assert_eq!(ExitCode::INTERNAL.as_i32(), 1);
        assert_eq!(ExitCode::CLI_ARGS.as_i32(), 2);
        assert_eq!(ExitCode::INVALID_INPUT.as_i32(), 3);
        assert_eq!(ExitCode::NOT_FOUND.as_i32(), 4);
        assert_eq!(ExitCode::BUDGET_EXCEEDED.as_i32(), 5);
        assert_eq!(ExitCode::VALIDATION_GATE.as_i32(), 6);
        assert_eq!(ExitCode::LLM_FAILURE.as_i32(), 70);
    }

    #[test]
    fn test_to_exit_code_mapping() {
        let config = PromptRunError::Config(ConfigError::InvalidFile("bad".into()));
        assert_eq!(config.to_exit_code(), ExitCode::CLI_ARGS);

        let var = PromptRunError::Variable(VariableError::MissingVariable { name: "x".into() });
        assert_eq!(var.to_exit_code(), ExitCode::INVALID_INPUT);

        let budget = PromptRunError::Budget(BudgetError::MaxToolCallsExceeded {
            limit: 1,
            attempted: 2,
        });
        assert_eq!(budget.to_exit_code(), ExitCode::BUDGET_EXCEEDED);

        let gate = PromptRunError::ValidationGateFailed {
            attempts: 3,
            last_response: Box::new(LlmResponse::default()),
            last_score: None,
        };
        assert_eq!(gate.to_exit_code(), ExitCode::VALIDATION_GATE);

        let auth = PromptRunError::Llm(LlmError::ProviderAuth("no key".into()));
        assert_eq!(auth.to_exit_code(), ExitCode::LLM_FAILURE);

        let misconfig = PromptRunError::Llm(LlmError::Misconfiguration("provider".into()));
        assert_eq!(misconfig.to_exit_code(), ExitCode::CLI_ARGS);

        let required = PromptRunError::Variable(VariableError::MissingRequiredVariable {
            name: "a".into(),
            kind: VariableKind::User,
        });
        assert_eq!(i32::from(required.to_exit_code()), 3);
    }
}
