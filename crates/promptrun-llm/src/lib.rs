//! LLM client capability and providers for promptrun
//!
//! The engine only depends on the [`LlmClient`] trait. This crate provides an
//! OpenAI-compatible HTTP implementation, a factory that builds one from
//! [`Config`], and (behind `test-utils`) a scripted client for tests.

use std::sync::Arc;
use std::time::Duration;

use promptrun_config::{Config, DEFAULT_API_KEY_ENV, DEFAULT_LLM_BASE_URL};
use promptrun_utils::types::LlmSettings;

pub use promptrun_utils::error::LlmError;

mod http_client;
mod openai_compat;
mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use openai_compat::{OPENROUTER_BASE_URL, OpenAiCompatibleClient};
pub use types::{LlmClient, LlmRequest, ResponseFormat, ToolChoice};

const OPENROUTER_API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Default model settings taken from the `[llm]` config section.
#[must_use]
pub fn default_settings(config: &Config) -> LlmSettings {
    LlmSettings {
        provider: Some(config.llm_provider().to_string()),
        model: Some(config.llm_model().to_string()),
        temperature: config.llm.temperature.map(|t| t as f32),
        max_tokens: config.llm.max_tokens,
        top_p: None,
    }
}

/// Build the configured LLM client.
///
/// # Errors
///
/// - `LlmError::Unsupported` for an unknown provider
/// - `LlmError::Misconfiguration` if the API key variable is unset or the HTTP
///   client cannot be built
pub fn from_config(config: &Config) -> Result<Arc<dyn LlmClient>, LlmError> {
    let provider = config.llm_provider();

    let (default_url, default_key_env) = match provider {
        "openai-compatible" | "openai" => (DEFAULT_LLM_BASE_URL, DEFAULT_API_KEY_ENV),
        "openrouter" => (OPENROUTER_BASE_URL, OPENROUTER_API_KEY_ENV),
        other => {
            return Err(LlmError::Unsupported(format!(
                "unknown LLM provider '{other}'"
            )));
        }
    };

    let key_env = config.llm.api_key_env.as_deref().unwrap_or(default_key_env);
    let api_key = std::env::var(key_env).map_err(|_| {
        LlmError::Misconfiguration(format!(
            "API key not found in environment variable '{key_env}'. \
             Set it or configure a different [llm] api_key_env."
        ))
    })?;

    let base_url = config
        .llm
        .base_url
        .clone()
        .unwrap_or_else(|| default_url.to_string());

    let client = OpenAiCompatibleClient::new(
        provider,
        base_url,
        api_key,
        default_settings(config),
        Duration::from_secs(config.llm_timeout_secs()),
    )?;

    let client = if provider == "openrouter" {
        client.with_openrouter_headers()
    } else {
        client
    };

    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_from_config() {
        let config = Config::builder()
            .llm_model("gpt-test")
            .llm_temperature(0.5)
            .llm_max_tokens(256)
            .build()
            .unwrap();
        let settings = default_settings(&config);
        assert_eq!(settings.model.as_deref(), Some("gpt-test"));
        assert_eq!(settings.temperature, Some(0.5));
        assert_eq!(settings.max_tokens, Some(256));
    }

    #[test]
    fn test_missing_api_key_is_misconfiguration() {
        let config = Config::builder()
            .llm_api_key_env("PROMPTRUN_TEST_SURELY_UNSET_KEY")
            .build()
            .unwrap();
        match from_config(&config) {
            Err(LlmError::Misconfiguration(msg)) => {
                assert!(msg.contains("PROMPTRUN_TEST_SURELY_UNSET_KEY"));
            }
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("expected misconfiguration"),
        }
    }
}
