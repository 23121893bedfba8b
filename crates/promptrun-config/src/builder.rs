use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use promptrun_utils::error::ConfigError;

use crate::{Config, ConfigSource, Defaults, LlmConfig, StorageConfig, ToolsConfig, ValidationConfig};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// ```rust
    /// use promptrun_config::Config;
    ///
    /// let config = Config::builder()
    ///     .max_llm_calls(3)
    ///     .tool_timeout_ms(2_000)
    ///     .llm_model("gpt-4o")
    ///     .build()
    ///     .expect("valid config");
    /// assert_eq!(config.max_llm_calls(), 3);
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for [`Config`] that never reads the environment or filesystem.
///
/// All values set via the builder are attributed to
/// [`ConfigSource::Programmatic`].
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    max_llm_calls: Option<u32>,
    max_tool_calls: Option<u32>,
    tool_timeout_ms: Option<u64>,
    max_total_execution_ms: Option<u64>,
    validation_threshold: Option<f64>,
    validation_gate_retries: Option<u32>,
    validation_model: Option<String>,
    llm_provider: Option<String>,
    llm_model: Option<String>,
    llm_base_url: Option<String>,
    llm_api_key_env: Option<String>,
    llm_temperature: Option<f64>,
    llm_max_tokens: Option<u32>,
    tools_base_url: Option<String>,
    enable_activities: Option<bool>,
    enable_workflows: Option<bool>,
    tools_env: BTreeMap<String, String>,
    library: Option<PathBuf>,
    execution_log: Option<PathBuf>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn max_llm_calls(mut self, value: u32) -> Self {
        self.max_llm_calls = Some(value);
        self
    }

    #[must_use]
    pub fn max_tool_calls(mut self, value: u32) -> Self {
        self.max_tool_calls = Some(value);
        self
    }

    #[must_use]
    pub fn tool_timeout_ms(mut self, value: u64) -> Self {
        self.tool_timeout_ms = Some(value);
        self
    }

    #[must_use]
    pub fn max_total_execution_ms(mut self, value: u64) -> Self {
        self.max_total_execution_ms = Some(value);
        self
    }

    #[must_use]
    pub fn validation_threshold(mut self, value: f64) -> Self {
        self.validation_threshold = Some(value);
        self
    }

    #[must_use]
    pub fn validation_gate_retries(mut self, value: u32) -> Self {
        self.validation_gate_retries = Some(value);
        self
    }

    #[must_use]
    pub fn validation_model(mut self, model: impl Into<String>) -> Self {
        self.validation_model = Some(model.into());
        self
    }

    #[must_use]
    pub fn llm_provider(mut self, provider: impl Into<String>) -> Self {
        self.llm_provider = Some(provider.into());
        self
    }

    #[must_use]
    pub fn llm_model(mut self, model: impl Into<String>) -> Self {
        self.llm_model = Some(model.into());
        self
    }

    #[must_use]
    pub fn llm_base_url(mut self, url: impl Into<String>) -> Self {
        self.llm_base_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn llm_api_key_env(mut self, var: impl Into<String>) -> Self {
        self.llm_api_key_env = Some(var.into());
        self
    }

    #[must_use]
    pub fn llm_temperature(mut self, value: f64) -> Self {
        self.llm_temperature = Some(value);
        self
    }

    #[must_use]
    pub fn llm_max_tokens(mut self, value: u32) -> Self {
        self.llm_max_tokens = Some(value);
        self
    }

    #[must_use]
    pub fn tools_base_url(mut self, url: impl Into<String>) -> Self {
        self.tools_base_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn enable_activities(mut self, enabled: bool) -> Self {
        self.enable_activities = Some(enabled);
        self
    }

    #[must_use]
    pub fn enable_workflows(mut self, enabled: bool) -> Self {
        self.enable_workflows = Some(enabled);
        self
    }

    #[must_use]
    pub fn tool_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tools_env.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn library(mut self, path: impl Into<PathBuf>) -> Self {
        self.library = Some(path.into());
        self
    }

    #[must_use]
    pub fn execution_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.execution_log = Some(path.into());
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if any value is out of range.
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut attribution: HashMap<String, ConfigSource> = HashMap::new();
        let mut mark = |key: &str, set: bool| {
            let source = if set {
                ConfigSource::Programmatic
            } else {
                ConfigSource::Default
            };
            attribution.insert(key.to_string(), source);
        };

        mark("max_llm_calls", self.max_llm_calls.is_some());
        mark("max_tool_calls", self.max_tool_calls.is_some());
        mark("tool_timeout_ms", self.tool_timeout_ms.is_some());
        mark("validation_threshold", self.validation_threshold.is_some());
        mark("validation_gate_retries", self.validation_gate_retries.is_some());
        mark("llm_provider", self.llm_provider.is_some());
        mark("llm_model", self.llm_model.is_some());
        for (key, set) in [
            ("max_total_execution_ms", self.max_total_execution_ms.is_some()),
            ("validation_model", self.validation_model.is_some()),
            ("llm_base_url", self.llm_base_url.is_some()),
            ("llm_api_key_env", self.llm_api_key_env.is_some()),
            ("llm_temperature", self.llm_temperature.is_some()),
            ("llm_max_tokens", self.llm_max_tokens.is_some()),
            ("tools_base_url", self.tools_base_url.is_some()),
            ("enable_activities", self.enable_activities.is_some()),
            ("enable_workflows", self.enable_workflows.is_some()),
            ("tools_env", !self.tools_env.is_empty()),
            ("library", self.library.is_some()),
            ("execution_log", self.execution_log.is_some()),
        ] {
            if set {
                mark(key, true);
            }
        }

        let base_defaults = Defaults::default();
        let base_validation = ValidationConfig::default();
        let base_llm = LlmConfig::default();

        let config = Config {
            defaults: Defaults {
                max_llm_calls: self.max_llm_calls.or(base_defaults.max_llm_calls),
                max_tool_calls: self.max_tool_calls.or(base_defaults.max_tool_calls),
                tool_timeout_ms: self.tool_timeout_ms.or(base_defaults.tool_timeout_ms),
                max_total_execution_ms: self.max_total_execution_ms,
            },
            validation: ValidationConfig {
                threshold: self.validation_threshold.or(base_validation.threshold),
                gate_retries: self.validation_gate_retries.or(base_validation.gate_retries),
                model: self.validation_model,
            },
            llm: LlmConfig {
                provider: self.llm_provider.or(base_llm.provider),
                model: self.llm_model.or(base_llm.model),
                base_url: self.llm_base_url,
                api_key_env: self.llm_api_key_env,
                temperature: self.llm_temperature,
                max_tokens: self.llm_max_tokens,
                timeout_secs: base_llm.timeout_secs,
            },
            tools: ToolsConfig {
                base_url: self.tools_base_url,
                enable_activities: self.enable_activities,
                enable_workflows: self.enable_workflows,
                env: self.tools_env,
            },
            storage: StorageConfig {
                library: self.library,
                execution_log: self.execution_log,
            },
            config_path: None,
            source_attribution: attribution,
        };

        config.validate()?;
        Ok(config)
    }
}
