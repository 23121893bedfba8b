use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use promptrun_utils::types::ConfigSource;

/// Default cap on LLM calls per execution attempt
pub const DEFAULT_MAX_LLM_CALLS: u32 = 5;
/// Default cap on cumulative tool calls per execution attempt
pub const DEFAULT_MAX_TOOL_CALLS: u32 = 5;
/// Default per-tool-call timeout
pub const DEFAULT_TOOL_TIMEOUT_MS: u64 = 30_000;
/// Default pass threshold for the validation scorer
pub const DEFAULT_VALIDATION_THRESHOLD: f64 = 70.0;
/// Default number of full attempts under the validation gate
pub const DEFAULT_VALIDATION_GATE_RETRIES: u32 = 3;

pub const DEFAULT_LLM_PROVIDER: &str = "openai-compatible";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;

pub const DEFAULT_LIBRARY_PATH: &str = "prompts.yaml";
pub const DEFAULT_EXECUTION_LOG_PATH: &str = ".promptrun/logs/executions.jsonl";

/// LLM providers the client factory knows how to build.
pub const KNOWN_PROVIDERS: &[&str] = &["openai-compatible", "openai", "openrouter"];

/// `[defaults]` section: per-execution limits.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    pub max_llm_calls: Option<u32>,
    pub max_tool_calls: Option<u32>,
    pub tool_timeout_ms: Option<u64>,
    pub max_total_execution_ms: Option<u64>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            max_llm_calls: Some(DEFAULT_MAX_LLM_CALLS),
            max_tool_calls: Some(DEFAULT_MAX_TOOL_CALLS),
            tool_timeout_ms: Some(DEFAULT_TOOL_TIMEOUT_MS),
            max_total_execution_ms: None,
        }
    }
}

/// `[validation]` section: scorer threshold and gate retries.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ValidationConfig {
    pub threshold: Option<f64>,
    pub gate_retries: Option<u32>,
    /// Model override for the scorer call; falls back to `[llm] model`
    pub model: Option<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            threshold: Some(DEFAULT_VALIDATION_THRESHOLD),
            gate_retries: Some(DEFAULT_VALIDATION_GATE_RETRIES),
            model: None,
        }
    }
}

/// `[llm]` section: provider selection and default generation settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LlmConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key_env: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Some(DEFAULT_LLM_PROVIDER.to_string()),
            model: Some(DEFAULT_LLM_MODEL.to_string()),
            base_url: None,
            api_key_env: None,
            temperature: None,
            max_tokens: None,
            timeout_secs: Some(DEFAULT_LLM_TIMEOUT_SECS),
        }
    }
}

/// `[tools]` section: executor endpoint, namespace toggles, and env vars.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ToolsConfig {
    pub base_url: Option<String>,
    pub enable_activities: Option<bool>,
    pub enable_workflows: Option<bool>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// `[storage]` section: prompt library and execution log locations.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct StorageConfig {
    pub library: Option<PathBuf>,
    pub execution_log: Option<PathBuf>,
}

/// Configuration for promptrun.
///
/// `Config` is resolved with precedence CLI arguments > config file >
/// built-in defaults. Every key records where its value came from in
/// `source_attribution`.
///
/// # Discovery
///
/// [`Config::discover()`] looks for the config file in this order:
/// - the explicit `--config` path
/// - `$PROMPTRUN_HOME/config.toml`
/// - `.promptrun/config.toml` searched upward from the current directory,
///   stopping at a repository root
///
/// # Programmatic Configuration
///
/// Use [`Config::builder()`] to construct a `Config` without touching the
/// environment or filesystem.
#[derive(Debug, Clone)]
pub struct Config {
    pub defaults: Defaults,
    pub validation: ValidationConfig,
    pub llm: LlmConfig,
    pub tools: ToolsConfig,
    pub storage: StorageConfig,
    /// Config file the values were loaded from, if any
    pub config_path: Option<PathBuf>,
    pub source_attribution: HashMap<String, ConfigSource>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            defaults: Defaults::default(),
            validation: ValidationConfig::default(),
            llm: LlmConfig::default(),
            tools: ToolsConfig::default(),
            storage: StorageConfig::default(),
            config_path: None,
            source_attribution: HashMap::new(),
        }
    }
}

impl Config {
    #[must_use]
    pub fn max_llm_calls(&self) -> u32 {
        self.defaults.max_llm_calls.unwrap_or(DEFAULT_MAX_LLM_CALLS)
    }

    #[must_use]
    pub fn max_tool_calls(&self) -> u32 {
        self.defaults.max_tool_calls.unwrap_or(DEFAULT_MAX_TOOL_CALLS)
    }

    #[must_use]
    pub fn tool_timeout_ms(&self) -> u64 {
        self.defaults
            .tool_timeout_ms
            .unwrap_or(DEFAULT_TOOL_TIMEOUT_MS)
    }

    #[must_use]
    pub fn max_total_execution_ms(&self) -> Option<u64> {
        self.defaults.max_total_execution_ms
    }

    #[must_use]
    pub fn validation_threshold(&self) -> f64 {
        self.validation
            .threshold
            .unwrap_or(DEFAULT_VALIDATION_THRESHOLD)
    }

    #[must_use]
    pub fn validation_gate_retries(&self) -> u32 {
        self.validation
            .gate_retries
            .unwrap_or(DEFAULT_VALIDATION_GATE_RETRIES)
    }

    #[must_use]
    pub fn llm_provider(&self) -> &str {
        self.llm.provider.as_deref().unwrap_or(DEFAULT_LLM_PROVIDER)
    }

    #[must_use]
    pub fn llm_model(&self) -> &str {
        self.llm.model.as_deref().unwrap_or(DEFAULT_LLM_MODEL)
    }

    #[must_use]
    pub fn llm_timeout_secs(&self) -> u64 {
        self.llm.timeout_secs.unwrap_or(DEFAULT_LLM_TIMEOUT_SECS)
    }

    #[must_use]
    pub fn activities_enabled(&self) -> bool {
        self.tools.enable_activities.unwrap_or(false)
    }

    #[must_use]
    pub fn workflows_enabled(&self) -> bool {
        self.tools.enable_workflows.unwrap_or(false)
    }

    /// Prompt library path, resolved against the config root.
    #[must_use]
    pub fn library_path(&self) -> PathBuf {
        let path = self
            .storage
            .library
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LIBRARY_PATH));
        self.resolve_path(&path)
    }

    /// Execution log path, resolved against the config root.
    #[must_use]
    pub fn execution_log_path(&self) -> PathBuf {
        let path = self
            .storage
            .execution_log
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EXECUTION_LOG_PATH));
        self.resolve_path(&path)
    }

    /// Resolve a relative path against the directory owning the config file.
    ///
    /// For `<root>/.promptrun/config.toml` the base is `<root>`; for any other
    /// file it is the file's own directory. Without a config file, relative
    /// paths are returned unchanged.
    #[must_use]
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match self.config_root() {
            Some(root) => root.join(path),
            None => path.to_path_buf(),
        }
    }

    fn config_root(&self) -> Option<PathBuf> {
        let parent = self.config_path.as_ref()?.parent()?;
        if parent.file_name().is_some_and(|name| name == ".promptrun") {
            parent.parent().map(Path::to_path_buf)
        } else {
            Some(parent.to_path_buf())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.max_llm_calls(), 5);
        assert_eq!(config.max_tool_calls(), 5);
        assert_eq!(config.tool_timeout_ms(), 30_000);
        assert_eq!(config.max_total_execution_ms(), None);
        assert!((config.validation_threshold() - 70.0).abs() < f64::EPSILON);
        assert_eq!(config.validation_gate_retries(), 3);
        assert!(!config.activities_enabled());
        assert!(!config.workflows_enabled());
    }

    #[test]
    fn test_resolve_path_against_dot_dir_root() {
        let config = Config {
            config_path: Some(PathBuf::from("/work/proj/.promptrun/config.toml")),
            ..Config::default()
        };
        assert_eq!(
            config.library_path(),
            PathBuf::from("/work/proj/prompts.yaml")
        );
        assert_eq!(
            config.resolve_path(Path::new("/abs/lib.yaml")),
            PathBuf::from("/abs/lib.yaml")
        );
    }

    #[test]
    fn test_resolve_path_against_plain_file_dir() {
        let config = Config {
            config_path: Some(PathBuf::from("/etc/promptrun/custom.toml")),
            ..Config::default()
        };
        assert_eq!(
            config.execution_log_path(),
            PathBuf::from("/etc/promptrun/.promptrun/logs/executions.jsonl")
        );
    }
}
