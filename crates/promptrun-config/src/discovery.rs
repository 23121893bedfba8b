use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use promptrun_utils::error::ConfigError;
use promptrun_utils::types::ConfigSource;

use crate::{CliArgs, Config, Defaults, LlmConfig, StorageConfig, ToolsConfig, ValidationConfig};

/// Environment variable pointing at a directory holding `config.toml`
pub const PROMPTRUN_HOME_ENV: &str = "PROMPTRUN_HOME";

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize, Serialize)]
struct TomlConfig {
    defaults: Option<TomlDefaults>,
    validation: Option<TomlValidation>,
    llm: Option<TomlLlm>,
    tools: Option<TomlTools>,
    storage: Option<TomlStorage>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct TomlDefaults {
    max_llm_calls: Option<u32>,
    max_tool_calls: Option<u32>,
    tool_timeout_ms: Option<u64>,
    max_total_execution_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct TomlValidation {
    threshold: Option<f64>,
    gate_retries: Option<u32>,
    model: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct TomlLlm {
    provider: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
    api_key_env: Option<String>,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct TomlTools {
    base_url: Option<String>,
    enable_activities: Option<bool>,
    enable_workflows: Option<bool>,
    env: Option<std::collections::BTreeMap<String, String>>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct TomlStorage {
    library: Option<PathBuf>,
    execution_log: Option<PathBuf>,
}

/// Overwrite `target` when `value` is set and record where it came from.
fn apply<T>(
    target: &mut Option<T>,
    value: Option<T>,
    key: &str,
    source: ConfigSource,
    attribution: &mut HashMap<String, ConfigSource>,
) {
    if let Some(v) = value {
        *target = Some(v);
        attribution.insert(key.to_string(), source);
    }
}

impl Config {
    /// Discover and load configuration with precedence: CLI > file > defaults
    ///
    /// Honors `$PROMPTRUN_HOME` and searches upward from the current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be determined, a config
    /// file exists but cannot be parsed, or validation fails.
    pub fn discover(cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let start_dir = std::env::current_dir().map_err(|e| ConfigError::DiscoveryFailed {
            reason: format!("failed to get current directory: {e}"),
        })?;

        let mut args = cli_args.clone();
        if args.config_path.is_none()
            && let Some(home) = std::env::var_os(PROMPTRUN_HOME_ENV)
        {
            let candidate = PathBuf::from(home).join("config.toml");
            if candidate.exists() {
                args.config_path = Some(candidate);
            }
        }

        Self::discover_from(&start_dir, &args)
    }

    /// Discover and load configuration starting from a specific directory
    ///
    /// The path-driven variant used by tests; it reads no environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or the
    /// resulting configuration fails validation.
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let mut source_attribution = HashMap::new();

        let mut defaults = Defaults::default();
        let mut validation = ValidationConfig::default();
        let mut llm = LlmConfig::default();
        let mut tools = ToolsConfig::default();
        let mut storage = StorageConfig::default();

        for key in [
            "max_llm_calls",
            "max_tool_calls",
            "tool_timeout_ms",
            "validation_threshold",
            "validation_gate_retries",
            "llm_provider",
            "llm_model",
            "llm_timeout_secs",
        ] {
            source_attribution.insert(key.to_string(), ConfigSource::Default);
        }

        let config_path = match &cli_args.config_path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(ConfigError::NotFound {
                        path: explicit.display().to_string(),
                    });
                }
                Some(explicit.clone())
            }
            None => Self::discover_config_file_from(start_dir),
        };

        if let Some(path) = &config_path {
            tracing::debug!(path = %path.display(), "Loading config file");
            let file = Self::load_config_file(path)?;
            let src = ConfigSource::Config;
            let attr = &mut source_attribution;

            if let Some(d) = file.defaults {
                apply(&mut defaults.max_llm_calls, d.max_llm_calls, "max_llm_calls", src, attr);
                apply(&mut defaults.max_tool_calls, d.max_tool_calls, "max_tool_calls", src, attr);
                apply(&mut defaults.tool_timeout_ms, d.tool_timeout_ms, "tool_timeout_ms", src, attr);
                apply(
                    &mut defaults.max_total_execution_ms,
                    d.max_total_execution_ms,
                    "max_total_execution_ms",
                    src,
                    attr,
                );
            }

            if let Some(v) = file.validation {
                apply(&mut validation.threshold, v.threshold, "validation_threshold", src, attr);
                apply(
                    &mut validation.gate_retries,
                    v.gate_retries,
                    "validation_gate_retries",
                    src,
                    attr,
                );
                apply(&mut validation.model, v.model, "validation_model", src, attr);
            }

            if let Some(l) = file.llm {
                apply(&mut llm.provider, l.provider, "llm_provider", src, attr);
                apply(&mut llm.model, l.model, "llm_model", src, attr);
                apply(&mut llm.base_url, l.base_url, "llm_base_url", src, attr);
                apply(&mut llm.api_key_env, l.api_key_env, "llm_api_key_env", src, attr);
                apply(&mut llm.temperature, l.temperature, "llm_temperature", src, attr);
                apply(&mut llm.max_tokens, l.max_tokens, "llm_max_tokens", src, attr);
                apply(&mut llm.timeout_secs, l.timeout_secs, "llm_timeout_secs", src, attr);
            }

            if let Some(t) = file.tools {
                apply(&mut tools.base_url, t.base_url, "tools_base_url", src, attr);
                apply(
                    &mut tools.enable_activities,
                    t.enable_activities,
                    "enable_activities",
                    src,
                    attr,
                );
                apply(
                    &mut tools.enable_workflows,
                    t.enable_workflows,
                    "enable_workflows",
                    src,
                    attr,
                );
                if let Some(env) = t.env {
                    tools.env = env;
                    attr.insert("tools_env".to_string(), src);
                }
            }

            if let Some(s) = file.storage {
                apply(&mut storage.library, s.library, "library", src, attr);
                apply(&mut storage.execution_log, s.execution_log, "execution_log", src, attr);
            }
        }

        let src = ConfigSource::Cli;
        let attr = &mut source_attribution;
        apply(&mut storage.library, cli_args.library.clone(), "library", src, attr);
        apply(&mut defaults.max_llm_calls, cli_args.max_llm_calls, "max_llm_calls", src, attr);
        apply(&mut defaults.max_tool_calls, cli_args.max_tool_calls, "max_tool_calls", src, attr);
        apply(
            &mut defaults.tool_timeout_ms,
            cli_args.tool_timeout_ms,
            "tool_timeout_ms",
            src,
            attr,
        );
        apply(&mut llm.model, cli_args.model.clone(), "llm_model", src, attr);

        let config = Config {
            defaults,
            validation,
            llm,
            tools,
            storage,
            config_path,
            source_attribution,
        };

        config.validate()?;
        Ok(config)
    }

    /// Search upward for `.promptrun/config.toml`, stopping at a repository root.
    #[must_use]
    pub fn discover_config_file_from(start_dir: &Path) -> Option<PathBuf> {
        let mut current = Some(start_dir);

        while let Some(dir) = current {
            let config_path = dir.join(".promptrun").join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }

            if dir.join(".git").exists() || dir.join(".hg").exists() || dir.join(".svn").exists()
            {
                break;
            }

            current = dir.parent();
        }

        None
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                ConfigError::InvalidFile(format!("{}: {e}", path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TomlConfig::default()),
            Err(e) => Err(ConfigError::InvalidFile(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(root: &Path, body: &str) -> PathBuf {
        let dir = root.join(".promptrun");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_config_file() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();

        let config = Config::discover_from(temp.path(), &CliArgs::default()).unwrap();
        assert!(config.config_path.is_none());
        assert_eq!(config.max_llm_calls(), 5);
        assert_eq!(
            config.source_attribution.get("max_llm_calls"),
            Some(&ConfigSource::Default)
        );
    }

    #[test]
    fn test_upward_discovery_finds_parent_config() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        let path = write_config(temp.path(), "[defaults]\nmax_llm_calls = 8\n");

        let nested = temp.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let config = Config::discover_from(&nested, &CliArgs::default()).unwrap();
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
        assert_eq!(config.max_llm_calls(), 8);
        assert_eq!(
            config.source_attribution.get("max_llm_calls"),
            Some(&ConfigSource::Config)
        );
    }

    #[test]
    fn test_discovery_stops_at_repo_root() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "[defaults]\nmax_llm_calls = 8\n");

        let repo = temp.path().join("repo");
        fs::create_dir_all(repo.join(".git")).unwrap();

        assert!(Config::discover_config_file_from(&repo).is_none());
    }

    #[test]
    fn test_cli_overrides_file() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        write_config(
            temp.path(),
            r#"
[defaults]
max_tool_calls = 7

[llm]
model = "file-model"
"#,
        );

        let args = CliArgs {
            max_tool_calls: Some(9),
            model: Some("cli-model".into()),
            ..CliArgs::default()
        };
        let config = Config::discover_from(temp.path(), &args).unwrap();

        assert_eq!(config.max_tool_calls(), 9);
        assert_eq!(config.llm_model(), "cli-model");
        assert_eq!(
            config.source_attribution.get("llm_model"),
            Some(&ConfigSource::Cli)
        );
    }

    #[test]
    fn test_full_file_is_parsed() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        write_config(
            temp.path(),
            r#"
[defaults]
max_total_execution_ms = 60000

[validation]
threshold = 80.0
gate_retries = 2
model = "judge"

[llm]
provider = "openrouter"
api_key_env = "OPENROUTER_API_KEY"
temperature = 0.1

[tools]
base_url = "http://localhost:9000"
enable_activities = true
env = { REGION = "eu-west-1" }

[storage]
library = "lib/prompts.yaml"
"#,
        );

        let config = Config::discover_from(temp.path(), &CliArgs::default()).unwrap();
        assert_eq!(config.max_total_execution_ms(), Some(60_000));
        assert_eq!(config.validation_gate_retries(), 2);
        assert_eq!(config.validation.model.as_deref(), Some("judge"));
        assert_eq!(config.llm_provider(), "openrouter");
        assert!(config.activities_enabled());
        assert!(!config.workflows_enabled());
        assert_eq!(config.tools.env.get("REGION").map(String::as_str), Some("eu-west-1"));
        assert_eq!(config.library_path(), temp.path().join("lib/prompts.yaml"));
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        write_config(temp.path(), "[defaults\nmax_llm_calls = ");

        let err = Config::discover_from(temp.path(), &CliArgs::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFile(_)));
    }

    #[test]
    fn test_explicit_missing_path_is_not_found() {
        let temp = TempDir::new().unwrap();
        let args = CliArgs {
            config_path: Some(temp.path().join("nope.toml")),
            ..CliArgs::default()
        };
        let err = Config::discover_from(temp.path(), &args).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_out_of_range_value_fails_validation() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        write_config(temp.path(), "[defaults]\nmax_llm_calls = 0\n");

        let err = Config::discover_from(temp.path(), &CliArgs::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "max_llm_calls"));
    }
}
