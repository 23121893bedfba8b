use std::collections::BTreeMap;

use crate::{Config, ConfigSource};

fn source_label(source: Option<&ConfigSource>) -> String {
    source.copied().unwrap_or(ConfigSource::Default).to_string()
}

impl Config {
    /// Effective configuration as `key -> (value, source)`, sorted by key.
    ///
    /// Unset optional keys are omitted. API keys are never included; only the
    /// name of the environment variable holding one.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let mut config = BTreeMap::new();

        let mut add = |key: &str, value: Option<String>| {
            if let Some(val) = value {
                let source = source_label(self.source_attribution.get(key));
                config.insert(key.to_string(), (val, source));
            }
        };

        add("max_llm_calls", Some(self.max_llm_calls().to_string()));
        add("max_tool_calls", Some(self.max_tool_calls().to_string()));
        add("tool_timeout_ms", Some(self.tool_timeout_ms().to_string()));
        add(
            "max_total_execution_ms",
            self.max_total_execution_ms().map(|v| v.to_string()),
        );

        add(
            "validation_threshold",
            Some(self.validation_threshold().to_string()),
        );
        add(
            "validation_gate_retries",
            Some(self.validation_gate_retries().to_string()),
        );
        add("validation_model", self.validation.model.clone());

        add("llm_provider", Some(self.llm_provider().to_string()));
        add("llm_model", Some(self.llm_model().to_string()));
        add("llm_base_url", self.llm.base_url.clone());
        add("llm_api_key_env", self.llm.api_key_env.clone());
        add("llm_temperature", self.llm.temperature.map(|v| v.to_string()));
        add("llm_max_tokens", self.llm.max_tokens.map(|v| v.to_string()));
        add("llm_timeout_secs", Some(self.llm_timeout_secs().to_string()));

        add("tools_base_url", self.tools.base_url.clone());
        add("enable_activities", Some(self.activities_enabled().to_string()));
        add("enable_workflows", Some(self.workflows_enabled().to_string()));
        if !self.tools.env.is_empty() {
            let keys: Vec<&str> = self.tools.env.keys().map(String::as_str).collect();
            add("tools_env", Some(keys.join(", ")));
        }

        add("library", Some(self.library_path().display().to_string()));
        add(
            "execution_log",
            Some(self.execution_log_path().display().to_string()),
        );

        config
    }
}
