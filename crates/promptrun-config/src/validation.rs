use promptrun_utils::error::ConfigError;

use crate::{Config, KNOWN_PROVIDERS};

const MAX_CALL_CAP: u32 = 100;
const MIN_TOOL_TIMEOUT_MS: u64 = 100;
const MAX_TOOL_TIMEOUT_MS: u64 = 10 * 60 * 1000;
const MAX_GATE_RETRIES: u32 = 10;

fn invalid(key: &str, value: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.into(),
    }
}

fn check_cap(key: &str, value: Option<u32>) -> Result<(), ConfigError> {
    match value {
        Some(0) => Err(invalid(key, "must be greater than 0")),
        Some(v) if v > MAX_CALL_CAP => Err(invalid(
            key,
            format!("{v} exceeds maximum limit of {MAX_CALL_CAP}"),
        )),
        _ => Ok(()),
    }
}

impl Config {
    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_cap("max_llm_calls", self.defaults.max_llm_calls)?;
        check_cap("max_tool_calls", self.defaults.max_tool_calls)?;

        if let Some(timeout) = self.defaults.tool_timeout_ms {
            if timeout < MIN_TOOL_TIMEOUT_MS {
                return Err(invalid(
                    "tool_timeout_ms",
                    format!("must be at least {MIN_TOOL_TIMEOUT_MS}ms"),
                ));
            }
            if timeout > MAX_TOOL_TIMEOUT_MS {
                return Err(invalid(
                    "tool_timeout_ms",
                    "exceeds maximum limit of 600000ms (10 minutes)",
                ));
            }
        }

        if self.defaults.max_total_execution_ms == Some(0) {
            return Err(invalid("max_total_execution_ms", "must be greater than 0"));
        }

        if let Some(threshold) = self.validation.threshold
            && !(0.0..=100.0).contains(&threshold)
        {
            return Err(invalid(
                "validation_threshold",
                format!("{threshold} is outside 0..=100"),
            ));
        }

        if let Some(retries) = self.validation.gate_retries
            && !(1..=MAX_GATE_RETRIES).contains(&retries)
        {
            return Err(invalid(
                "validation_gate_retries",
                format!("{retries} is outside 1..={MAX_GATE_RETRIES}"),
            ));
        }

        if let Some(provider) = self.llm.provider.as_deref()
            && !KNOWN_PROVIDERS.contains(&provider)
        {
            return Err(invalid(
                "llm_provider",
                format!(
                    "unknown provider '{provider}' (known: {})",
                    KNOWN_PROVIDERS.join(", ")
                ),
            ));
        }

        if let Some(temperature) = self.llm.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(invalid(
                "llm_temperature",
                format!("{temperature} is outside 0.0..=2.0"),
            ));
        }

        if self.llm.timeout_secs == Some(0) {
            return Err(invalid("llm_timeout_secs", "must be greater than 0"));
        }

        if let Some(model) = self.llm.model.as_deref()
            && model.trim().is_empty()
        {
            return Err(invalid("llm_model", "must not be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_of(err: ConfigError) -> String {
        match err {
            ConfigError::InvalidValue { key, .. } => key,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_call_caps_bounds() {
        let mut config = Config::default();
        config.defaults.max_llm_calls = Some(101);
        assert_eq!(key_of(config.validate().unwrap_err()), "max_llm_calls");

        config.defaults.max_llm_calls = Some(100);
        config.defaults.max_tool_calls = Some(0);
        assert_eq!(key_of(config.validate().unwrap_err()), "max_tool_calls");
    }

    #[test]
    fn test_tool_timeout_bounds() {
        let mut config = Config::default();
        config.defaults.tool_timeout_ms = Some(99);
        assert_eq!(key_of(config.validate().unwrap_err()), "tool_timeout_ms");

        config.defaults.tool_timeout_ms = Some(600_001);
        assert_eq!(key_of(config.validate().unwrap_err()), "tool_timeout_ms");

        config.defaults.tool_timeout_ms = Some(100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_gate_retries_bounds() {
        let mut config = Config::default();
        config.validation.gate_retries = Some(0);
        assert_eq!(key_of(config.validate().unwrap_err()), "validation_gate_retries");
        config.validation.gate_retries = Some(10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let mut config = Config::default();
        config.llm.provider = Some("carrier-pigeon".into());
        assert_eq!(key_of(config.validate().unwrap_err()), "llm_provider");
    }
}
