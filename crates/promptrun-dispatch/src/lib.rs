//! Parallel tool dispatch
//!
//! [`ToolDispatcher::execute_parallel`] runs one batch of model tool calls
//! concurrently, each under its own timeout and child trace span, and returns
//! the normalized results in the order the calls were issued.

mod dispatcher;
mod executor;
mod http;

use std::sync::Arc;

use promptrun_config::Config;
use promptrun_utils::error::ToolCallError;

pub use dispatcher::{BatchOutcome, DispatchContext, ToolDispatcher};
pub use executor::{ExecutorSet, ToolExecutor, ToolInvocation, ToolOutput};
pub use http::HttpToolExecutor;

/// Executors described by the `[tools]` config section.
///
/// Without a `base_url` no namespace has an executor, so every call settles
/// as a failed result.
///
/// # Errors
///
/// Propagates HTTP client construction failures.
pub fn executors_from_config(config: &Config) -> Result<ExecutorSet, ToolCallError> {
    let Some(base_url) = config.tools.base_url.as_deref() else {
        tracing::debug!("No [tools] base_url configured; tool execution disabled");
        return Ok(ExecutorSet::new());
    };
    let executor = Arc::new(HttpToolExecutor::new(base_url)?);
    Ok(ExecutorSet::uniform(
        executor,
        config.activities_enabled(),
        config.workflows_enabled(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptrun_utils::types::Namespace;

    #[test]
    fn test_namespace_toggles_from_config() {
        let mut config = Config::default();
        assert!(!executors_from_config(&config).unwrap().is_enabled(Namespace::Tool));

        config.tools.base_url = Some("http://localhost:8080".into());
        config.tools.enable_workflows = Some(true);
        let set = executors_from_config(&config).unwrap();
        assert!(set.is_enabled(Namespace::Tool));
        assert!(!set.is_enabled(Namespace::Activity));
        assert!(set.is_enabled(Namespace::Workflow));
    }
}
