use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::RwLock;

use promptrun_prompt_template::VariableSpecMap;
use promptrun_utils::error::StoreError;
use promptrun_utils::types::{LlmSettings, PromptStatus};

/// Reusable prompt: templates, variable specs, model defaults, and the
/// callables it may offer to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub system_prompt_template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_prompt_template: Option<String>,
    #[serde(default)]
    pub system_variables: VariableSpecMap,
    #[serde(default)]
    pub user_variables: VariableSpecMap,
    #[serde(default)]
    pub default_llm_settings: LlmSettings,
    #[serde(default)]
    pub tool_ids: Vec<String>,
    #[serde(default)]
    pub activity_ids: Vec<String>,
    #[serde(default)]
    pub workflow_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
    #[serde(default)]
    pub validation_required: bool,
    #[serde(default)]
    pub validation_gate: bool,
    #[serde(default)]
    pub status: PromptStatus,
    #[serde(default)]
    pub execution_count: u64,
    #[serde(default)]
    pub avg_response_time_ms: f64,
}

/// Successful-run count and mean response time of one prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PromptStats {
    pub execution_count: u64,
    pub avg_response_time_ms: f64,
}

impl PromptStats {
    /// Fold one successful run into the incremental mean.
    pub fn record(&mut self, elapsed_ms: u64) {
        let n = self.execution_count as f64;
        self.avg_response_time_ms = (self.avg_response_time_ms * n + elapsed_ms as f64) / (n + 1.0);
        self.execution_count += 1;
    }

    /// Combine two disjoint sets of runs.
    pub fn merge(&mut self, other: &PromptStats) {
        let total = self.execution_count + other.execution_count;
        if total == 0 {
            return;
        }
        self.avg_response_time_ms = (self.avg_response_time_ms * self.execution_count as f64
            + other.avg_response_time_ms * other.execution_count as f64)
            / total as f64;
        self.execution_count = total;
    }
}

impl PromptDefinition {
    /// Active prompt with only a system template.
    #[must_use]
    pub fn new(id: impl Into<String>, system_prompt_template: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            system_prompt_template: system_prompt_template.into(),
            user_prompt_template: None,
            system_variables: VariableSpecMap::new(),
            user_variables: VariableSpecMap::new(),
            default_llm_settings: LlmSettings::default(),
            tool_ids: Vec::new(),
            activity_ids: Vec::new(),
            workflow_ids: Vec::new(),
            response_schema: None,
            validation_required: false,
            validation_gate: false,
            status: PromptStatus::Active,
            execution_count: 0,
            avg_response_time_ms: 0.0,
        }
    }

    #[must_use]
    pub fn stats(&self) -> PromptStats {
        PromptStats {
            execution_count: self.execution_count,
            avg_response_time_ms: self.avg_response_time_ms,
        }
    }

    pub fn set_stats(&mut self, stats: PromptStats) {
        self.execution_count = stats.execution_count;
        self.avg_response_time_ms = stats.avg_response_time_ms;
    }

    #[must_use]
    pub fn is_executable(&self) -> bool {
        self.status == PromptStatus::Active
    }

    /// Whether any tool, activity, or workflow is declared.
    #[must_use]
    pub fn declares_callables(&self) -> bool {
        !(self.tool_ids.is_empty() && self.activity_ids.is_empty() && self.workflow_ids.is_empty())
    }

    /// Whether the validation gate wraps execution.
    #[must_use]
    pub fn gated(&self) -> bool {
        self.validation_gate && self.validation_required
    }
}

/// Read access to prompt definitions plus rolling execution stats.
#[async_trait]
pub trait PromptStore: Send + Sync {
    async fn get(&self, prompt_id: &str) -> Result<Option<PromptDefinition>, StoreError>;

    /// Fold one successful execution's elapsed time into the rolling stats.
    async fn record_stats(&self, prompt_id: &str, elapsed_ms: u64) -> Result<(), StoreError>;

    async fn list(&self) -> Result<Vec<PromptDefinition>, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryPromptStore {
    prompts: RwLock<BTreeMap<String, PromptDefinition>>,
}

impl InMemoryPromptStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, prompt: PromptDefinition) {
        if let Ok(mut prompts) = self.prompts.write() {
            prompts.insert(prompt.id.clone(), prompt);
        }
    }

    #[must_use]
    pub fn with(self, prompt: PromptDefinition) -> Self {
        self.insert(prompt);
        self
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("prompt store lock poisoned".to_string())
}

#[async_trait]
impl PromptStore for InMemoryPromptStore {
    async fn get(&self, prompt_id: &str) -> Result<Option<PromptDefinition>, StoreError> {
        let prompts = self.prompts.read().map_err(|_| poisoned())?;
        Ok(prompts.get(prompt_id).cloned())
    }

    async fn record_stats(&self, prompt_id: &str, elapsed_ms: u64) -> Result<(), StoreError> {
        let mut prompts = self.prompts.write().map_err(|_| poisoned())?;
        let Some(prompt) = prompts.get_mut(prompt_id) else {
            return Err(StoreError::Backend(format!(
                "cannot record stats for unknown prompt '{prompt_id}'"
            )));
        };

        let mut stats = prompt.stats();
        stats.record(elapsed_ms);
        prompt.set_stats(stats);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<PromptDefinition>, StoreError> {
        let prompts = self.prompts.read().map_err(|_| poisoned())?;
        Ok(prompts.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rolling_mean() {
        let store = InMemoryPromptStore::new().with(PromptDefinition::new("p", "sys"));

        store.record_stats("p", 100).await.unwrap();
        store.record_stats("p", 200).await.unwrap();
        store.record_stats("p", 600).await.unwrap();

        let prompt = store.get("p").await.unwrap().unwrap();
        assert_eq!(prompt.execution_count, 3);
        assert!((prompt.avg_response_time_ms - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_merge_weights_by_count() {
        let mut baseline = PromptStats {
            execution_count: 1,
            avg_response_time_ms: 100.0,
        };
        baseline.merge(&PromptStats {
            execution_count: 3,
            avg_response_time_ms: 300.0,
        });
        assert_eq!(baseline.execution_count, 4);
        assert!((baseline.avg_response_time_ms - 250.0).abs() < 1e-9);

        let mut empty = PromptStats::default();
        empty.merge(&PromptStats::default());
        assert_eq!(empty, PromptStats::default());
    }

    #[tokio::test]
    async fn test_missing_prompt() {
        let store = InMemoryPromptStore::new();
        assert!(store.get("nope").await.unwrap().is_none());
        assert!(store.record_stats("nope", 1).await.is_err());
    }

    #[test]
    fn test_gate_requires_validation() {
        let mut prompt = PromptDefinition::new("p", "s");
        prompt.validation_gate = true;
        assert!(!prompt.gated());
        prompt.validation_required = true;
        assert!(prompt.gated());
    }

    #[test]
    fn test_deserialize_defaults_to_draft() {
        let prompt: PromptDefinition = serde_json::from_value(serde_json::json!({
            "id": "p",
            "system_prompt_template": "hi"
        }))
        .unwrap();
        assert_eq!(prompt.status, PromptStatus::Draft);
        assert!(!prompt.is_executable());
        assert!(!prompt.declares_callables());
    }
}
