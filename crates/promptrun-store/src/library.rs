//! YAML prompt library: prompts plus the descriptor catalog in one file.
//!
//! ```yaml
//! prompts:
//!   - id: support
//!     system_prompt_template: "You help ${customer}."
//!     status: ACTIVE
//!     tool_ids: [t-lookup]
//! tools:
//!   - id: t-lookup
//!     external_name: lookup_order
//!     status: ACTIVE
//! activities: []
//! workflows: []
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use promptrun_catalog::{InMemoryCatalogStore, ToolDescriptor};
use promptrun_utils::error::StoreError;
use promptrun_utils::types::Namespace;

use crate::prompt::{InMemoryPromptStore, PromptDefinition, PromptStats};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptLibrary {
    #[serde(default)]
    pub prompts: Vec<PromptDefinition>,
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
    #[serde(default)]
    pub activities: Vec<ToolDescriptor>,
    #[serde(default)]
    pub workflows: Vec<ToolDescriptor>,
}

impl PromptLibrary {
    /// Read and parse a library file.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] if the file cannot be read, [`StoreError::Parse`]
    /// for malformed YAML or a duplicate prompt id.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| StoreError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse library YAML held in memory.
    ///
    /// # Errors
    ///
    /// [`StoreError::Parse`] for malformed YAML or a duplicate prompt id.
    pub fn from_yaml_str(content: &str) -> Result<Self, StoreError> {
        Self::parse(content, "<inline>")
    }

    fn parse(content: &str, origin: &str) -> Result<Self, StoreError> {
        let library: Self = serde_yaml::from_str(content).map_err(|e| StoreError::Parse {
            path: origin.to_string(),
            reason: e.to_string(),
        })?;

        let mut seen = HashSet::new();
        if let Some(dup) = library.prompts.iter().find(|p| !seen.insert(p.id.as_str())) {
            return Err(StoreError::Parse {
                path: origin.to_string(),
                reason: format!("duplicate prompt id '{}'", dup.id),
            });
        }

        tracing::debug!(
            origin,
            prompts = library.prompts.len(),
            tools = library.tools.len(),
            activities = library.activities.len(),
            workflows = library.workflows.len(),
            "Loaded prompt library"
        );
        Ok(library)
    }

    /// Add run stats recorded elsewhere (the execution log) to the stats
    /// stored in the file. Unknown prompt ids are ignored.
    pub fn merge_stats(&mut self, stats: &BTreeMap<String, PromptStats>) {
        for prompt in &mut self.prompts {
            if let Some(extra) = stats.get(&prompt.id) {
                let mut merged = prompt.stats();
                merged.merge(extra);
                prompt.set_stats(merged);
            }
        }
    }

    /// Split into the prompt store and the catalog store backing an engine.
    #[must_use]
    pub fn into_stores(self) -> (InMemoryPromptStore, InMemoryCatalogStore) {
        let prompts = InMemoryPromptStore::new();
        for prompt in self.prompts {
            prompts.insert(prompt);
        }

        let catalog = InMemoryCatalogStore::new();
        for (namespace, descriptors) in [
            (Namespace::Tool, self.tools),
            (Namespace::Activity, self.activities),
            (Namespace::Workflow, self.workflows),
        ] {
            for descriptor in descriptors {
                catalog.insert(namespace, descriptor);
            }
        }
        (prompts, catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::PromptStore;
    use promptrun_catalog::{CatalogStore, DescriptorStatus};
    use promptrun_prompt_template::VariableType;
    use promptrun_utils::types::PromptStatus;
    use tempfile::TempDir;

    const LIBRARY: &str = r#"
prompts:
  - id: support
    name: Support agent
    system_prompt_template: "You help ${customer}."
    user_prompt_template: "Question: ${question}"
    system_variables:
      customer: { type: string, required: true }
    user_variables:
      question: { type: string, required: true }
      verbose: { type: boolean, default: false }
    default_llm_settings:
      model: gpt-4o-mini
      temperature: 0.1
    tool_ids: [t-lookup]
    activity_ids: [a-notify]
    status: ACTIVE
    validation_required: true
    validation_gate: true
tools:
  - id: t-lookup
    external_name: lookup_order
    description: Look up an order
    status: ACTIVE
activities:
  - id: a-notify
    external_name: notify_customer
"#;

    #[tokio::test]
    async fn test_library_into_stores() {
        let library = PromptLibrary::from_yaml_str(LIBRARY).unwrap();
        let (prompts, catalog) = library.into_stores();

        let prompt = prompts.get("support").await.unwrap().unwrap();
        assert_eq!(prompt.status, PromptStatus::Active);
        assert!(prompt.gated());
        assert_eq!(
            prompt.system_variables["customer"].var_type,
            VariableType::String
        );
        assert_eq!(
            prompt.user_variables["verbose"].default,
            Some(serde_json::json!(false))
        );
        assert_eq!(prompt.default_llm_settings.temperature, Some(0.1));

        let tools = catalog
            .find_by_ids(Namespace::Tool, &["t-lookup".into()])
            .await
            .unwrap();
        assert_eq!(tools[0].status, Some(DescriptorStatus::Active));
        assert_eq!(catalog.list(Namespace::Activity).len(), 1);
    }

    #[test]
    fn test_merge_stats_adds_to_file_values() {
        let mut library = PromptLibrary::from_yaml_str(
            r#"
prompts:
  - { id: a, system_prompt_template: x, execution_count: 2, avg_response_time_ms: 100.0 }
  - { id: b, system_prompt_template: y }
"#,
        )
        .unwrap();
        let stats = BTreeMap::from([
            (
                "a".to_string(),
                PromptStats {
                    execution_count: 2,
                    avg_response_time_ms: 300.0,
                },
            ),
            ("ghost".to_string(), PromptStats::default()),
        ]);
        library.merge_stats(&stats);

        assert_eq!(library.prompts[0].execution_count, 4);
        assert!((library.prompts[0].avg_response_time_ms - 200.0).abs() < 1e-9);
        assert_eq!(library.prompts[1].execution_count, 0);
    }

    #[test]
    fn test_duplicate_prompt_ids_rejected() {
        let yaml = r#"
prompts:
  - { id: a, system_prompt_template: x }
  - { id: a, system_prompt_template: y }
"#;
        let err = PromptLibrary::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, StoreError::Parse { ref reason, .. } if reason.contains("'a'")));
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = PromptLibrary::load(&temp.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn test_load_from_disk() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("prompts.yaml");
        std::fs::write(&path, LIBRARY).unwrap();
        let library = PromptLibrary::load(&path).unwrap();
        assert_eq!(library.prompts.len(), 1);
        assert_eq!(library.tools[0].external_name, "lookup_order");
    }
}
