use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use promptrun_utils::error::CatalogError;
use promptrun_utils::types::{Namespace, ToolDefinition};

use crate::descriptor::{CallTarget, ToolDescriptor};
use crate::store::CatalogStore;

/// Resolves declared descriptor ids against a [`CatalogStore`].
#[derive(Clone)]
pub struct CatalogResolver {
    store: Arc<dyn CatalogStore>,
}

impl CatalogResolver {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    /// Fetch the descriptors for `ids` in one namespace.
    ///
    /// Every requested id must resolve. Tools must additionally be ACTIVE or
    /// DEPLOYED. Results follow the order of `ids`, with duplicates collapsed.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::NotFound`] listing every id with no descriptor
    /// - [`CatalogError::ToolUnavailable`] listing every non-executable tool
    pub async fn resolve(
        &self,
        namespace: Namespace,
        ids: &[String],
    ) -> Result<Vec<ToolDescriptor>, CatalogError> {
        let mut seen = HashSet::new();
        let requested: Vec<String> = ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();
        if requested.is_empty() {
            return Ok(Vec::new());
        }

        let found = self.store.find_by_ids(namespace, &requested).await?;
        let mut by_id: BTreeMap<&str, &ToolDescriptor> = BTreeMap::new();
        for descriptor in &found {
            by_id.entry(descriptor.id.as_str()).or_insert(descriptor);
        }

        let missing: Vec<String> = requested
            .iter()
            .filter(|id| !by_id.contains_key(id.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(CatalogError::NotFound { namespace, missing });
        }

        let resolved: Vec<ToolDescriptor> = requested
            .iter()
            .filter_map(|id| by_id.get(id.as_str()).map(|d| (*d).clone()))
            .collect();

        if namespace == Namespace::Tool {
            let unavailable: Vec<String> = resolved
                .iter()
                .filter(|d| !d.status.is_some_and(|s| s.is_executable()))
                .map(|d| d.external_name.clone())
                .collect();
            if !unavailable.is_empty() {
                return Err(CatalogError::ToolUnavailable { names: unavailable });
            }
        }

        debug!(
            namespace = %namespace,
            count = resolved.len(),
            "Resolved catalog descriptors"
        );
        Ok(resolved)
    }

    /// Resolve all three namespaces and union them into one catalog.
    ///
    /// Namespaces with no declared ids are skipped without a store lookup.
    ///
    /// # Errors
    ///
    /// Any resolution error, or [`CatalogError::DuplicateExternalName`].
    pub async fn resolve_all(
        &self,
        tool_ids: &[String],
        activity_ids: &[String],
        workflow_ids: &[String],
    ) -> Result<ResolvedCatalog, CatalogError> {
        let tools = self.resolve(Namespace::Tool, tool_ids).await?;
        let activities = self.resolve(Namespace::Activity, activity_ids).await?;
        let workflows = self.resolve(Namespace::Workflow, workflow_ids).await?;
        ResolvedCatalog::build(tools, activities, workflows)
    }
}

/// One routable entry of a resolved catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub target: CallTarget,
    pub descriptor: ToolDescriptor,
}

/// Union of the resolved namespaces, keyed by external name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedCatalog {
    entries: BTreeMap<String, CatalogEntry>,
    order: Vec<String>,
}

impl ResolvedCatalog {
    /// Union per-namespace descriptors, rejecting reused external names.
    ///
    /// # Errors
    ///
    /// [`CatalogError::DuplicateExternalName`] for the first clash.
    pub fn build(
        tools: Vec<ToolDescriptor>,
        activities: Vec<ToolDescriptor>,
        workflows: Vec<ToolDescriptor>,
    ) -> Result<Self, CatalogError> {
        let mut catalog = Self::default();
        for (namespace, descriptors) in [
            (Namespace::Tool, tools),
            (Namespace::Activity, activities),
            (Namespace::Workflow, workflows),
        ] {
            for descriptor in descriptors {
                catalog.insert(namespace, descriptor)?;
            }
        }
        Ok(catalog)
    }

    fn insert(&mut self, namespace: Namespace, descriptor: ToolDescriptor) -> Result<(), CatalogError> {
        if let Some(existing) = self.entries.get(&descriptor.external_name) {
            return Err(CatalogError::DuplicateExternalName {
                name: descriptor.external_name,
                first: existing.target.namespace(),
                second: namespace,
            });
        }
        let name = descriptor.external_name.clone();
        self.order.push(name.clone());
        self.entries.insert(
            name,
            CatalogEntry {
                target: CallTarget::new(namespace, descriptor.id.clone()),
                descriptor,
            },
        );
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Where a model call to `external_name` goes.
    #[must_use]
    pub fn route(&self, external_name: &str) -> Option<&CallTarget> {
        self.entries.get(external_name).map(|e| &e.target)
    }

    #[must_use]
    pub fn entry(&self, external_name: &str) -> Option<&CatalogEntry> {
        self.entries.get(external_name)
    }

    /// External names in declaration order (tools, activities, workflows).
    pub fn external_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Function definitions offered to the model, in declaration order.
    #[must_use]
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.entries.get(name))
            .map(|e| e.descriptor.to_definition())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorStatus;
    use crate::store::InMemoryCatalogStore;
    use proptest::prelude::*;

    fn active(id: &str, name: &str) -> ToolDescriptor {
        ToolDescriptor::new(id, name).with_status(DescriptorStatus::Active)
    }

    fn store() -> Arc<InMemoryCatalogStore> {
        Arc::new(
            InMemoryCatalogStore::new()
                .with(Namespace::Tool, active("t1", "calc"))
                .with(
                    Namespace::Tool,
                    ToolDescriptor::new("t2", "search").with_status(DescriptorStatus::Deployed),
                )
                .with(
                    Namespace::Tool,
                    ToolDescriptor::new("t3", "legacy").with_status(DescriptorStatus::Archived),
                )
                .with(Namespace::Tool, ToolDescriptor::new("t4", "unstamped"))
                .with(Namespace::Activity, ToolDescriptor::new("a1", "notify"))
                .with(Namespace::Workflow, ToolDescriptor::new("w1", "calc")),
        )
    }

    #[tokio::test]
    async fn test_resolve_preserves_request_order() {
        let resolver = CatalogResolver::new(store());
        let resolved = resolver
            .resolve(Namespace::Tool, &["t2".into(), "t1".into(), "t2".into()])
            .await
            .unwrap();
        let names: Vec<&str> = resolved.iter().map(|d| d.external_name.as_str()).collect();
        assert_eq!(names, vec!["search", "calc"]);
    }

    #[tokio::test]
    async fn test_resolve_reports_all_missing_ids() {
        let resolver = CatalogResolver::new(store());
        let err = resolver
            .resolve(Namespace::Tool, &["t1".into(), "nope".into(), "gone".into()])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CatalogError::NotFound {
                namespace: Namespace::Tool,
                missing: vec!["nope".into(), "gone".into()],
            }
        );
    }

    #[tokio::test]
    async fn test_inactive_or_unstamped_tools_unavailable() {
        let resolver = CatalogResolver::new(store());
        let err = resolver
            .resolve(Namespace::Tool, &["t1".into(), "t3".into(), "t4".into()])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CatalogError::ToolUnavailable {
                names: vec!["legacy".into(), "unstamped".into()],
            }
        );
    }

    #[tokio::test]
    async fn test_activity_status_not_checked() {
        let resolver = CatalogResolver::new(store());
        let resolved = resolver
            .resolve(Namespace::Activity, &["a1".into()])
            .await
            .unwrap();
        assert_eq!(resolved.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_namespaces_skip_lookup() {
        let backing = store();
        let resolver = CatalogResolver::new(backing.clone());
        let catalog = resolver
            .resolve_all(&["t1".into()], &[], &[])
            .await
            .unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(backing.lookup_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_external_name_rejected() {
        let resolver = CatalogResolver::new(store());
        let err = resolver
            .resolve_all(&["t1".into()], &[], &["w1".into()])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CatalogError::DuplicateExternalName {
                name: "calc".into(),
                first: Namespace::Tool,
                second: Namespace::Workflow,
            }
        );
    }

    #[tokio::test]
    async fn test_routes_by_external_name() {
        let resolver = CatalogResolver::new(store());
        let catalog = resolver
            .resolve_all(&["t1".into(), "t2".into()], &["a1".into()], &[])
            .await
            .unwrap();

        assert_eq!(catalog.route("notify"), Some(&CallTarget::Activity("a1".into())));
        assert_eq!(catalog.route("search"), Some(&CallTarget::Tool("t2".into())));
        assert!(catalog.route("unknown").is_none());

        let defs: Vec<String> = catalog.tool_definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(defs, vec!["calc", "search", "notify"]);
    }

    proptest! {
        #[test]
        fn prop_resolution_is_idempotent(picks in proptest::collection::vec(0usize..2, 1..6)) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let ids: Vec<String> = picks.iter().map(|i| format!("t{}", i + 1)).collect();
            let resolver = CatalogResolver::new(store());

            let (first, second) = runtime.block_on(async {
                let a = resolver.resolve(Namespace::Tool, &ids).await.unwrap();
                let b = resolver.resolve(Namespace::Tool, &ids).await.unwrap();
                (a, b)
            });

            let names = |v: &[ToolDescriptor]| -> Vec<String> {
                v.iter().map(|d| d.external_name.clone()).collect()
            };
            prop_assert_eq!(names(&first), names(&second));
        }
    }
}
