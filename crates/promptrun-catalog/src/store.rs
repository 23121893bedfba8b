use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use promptrun_utils::error::CatalogError;
use promptrun_utils::types::Namespace;

use crate::descriptor::ToolDescriptor;

/// Read access to the descriptor catalog.
///
/// Lookups return only the descriptors that exist; callers decide whether a
/// partial result is an error.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_by_ids(
        &self,
        namespace: Namespace,
        ids: &[String],
    ) -> Result<Vec<ToolDescriptor>, CatalogError>;

    async fn find_by_external_names(
        &self,
        namespace: Namespace,
        names: &[String],
    ) -> Result<Vec<ToolDescriptor>, CatalogError>;
}

/// In-process catalog, also used as the backing store of the YAML library.
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    descriptors: RwLock<HashMap<Namespace, Vec<ToolDescriptor>>>,
    lookups: AtomicUsize,
}

impl InMemoryCatalogStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a descriptor (keyed by id within its namespace).
    pub fn insert(&self, namespace: Namespace, descriptor: ToolDescriptor) {
        if let Ok(mut map) = self.descriptors.write() {
            let entries = map.entry(namespace).or_default();
            entries.retain(|d| d.id != descriptor.id);
            entries.push(descriptor);
        }
    }

    #[must_use]
    pub fn with(self, namespace: Namespace, descriptor: ToolDescriptor) -> Self {
        self.insert(namespace, descriptor);
        self
    }

    /// Number of store lookups served so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Every descriptor in `namespace`.
    pub fn list(&self, namespace: Namespace) -> Vec<ToolDescriptor> {
        self.descriptors
            .read()
            .map(|map| map.get(&namespace).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    fn filter(
        &self,
        namespace: Namespace,
        keep: impl Fn(&ToolDescriptor) -> bool,
    ) -> Result<Vec<ToolDescriptor>, CatalogError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let map = self
            .descriptors
            .read()
            .map_err(|_| CatalogError::Store("catalog lock poisoned".to_string()))?;
        Ok(map
            .get(&namespace)
            .map(|entries| entries.iter().filter(|d| keep(d)).cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn find_by_ids(
        &self,
        namespace: Namespace,
        ids: &[String],
    ) -> Result<Vec<ToolDescriptor>, CatalogError> {
        self.filter(namespace, |d| ids.contains(&d.id))
    }

    async fn find_by_external_names(
        &self,
        namespace: Namespace,
        names: &[String],
    ) -> Result<Vec<ToolDescriptor>, CatalogError> {
        self.filter(namespace, |d| names.contains(&d.external_name))
    }
}
