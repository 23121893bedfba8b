//! Tool, activity, and workflow catalog resolution.
//!
//! A prompt declares descriptor ids per namespace. At the start of an
//! execution they are resolved strictly (every id must exist) and unioned into
//! a [`ResolvedCatalog`] that routes each model tool call to a [`CallTarget`].

mod descriptor;
mod resolver;
mod store;

pub use descriptor::{CallTarget, DescriptorStatus, ToolDescriptor};
pub use promptrun_utils::types::Namespace;
pub use resolver::{CatalogEntry, CatalogResolver, ResolvedCatalog};
pub use store::{CatalogStore, InMemoryCatalogStore};
