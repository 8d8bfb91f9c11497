//! Semantic-type hierarchy: ancestor chains for leaf types.
//!
//! The ontology itself lives behind [`HierarchyProvider`]. Two providers ship
//! with the crate:
//!
//! - [`TypeTable`]: a parent table loaded from TOML or JSON, with a built-in
//!   Biolink category table
//! - [`RemoteHierarchy`]: an HTTP ontology service
//!
//! [`AncestorResolver`] memoizes provider answers and normalizes them so the
//! leaf always comes first, exactly once.

pub mod remote;
pub mod table;

use std::sync::Arc;

use dashmap::DashMap;

pub use remote::RemoteHierarchy;
pub use table::TypeTable;

use crate::curie::uniquify;
use crate::error::HierarchyError;

/// Result type for hierarchy lookups.
pub type HierarchyResult<T> = std::result::Result<T, HierarchyError>;

/// Answers "what are the ancestors of type T".
///
/// The answer is ordered from most to least specific. Providers may or may
/// not include `T` itself.
pub trait HierarchyProvider: Send + Sync {
    fn ancestors_of(&self, semantic_type: &str) -> HierarchyResult<Vec<String>>;
}

/// Memoizing front for a [`HierarchyProvider`].
///
/// Ontology data does not change while a process runs, so answers are cached
/// for the resolver's lifetime. Errors are not cached.
pub struct AncestorResolver {
    provider: Arc<dyn HierarchyProvider>,
    cache: DashMap<String, Arc<[String]>>,
}

impl AncestorResolver {
    pub fn new(provider: Arc<dyn HierarchyProvider>) -> Self {
        Self {
            provider,
            cache: DashMap::new(),
        }
    }

    /// Ancestor chain of `leaf`, leaf first, ending at the root.
    pub fn ancestors(&self, leaf: &str) -> HierarchyResult<Arc<[String]>> {
        if let Some(hit) = self.cache.get(leaf) {
            return Ok(Arc::clone(hit.value()));
        }

        let raw = self.provider.ancestors_of(leaf)?;
        let chain = uniquify(
            std::iter::once(leaf.to_string()).chain(raw.into_iter().filter(|t| t != leaf)),
        );
        let chain: Arc<[String]> = chain.into();

        tracing::debug!(leaf, depth = chain.len(), "resolved ancestor chain");
        self.cache.insert(leaf.to_string(), Arc::clone(&chain));
        Ok(chain)
    }

    /// Number of memoized leaf types.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

impl std::fmt::Debug for AncestorResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AncestorResolver")
            .field("cached", &self.cache.len())
            .finish()
    }
}
