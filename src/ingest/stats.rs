//! Per-file prefix statistics.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::compendium::EquivalenceClass;
use crate::error::StoreError;
use crate::hierarchy::{AncestorResolver, HierarchyResult};
use crate::store::{FILE_STATS_PREFIX, KeyValueStore, Namespace, StoreResult};

/// Semantic type → identifier prefix → count.
pub type PrefixCounts = BTreeMap<String, BTreeMap<String, u64>>;

/// Stable identity of a compendium file: its canonical path when it can be
/// resolved, the path as given otherwise.
pub fn file_identity(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

/// Key of the per-file partial in the prefix-statistics namespace.
pub fn file_key(identity: &str) -> String {
    format!("{FILE_STATS_PREFIX}{identity}")
}

/// Stored shape of a per-file partial.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStatistics {
    pub source_prefixes: PrefixCounts,
}

/// Tallies identifier prefixes per expanded semantic type for one file.
///
/// Every ancestor of a class's leaf type is credited, so a `biolink:Disease`
/// record also counts towards `biolink:NamedThing`.
#[derive(Debug, Default)]
pub struct PrefixStatistics {
    counts: PrefixCounts,
    records: usize,
}

impl PrefixStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit every member prefix of `class` to every ancestor of its leaf type.
    pub fn record(
        &mut self,
        class: &EquivalenceClass,
        ancestors: &AncestorResolver,
    ) -> HierarchyResult<()> {
        let chain = ancestors.ancestors(class.leaf_type())?;
        for semantic_type in chain.iter() {
            let per_type = self.counts.entry(semantic_type.clone()).or_default();
            for member in class.members() {
                *per_type.entry(member.prefix().to_string()).or_insert(0) += 1;
            }
        }
        self.records += 1;
        Ok(())
    }

    pub fn counts(&self) -> &PrefixCounts {
        &self.counts
    }

    /// Number of classes recorded.
    pub fn records(&self) -> usize {
        self.records
    }

    /// Write the partial under `file-<identity>`, replacing any previous run's.
    pub fn persist(&self, store: &dyn KeyValueStore, identity: &str) -> StoreResult<()> {
        let key = file_key(identity);
        let body = serde_json::to_string(&FileStatistics {
            source_prefixes: self.counts.clone(),
        })
        .map_err(|e| StoreError::Serialization {
            message: format!("{key}: {e}"),
        })?;
        store.set(Namespace::PrefixStatistics, &key, &body)?;
        tracing::debug!(key = %key, types = self.counts.len(), "persisted per-file statistics");
        Ok(())
    }

    pub fn into_counts(self) -> PrefixCounts {
        self.counts
    }
}
