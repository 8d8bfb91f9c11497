//! Merge of per-file prefix statistics into the global tables.

use std::collections::{BTreeMap, HashSet};

use crate::error::IngestError;
use crate::ingest::stats::{FileStatistics, PrefixCounts, file_key};
use crate::store::{FILE_STATS_PREFIX, KeyValueStore, Namespace, SEMANTIC_TYPES_KEY, WriteBatch};

/// Outcome of one [`StatisticsMerger::merge_all`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Per-file partials read.
    pub files: usize,
    /// Distinct semantic types in the merged table.
    pub semantic_types: usize,
    /// Types appended to the global `semantic_types` list by this run.
    pub new_types: usize,
    /// Listed types no partial contributes to any more; their counts were emptied.
    pub cleared_types: usize,
}

/// Recomputes the global prefix-statistics table from every per-file partial.
///
/// Nothing is accumulated in place: each run sums all `file-*` entries from
/// scratch, so running it twice without new ingestion writes the same bytes.
#[derive(Debug, Default)]
pub struct StatisticsMerger {
    dry_run: bool,
}

impl StatisticsMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Every stored partial keyed by its `file-*` key. Fails on the first
    /// unreadable entry.
    fn read_partials(
        &self,
        store: &dyn KeyValueStore,
    ) -> Result<BTreeMap<String, PrefixCounts>, IngestError> {
        let keys = store.keys_with_prefix(Namespace::PrefixStatistics, FILE_STATS_PREFIX)?;
        let values = store.mget(Namespace::PrefixStatistics, &keys)?;

        let mut partials = BTreeMap::new();
        for (key, value) in keys.into_iter().zip(values) {
            let Some(raw) = value else {
                continue;
            };
            let partial: FileStatistics =
                serde_json::from_str(&raw).map_err(|e| IngestError::CorruptStatistics {
                    key: key.clone(),
                    message: e.to_string(),
                })?;
            partials.insert(key, partial.source_prefixes);
        }
        Ok(partials)
    }

    /// Rebuild the global per-type prefix counts and extend the
    /// `semantic_types` list with any type it does not yet hold.
    pub fn merge_all(&self, store: &dyn KeyValueStore) -> Result<MergeReport, IngestError> {
        self.merge_with(store, Vec::new())
    }

    /// Like [`merge_all`](Self::merge_all), with `pending` partials (file
    /// identity, counts) taking the place of whatever the store holds for
    /// those files. Dry runs use this to merge counts they never persisted.
    pub fn merge_with(
        &self,
        store: &dyn KeyValueStore,
        pending: Vec<(String, PrefixCounts)>,
    ) -> Result<MergeReport, IngestError> {
        let mut partials = self.read_partials(store)?;
        for (identity, counts) in pending {
            partials.insert(file_key(&identity), counts);
        }
        let files = partials.len();
        let merged = sum(partials.values());

        let listed = store.lrange(Namespace::PrefixStatistics, SEMANTIC_TYPES_KEY, 0, -1)?;
        let known: HashSet<&str> = listed.iter().map(String::as_str).collect();
        let new_types: Vec<String> = merged
            .keys()
            .filter(|t| !known.contains(t.as_str()))
            .cloned()
            .collect();
        let mut stale: Vec<&str> = known
            .iter()
            .copied()
            .filter(|t| !merged.contains_key(*t))
            .collect();
        stale.sort_unstable();

        let mut batch = WriteBatch::new();
        let new_count = new_types.len();
        batch.lpush(Namespace::PrefixStatistics, SEMANTIC_TYPES_KEY, new_types);
        for (semantic_type, prefixes) in &merged {
            let body = serde_json::to_string(prefixes).map_err(|e| IngestError::CorruptStatistics {
                key: semantic_type.clone(),
                message: e.to_string(),
            })?;
            batch.set(Namespace::PrefixStatistics, semantic_type.as_str(), body);
        }
        for semantic_type in &stale {
            batch.set(Namespace::PrefixStatistics, *semantic_type, "{}");
        }

        if self.dry_run {
            tracing::info!(files, types = merged.len(), "dry run: merge computed, nothing written");
        } else {
            store.execute(batch)?;
            tracing::info!(
                files,
                types = merged.len(),
                new_types = new_count,
                cleared_types = stale.len(),
                "merged prefix statistics"
            );
        }

        Ok(MergeReport {
            files,
            semantic_types: merged.len(),
            new_types: new_count,
            cleared_types: stale.len(),
        })
    }
}

fn sum<'a>(partials: impl Iterator<Item = &'a PrefixCounts>) -> PrefixCounts {
    let mut merged = PrefixCounts::new();
    for partial in partials {
        for (semantic_type, prefixes) in partial {
            let total = merged.entry(semantic_type.clone()).or_default();
            for (prefix, count) in prefixes {
                *total.entry(prefix.clone()).or_insert(0) += count;
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    fn put_partial(store: &MemStore, file: &str, body: &str) {
        store
            .set(Namespace::PrefixStatistics, &format!("file-{file}"), body)
            .unwrap();
    }

    fn snapshot(store: &MemStore) -> Vec<(String, Option<String>)> {
        let mut keys = store
            .keys_with_prefix(Namespace::PrefixStatistics, "biolink:")
            .unwrap();
        keys.sort();
        keys.into_iter()
            .map(|k| {
                let v = store.get(Namespace::PrefixStatistics, &k).unwrap();
                (k, v)
            })
            .collect()
    }

    #[test]
    fn sums_across_files() {
        let store = MemStore::new();
        put_partial(&store, "a", r#"{"source_prefixes":{"biolink:Disease":{"X":3}}}"#);
        put_partial(&store, "b", r#"{"source_prefixes":{"biolink:Disease":{"X":5,"Y":1}}}"#);

        let report = StatisticsMerger::new().merge_all(&store).unwrap();
        assert_eq!(report.files, 2);
        assert_eq!(report.new_types, 1);
        assert_eq!(
            store.get(Namespace::PrefixStatistics, "biolink:Disease").unwrap().as_deref(),
            Some(r#"{"X":8,"Y":1}"#)
        );
    }

    #[test]
    fn merging_twice_is_byte_identical() {
        let store = MemStore::new();
        put_partial(&store, "a", r#"{"source_prefixes":{"biolink:Gene":{"NCBIGene":2},"biolink:NamedThing":{"NCBIGene":2}}}"#);

        StatisticsMerger::new().merge_all(&store).unwrap();
        let first = snapshot(&store);
        let types_first = store.lrange(Namespace::PrefixStatistics, SEMANTIC_TYPES_KEY, 0, -1).unwrap();

        let again = StatisticsMerger::new().merge_all(&store).unwrap();
        assert_eq!(again.new_types, 0);
        assert_eq!(snapshot(&store), first);
        assert_eq!(
            store.lrange(Namespace::PrefixStatistics, SEMANTIC_TYPES_KEY, 0, -1).unwrap(),
            types_first
        );
    }

    #[test]
    fn corrupt_partial_aborts_before_writing() {
        let store = MemStore::new();
        put_partial(&store, "a", r#"{"source_prefixes":{"biolink:Gene":{"NCBIGene":2}}}"#);
        put_partial(&store, "b", "{not json");

        let err = StatisticsMerger::new().merge_all(&store).unwrap_err();
        assert!(matches!(err, IngestError::CorruptStatistics { ref key, .. } if key == "file-b"));
        assert_eq!(store.get(Namespace::PrefixStatistics, "biolink:Gene").unwrap(), None);
    }

    #[test]
    fn dry_run_writes_nothing() {
        let store = MemStore::new();
        put_partial(&store, "a", r#"{"source_prefixes":{"biolink:Gene":{"NCBIGene":2}}}"#);
        let report = StatisticsMerger::new().dry_run(true).merge_all(&store).unwrap();
        assert_eq!(report.semantic_types, 1);
        assert_eq!(store.get(Namespace::PrefixStatistics, "biolink:Gene").unwrap(), None);
    }

    #[test]
    fn pending_partial_replaces_stored_one() {
        let store = MemStore::new();
        put_partial(&store, "a", r#"{"source_prefixes":{"biolink:Gene":{"NCBIGene":2}}}"#);
        let mut pending = PrefixCounts::new();
        pending
            .entry("biolink:Gene".to_string())
            .or_default()
            .insert("HGNC".to_string(), 5);

        let merger = StatisticsMerger::new().dry_run(true);
        let report = merger
            .merge_with(&store, vec![("a".to_string(), pending.clone())])
            .unwrap();
        assert_eq!(report.files, 1);
        assert_eq!(report.semantic_types, 1);

        let report = merger
            .merge_with(&store, vec![("b".to_string(), pending)])
            .unwrap();
        assert_eq!(report.files, 2);
    }

    #[test]
    fn types_without_contributors_are_emptied() {
        let store = MemStore::new();
        put_partial(&store, "a", r#"{"source_prefixes":{"biolink:Disease":{"MONDO":1}}}"#);
        StatisticsMerger::new().merge_all(&store).unwrap();

        put_partial(&store, "a", r#"{"source_prefixes":{"biolink:Gene":{"NCBIGene":1}}}"#);
        let report = StatisticsMerger::new().merge_all(&store).unwrap();
        assert_eq!(report.cleared_types, 1);
        assert_eq!(
            store.get(Namespace::PrefixStatistics, "biolink:Disease").unwrap().as_deref(),
            Some("{}")
        );
        assert_eq!(
            store.get(Namespace::PrefixStatistics, "biolink:Gene").unwrap().as_deref(),
            Some(r#"{"NCBIGene":1}"#)
        );
    }
}
