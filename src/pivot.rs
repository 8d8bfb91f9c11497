//! Read side of the merged prefix statistics.

use std::collections::BTreeMap;

use crate::curie::uniquify;
use crate::error::StoreError;
use crate::store::{KeyValueStore, Namespace, SEMANTIC_TYPES_KEY, StoreResult};

/// Prefix → count for one semantic type.
pub type PrefixTable = BTreeMap<String, u64>;

/// Every semantic type the merger has seen, de-duplicated, first occurrence kept.
pub fn semantic_types(store: &dyn KeyValueStore) -> StoreResult<Vec<String>> {
    let listed = store.lrange(Namespace::PrefixStatistics, SEMANTIC_TYPES_KEY, 0, -1)?;
    Ok(uniquify(listed))
}

/// Merged prefix counts for the requested types; all known types when
/// `types` is empty. Types without merged counts are left out, including
/// types the last merge emptied because no loaded file contributes to them.
pub fn pivot(
    store: &dyn KeyValueStore,
    types: &[String],
) -> StoreResult<BTreeMap<String, PrefixTable>> {
    let wanted = if types.is_empty() {
        semantic_types(store)?
    } else {
        uniquify(types.iter().cloned())
    };

    let found = store.mget(Namespace::PrefixStatistics, &wanted)?;
    let mut out = BTreeMap::new();
    for (semantic_type, raw) in wanted.into_iter().zip(found) {
        let Some(raw) = raw else {
            tracing::debug!(semantic_type = %semantic_type, "no prefix statistics");
            continue;
        };
        let table: PrefixTable =
            serde_json::from_str(&raw).map_err(|e| StoreError::Serialization {
                message: format!("prefix statistics of {semantic_type}: {e}"),
            })?;
        if table.is_empty() {
            continue;
        }
        out.insert(semantic_type, table);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    fn seeded() -> MemStore {
        let store = MemStore::new();
        store
            .lpush(
                Namespace::PrefixStatistics,
                SEMANTIC_TYPES_KEY,
                &["biolink:Disease".to_string(), "biolink:NamedThing".to_string()],
            )
            .unwrap();
        store
            .lpush(Namespace::PrefixStatistics, SEMANTIC_TYPES_KEY, &["biolink:Disease".to_string()])
            .unwrap();
        store
            .set(Namespace::PrefixStatistics, "biolink:Disease", r#"{"DOID":1,"MONDO":2}"#)
            .unwrap();
        store
            .set(Namespace::PrefixStatistics, "biolink:NamedThing", r#"{"MONDO":2}"#)
            .unwrap();
        store
    }

    #[test]
    fn semantic_types_are_deduplicated() {
        let types = semantic_types(&seeded()).unwrap();
        assert_eq!(types, vec!["biolink:Disease", "biolink:NamedThing"]);
    }

    #[test]
    fn pivot_filters_to_requested_types() {
        let store = seeded();
        let out = pivot(&store, &["biolink:Disease".to_string(), "biolink:Gene".to_string()]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out["biolink:Disease"]["MONDO"], 2);
    }

    #[test]
    fn empty_request_means_all_types() {
        let out = pivot(&seeded(), &[]).unwrap();
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["biolink:Disease", "biolink:NamedThing"]);
    }

    #[test]
    fn empty_store_pivots_to_nothing() {
        assert!(pivot(&MemStore::new(), &[]).unwrap().is_empty());
    }

    #[test]
    fn emptied_types_are_left_out() {
        let store = seeded();
        store
            .set(Namespace::PrefixStatistics, "biolink:NamedThing", "{}")
            .unwrap();
        let out = pivot(&store, &[]).unwrap();
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["biolink:Disease"]);
    }
}
