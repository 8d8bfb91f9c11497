//! Batched writes of equivalence classes into the identifier namespaces.

use crate::compendium::EquivalenceClass;
use crate::curie::lookup_key;
use crate::store::{KeyValueStore, Namespace, StoreResult, WriteBatch};

/// Stages the namespace writes for equivalence classes and submits them to
/// the store in one pipelined batch per [`flush`](Self::flush).
///
/// For every class:
/// - `term_to_canonical`: uppercased and raw member identifiers → canonical
/// - `canonical_to_equivalents`: canonical → JSON member list
/// - `canonical_to_type`: canonical → leaf type
/// - `information_content`: canonical → score, only when supplied
pub struct NamespaceWriter<'a> {
    store: &'a dyn KeyValueStore,
    batch: WriteBatch,
    staged_records: usize,
    flushed_records: usize,
    dry_run: bool,
}

impl<'a> NamespaceWriter<'a> {
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self {
            store,
            batch: WriteBatch::new(),
            staged_records: 0,
            flushed_records: 0,
            dry_run: false,
        }
    }

    /// Discard batches on flush instead of submitting them.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Stage the writes for one class. Nothing reaches the store until [`flush`](Self::flush).
    pub fn write(&mut self, class: &EquivalenceClass) -> StoreResult<()> {
        let canonical = class.canonical_id();

        for member in class.members() {
            let upper = lookup_key(&member.identifier);
            if upper != member.identifier {
                self.batch
                    .set(Namespace::TermToCanonical, member.identifier.as_str(), canonical);
            }
            self.batch.set(Namespace::TermToCanonical, upper, canonical);
        }

        let members = serde_json::to_string(class.members()).map_err(|e| {
            crate::error::StoreError::Serialization {
                message: format!("member list for {canonical}: {e}"),
            }
        })?;
        self.batch
            .set(Namespace::CanonicalToEquivalents, canonical, members);
        self.batch
            .set(Namespace::CanonicalToType, canonical, class.leaf_type());
        if let Some(ic) = class.information_content() {
            self.batch
                .set(Namespace::InformationContent, canonical, ic.to_string());
        }

        self.staged_records += 1;
        Ok(())
    }

    /// Submit everything staged since the last flush, returning the number
    /// of records it covered.
    ///
    /// On failure the staged batch is lost and [`flushed_records`](Self::flushed_records)
    /// still reports what earlier flushes applied.
    pub fn flush(&mut self) -> StoreResult<usize> {
        let records = std::mem::take(&mut self.staged_records);
        let batch = std::mem::take(&mut self.batch);
        if records == 0 {
            return Ok(0);
        }

        if self.dry_run {
            tracing::debug!(records, ops = batch.len(), "dry run: discarded batch");
        } else {
            let ops = self.store.execute(batch)?;
            tracing::debug!(records, ops, "flushed namespace batch");
        }
        self.flushed_records += records;
        Ok(records)
    }

    /// Records staged but not yet flushed.
    pub fn staged_records(&self) -> usize {
        self.staged_records
    }

    /// Records covered by successful flushes so far.
    pub fn flushed_records(&self) -> usize {
        self.flushed_records
    }
}
