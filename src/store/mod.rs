//! Key-value storage for the identifier namespaces.
//!
//! The normalizer is a client of a key-value store that offers string
//! get/set, aligned multi-get, list push/range and pipelined batches.
//! Two backends implement [`KeyValueStore`]:
//!
//! - [`MemStore`]: concurrent hashmaps (DashMap), nothing survives the process
//! - [`DurableStore`]: one redb table per namespace, crash-safe
//!
//! Keys live in independent [`Namespace`]s; the same key may exist in several.

pub mod durable;
pub mod mem;

use std::fmt;

pub use durable::DurableStore;
pub use mem::MemStore;

use crate::error::StoreError;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Name of the list holding every semantic type seen by the merger.
pub const SEMANTIC_TYPES_KEY: &str = "semantic_types";

/// Key prefix for per-file prefix statistics partials.
pub const FILE_STATS_PREFIX: &str = "file-";

/// Independent key spaces written by ingestion and read by resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    /// Identifier (uppercased, and raw) → canonical identifier.
    TermToCanonical,
    /// Canonical identifier → JSON list of `{"i", "l"}` members.
    CanonicalToEquivalents,
    /// Canonical identifier → leaf semantic type.
    CanonicalToType,
    /// Canonical identifier → information content score.
    InformationContent,
    /// Semantic type → JSON prefix counts; also per-file partials and the type list.
    PrefixStatistics,
    /// Canonical identifier → JSON list of gene/protein conflated canonicals.
    GeneProteinConflation,
    /// Canonical identifier → JSON list of drug/chemical conflated canonicals.
    DrugChemicalConflation,
}

impl Namespace {
    /// Every namespace, in a stable order.
    pub const ALL: [Namespace; 7] = [
        Namespace::TermToCanonical,
        Namespace::CanonicalToEquivalents,
        Namespace::CanonicalToType,
        Namespace::InformationContent,
        Namespace::PrefixStatistics,
        Namespace::GeneProteinConflation,
        Namespace::DrugChemicalConflation,
    ];

    /// Stable name, used as the redb table name.
    pub fn name(self) -> &'static str {
        match self {
            Namespace::TermToCanonical => "term_to_canonical",
            Namespace::CanonicalToEquivalents => "canonical_to_equivalents",
            Namespace::CanonicalToType => "canonical_to_type",
            Namespace::InformationContent => "information_content",
            Namespace::PrefixStatistics => "prefix_statistics",
            Namespace::GeneProteinConflation => "conflation_gene_protein",
            Namespace::DrugChemicalConflation => "conflation_drug_chemical",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Set {
        namespace: Namespace,
        key: String,
        value: String,
    },
    /// Prepend values to a list, in argument order (like Redis `LPUSH`).
    LPush {
        namespace: Namespace,
        key: String,
        values: Vec<String>,
    },
}

/// A pipelined sequence of writes submitted in one round trip.
///
/// Backends apply the writes in order. Atomicity across the whole batch is
/// not part of the contract.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a `SET`.
    pub fn set(&mut self, namespace: Namespace, key: impl Into<String>, value: impl Into<String>) {
        self.ops.push(WriteOp::Set {
            namespace,
            key: key.into(),
            value: value.into(),
        });
    }

    /// Stage an `LPUSH`. Empty value lists are dropped.
    pub fn lpush(&mut self, namespace: Namespace, key: impl Into<String>, values: Vec<String>) {
        if values.is_empty() {
            return;
        }
        self.ops.push(WriteOp::LPush {
            namespace,
            key: key.into(),
            values,
        });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Contract of the key-value store the normalizer talks to.
///
/// Values are UTF-8 strings (JSON documents for structured values).
/// Implementations must be safe to share across threads: parallel ingestion
/// tasks and concurrent resolvers use one store handle.
pub trait KeyValueStore: Send + Sync {
    /// Read one value. `Ok(None)` when the key is absent.
    fn get(&self, namespace: Namespace, key: &str) -> StoreResult<Option<String>>;

    /// Write one value immediately.
    fn set(&self, namespace: Namespace, key: &str, value: &str) -> StoreResult<()>;

    /// Read many values; the result is aligned with `keys` by position.
    fn mget(&self, namespace: Namespace, keys: &[String]) -> StoreResult<Vec<Option<String>>>;

    /// Read a slice of a list with Redis index semantics (`-1` is the last element).
    fn lrange(&self, namespace: Namespace, key: &str, start: i64, stop: i64)
    -> StoreResult<Vec<String>>;

    /// Prepend values to a list, returning its new length.
    fn lpush(&self, namespace: Namespace, key: &str, values: &[String]) -> StoreResult<usize>;

    /// List the string keys (not list keys) starting with `prefix`, sorted.
    fn keys_with_prefix(&self, namespace: Namespace, prefix: &str) -> StoreResult<Vec<String>>;

    /// Apply a pipelined batch, returning the number of operations applied.
    fn execute(&self, batch: WriteBatch) -> StoreResult<usize>;
}

/// Resolve Redis-style `start..=stop` indices against a list of `len` items.
///
/// Returns `None` when the range selects nothing.
pub(crate) fn list_bounds(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let norm = |i: i64| if i < 0 { len + i } else { i };
    let start = norm(start).max(0);
    let stop = norm(stop).min(len - 1);
    if len == 0 || start > stop {
        return None;
    }
    Some((start as usize, stop as usize))
}

/// New list contents after `LPUSH values` onto `existing`.
pub(crate) fn lpush_onto(existing: &[String], values: &[String]) -> Vec<String> {
    let mut list: Vec<String> = values.iter().rev().cloned().collect();
    list.extend_from_slice(existing);
    list
}
