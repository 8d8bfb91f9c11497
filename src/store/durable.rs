//! Crash-safe key-value store backed by redb.
//!
//! Each [`Namespace`] is its own table; lists live in a shared table keyed by
//! `<namespace>/<key>` and are stored as JSON arrays. A [`WriteBatch`] is
//! committed in a single write transaction.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};

use crate::error::StoreError;
use crate::store::{
    KeyValueStore, Namespace, StoreResult, WriteBatch, WriteOp, list_bounds, lpush_onto,
};

const TERM_TABLE: TableDefinition<&str, &str> = TableDefinition::new("term_to_canonical");
const EQUIVALENTS_TABLE: TableDefinition<&str, &str> =
    TableDefinition::new("canonical_to_equivalents");
const TYPE_TABLE: TableDefinition<&str, &str> = TableDefinition::new("canonical_to_type");
const INFO_CONTENT_TABLE: TableDefinition<&str, &str> = TableDefinition::new("information_content");
const PREFIX_STATS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("prefix_statistics");
const GENE_PROTEIN_TABLE: TableDefinition<&str, &str> =
    TableDefinition::new("conflation_gene_protein");
const DRUG_CHEMICAL_TABLE: TableDefinition<&str, &str> =
    TableDefinition::new("conflation_drug_chemical");

/// Lists from every namespace, keyed by `<namespace>/<key>`.
const LIST_TABLE: TableDefinition<&str, &str> = TableDefinition::new("lists");

/// File name of the database inside the data directory.
pub const DB_FILE_NAME: &str = "node-norm.redb";

fn table_for(namespace: Namespace) -> TableDefinition<'static, &'static str, &'static str> {
    match namespace {
        Namespace::TermToCanonical => TERM_TABLE,
        Namespace::CanonicalToEquivalents => EQUIVALENTS_TABLE,
        Namespace::CanonicalToType => TYPE_TABLE,
        Namespace::InformationContent => INFO_CONTENT_TABLE,
        Namespace::PrefixStatistics => PREFIX_STATS_TABLE,
        Namespace::GeneProteinConflation => GENE_PROTEIN_TABLE,
        Namespace::DrugChemicalConflation => DRUG_CHEMICAL_TABLE,
    }
}

fn list_key(namespace: Namespace, key: &str) -> String {
    format!("{}/{key}", namespace.name())
}

fn redb_err(context: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Redb {
        message: format!("{context} failed: {err}"),
    }
}

fn decode_list(raw: &str) -> StoreResult<Vec<String>> {
    serde_json::from_str(raw).map_err(|e| StoreError::Serialization {
        message: format!("list value is not a JSON string array: {e}"),
    })
}

fn encode_list(list: &[String]) -> StoreResult<String> {
    serde_json::to_string(list).map_err(|e| StoreError::Serialization {
        message: format!("failed to encode list: {e}"),
    })
}

/// Durable store using redb.
///
/// Writes go through transactions; reads use MVCC snapshots, so resolvers
/// never block a running load.
pub struct DurableStore {
    db: Arc<Database>,
}

impl DurableStore {
    /// Open or create a durable store in the given directory.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io { source: e })?;
        let db_path = data_dir.join(DB_FILE_NAME);
        let db = Database::create(&db_path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", db_path.display()),
        })?;

        // Create every table up front so read transactions never see a missing table.
        let txn = db.begin_write().map_err(|e| redb_err("begin_write", e))?;
        for namespace in Namespace::ALL {
            txn.open_table(table_for(namespace))
                .map_err(|e| redb_err("open_table", e))?;
        }
        txn.open_table(LIST_TABLE)
            .map_err(|e| redb_err("open_table", e))?;
        txn.commit().map_err(|e| redb_err("commit", e))?;

        tracing::debug!(path = %db_path.display(), "opened durable store");
        Ok(Self { db: Arc::new(db) })
    }

    /// Get a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    fn apply(txn: &WriteTransaction, op: WriteOp) -> StoreResult<()> {
        match op {
            WriteOp::Set {
                namespace,
                key,
                value,
            } => {
                let mut table = txn
                    .open_table(table_for(namespace))
                    .map_err(|e| redb_err("open_table", e))?;
                table
                    .insert(key.as_str(), value.as_str())
                    .map_err(|e| redb_err("insert", e))?;
            }
            WriteOp::LPush {
                namespace,
                key,
                values,
            } => {
                Self::push(txn, namespace, &key, &values)?;
            }
        }
        Ok(())
    }

    fn push(
        txn: &WriteTransaction,
        namespace: Namespace,
        key: &str,
        values: &[String],
    ) -> StoreResult<usize> {
        let full_key = list_key(namespace, key);
        let mut table = txn
            .open_table(LIST_TABLE)
            .map_err(|e| redb_err("open_table", e))?;
        let existing = match table
            .get(full_key.as_str())
            .map_err(|e| redb_err("get", e))?
        {
            Some(guard) => decode_list(guard.value())?,
            None => Vec::new(),
        };
        let updated = lpush_onto(&existing, values);
        let encoded = encode_list(&updated)?;
        table
            .insert(full_key.as_str(), encoded.as_str())
            .map_err(|e| redb_err("insert", e))?;
        Ok(updated.len())
    }
}

impl KeyValueStore for DurableStore {
    fn get(&self, namespace: Namespace, key: &str) -> StoreResult<Option<String>> {
        let txn = self.db.begin_read().map_err(|e| redb_err("begin_read", e))?;
        let table = txn
            .open_table(table_for(namespace))
            .map_err(|e| redb_err("open_table", e))?;
        let result = table.get(key).map_err(|e| redb_err("get", e))?;
        Ok(result.map(|guard| guard.value().to_string()))
    }

    fn set(&self, namespace: Namespace, key: &str, value: &str) -> StoreResult<()> {
        let mut batch = WriteBatch::new();
        batch.set(namespace, key, value);
        self.execute(batch).map(|_| ())
    }

    fn mget(&self, namespace: Namespace, keys: &[String]) -> StoreResult<Vec<Option<String>>> {
        let txn = self.db.begin_read().map_err(|e| redb_err("begin_read", e))?;
        let table = txn
            .open_table(table_for(namespace))
            .map_err(|e| redb_err("open_table", e))?;
        keys.iter()
            .map(|key| {
                let result = table.get(key.as_str()).map_err(|e| redb_err("get", e))?;
                Ok(result.map(|guard| guard.value().to_string()))
            })
            .collect()
    }

    fn lrange(
        &self,
        namespace: Namespace,
        key: &str,
        start: i64,
        stop: i64,
    ) -> StoreResult<Vec<String>> {
        let txn = self.db.begin_read().map_err(|e| redb_err("begin_read", e))?;
        let table = txn
            .open_table(LIST_TABLE)
            .map_err(|e| redb_err("open_table", e))?;
        let full_key = list_key(namespace, key);
        let list = match table
            .get(full_key.as_str())
            .map_err(|e| redb_err("get", e))?
        {
            Some(guard) => decode_list(guard.value())?,
            None => return Ok(Vec::new()),
        };
        Ok(match list_bounds(list.len(), start, stop) {
            Some((from, to)) => list[from..=to].to_vec(),
            None => Vec::new(),
        })
    }

    fn lpush(&self, namespace: Namespace, key: &str, values: &[String]) -> StoreResult<usize> {
        let txn = self.db.begin_write().map_err(|e| redb_err("begin_write", e))?;
        let len = Self::push(&txn, namespace, key, values)?;
        txn.commit().map_err(|e| redb_err("commit", e))?;
        Ok(len)
    }

    fn keys_with_prefix(&self, namespace: Namespace, prefix: &str) -> StoreResult<Vec<String>> {
        let txn = self.db.begin_read().map_err(|e| redb_err("begin_read", e))?;
        let table = txn
            .open_table(table_for(namespace))
            .map_err(|e| redb_err("open_table", e))?;
        let mut keys = Vec::new();
        for entry in table.range(prefix..).map_err(|e| redb_err("range", e))? {
            let (key, _) = entry.map_err(|e| redb_err("range", e))?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key.to_string());
        }
        Ok(keys)
    }

    fn execute(&self, batch: WriteBatch) -> StoreResult<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let txn = self.db.begin_write().map_err(|e| redb_err("begin_write", e))?;
        let mut applied = 0;
        for op in batch.into_ops() {
            Self::apply(&txn, op)?;
            applied += 1;
        }
        txn.commit().map_err(|e| redb_err("commit", e))?;
        Ok(applied)
    }
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore").finish()
    }
}
