//! Conflation groups: canonical identifiers merged across semantic types.
//!
//! A gene and the protein it encodes, or a drug and its active chemical, are
//! distinct equivalence classes. A conflation file lists such groups, one
//! JSON array of canonical identifiers per line, preferred identifier first:
//!
//! ```text
//! ["NCBIGene:1017", "UniProtKB:P24941"]
//! ```
//!
//! Every identifier in a group maps to the whole group.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::compendium::reader::open_lines;
use crate::error::{CompendiumError, IngestError, StoreError};
use crate::store::{KeyValueStore, Namespace, WriteBatch};

/// Which conflation table to read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflationKind {
    GeneProtein,
    DrugChemical,
}

impl ConflationKind {
    pub const ALL: [ConflationKind; 2] = [ConflationKind::GeneProtein, ConflationKind::DrugChemical];

    pub fn namespace(self) -> Namespace {
        match self {
            ConflationKind::GeneProtein => Namespace::GeneProteinConflation,
            ConflationKind::DrugChemical => Namespace::DrugChemicalConflation,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConflationKind::GeneProtein => "gene-protein",
            ConflationKind::DrugChemical => "drug-chemical",
        }
    }
}

impl fmt::Display for ConflationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflationKind {
    type Err = String;

    /// Accepts `gene-protein`, `GeneProtein`, `gene_protein` and the drug equivalents.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match folded.as_str() {
            "geneprotein" => Ok(ConflationKind::GeneProtein),
            "drugchemical" => Ok(ConflationKind::DrugChemical),
            _ => Err(format!(
                "unknown conflation `{s}` (expected gene-protein or drug-chemical)"
            )),
        }
    }
}

/// Outcome of loading one conflation file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflationReport {
    pub groups: usize,
    pub identifiers: usize,
}

/// Streams a conflation file into its namespace in blocks of `block_size` groups.
pub fn load_conflation(
    store: &dyn KeyValueStore,
    path: &Path,
    kind: ConflationKind,
    block_size: usize,
    dry_run: bool,
) -> Result<ConflationReport, IngestError> {
    let file_name = path.display().to_string();
    let namespace = kind.namespace();
    let block_size = block_size.max(1);

    let mut report = ConflationReport::default();
    let mut batch = WriteBatch::new();
    let mut staged = 0;

    for (idx, line) in open_lines(path)?.enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|e| CompendiumError::Read {
            path: file_name.clone(),
            line: line_no,
            source: e,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let group: Vec<String> = serde_json::from_str(&line).map_err(|e| CompendiumError::Parse {
            path: file_name.clone(),
            line: line_no,
            message: e.to_string(),
        })?;
        if group.is_empty() {
            return Err(CompendiumError::Schema {
                path: file_name.clone(),
                line: line_no,
                message: "conflation group is empty".into(),
            }
            .into());
        }

        let body = serde_json::to_string(&group).map_err(|e| StoreError::Serialization {
            message: format!("conflation group at line {line_no}: {e}"),
        })?;
        for identifier in &group {
            batch.set(namespace, identifier.as_str(), body.as_str());
        }
        report.groups += 1;
        report.identifiers += group.len();
        staged += 1;

        if staged >= block_size {
            submit(store, std::mem::take(&mut batch), dry_run)?;
            staged = 0;
        }
    }
    if staged > 0 {
        submit(store, batch, dry_run)?;
    }

    tracing::info!(
        file = %file_name,
        kind = %kind,
        groups = report.groups,
        identifiers = report.identifiers,
        dry_run,
        "conflation loaded"
    );
    Ok(report)
}

fn submit(store: &dyn KeyValueStore, batch: WriteBatch, dry_run: bool) -> Result<(), StoreError> {
    if dry_run {
        tracing::debug!(ops = batch.len(), "dry run: discarded conflation batch");
        return Ok(());
    }
    store.execute(batch)?;
    Ok(())
}
