//! Compendium ingestion: validate, stream, write namespaces, tally prefixes.
//!
//! One file is ingested sequentially by [`Ingestor::ingest_file`]. Several
//! files can be ingested in parallel by [`Ingestor::ingest_all`], which then
//! runs a single [`StatisticsMerger`] pass over every per-file partial.

pub mod merge;
pub mod stats;
pub mod writer;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use merge::{MergeReport, StatisticsMerger};
pub use stats::{FileStatistics, PrefixCounts, PrefixStatistics, file_identity, file_key};
pub use writer::NamespaceWriter;

use crate::compendium::{CompendiumReader, DEFAULT_SAMPLE_SIZE, validate_sample};
use crate::error::{IngestError, StoreError};
use crate::hierarchy::AncestorResolver;
use crate::store::KeyValueStore;

/// Default number of records staged between flushes.
pub const DEFAULT_BLOCK_SIZE: usize = 1000;

/// Ingestion tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Records staged before the namespace writer flushes.
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// Records checked by the structural pre-check.
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    /// Ingest files on the rayon pool.
    #[serde(default)]
    pub parallel: bool,
    /// Parse and count, but write nothing.
    #[serde(default)]
    pub dry_run: bool,
}

fn default_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

fn default_sample_size() -> usize {
    DEFAULT_SAMPLE_SIZE
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            sample_size: DEFAULT_SAMPLE_SIZE,
            parallel: false,
            dry_run: false,
        }
    }
}

/// Outcome of ingesting one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    /// Key suffix of the per-file statistics partial.
    pub identity: String,
    pub records: usize,
    pub flushes: usize,
    /// Distinct semantic types (leaf and ancestors) seen in the file.
    pub semantic_types: usize,
    /// The file's prefix statistics, as persisted under its `file-*` key.
    pub prefix_counts: PrefixCounts,
}

/// Outcome of [`Ingestor::ingest_all`].
#[derive(Debug, Default)]
pub struct RunReport {
    pub loaded: Vec<FileReport>,
    pub failed: Vec<(PathBuf, IngestError)>,
    pub merge: MergeReport,
}

impl RunReport {
    pub fn records(&self) -> usize {
        self.loaded.iter().map(|f| f.records).sum()
    }
}

/// Drives ingestion of compendium files into a store.
pub struct Ingestor {
    store: Arc<dyn KeyValueStore>,
    ancestors: Arc<AncestorResolver>,
    config: IngestConfig,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        ancestors: Arc<AncestorResolver>,
        config: IngestConfig,
    ) -> Self {
        Self {
            store,
            ancestors,
            config,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Validate and ingest one file, then persist its prefix statistics.
    ///
    /// Any error aborts this file. Batches flushed before the error stay in
    /// the store; a failing flush after earlier ones is reported as
    /// [`IngestError::PartialBatch`].
    pub fn ingest_file(&self, path: &Path) -> Result<FileReport, IngestError> {
        let file_name = path.display().to_string();
        let sampled = validate_sample(path, self.config.sample_size)?;
        tracing::debug!(file = %file_name, sampled, "pre-check passed");

        let identity = file_identity(path);
        let block_size = self.config.block_size.max(1);
        let mut writer = NamespaceWriter::new(self.store.as_ref()).dry_run(self.config.dry_run);
        let mut stats = PrefixStatistics::new();
        let mut flushes = 0;

        for record in CompendiumReader::open(path)? {
            let class = record?;
            stats.record(&class, &self.ancestors)?;
            writer.write(&class)?;

            if writer.staged_records() >= block_size {
                flush(&mut writer, &file_name)?;
                flushes += 1;
                tracing::info!(
                    file = %file_name,
                    records = writer.flushed_records(),
                    "flushed block"
                );
            }
        }
        if writer.staged_records() > 0 {
            flush(&mut writer, &file_name)?;
            flushes += 1;
        }

        if !self.config.dry_run {
            stats.persist(self.store.as_ref(), &identity)?;
        }

        let report = FileReport {
            path: path.to_path_buf(),
            identity,
            records: stats.records(),
            flushes,
            semantic_types: stats.counts().len(),
            prefix_counts: stats.into_counts(),
        };
        tracing::info!(
            file = %file_name,
            records = report.records,
            types = report.semantic_types,
            dry_run = self.config.dry_run,
            "file ingested"
        );
        Ok(report)
    }

    /// Ingest every file, skipping the ones that fail, then merge statistics.
    ///
    /// Per-file failures are collected in the report. Only a failing merge
    /// fails the run.
    pub fn ingest_all(&self, paths: &[PathBuf]) -> Result<RunReport, IngestError> {
        let outcomes: Vec<(PathBuf, Result<FileReport, IngestError>)> = if self.config.parallel {
            use rayon::prelude::*;

            paths
                .par_iter()
                .map(|p| (p.clone(), self.ingest_file(p)))
                .collect()
        } else {
            paths
                .iter()
                .map(|p| (p.clone(), self.ingest_file(p)))
                .collect()
        };

        let mut report = RunReport::default();
        for (path, outcome) in outcomes {
            match outcome {
                Ok(file) => report.loaded.push(file),
                Err(e) => {
                    tracing::warn!(
                        file = %path.display(),
                        class = ?e.class(),
                        error = %e,
                        "file skipped"
                    );
                    report.failed.push((path, e));
                }
            }
        }

        // Dry runs never persisted their partials; merge them from memory.
        let pending: Vec<(String, PrefixCounts)> = if self.config.dry_run {
            report
                .loaded
                .iter()
                .map(|f| (f.identity.clone(), f.prefix_counts.clone()))
                .collect()
        } else {
            Vec::new()
        };
        report.merge = StatisticsMerger::new()
            .dry_run(self.config.dry_run)
            .merge_with(self.store.as_ref(), pending)?;
        tracing::info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            records = report.records(),
            "ingestion run complete"
        );
        Ok(report)
    }
}

fn flush(writer: &mut NamespaceWriter<'_>, file: &str) -> Result<(), IngestError> {
    let flushed_before = writer.flushed_records();
    writer
        .flush()
        .map(|_| ())
        .map_err(|source: StoreError| {
            if flushed_before == 0 {
                IngestError::Store(source)
            } else {
                tracing::error!(file, flushed_records = flushed_before, "flush failed mid-file");
                IngestError::PartialBatch {
                    file: file.to_string(),
                    flushed_records: flushed_before,
                    source,
                }
            }
        })
}

impl std::fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor")
            .field("config", &self.config)
            .field("ancestors", &self.ancestors)
            .finish()
    }
}
