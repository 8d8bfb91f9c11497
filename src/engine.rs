//! Normalizer facade: top-level API over ingestion, resolution and pivots.
//!
//! The `Normalizer` owns the store handle, the ancestor resolver and the two
//! pipelines built on them. The CLI and the HTTP server only talk to this type.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{HierarchySource, NormConfig, StoreBackend};
use crate::conflation::{ConflationKind, ConflationReport, load_conflation};
use crate::error::{ConfigError, NormResult};
use crate::hierarchy::{AncestorResolver, HierarchyProvider, RemoteHierarchy, TypeTable};
use crate::ingest::{FileReport, Ingestor, MergeReport, RunReport, StatisticsMerger};
use crate::pivot::{self, PrefixTable};
use crate::resolve::{ResolutionEngine, ResolveOptions, ResolvedNode};
use crate::store::{DurableStore, KeyValueStore, MemStore};

/// Biomedical identifier normalizer.
pub struct Normalizer {
    config: NormConfig,
    store: Arc<dyn KeyValueStore>,
    ancestors: Arc<AncestorResolver>,
    ingestor: Ingestor,
    resolver: ResolutionEngine,
}

impl Normalizer {
    /// Open the configured store and hierarchy provider.
    pub fn new(config: NormConfig) -> NormResult<Self> {
        config.validate()?;
        let store = open_store(&config)?;
        let provider = open_hierarchy(&config)?;
        tracing::info!(
            backend = ?config.store.backend,
            hierarchy = ?config.hierarchy.source,
            "initializing normalizer"
        );
        Ok(Self::with_parts(config, store, provider))
    }

    /// Assemble a normalizer from an already opened store and provider.
    pub fn with_parts(
        config: NormConfig,
        store: Arc<dyn KeyValueStore>,
        provider: Arc<dyn HierarchyProvider>,
    ) -> Self {
        let ancestors = Arc::new(AncestorResolver::new(provider));
        let ingestor = Ingestor::new(
            Arc::clone(&store),
            Arc::clone(&ancestors),
            config.ingest.clone(),
        );
        let resolver = ResolutionEngine::new(
            Arc::clone(&store),
            Arc::clone(&ancestors),
            config.resolve.clone(),
        );
        Self {
            config,
            store,
            ancestors,
            ingestor,
            resolver,
        }
    }

    /// In-memory normalizer over the built-in Biolink table.
    pub fn in_memory() -> NormResult<Self> {
        let provider = Arc::new(TypeTable::builtin()?);
        Ok(Self::with_parts(
            NormConfig::default(),
            Arc::new(MemStore::new()),
            provider,
        ))
    }

    pub fn config(&self) -> &NormConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn ancestors(&self) -> &Arc<AncestorResolver> {
        &self.ancestors
    }

    // -----------------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------------

    /// Validate and ingest compendium files, then merge prefix statistics.
    pub fn load(&self, paths: &[PathBuf]) -> NormResult<RunReport> {
        Ok(self.ingestor.ingest_all(paths)?)
    }

    /// Ingest a single file without merging.
    pub fn ingest_file(&self, path: &Path) -> NormResult<FileReport> {
        Ok(self.ingestor.ingest_file(path)?)
    }

    /// Rebuild the global prefix statistics from every per-file partial.
    pub fn merge(&self) -> NormResult<MergeReport> {
        let merger = StatisticsMerger::new().dry_run(self.config.ingest.dry_run);
        Ok(merger.merge_all(self.store.as_ref())?)
    }

    pub fn load_conflation(&self, path: &Path, kind: ConflationKind) -> NormResult<ConflationReport> {
        Ok(load_conflation(
            self.store.as_ref(),
            path,
            kind,
            self.config.ingest.block_size,
            self.config.ingest.dry_run,
        )?)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Resolve identifiers; the result is aligned with `curies`.
    pub fn resolve(
        &self,
        curies: &[String],
        options: &ResolveOptions,
    ) -> NormResult<Vec<Option<ResolvedNode>>> {
        self.resolver.resolve(curies, options)
    }

    pub fn semantic_types(&self) -> NormResult<Vec<String>> {
        Ok(pivot::semantic_types(self.store.as_ref())?)
    }

    /// Merged prefix counts per semantic type; every known type when `types` is empty.
    pub fn curie_prefixes(&self, types: &[String]) -> NormResult<BTreeMap<String, PrefixTable>> {
        Ok(pivot::pivot(self.store.as_ref(), types)?)
    }
}

impl std::fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Normalizer")
            .field("backend", &self.config.store.backend)
            .field("hierarchy", &self.config.hierarchy.source)
            .field("ancestors", &self.ancestors)
            .finish()
    }
}

fn open_store(config: &NormConfig) -> NormResult<Arc<dyn KeyValueStore>> {
    match config.store.backend {
        StoreBackend::Memory => Ok(Arc::new(MemStore::new())),
        StoreBackend::Redb => {
            let dir = config.store.path.as_ref().ok_or_else(|| ConfigError::Invalid {
                message: "store.path is required for the redb backend".into(),
            })?;
            Ok(Arc::new(DurableStore::open(dir)?))
        }
    }
}

fn open_hierarchy(config: &NormConfig) -> NormResult<Arc<dyn HierarchyProvider>> {
    let hierarchy = &config.hierarchy;
    match hierarchy.source {
        HierarchySource::Builtin => Ok(Arc::new(TypeTable::builtin()?)),
        HierarchySource::File => {
            let path = hierarchy.path.as_ref().ok_or_else(|| ConfigError::Invalid {
                message: "hierarchy.path is required for a file hierarchy".into(),
            })?;
            Ok(Arc::new(TypeTable::load(path)?))
        }
        HierarchySource::Remote => {
            let endpoint = hierarchy.endpoint.as_ref().ok_or_else(|| ConfigError::Invalid {
                message: "hierarchy.endpoint is required for a remote hierarchy".into(),
            })?;
            Ok(Arc::new(RemoteHierarchy::new(
                endpoint.clone(),
                hierarchy.timeout_secs,
            )))
        }
    }
}
