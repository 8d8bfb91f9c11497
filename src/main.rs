//! node-norm CLI: load compendia, merge statistics, resolve identifiers.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use node_norm::config::{NormConfig, StoreBackend};
use node_norm::conflation::ConflationKind;
use node_norm::engine::Normalizer;
use node_norm::resolve::{ResolveOptions, ResolvedNode};

#[derive(Parser)]
#[command(name = "node-norm", version, about = "Biomedical identifier normalizer")]
struct Cli {
    /// TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for the redb store (implies `store.backend = "redb"`).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and ingest compendium files, then merge prefix statistics.
    Load {
        /// Compendium files (NDJSON).
        #[arg(short = 'c', long = "compendium", required = true, num_args = 1..)]
        compendia: Vec<PathBuf>,

        /// Records per flushed batch.
        #[arg(long)]
        block_size: Option<usize>,

        /// Ingest files in parallel.
        #[arg(long)]
        parallel: bool,

        /// Parse and count without writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Rebuild global prefix statistics from the per-file partials.
    Merge,

    /// Load a conflation file (one JSON array of canonical identifiers per line).
    LoadConflation {
        #[arg(long)]
        file: PathBuf,

        /// gene-protein or drug-chemical.
        #[arg(long)]
        kind: ConflationKind,

        #[arg(long)]
        dry_run: bool,
    },

    /// Resolve identifiers and print one `{curie, node}` entry per input as JSON.
    Resolve {
        /// CURIEs to resolve.
        #[arg(required = true)]
        curies: Vec<String>,

        /// Conflation to apply (repeatable).
        #[arg(long = "conflate")]
        conflate: Vec<ConflationKind>,

        /// Return full ancestor chains in `type`.
        #[arg(long)]
        ancestors: bool,
    },

    /// List every semantic type seen by the merger.
    SemanticTypes,

    /// Show identifier prefix counts per semantic type (all types when none given).
    CuriePrefixes {
        types: Vec<String>,
    },

    /// Print the effective configuration as TOML.
    Config,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => NormConfig::load(path)?,
        None => NormConfig::default(),
    };
    if let Some(dir) = cli.data_dir.clone() {
        config = config.with_data_dir(dir);
    }

    match cli.command {
        Commands::Load {
            compendia,
            block_size,
            parallel,
            dry_run,
        } => {
            if let Some(block_size) = block_size {
                config.ingest.block_size = block_size;
            }
            config.ingest.parallel |= parallel;
            config.ingest.dry_run |= dry_run;
            warn_if_ephemeral(&config);

            let norm = Normalizer::new(config)?;
            let report = norm.load(&compendia)?;

            for file in &report.loaded {
                println!(
                    "loaded {} ({} records, {} types)",
                    file.path.display(),
                    file.records,
                    file.semantic_types
                );
            }
            for (path, err) in &report.failed {
                println!("skipped {}: {err}", path.display());
            }
            println!(
                "{} records from {} file(s); merged {} semantic types ({} new)",
                report.records(),
                report.loaded.len(),
                report.merge.semantic_types,
                report.merge.new_types
            );
            if report.loaded.is_empty() && !report.failed.is_empty() {
                miette::bail!("no compendium could be loaded");
            }
        }

        Commands::Merge => {
            warn_if_ephemeral(&config);
            let norm = Normalizer::new(config)?;
            let report = norm.merge()?;
            println!(
                "merged {} file partial(s) into {} semantic types ({} new)",
                report.files, report.semantic_types, report.new_types
            );
        }

        Commands::LoadConflation {
            file,
            kind,
            dry_run,
        } => {
            config.ingest.dry_run |= dry_run;
            warn_if_ephemeral(&config);
            let norm = Normalizer::new(config)?;
            let report = norm.load_conflation(&file, kind)?;
            println!(
                "loaded {} {kind} group(s) covering {} identifiers",
                report.groups, report.identifiers
            );
        }

        Commands::Resolve {
            curies,
            conflate,
            ancestors,
        } => {
            let norm = Normalizer::new(config)?;
            let mut options = ResolveOptions::default();
            for kind in conflate {
                options = options.conflate(kind);
            }
            if ancestors {
                options = options.with_ancestors(true);
            }
            let nodes = norm.resolve(&curies, &options)?;
            let aligned = aligned_entries(&curies, &nodes);
            println!("{}", serde_json::to_string_pretty(&aligned).into_diagnostic()?);
        }

        Commands::SemanticTypes => {
            let norm = Normalizer::new(config)?;
            let types = norm.semantic_types()?;
            if types.is_empty() {
                println!("No semantic types. Run `node-norm load` first.");
            } else {
                for t in types {
                    println!("{t}");
                }
            }
        }

        Commands::CuriePrefixes { types } => {
            let norm = Normalizer::new(config)?;
            let table = norm.curie_prefixes(&types)?;
            println!("{}", serde_json::to_string_pretty(&table).into_diagnostic()?);
        }

        Commands::Config => {
            config.validate()?;
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct ResolvedEntry<'a> {
    curie: &'a str,
    node: Option<&'a ResolvedNode>,
}

/// One entry per input, duplicates included.
fn aligned_entries<'a>(curies: &'a [String], nodes: &'a [Option<ResolvedNode>]) -> Vec<ResolvedEntry<'a>> {
    curies
        .iter()
        .zip(nodes)
        .map(|(curie, node)| ResolvedEntry {
            curie,
            node: node.as_ref(),
        })
        .collect()
}

fn warn_if_ephemeral(config: &NormConfig) {
    if config.store.backend == StoreBackend::Memory && !config.ingest.dry_run {
        tracing::warn!("memory backend: nothing written by this command outlives the process (use --data-dir)");
    }
}
