//! Rich diagnostic error types for node-norm.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! so an operator running a load sees an error code and a hint about what to fix,
//! not just a message.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for node-norm.
///
/// Each variant wraps a subsystem error, preserving the full diagnostic chain
/// through to the CLI or HTTP layer.
#[derive(Debug, Error, Diagnostic)]
pub enum NormError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Hierarchy(#[from] HierarchyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Compendium(#[from] CompendiumError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

/// Broad failure classes used by callers to decide what to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed or schema-violating input. Only the current file is lost.
    Validation,
    /// The store or the hierarchy provider failed.
    ExternalService,
    /// A flush failed after earlier batches of the same file were applied.
    PartialBatch,
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(node_norm::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(node_norm::store::redb),
        help(
            "The embedded database encountered a transaction error. \
             Make sure no other process holds the database open; \
             if the file is damaged, reload the compendia into a fresh data directory."
        )
    )]
    Redb { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(node_norm::store::serde),
        help(
            "A stored value could not be encoded or decoded. \
             The data was probably written by an incompatible loader; reload the compendia."
        )
    )]
    Serialization { message: String },
}

// ---------------------------------------------------------------------------
// Hierarchy errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum HierarchyError {
    #[error("unknown semantic type: {semantic_type}")]
    #[diagnostic(
        code(node_norm::hierarchy::unknown_type),
        help(
            "The hierarchy provider has no entry for this type. \
             Add it to the type table, or check the record's `type` field for typos."
        )
    )]
    UnknownType { semantic_type: String },

    #[error("hierarchy provider failed for {semantic_type}: {message}")]
    #[diagnostic(
        code(node_norm::hierarchy::provider),
        help(
            "The ontology service could not be reached or returned an invalid answer. \
             Check `hierarchy.endpoint` in the config and that the service is up."
        )
    )]
    Provider {
        semantic_type: String,
        message: String,
    },

    #[error("failed to load type table from {path}: {message}")]
    #[diagnostic(
        code(node_norm::hierarchy::load),
        help("The type table must be TOML or JSON with a `types` map of type -> parent list.")
    )]
    Load { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Compendium errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum CompendiumError {
    #[error("cannot open compendium {path}")]
    #[diagnostic(
        code(node_norm::compendium::open),
        help("Check that the file exists and is readable.")
    )]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("read error in {path} at line {line}")]
    #[diagnostic(
        code(node_norm::compendium::read),
        help("The file could not be read to the end. Check the disk and the file encoding (UTF-8).")
    )]
    Read {
        path: String,
        line: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path} at line {line}: {message}")]
    #[diagnostic(
        code(node_norm::compendium::parse),
        help(
            "Every line must be one JSON object. The file was not ingested; \
             fix or regenerate it and load it again."
        )
    )]
    Parse {
        path: String,
        line: usize,
        message: String,
    },

    #[error("schema violation in {path} at line {line}: {message}")]
    #[diagnostic(
        code(node_norm::compendium::schema),
        help(
            "Records need a non-empty string `type` and a non-empty `identifiers` list \
             of {{\"i\": ..., \"l\": ...}} objects; `ic` is optional."
        )
    )]
    Schema {
        path: String,
        line: usize,
        message: String,
    },

    #[error("compendium record schema is unusable: {message}")]
    #[diagnostic(
        code(node_norm::compendium::schema_definition),
        help("resources/compendium_schema.json must be a valid JSON Schema document.")
    )]
    SchemaDefinition { message: String },
}

// ---------------------------------------------------------------------------
// Ingestion errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum IngestError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Compendium(#[from] CompendiumError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Hierarchy(#[from] HierarchyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error("flush failed for {file} after {flushed_records} records were written")]
    #[diagnostic(
        code(node_norm::ingest::partial_batch),
        help(
            "Earlier batches of this file are already in the store. \
             Resume by reloading the file once the store is healthy; rewrites are idempotent."
        )
    )]
    PartialBatch {
        file: String,
        flushed_records: usize,
        #[source]
        source: StoreError,
    },

    #[error("corrupt per-file statistics under {key}: {message}")]
    #[diagnostic(
        code(node_norm::ingest::corrupt_stats),
        help(
            "A per-file prefix statistics record could not be decoded. \
             Reload the file that produced it; the merge has not modified the global tables."
        )
    )]
    CorruptStatistics { key: String, message: String },
}

impl IngestError {
    /// Classify the failure for callers that need to decide on recovery.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Compendium(_) => ErrorClass::Validation,
            Self::PartialBatch { .. } => ErrorClass::PartialBatch,
            Self::Hierarchy(_) | Self::Store(_) | Self::CorruptStatistics { .. } => {
                ErrorClass::ExternalService
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(node_norm::config::read),
        help("Ensure the config file exists and is valid TOML.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}")]
    #[diagnostic(
        code(node_norm::config::parse),
        help("Check the TOML syntax. {message}")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(node_norm::config::write),
        help("Ensure you have write permissions to the target directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(node_norm::config::invalid), help("{message}"))]
    Invalid { message: String },
}

/// Convenience alias for functions returning node-norm results.
pub type NormResult<T> = std::result::Result<T, NormError>;
