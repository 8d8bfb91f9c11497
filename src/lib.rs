// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # node-norm
//!
//! Biomedical identifier normalization: many CURIEs in, one canonical
//! identifier (with its equivalents and semantic type) out.
//!
//! ## Architecture
//!
//! - **Compendia** (`compendium`): NDJSON equivalence classes, streamed and pre-checked
//! - **Ingestion** (`ingest`): namespace writes, per-file prefix statistics, merge
//! - **Hierarchy** (`hierarchy`): memoized ancestor chains over a type table or HTTP service
//! - **Resolution** (`resolve`): batched, order-preserving canonicalization with conflation
//! - **Storage** (`store`): key-value namespaces over DashMap (memory) or redb (durable)
//!
//! ## Library usage
//!
//! ```no_run
//! use std::path::PathBuf;
//! use node_norm::engine::Normalizer;
//! use node_norm::resolve::ResolveOptions;
//!
//! let norm = Normalizer::in_memory().unwrap();
//! norm.load(&[PathBuf::from("Disease.txt")]).unwrap();
//! let nodes = norm
//!     .resolve(&["DOID:3812".to_string()], &ResolveOptions::default())
//!     .unwrap();
//! println!("{}", serde_json::to_string_pretty(&nodes).unwrap());
//! ```

pub mod compendium;
pub mod config;
pub mod conflation;
pub mod curie;
pub mod engine;
pub mod error;
pub mod hierarchy;
pub mod ingest;
pub mod pivot;
pub mod resolve;
pub mod store;
