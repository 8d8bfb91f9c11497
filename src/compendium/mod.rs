//! Compendium files: newline-delimited JSON, one equivalence class per line.
//!
//! ```text
//! {"type": "biolink:Disease", "ic": "100", "identifiers": [{"i": "MONDO:0005002", "l": "COPD"}, {"i": "DOID:3812"}]}
//! ```

pub mod model;
pub mod reader;
pub mod validate;

pub use model::{EquivalenceClass, parse_record};
pub use reader::CompendiumReader;
pub use validate::{DEFAULT_SAMPLE_SIZE, schema_violations, validate_sample};
