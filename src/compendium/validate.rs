//! Structural pre-check run before a compendium is ingested.
//!
//! Only the first few records are sampled. A file whose head does not match
//! the record schema is rejected as a whole, before any write happens.

use std::io::BufRead;
use std::path::Path;
use std::sync::OnceLock;

use jsonschema::Validator;
use serde_json::Value;

use crate::compendium::reader::open_lines;
use crate::error::CompendiumError;

/// Default number of records sampled by [`validate_sample`].
pub const DEFAULT_SAMPLE_SIZE: usize = 5;

const RECORD_SCHEMA: &str = include_str!("../../resources/compendium_schema.json");

static RECORD_VALIDATOR: OnceLock<Result<Validator, String>> = OnceLock::new();

/// The compiled record schema, built on first use.
fn record_validator() -> Result<&'static Validator, CompendiumError> {
    RECORD_VALIDATOR
        .get_or_init(|| {
            let schema: Value = serde_json::from_str(RECORD_SCHEMA).map_err(|e| e.to_string())?;
            jsonschema::validator_for(&schema).map_err(|e| e.to_string())
        })
        .as_ref()
        .map_err(|message| CompendiumError::SchemaDefinition {
            message: message.clone(),
        })
}

/// Every way `record` violates the compendium record schema, one message
/// per violation prefixed with the offending JSON path. Empty when valid.
pub fn schema_violations(record: &Value) -> Result<Vec<String>, CompendiumError> {
    let validator = record_validator()?;
    Ok(validator
        .iter_errors(record)
        .map(|e| {
            let at = e.instance_path.to_string();
            if at.is_empty() {
                format!("record: {e}")
            } else {
                format!("{at}: {e}")
            }
        })
        .collect())
}

/// Validate the first `sample_size` non-blank records of a compendium file.
///
/// Returns the number of records sampled.
pub fn validate_sample(path: &Path, sample_size: usize) -> Result<usize, CompendiumError> {
    let file_name = path.display().to_string();
    let lines = open_lines(path)?;
    validate_lines(&file_name, lines, sample_size)
}

pub(crate) fn validate_lines<R: BufRead>(
    path: &str,
    lines: std::io::Lines<R>,
    sample_size: usize,
) -> Result<usize, CompendiumError> {
    let mut sampled = 0;
    for (idx, line) in lines.enumerate() {
        if sampled >= sample_size {
            break;
        }
        let line_no = idx + 1;
        let line = line.map_err(|e| CompendiumError::Read {
            path: path.to_string(),
            line: line_no,
            source: e,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line).map_err(|e| CompendiumError::Parse {
            path: path.to_string(),
            line: line_no,
            message: e.to_string(),
        })?;
        let violations = schema_violations(&value)?;
        if !violations.is_empty() {
            return Err(CompendiumError::Schema {
                path: path.to_string(),
                line: line_no,
                message: violations.join("; "),
            });
        }
        sampled += 1;
    }
    tracing::debug!(file = path, sampled, "compendium sample validated");
    Ok(sampled)
}
