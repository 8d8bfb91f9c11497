//! In-process type hierarchy backed by a parent table.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{HierarchyProvider, HierarchyResult};
use crate::error::HierarchyError;

const BUILTIN_TYPES: &str = include_str!("../../resources/biolink_types.toml");

/// Direct-parent table for semantic types.
///
/// Serialized as `{ types = { "biolink:Gene" = ["biolink:BiologicalEntity"] } }`
/// in TOML, or the equivalent JSON object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeTable {
    #[serde(default)]
    types: BTreeMap<String, Vec<String>>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Biolink category table bundled with the crate.
    pub fn builtin() -> HierarchyResult<Self> {
        Self::from_toml_str(BUILTIN_TYPES).map_err(|e| match e {
            HierarchyError::Load { message, .. } => HierarchyError::Load {
                path: "<builtin>".into(),
                message,
            },
            other => other,
        })
    }

    /// Builder: register `semantic_type` with its direct parents.
    pub fn with_type<I, S>(mut self, semantic_type: impl Into<String>, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(semantic_type, parents);
        self
    }

    pub fn insert<I, S>(&mut self, semantic_type: impl Into<String>, parents: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types.insert(
            semantic_type.into(),
            parents.into_iter().map(Into::into).collect(),
        );
    }

    pub fn from_toml_str(text: &str) -> HierarchyResult<Self> {
        toml::from_str(text).map_err(|e| HierarchyError::Load {
            path: "<inline>".into(),
            message: e.to_string(),
        })
    }

    pub fn from_json_str(text: &str) -> HierarchyResult<Self> {
        serde_json::from_str(text).map_err(|e| HierarchyError::Load {
            path: "<inline>".into(),
            message: e.to_string(),
        })
    }

    /// Load a table from disk. `.json` files are read as JSON, anything else as TOML.
    pub fn load(path: &Path) -> HierarchyResult<Self> {
        let file_name = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|e| HierarchyError::Load {
            path: file_name.clone(),
            message: e.to_string(),
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_toml_str(&text)
        };
        let table = parsed.map_err(|e| match e {
            HierarchyError::Load { message, .. } => HierarchyError::Load {
                path: file_name.clone(),
                message,
            },
            other => other,
        })?;
        tracing::info!(path = %file_name, types = table.len(), "loaded type table");
        Ok(table)
    }

    pub fn contains(&self, semantic_type: &str) -> bool {
        self.types.contains_key(semantic_type)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Direct parents of `semantic_type`, if known.
    pub fn parents(&self, semantic_type: &str) -> Option<&[String]> {
        self.types.get(semantic_type).map(Vec::as_slice)
    }

    /// Transitive ancestors, breadth-first from the type itself.
    ///
    /// Parents that are not themselves registered are still reported; the
    /// walk just stops there.
    pub fn ancestors(&self, semantic_type: &str) -> HierarchyResult<Vec<String>> {
        let parents = self
            .parents(semantic_type)
            .ok_or_else(|| HierarchyError::UnknownType {
                semantic_type: semantic_type.to_string(),
            })?;

        let mut chain = vec![semantic_type.to_string()];
        let mut visited: HashSet<&str> = HashSet::from([semantic_type]);
        let mut queue: VecDeque<&str> = VecDeque::new();

        for parent in parents {
            if visited.insert(parent.as_str()) {
                queue.push_back(parent.as_str());
            }
        }
        while let Some(current) = queue.pop_front() {
            chain.push(current.to_string());
            if let Some(next) = self.types.get(current) {
                for parent in next {
                    if visited.insert(parent.as_str()) {
                        queue.push_back(parent.as_str());
                    }
                }
            }
        }
        Ok(chain)
    }
}

impl HierarchyProvider for TypeTable {
    fn ancestors_of(&self, semantic_type: &str) -> HierarchyResult<Vec<String>> {
        self.ancestors(semantic_type)
    }
}
