//! CURIE helpers and the identifier/label pair shared by ingestion and resolution.

use serde::{Deserialize, Serialize};

/// Biolink root type used when a canonical identifier has no stored type.
pub const BIOLINK_NAMED_THING: &str = "biolink:NamedThing";

/// Biolink's abstract top type, stripped from ancestor-expanded output.
pub const BIOLINK_ENTITY: &str = "biolink:Entity";

/// Source prefix of a CURIE: everything before the first `:`.
///
/// An identifier without a colon is its own prefix.
pub fn prefix_of(curie: &str) -> &str {
    curie.split_once(':').map_or(curie, |(prefix, _)| prefix)
}

/// Case-insensitive lookup key for the term-to-canonical namespace.
pub fn lookup_key(curie: &str) -> String {
    curie.to_uppercase()
}

/// One member of an equivalence class, in the compact form persisted in the
/// canonical-to-equivalents namespace: `{"i": "MONDO:0005002", "l": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    #[serde(rename = "i")]
    pub identifier: String,
    #[serde(rename = "l", default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Member {
    pub fn new(identifier: impl Into<String>, label: Option<String>) -> Self {
        Self {
            identifier: identifier.into(),
            label: label.filter(|l| !l.is_empty()),
        }
    }

    pub fn prefix(&self) -> &str {
        prefix_of(&self.identifier)
    }
}

/// An identifier as returned to API callers: `{"identifier": ..., "label": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeIdentifier {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl From<&Member> for NodeIdentifier {
    fn from(member: &Member) -> Self {
        Self {
            identifier: member.identifier.clone(),
            label: member.label.clone(),
        }
    }
}

/// Order-preserving de-duplication.
pub fn uniquify<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
