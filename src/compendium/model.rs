//! Equivalence classes and the on-disk record shapes they are parsed from.

use serde::Deserialize;

use crate::curie::Member;

/// One compendium record: a set of identifiers denoting the same entity.
///
/// The first member is the canonical identifier. It is chosen upstream and
/// never recomputed here.
#[derive(Debug, Clone, PartialEq)]
pub struct EquivalenceClass {
    leaf_type: String,
    information_content: Option<f64>,
    members: Vec<Member>,
}

impl EquivalenceClass {
    /// Build a class, rejecting an empty member list or an empty type.
    pub fn new(
        leaf_type: impl Into<String>,
        information_content: Option<f64>,
        members: Vec<Member>,
    ) -> Result<Self, String> {
        let leaf_type = leaf_type.into();
        if leaf_type.trim().is_empty() {
            return Err("`type` is empty".into());
        }
        if members.is_empty() {
            return Err("`identifiers` is empty".into());
        }
        if let Some(pos) = members.iter().position(|m| m.identifier.is_empty()) {
            return Err(format!("identifier #{pos} is empty"));
        }
        Ok(Self {
            leaf_type,
            information_content,
            members,
        })
    }

    pub fn leaf_type(&self) -> &str {
        &self.leaf_type
    }

    pub fn information_content(&self) -> Option<f64> {
        self.information_content
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// The canonical member (`members[0]`).
    pub fn canonical(&self) -> &Member {
        &self.members[0]
    }

    pub fn canonical_id(&self) -> &str {
        &self.canonical().identifier
    }
}

/// Why a line could not be turned into an [`EquivalenceClass`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordError {
    /// Not JSON, or JSON of the wrong shape.
    Json(String),
    /// Well-formed JSON that breaks a record invariant.
    Schema(String),
}

/// `type` was a single string in current files and a list (leaf first) in older ones.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawType {
    One(String),
    Many(Vec<String>),
}

/// `ic` arrives as a numeric string, occasionally as a bare number.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawScore {
    Number(f64),
    Text(String),
}

/// Identifier entries seen across compendium generations.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawIdentifier {
    Compact {
        i: String,
        #[serde(default)]
        l: Option<String>,
    },
    Verbose {
        identifier: String,
        #[serde(default)]
        label: Option<String>,
    },
    Bare(String),
}

impl From<RawIdentifier> for Member {
    fn from(raw: RawIdentifier) -> Self {
        match raw {
            RawIdentifier::Compact { i, l } => Member::new(i, l),
            RawIdentifier::Verbose { identifier, label } => Member::new(identifier, label),
            RawIdentifier::Bare(identifier) => Member::new(identifier, None),
        }
    }
}

#[derive(Deserialize)]
struct RawRecord {
    #[serde(rename = "type")]
    semantic_type: RawType,
    #[serde(default)]
    ic: Option<RawScore>,
    #[serde(alias = "equivalent_identifiers")]
    identifiers: Vec<RawIdentifier>,
}

/// Parse one NDJSON line into an equivalence class.
pub fn parse_record(line: &str) -> Result<EquivalenceClass, RecordError> {
    let raw: RawRecord = serde_json::from_str(line).map_err(|e| RecordError::Json(e.to_string()))?;

    let leaf_type = match raw.semantic_type {
        RawType::One(t) => t,
        RawType::Many(types) => types
            .into_iter()
            .next()
            .ok_or_else(|| RecordError::Schema("`type` list is empty".into()))?,
    };

    let information_content = match raw.ic {
        None => None,
        Some(RawScore::Number(n)) => Some(n),
        Some(RawScore::Text(text)) => Some(text.trim().parse::<f64>().map_err(|_| {
            RecordError::Schema(format!("`ic` is not numeric: {text:?}"))
        })?),
    };

    let members = raw.identifiers.into_iter().map(Member::from).collect();
    EquivalenceClass::new(leaf_type, information_content, members).map_err(RecordError::Schema)
}
