//! Canonical-identifier resolution.
//!
//! Input identifiers are looked up case-insensitively in `term_to_canonical`.
//! The distinct canonicals found are then fetched from the equivalents, type
//! and information-content namespaces in chunked multi-gets, and one
//! [`ResolvedNode`] is assembled per canonical. The output is aligned with the
//! input: same length, same order, `None` for identifiers nobody knows.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::conflation::ConflationKind;
use crate::curie::{
    BIOLINK_ENTITY, BIOLINK_NAMED_THING, Member, NodeIdentifier, lookup_key, prefix_of, uniquify,
};
use crate::error::{NormResult, StoreError};
use crate::hierarchy::AncestorResolver;
use crate::store::{KeyValueStore, Namespace, StoreResult};

/// Default chunk size for multi-get lookups.
pub const DEFAULT_EQ_BATCH_SIZE: usize = 2500;

/// Default length above which labels lose to shorter ones.
pub const DEFAULT_DEMOTE_LABELS_LONGER_THAN: usize = 15;

/// Labels with this prefix are usually the identifier repeated, never a name.
const SUSPICIOUS_LABEL_PREFIX: &str = "CHEMBL";

/// Resolution tuning, the `[resolve]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveConfig {
    #[serde(default = "default_eq_batch_size")]
    pub eq_batch_size: usize,
    #[serde(default = "default_demote_labels_longer_than")]
    pub demote_labels_longer_than: usize,
    /// Return the whole ancestor chain in `type` instead of the leaf only.
    #[serde(default)]
    pub include_ancestors: bool,
    /// Semantic type → identifier prefixes whose labels are preferred, best first.
    #[serde(default)]
    pub preferred_name_boost_prefixes: BTreeMap<String, Vec<String>>,
}

fn default_eq_batch_size() -> usize {
    DEFAULT_EQ_BATCH_SIZE
}

fn default_demote_labels_longer_than() -> usize {
    DEFAULT_DEMOTE_LABELS_LONGER_THAN
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            eq_batch_size: DEFAULT_EQ_BATCH_SIZE,
            demote_labels_longer_than: DEFAULT_DEMOTE_LABELS_LONGER_THAN,
            include_ancestors: false,
            preferred_name_boost_prefixes: BTreeMap::new(),
        }
    }
}

/// Per-request switches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Conflation tables to apply, in order.
    pub conflations: Vec<ConflationKind>,
    /// Overrides [`ResolveConfig::include_ancestors`] when set.
    pub include_ancestors: Option<bool>,
}

impl ResolveOptions {
    pub fn conflate(mut self, kind: ConflationKind) -> Self {
        if !self.conflations.contains(&kind) {
            self.conflations.push(kind);
        }
        self
    }

    pub fn with_ancestors(mut self, include: bool) -> Self {
        self.include_ancestors = Some(include);
        self
    }
}

/// A resolved identifier, as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedNode {
    pub id: NodeIdentifier,
    pub equivalent_identifiers: Vec<NodeIdentifier>,
    #[serde(rename = "type")]
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub information_content: Option<f64>,
}

/// Stored data for one canonical identifier.
#[derive(Debug, Clone, Default)]
struct Clique {
    members: Option<Vec<Member>>,
    leaf_type: Option<String>,
    information_content: Option<f64>,
}

/// Read path from input identifiers to [`ResolvedNode`]s.
pub struct ResolutionEngine {
    store: Arc<dyn KeyValueStore>,
    ancestors: Arc<AncestorResolver>,
    config: ResolveConfig,
}

impl ResolutionEngine {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        ancestors: Arc<AncestorResolver>,
        config: ResolveConfig,
    ) -> Self {
        Self {
            store,
            ancestors,
            config,
        }
    }

    pub fn config(&self) -> &ResolveConfig {
        &self.config
    }

    /// Canonical identifier for each input, aligned with `curies`.
    pub fn canonicalize(&self, curies: &[String]) -> StoreResult<Vec<Option<String>>> {
        let keys: Vec<String> = curies.iter().map(|c| lookup_key(c)).collect();
        self.mget_chunked(Namespace::TermToCanonical, &keys)
    }

    /// Resolve a batch of identifiers. Unknown identifiers yield `None`.
    pub fn resolve(
        &self,
        curies: &[String],
        options: &ResolveOptions,
    ) -> NormResult<Vec<Option<ResolvedNode>>> {
        let canonicals = self.canonicalize(curies)?;
        let distinct = uniquify(canonicals.iter().flatten().cloned());
        if distinct.is_empty() {
            tracing::debug!(curies = curies.len(), "no identifier resolved");
            return Ok(vec![None; curies.len()]);
        }

        let mut cliques = self.fetch_cliques(&distinct)?;
        let include_ancestors = options
            .include_ancestors
            .unwrap_or(self.config.include_ancestors);

        let groups = self.conflation_groups(&distinct, &options.conflations)?;
        let missing: Vec<String> = uniquify(
            groups
                .values()
                .flatten()
                .filter(|id| !cliques.contains_key(*id))
                .cloned(),
        );
        if !missing.is_empty() {
            cliques.extend(self.fetch_cliques(&missing)?);
        }

        let mut nodes: HashMap<&str, Option<ResolvedNode>> = HashMap::with_capacity(distinct.len());
        for canonical in &distinct {
            let node = match groups.get(canonical) {
                Some(group) => self.assemble_conflated(canonical, group, &cliques, include_ancestors)?,
                None => self.assemble(canonical, &cliques, include_ancestors)?,
            };
            nodes.insert(canonical.as_str(), node);
        }

        let resolved: Vec<Option<ResolvedNode>> = canonicals
            .iter()
            .map(|c| c.as_deref().and_then(|c| nodes.get(c).cloned().flatten()))
            .collect();
        tracing::debug!(
            curies = curies.len(),
            canonicals = distinct.len(),
            resolved = resolved.iter().filter(|n| n.is_some()).count(),
            "resolved identifiers"
        );
        Ok(resolved)
    }

    fn mget_chunked(&self, namespace: Namespace, keys: &[String]) -> StoreResult<Vec<Option<String>>> {
        let mut out = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(self.config.eq_batch_size.max(1)) {
            out.extend(self.store.mget(namespace, chunk)?);
        }
        Ok(out)
    }

    fn fetch_cliques(&self, canonicals: &[String]) -> StoreResult<HashMap<String, Clique>> {
        let equivalents = self.mget_chunked(Namespace::CanonicalToEquivalents, canonicals)?;
        let types = self.mget_chunked(Namespace::CanonicalToType, canonicals)?;
        let scores = self.mget_chunked(Namespace::InformationContent, canonicals)?;

        let mut cliques = HashMap::with_capacity(canonicals.len());
        for (((canonical, eq), leaf_type), score) in
            canonicals.iter().zip(equivalents).zip(types).zip(scores)
        {
            let members = eq
                .map(|raw| {
                    serde_json::from_str::<Vec<Member>>(&raw).map_err(|e| StoreError::Serialization {
                        message: format!("equivalents of {canonical}: {e}"),
                    })
                })
                .transpose()?;
            let information_content = score.and_then(|raw| match raw.trim().parse::<f64>() {
                Ok(ic) => Some(ic),
                Err(_) => {
                    tracing::warn!(canonical = %canonical, value = %raw, "ignoring non-numeric information content");
                    None
                }
            });
            cliques.insert(
                canonical.clone(),
                Clique {
                    members,
                    leaf_type,
                    information_content,
                },
            );
        }
        Ok(cliques)
    }

    /// Conflation group per canonical, concatenated across the requested kinds.
    fn conflation_groups(
        &self,
        canonicals: &[String],
        kinds: &[ConflationKind],
    ) -> StoreResult<HashMap<String, Vec<String>>> {
        let mut groups: HashMap<String, Vec<String>> = HashMap::new();
        for kind in kinds {
            let found = self.mget_chunked(kind.namespace(), canonicals)?;
            for (canonical, raw) in canonicals.iter().zip(found) {
                let Some(raw) = raw else { continue };
                let group: Vec<String> =
                    serde_json::from_str(&raw).map_err(|e| StoreError::Serialization {
                        message: format!("{kind} conflation of {canonical}: {e}"),
                    })?;
                if !group.is_empty() {
                    groups.entry(canonical.clone()).or_default().extend(group);
                }
            }
        }
        Ok(groups)
    }

    /// Output `type` list for a leaf.
    fn output_types(&self, leaf: &str, include_ancestors: bool) -> NormResult<Vec<String>> {
        if !include_ancestors {
            return Ok(vec![leaf.to_string()]);
        }
        let chain = self.ancestors.ancestors(leaf)?;
        Ok(chain
            .iter()
            .filter(|t| t.as_str() != BIOLINK_ENTITY)
            .cloned()
            .collect())
    }

    /// Leaf type of a clique, defaulting to the Biolink root.
    fn leaf_type<'c>(canonical: &str, clique: &'c Clique) -> &'c str {
        match clique.leaf_type.as_deref() {
            Some(t) => t,
            None => {
                tracing::warn!(canonical, "no semantic type stored, using biolink:NamedThing");
                BIOLINK_NAMED_THING
            }
        }
    }

    fn assemble(
        &self,
        canonical: &str,
        cliques: &HashMap<String, Clique>,
        include_ancestors: bool,
    ) -> NormResult<Option<ResolvedNode>> {
        let Some(clique) = cliques.get(canonical) else {
            return Ok(None);
        };
        let Some(members) = clique.members.as_deref().filter(|m| !m.is_empty()) else {
            tracing::warn!(canonical, "canonical identifier has no equivalents entry");
            return Ok(None);
        };
        let leaf = Self::leaf_type(canonical, clique);
        let types = self.output_types(leaf, include_ancestors)?;
        let label = self.select_label(members, leaf);
        Ok(Some(build_node(members, label, types, clique.information_content)))
    }

    /// Node for a canonical with a conflation group: equivalents of every
    /// group member concatenated, types merged, identifier taken from the
    /// first concatenated member.
    fn assemble_conflated(
        &self,
        canonical: &str,
        group: &[String],
        cliques: &HashMap<String, Clique>,
        include_ancestors: bool,
    ) -> NormResult<Option<ResolvedNode>> {
        let mut members: Vec<Member> = Vec::new();
        let mut types: Vec<String> = Vec::new();
        let mut label_source: Option<(&[Member], &str)> = None;

        for other in group {
            let Some(clique) = cliques.get(other) else { continue };
            let Some(other_members) = clique.members.as_deref().filter(|m| !m.is_empty()) else {
                tracing::warn!(canonical, conflated = %other, "conflated identifier has no equivalents entry");
                continue;
            };
            let leaf = Self::leaf_type(other, clique);
            members.extend_from_slice(other_members);
            types.extend(self.output_types(leaf, include_ancestors)?);
            if label_source.is_none() && other_members.iter().any(|m| m.label.is_some()) {
                label_source = Some((other_members, leaf));
            }
        }

        if members.is_empty() {
            tracing::warn!(canonical, "conflation group resolved to nothing, using the clique itself");
            return self.assemble(canonical, cliques, include_ancestors);
        }

        let information_content = cliques.get(canonical).and_then(|c| c.information_content);
        let label = label_source.and_then(|(source, leaf)| self.select_label(source, leaf));
        Ok(Some(build_node(&members, label, uniquify(types), information_content)))
    }

    /// Preferred display label among `members`.
    ///
    /// Members are stably re-ordered by the boost prefixes of the most specific
    /// type that has any, blank and `CHEMBL…` labels are ignored, and long
    /// labels only win when no short one exists.
    fn select_label(&self, members: &[Member], leaf: &str) -> Option<String> {
        let mut ordered: Vec<&Member> = members.iter().collect();
        if let Some(boost) = self.boost_prefixes(leaf) {
            let rank = |m: &&Member| {
                boost
                    .iter()
                    .position(|p| p == prefix_of(&m.identifier))
                    .unwrap_or(boost.len())
            };
            ordered.sort_by_key(rank);
        }

        let candidates: Vec<&str> = ordered
            .iter()
            .filter_map(|m| m.label.as_deref())
            .filter(|l| !l.trim().is_empty() && !l.starts_with(SUSPICIOUS_LABEL_PREFIX))
            .collect();
        let limit = self.config.demote_labels_longer_than;
        candidates
            .iter()
            .find(|l| l.chars().count() <= limit)
            .or_else(|| candidates.first())
            .map(|l| l.to_string())
    }

    /// Boost prefixes of the most specific type in `leaf`'s chain that has any.
    fn boost_prefixes(&self, leaf: &str) -> Option<&Vec<String>> {
        let boosts = &self.config.preferred_name_boost_prefixes;
        if boosts.is_empty() {
            return None;
        }
        if let Some(direct) = boosts.get(leaf) {
            return Some(direct);
        }
        match self.ancestors.ancestors(leaf) {
            Ok(chain) => chain.iter().find_map(|t| boosts.get(t)),
            Err(e) => {
                tracing::warn!(leaf, error = %e, "cannot expand type for label boosting");
                None
            }
        }
    }
}

impl std::fmt::Debug for ResolutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionEngine")
            .field("config", &self.config)
            .finish()
    }
}

fn build_node(
    members: &[Member],
    label: Option<String>,
    types: Vec<String>,
    information_content: Option<f64>,
) -> ResolvedNode {
    let equivalent_identifiers: Vec<NodeIdentifier> = members.iter().map(NodeIdentifier::from).collect();
    ResolvedNode {
        id: NodeIdentifier {
            identifier: members[0].identifier.clone(),
            label,
        },
        equivalent_identifiers,
        types,
        information_content: information_content.map(|ic| (ic * 10.0).round() / 10.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::TypeTable;
    use crate::store::MemStore;

    fn engine_with(store: Arc<MemStore>, config: ResolveConfig) -> ResolutionEngine {
        let ancestors = Arc::new(AncestorResolver::new(Arc::new(TypeTable::builtin().unwrap())));
        ResolutionEngine::new(store, ancestors, config)
    }

    fn put_clique(store: &MemStore, leaf: Option<&str>, members: &[(&str, Option<&str>)]) {
        let members: Vec<Member> = members
            .iter()
            .map(|(i, l)| Member::new(*i, l.map(String::from)))
            .collect();
        let canonical = members[0].identifier.clone();
        for m in &members {
            store
                .set(Namespace::TermToCanonical, &lookup_key(&m.identifier), &canonical)
                .unwrap();
        }
        store
            .set(
                Namespace::CanonicalToEquivalents,
                &canonical,
                &serde_json::to_string(&members).unwrap(),
            )
            .unwrap();
        if let Some(leaf) = leaf {
            store.set(Namespace::CanonicalToType, &canonical, leaf).unwrap();
        }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn duplicates_and_unknowns_keep_their_slots() {
        let store = Arc::new(MemStore::new());
        put_clique(&store, Some("biolink:Disease"), &[("MONDO:1", Some("thing")), ("DOID:2", None)]);
        let engine = engine_with(store, ResolveConfig::default());

        let out = engine
            .resolve(&ids(&["doid:2", "DOID:2", "NOPE:1"]), &ResolveOptions::default())
            .unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], out[1]);
        let node = out[0].as_ref().unwrap();
        assert_eq!(node.id.identifier, "MONDO:1");
        assert_eq!(node.id.label.as_deref(), Some("thing"));
        assert_eq!(node.types, vec!["biolink:Disease"]);
        assert!(out[2].is_none());
    }

    #[test]
    fn missing_type_defaults_to_named_thing() {
        let store = Arc::new(MemStore::new());
        put_clique(&store, None, &[("X:1", None)]);
        let engine = engine_with(store, ResolveConfig::default());
        let out = engine.resolve(&ids(&["X:1"]), &ResolveOptions::default()).unwrap();
        assert_eq!(out[0].as_ref().unwrap().types, vec![BIOLINK_NAMED_THING]);
    }

    #[test]
    fn term_without_equivalents_is_none() {
        let store = Arc::new(MemStore::new());
        store.set(Namespace::TermToCanonical, "X:1", "X:1").unwrap();
        let engine = engine_with(store, ResolveConfig::default());
        let out = engine.resolve(&ids(&["x:1"]), &ResolveOptions::default()).unwrap();
        assert_eq!(out, vec![None]);
    }

    #[test]
    fn ancestors_exclude_entity() {
        let store = Arc::new(MemStore::new());
        put_clique(&store, Some("biolink:Disease"), &[("MONDO:1", None)]);
        let engine = engine_with(store, ResolveConfig::default());
        let out = engine
            .resolve(&ids(&["MONDO:1"]), &ResolveOptions::default().with_ancestors(true))
            .unwrap();
        assert_eq!(
            out[0].as_ref().unwrap().types,
            vec![
                "biolink:Disease",
                "biolink:DiseaseOrPhenotypicFeature",
                "biolink:BiologicalEntity",
                "biolink:NamedThing",
            ]
        );
    }

    #[test]
    fn information_content_is_rounded() {
        let store = Arc::new(MemStore::new());
        put_clique(&store, Some("biolink:Gene"), &[("NCBIGene:1", None)]);
        store.set(Namespace::InformationContent, "NCBIGene:1", "87.46").unwrap();
        let engine = engine_with(store, ResolveConfig::default());
        let out = engine.resolve(&ids(&["NCBIGene:1"]), &ResolveOptions::default()).unwrap();
        assert_eq!(out[0].as_ref().unwrap().information_content, Some(87.5));
    }

    #[test]
    fn label_policy_skips_chembl_and_demotes_long_labels() {
        let store = Arc::new(MemStore::new());
        put_clique(
            &store,
            Some("biolink:SmallMolecule"),
            &[
                ("CHEBI:1", Some("")),
                ("CHEMBL.COMPOUND:2", Some("CHEMBL2")),
                ("PUBCHEM.COMPOUND:3", Some("a very long systematic chemical name")),
                ("DRUGBANK:4", Some("aspirin")),
            ],
        );
        let engine = engine_with(store, ResolveConfig::default());
        let out = engine.resolve(&ids(&["CHEBI:1"]), &ResolveOptions::default()).unwrap();
        let node = out[0].as_ref().unwrap();
        assert_eq!(node.id.identifier, "CHEBI:1");
        assert_eq!(node.id.label.as_deref(), Some("aspirin"));
    }

    #[test]
    fn long_label_wins_when_nothing_shorter() {
        let store = Arc::new(MemStore::new());
        put_clique(
            &store,
            Some("biolink:Disease"),
            &[("MONDO:1", Some("chronic obstructive pulmonary disease"))],
        );
        let engine = engine_with(store, ResolveConfig::default());
        let out = engine.resolve(&ids(&["MONDO:1"]), &ResolveOptions::default()).unwrap();
        assert_eq!(
            out[0].as_ref().unwrap().id.label.as_deref(),
            Some("chronic obstructive pulmonary disease")
        );
    }

    #[test]
    fn boost_prefixes_apply_through_ancestors() {
        let store = Arc::new(MemStore::new());
        put_clique(
            &store,
            Some("biolink:SmallMolecule"),
            &[("PUBCHEM.COMPOUND:1", Some("pubchem name")), ("CHEBI:2", Some("chebi name"))],
        );
        let config = ResolveConfig {
            preferred_name_boost_prefixes: BTreeMap::from([(
                "biolink:ChemicalEntity".to_string(),
                vec!["CHEBI".to_string()],
            )]),
            ..ResolveConfig::default()
        };
        let engine = engine_with(store, config);
        let out = engine.resolve(&ids(&["CHEBI:2"]), &ResolveOptions::default()).unwrap();
        let node = out[0].as_ref().unwrap();
        assert_eq!(node.id.identifier, "PUBCHEM.COMPOUND:1");
        assert_eq!(node.id.label.as_deref(), Some("chebi name"));
    }

    #[test]
    fn conflation_concatenates_cliques() {
        let store = Arc::new(MemStore::new());
        put_clique(&store, Some("biolink:Gene"), &[("NCBIGene:1017", Some("CDK2")), ("HGNC:1771", None)]);
        put_clique(&store, Some("biolink:Protein"), &[("UniProtKB:P24941", Some("CDK2 protein"))]);
        let group = r#"["NCBIGene:1017","UniProtKB:P24941"]"#;
        store.set(Namespace::GeneProteinConflation, "NCBIGene:1017", group).unwrap();
        store.set(Namespace::GeneProteinConflation, "UniProtKB:P24941", group).unwrap();
        let engine = engine_with(store, ResolveConfig::default());

        let plain = engine.resolve(&ids(&["UniProtKB:P24941"]), &ResolveOptions::default()).unwrap();
        assert_eq!(plain[0].as_ref().unwrap().id.identifier, "UniProtKB:P24941");

        let options = ResolveOptions::default().conflate(ConflationKind::GeneProtein);
        let out = engine.resolve(&ids(&["UniProtKB:P24941"]), &options).unwrap();
        let node = out[0].as_ref().unwrap();
        assert_eq!(node.id.identifier, "NCBIGene:1017");
        assert_eq!(node.id.label.as_deref(), Some("CDK2"));
        let eq: Vec<&str> = node.equivalent_identifiers.iter().map(|e| e.identifier.as_str()).collect();
        assert_eq!(eq, vec!["NCBIGene:1017", "HGNC:1771", "UniProtKB:P24941"]);
        assert_eq!(node.types, vec!["biolink:Gene", "biolink:Protein"]);
    }

    #[test]
    fn lookups_are_chunked() {
        let store = Arc::new(MemStore::new());
        for n in 0..7 {
            let id = format!("NCBIGene:{n}");
            put_clique(&store, Some("biolink:Gene"), &[(id.as_str(), None)]);
        }
        let config = ResolveConfig {
            eq_batch_size: 3,
            ..ResolveConfig::default()
        };
        let engine = engine_with(store, config);
        let input: Vec<String> = (0..7).map(|n| format!("ncbigene:{n}")).collect();
        let out = engine.resolve(&input, &ResolveOptions::default()).unwrap();
        assert!(out.iter().all(Option::is_some));
        assert_eq!(out[6].as_ref().unwrap().id.identifier, "NCBIGene:6");
    }

    #[test]
    fn serializes_with_type_key() {
        let node = build_node(&[Member::new("MONDO:1", None)], None, vec!["biolink:Disease".into()], None);
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": {"identifier": "MONDO:1"},
                "equivalent_identifiers": [{"identifier": "MONDO:1"}],
                "type": ["biolink:Disease"]
            })
        );
    }
}
