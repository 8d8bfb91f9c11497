//! End-to-end integration tests for node-norm.
//!
//! These tests load compendium files through the public `Normalizer` API and
//! check resolution, prefix statistics and conflation against an in-memory
//! store.

use std::io::Write;
use std::path::{Path, PathBuf};

use node_norm::conflation::ConflationKind;
use node_norm::engine::Normalizer;
use node_norm::error::{ErrorClass, IngestError};
use node_norm::resolve::ResolveOptions;

fn write_compendium(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    for line in lines {
        writeln!(f, "{line}").unwrap();
    }
    path
}

fn curies(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

const COPD: &str = r#"{"type":"biolink:Disease","identifiers":[{"i":"MONDO:0005002"},{"i":"DOID:3812"}]}"#;

#[test]
fn end_to_end_ingest_and_resolve() {
    let dir = tempfile::TempDir::new().unwrap();
    let file = write_compendium(dir.path(), "Disease.txt", &[COPD]);
    let norm = Normalizer::in_memory().unwrap();
    norm.load(&[file]).unwrap();

    let out = norm
        .resolve(&curies(&["doid:3812"]), &ResolveOptions::default())
        .unwrap();
    let json = serde_json::to_value(&out).unwrap();
    assert_eq!(
        json,
        serde_json::json!([{
            "id": {"identifier": "MONDO:0005002"},
            "equivalent_identifiers": [
                {"identifier": "MONDO:0005002"},
                {"identifier": "DOID:3812"}
            ],
            "type": ["biolink:Disease"]
        }])
    );
}

#[test]
fn every_member_resolves_in_any_case() {
    let dir = tempfile::TempDir::new().unwrap();
    let file = write_compendium(
        dir.path(),
        "Gene.txt",
        &[r#"{"type":"biolink:Gene","ic":"88.04","identifiers":[{"i":"NCBIGene:1017","l":"CDK2"},{"i":"ENSEMBL:ENSG00000123374"},{"i":"HGNC:1771","l":"CDK2"},{"i":"UMLS:C1332733","l":"CDK2 gene"}]}"#],
    );
    let norm = Normalizer::in_memory().unwrap();
    norm.load(&[file]).unwrap();

    let inputs = curies(&["ncbigene:1017", "ENSEMBL:ENSG00000123374", "hgnc:1771", "Umls:c1332733"]);
    let out = norm.resolve(&inputs, &ResolveOptions::default()).unwrap();
    assert_eq!(out.len(), inputs.len());
    for node in &out {
        let node = node.as_ref().unwrap();
        assert_eq!(node.id.identifier, "NCBIGene:1017");
        assert_eq!(node.id.label.as_deref(), Some("CDK2"));
        assert_eq!(node.information_content, Some(88.0));
        let order: Vec<&str> = node
            .equivalent_identifiers
            .iter()
            .map(|e| e.identifier.as_str())
            .collect();
        assert_eq!(
            order,
            vec!["NCBIGene:1017", "ENSEMBL:ENSG00000123374", "HGNC:1771", "UMLS:C1332733"]
        );
    }
}

#[test]
fn duplicates_and_unknowns_are_aligned() {
    let dir = tempfile::TempDir::new().unwrap();
    let file = write_compendium(dir.path(), "Disease.txt", &[COPD]);
    let norm = Normalizer::in_memory().unwrap();
    norm.load(&[file]).unwrap();

    let out = norm
        .resolve(
            &curies(&["DOID:3812", "DOID:3812", "NOT:REAL"]),
            &ResolveOptions::default(),
        )
        .unwrap();
    assert_eq!(out.len(), 3);
    assert!(out[0].is_some());
    assert_eq!(out[0], out[1]);
    assert!(out[2].is_none());
}

#[test]
fn prefix_counts_add_up_across_files() {
    let dir = tempfile::TempDir::new().unwrap();
    let three = [
        r#"{"type":"biolink:Disease","identifiers":[{"i":"X:1"}]}"#,
        r#"{"type":"biolink:Disease","identifiers":[{"i":"X:2"}]}"#,
        r#"{"type":"biolink:Disease","identifiers":[{"i":"X:3"}]}"#,
    ];
    let five = [
        r#"{"type":"biolink:Disease","identifiers":[{"i":"X:4"},{"i":"X:5"}]}"#,
        r#"{"type":"biolink:Disease","identifiers":[{"i":"X:6"},{"i":"X:7"},{"i":"X:8"}]}"#,
    ];
    let a = write_compendium(dir.path(), "a.txt", &three);
    let b = write_compendium(dir.path(), "b.txt", &five);
    let norm = Normalizer::in_memory().unwrap();
    norm.load(&[a, b]).unwrap();

    let table = norm.curie_prefixes(&curies(&["biolink:Disease"])).unwrap();
    assert_eq!(table["biolink:Disease"]["X"], 8);
    // ancestors are credited too
    let table = norm.curie_prefixes(&curies(&["biolink:NamedThing"])).unwrap();
    assert_eq!(table["biolink:NamedThing"]["X"], 8);
}

#[test]
fn reloading_a_file_does_not_double_count() {
    let dir = tempfile::TempDir::new().unwrap();
    let file = write_compendium(dir.path(), "Disease.txt", &[COPD]);
    let norm = Normalizer::in_memory().unwrap();
    norm.load(&[file.clone()]).unwrap();
    let before = norm.curie_prefixes(&[]).unwrap();
    let types_before = norm.semantic_types().unwrap();

    norm.load(&[file]).unwrap();
    norm.merge().unwrap();
    assert_eq!(norm.curie_prefixes(&[]).unwrap(), before);
    assert_eq!(norm.semantic_types().unwrap(), types_before);
    assert_eq!(before["biolink:Disease"]["DOID"], 1);
}

#[test]
fn reloaded_file_with_new_type_drops_old_counts() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_compendium(
        dir.path(),
        "a.txt",
        &[r#"{"type":"biolink:Disease","identifiers":[{"i":"MONDO:1"}]}"#],
    );
    let norm = Normalizer::in_memory().unwrap();
    norm.load(&[path.clone()]).unwrap();
    assert_eq!(
        norm.curie_prefixes(&curies(&["biolink:Disease"])).unwrap()["biolink:Disease"]["MONDO"],
        1
    );

    write_compendium(
        dir.path(),
        "a.txt",
        &[r#"{"type":"biolink:Gene","identifiers":[{"i":"NCBIGene:1"}]}"#],
    );
    let report = norm.load(&[path]).unwrap();
    assert!(report.merge.cleared_types >= 2);

    let table = norm
        .curie_prefixes(&curies(&["biolink:Disease", "biolink:Gene", "biolink:NamedThing"]))
        .unwrap();
    assert!(!table.contains_key("biolink:Disease"));
    assert_eq!(table["biolink:Gene"]["NCBIGene"], 1);
    assert_eq!(table["biolink:NamedThing"].get("MONDO"), None);
    assert_eq!(table["biolink:NamedThing"]["NCBIGene"], 1);
}

#[test]
fn semantic_types_cover_ancestors() {
    let dir = tempfile::TempDir::new().unwrap();
    let file = write_compendium(dir.path(), "Disease.txt", &[COPD]);
    let norm = Normalizer::in_memory().unwrap();
    norm.load(&[file]).unwrap();

    let mut types = norm.semantic_types().unwrap();
    types.sort();
    assert_eq!(
        types,
        vec![
            "biolink:BiologicalEntity",
            "biolink:Disease",
            "biolink:DiseaseOrPhenotypicFeature",
            "biolink:Entity",
            "biolink:NamedThing",
        ]
    );
}

#[test]
fn invalid_file_is_skipped_and_others_load() {
    let dir = tempfile::TempDir::new().unwrap();
    let good = write_compendium(dir.path(), "Disease.txt", &[COPD]);
    let bad = write_compendium(dir.path(), "Broken.txt", &[r#"{"identifiers":[{"i":"A:1"}]}"#]);
    let norm = Normalizer::in_memory().unwrap();

    let report = norm.load(&[bad.clone(), good]).unwrap();
    assert_eq!(report.loaded.len(), 1);
    assert_eq!(report.failed.len(), 1);
    let (path, err) = &report.failed[0];
    assert_eq!(path, &bad);
    assert!(matches!(err, IngestError::Compendium(_)));
    assert_eq!(err.class(), ErrorClass::Validation);

    let out = norm.resolve(&curies(&["A:1"]), &ResolveOptions::default()).unwrap();
    assert!(out[0].is_none());
}

#[test]
fn last_write_wins_for_a_canonical() {
    let dir = tempfile::TempDir::new().unwrap();
    let first = write_compendium(dir.path(), "one.txt", &[COPD]);
    let second = write_compendium(
        dir.path(),
        "two.txt",
        &[r#"{"type":"biolink:PhenotypicFeature","identifiers":[{"i":"MONDO:0005002"},{"i":"HP:0006510"}]}"#],
    );
    let norm = Normalizer::in_memory().unwrap();
    norm.load(&[first]).unwrap();
    norm.load(&[second]).unwrap();

    let out = norm.resolve(&curies(&["MONDO:0005002"]), &ResolveOptions::default()).unwrap();
    let node = out[0].as_ref().unwrap();
    assert_eq!(node.types, vec!["biolink:PhenotypicFeature"]);
    assert_eq!(node.equivalent_identifiers.len(), 2);
    assert_eq!(node.equivalent_identifiers[1].identifier, "HP:0006510");
}

#[test]
fn gene_protein_conflation() {
    let dir = tempfile::TempDir::new().unwrap();
    let genes = write_compendium(
        dir.path(),
        "Gene.txt",
        &[r#"{"type":"biolink:Gene","identifiers":[{"i":"NCBIGene:1017","l":"CDK2"}]}"#],
    );
    let proteins = write_compendium(
        dir.path(),
        "Protein.txt",
        &[r#"{"type":"biolink:Protein","identifiers":[{"i":"UniProtKB:P24941","l":"CDK2_HUMAN"}]}"#],
    );
    let conflation = write_compendium(
        dir.path(),
        "GeneProtein.txt",
        &[r#"["NCBIGene:1017","UniProtKB:P24941"]"#],
    );
    let norm = Normalizer::in_memory().unwrap();
    norm.load(&[genes, proteins]).unwrap();
    let report = norm
        .load_conflation(&conflation, ConflationKind::GeneProtein)
        .unwrap();
    assert_eq!(report.groups, 1);

    let input = curies(&["UniProtKB:P24941"]);
    let plain = norm.resolve(&input, &ResolveOptions::default()).unwrap();
    assert_eq!(plain[0].as_ref().unwrap().id.identifier, "UniProtKB:P24941");

    let conflated = norm
        .resolve(
            &input,
            &ResolveOptions::default().conflate(ConflationKind::GeneProtein),
        )
        .unwrap();
    let node = conflated[0].as_ref().unwrap();
    assert_eq!(node.id.identifier, "NCBIGene:1017");
    assert_eq!(node.types, vec!["biolink:Gene", "biolink:Protein"]);
    assert_eq!(node.equivalent_identifiers.len(), 2);

    // a different conflation kind leaves the node alone
    let other = norm
        .resolve(
            &input,
            &ResolveOptions::default().conflate(ConflationKind::DrugChemical),
        )
        .unwrap();
    assert_eq!(other, plain);
}

#[test]
fn ancestor_expanded_types_drop_entity() {
    let dir = tempfile::TempDir::new().unwrap();
    let file = write_compendium(dir.path(), "Disease.txt", &[COPD]);
    let norm = Normalizer::in_memory().unwrap();
    norm.load(&[file]).unwrap();

    let out = norm
        .resolve(
            &curies(&["MONDO:0005002"]),
            &ResolveOptions::default().with_ancestors(true),
        )
        .unwrap();
    let types = &out[0].as_ref().unwrap().types;
    assert_eq!(types[0], "biolink:Disease");
    assert!(types.contains(&"biolink:NamedThing".to_string()));
    assert!(!types.contains(&"biolink:Entity".to_string()));
}
