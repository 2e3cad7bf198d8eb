//! Registry invariants: the reverse import index stays the exact
//! transpose of the records through arbitrary mutation sequences.

use ontograph::{Ontology, Registry, Source};
use std::collections::{BTreeMap, BTreeSet};
use tempfile::TempDir;

fn record(id: &str, imports: &[String]) -> Ontology {
    Ontology {
        id: id.to_string(),
        source: Source::InMemory,
        imports: imports.to_vec(),
        last_updated: chrono::Utc::now(),
        content_hash: None,
        version: None,
        prefixes: BTreeMap::new(),
    }
}

/// Brute-force transpose of the registry's import relation.
fn transpose(registry: &Registry) -> BTreeMap<String, BTreeSet<String>> {
    let mut reverse: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for ontology in registry.iter() {
        for import in &ontology.imports {
            reverse
                .entry(import.clone())
                .or_default()
                .insert(ontology.id.clone());
        }
    }
    reverse
}

fn assert_index_matches(registry: &Registry) {
    let expected = transpose(registry);
    let mut targets: BTreeSet<String> = expected.keys().cloned().collect();
    for ontology in registry.iter() {
        targets.insert(ontology.id.clone());
        targets.extend(ontology.imports.iter().cloned());
    }
    for target in targets {
        let expected_importers: Vec<String> = expected
            .get(&target)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        assert_eq!(
            registry.importers_of(&target),
            expected_importers,
            "reverse index diverged for {target}"
        );
    }
}

#[test]
fn test_index_matches_transpose_through_mutation_sequence() {
    let ids: Vec<String> = (0..8).map(|i| format!("urn:contract:{i}")).collect();
    let mut registry = Registry::new();

    // deterministic pseudo-random walk over inserts, replacements, removals
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    for step in 0..200 {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let subject = &ids[(state >> 33) as usize % ids.len()];
        match step % 3 {
            0 | 1 => {
                let mut imports = Vec::new();
                for (offset, candidate) in ids.iter().enumerate() {
                    if candidate != subject && (state >> offset) & 1 == 1 {
                        imports.push(candidate.clone());
                    }
                }
                registry.insert(record(subject, &imports));
            }
            _ => {
                registry.remove(subject);
            }
        }
        assert_index_matches(&registry);
    }
}

#[test]
fn test_index_survives_persistence_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("registry.json");

    let mut registry = Registry::new();
    registry.insert(record(
        "urn:contract:a",
        &["urn:contract:b".to_string(), "urn:contract:c".to_string()],
    ));
    registry.insert(record("urn:contract:b", &["urn:contract:c".to_string()]));
    registry.insert(record("urn:contract:c", &[]));
    registry.save_to_file(&path).unwrap();

    let restored = Registry::from_file(&path).unwrap();
    assert_eq!(restored.ids(), registry.ids());
    assert_index_matches(&restored);
    assert_eq!(
        restored.importers_of("urn:contract:c"),
        vec!["urn:contract:a", "urn:contract:b"]
    );
}

#[test]
fn test_missing_imports_are_sorted_and_deduplicated() {
    let mut registry = Registry::new();
    registry.insert(record(
        "urn:contract:a",
        &["urn:ghost:z".to_string(), "urn:ghost:a".to_string()],
    ));
    registry.insert(record("urn:contract:b", &["urn:ghost:a".to_string()]));

    assert_eq!(
        registry.missing_imports(),
        vec!["urn:ghost:a", "urn:ghost:z"]
    );
}

#[test]
fn test_empty_registry_has_no_relations() {
    let registry = Registry::new();
    assert!(registry.is_empty());
    assert!(registry.ids().is_empty());
    assert!(registry.missing_imports().is_empty());
    assert!(registry.importers_of("urn:anything").is_empty());
}
