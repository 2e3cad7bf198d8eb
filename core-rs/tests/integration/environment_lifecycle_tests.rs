//! End-to-end environment lifecycle: create, add, persist, reopen,
//! update, and state enforcement.

use ontograph::{Config, EnvError, OntoGraphEnv};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn write_ontology(dir: &Path, file: &str, id: &str, imports: &[&str]) {
    let mut doc = format!(
        "@prefix owl: <http://www.w3.org/2002/07/owl#> .\n<{id}> a owl:Ontology "
    );
    for import in imports {
        doc.push_str(&format!(";\n    owl:imports <{import}> "));
    }
    doc.push_str(".\n");
    std::fs::write(dir.join(file), doc).unwrap();
}

fn offline_config(root: &Path) -> Config {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Config::builder(root).offline(true).build().unwrap()
}

#[test]
fn test_persistent_roundtrip_through_reopen() {
    let dir = TempDir::new().unwrap();
    write_ontology(dir.path(), "a.ttl", "urn:example:a", &["urn:example:b"]);
    write_ontology(dir.path(), "b.ttl", "urn:example:b", &[]);

    {
        let mut env = OntoGraphEnv::create(offline_config(dir.path()), false).unwrap();
        let added = env.add(dir.path().join("a.ttl")).unwrap();
        assert_eq!(added.id, "urn:example:a");
        env.close().unwrap();
    }

    let env = OntoGraphEnv::open(offline_config(dir.path())).unwrap();
    assert_eq!(env.ids().unwrap(), vec!["urn:example:a", "urn:example:b"]);
    assert_eq!(env.get_importers("urn:example:b").unwrap(), vec!["urn:example:a"]);
    assert!(env.get_graph("urn:example:a").unwrap().len() >= 2);
}

#[test]
fn test_temporary_env_leaves_no_marker_dir() {
    let dir = TempDir::new().unwrap();
    write_ontology(dir.path(), "a.ttl", "urn:example:a", &[]);

    let config = Config::builder(dir.path())
        .temporary(true)
        .offline(true)
        .build()
        .unwrap();
    {
        let mut env = OntoGraphEnv::create(config, false).unwrap();
        env.add(dir.path().join("a.ttl")).unwrap();
        assert_eq!(env.store_path(), None);
        env.close().unwrap();
    }
    assert!(!dir.path().join(".ontograph").exists());
}

#[test]
fn test_read_only_handle_rejects_mutations() {
    let dir = TempDir::new().unwrap();
    write_ontology(dir.path(), "a.ttl", "urn:example:a", &[]);

    {
        let mut env = OntoGraphEnv::create(offline_config(dir.path()), false).unwrap();
        env.add(dir.path().join("a.ttl")).unwrap();
        env.close().unwrap();
    }

    let config = Config::builder(dir.path())
        .offline(true)
        .read_only(true)
        .build()
        .unwrap();
    let mut env = OntoGraphEnv::open(config).unwrap();

    // reads work
    assert_eq!(env.ids().unwrap(), vec!["urn:example:a"]);
    assert!(env.get_graph("urn:example:a").unwrap().len() >= 1);

    // mutations do not
    assert!(matches!(
        env.add(dir.path().join("a.ttl")),
        Err(EnvError::ReadOnlyViolation)
    ));
    assert!(matches!(
        env.remove("urn:example:a"),
        Err(EnvError::ReadOnlyViolation)
    ));
    assert!(matches!(env.scan(), Err(EnvError::ReadOnlyViolation)));
    assert!(matches!(env.update(false), Err(EnvError::ReadOnlyViolation)));
}

#[test]
fn test_recreate_discards_existing_contents() {
    let dir = TempDir::new().unwrap();
    write_ontology(dir.path(), "a.ttl", "urn:example:a", &[]);

    {
        let mut env = OntoGraphEnv::create(offline_config(dir.path()), false).unwrap();
        env.add(dir.path().join("a.ttl")).unwrap();
        env.close().unwrap();
    }

    let env = OntoGraphEnv::create(offline_config(dir.path()), true).unwrap();
    assert!(env.ids().unwrap().is_empty());
    assert_eq!(env.stats().unwrap().num_graphs, 0);
}

#[test]
fn test_scan_picks_up_matching_files_only() {
    let dir = TempDir::new().unwrap();
    write_ontology(dir.path(), "a.ttl", "urn:example:a", &[]);
    write_ontology(dir.path(), "b.ttl", "urn:example:b", &[]);
    std::fs::write(dir.path().join("notes.md"), "not rdf").unwrap();

    let mut env = OntoGraphEnv::create(offline_config(dir.path()), false).unwrap();
    let added = env.scan().unwrap();
    assert_eq!(added, vec!["urn:example:a", "urn:example:b"]);

    // a second scan finds nothing new
    assert!(env.scan().unwrap().is_empty());
}

#[test]
fn test_update_reloads_changed_file() {
    let dir = TempDir::new().unwrap();
    write_ontology(dir.path(), "a.ttl", "urn:example:a", &[]);

    let mut env = OntoGraphEnv::create(offline_config(dir.path()), false).unwrap();
    env.add(dir.path().join("a.ttl")).unwrap();
    let before = env.get_graph("urn:example:a").unwrap().len();

    // mtime resolution guard
    std::thread::sleep(Duration::from_millis(50));
    write_ontology(dir.path(), "a.ttl", "urn:example:a", &["urn:example:new-dep"]);

    let report = env.update(false).unwrap();
    assert_eq!(report.updated, vec!["urn:example:a"]);
    assert!(env.get_graph("urn:example:a").unwrap().len() > before);
    assert_eq!(env.missing_imports().unwrap(), vec!["urn:example:new-dep"]);
}

#[test]
fn test_update_skips_touched_but_unchanged_file() {
    let dir = TempDir::new().unwrap();
    write_ontology(dir.path(), "a.ttl", "urn:example:a", &[]);

    let mut env = OntoGraphEnv::create(offline_config(dir.path()), false).unwrap();
    env.add(dir.path().join("a.ttl")).unwrap();

    std::thread::sleep(Duration::from_millis(50));
    // rewrite with identical bytes: newer mtime, same content hash
    write_ontology(dir.path(), "a.ttl", "urn:example:a", &[]);

    let report = env.update(false).unwrap();
    assert!(report.updated.is_empty());
    assert!(report.removed.is_empty());
}

#[test]
fn test_update_all_forces_reload() {
    let dir = TempDir::new().unwrap();
    write_ontology(dir.path(), "a.ttl", "urn:example:a", &[]);

    let mut env = OntoGraphEnv::create(offline_config(dir.path()), false).unwrap();
    env.add(dir.path().join("a.ttl")).unwrap();

    let report = env.update(true).unwrap();
    assert_eq!(report.updated, vec!["urn:example:a"]);
}

#[test]
fn test_update_drops_vanished_sources() {
    let dir = TempDir::new().unwrap();
    write_ontology(dir.path(), "a.ttl", "urn:example:a", &["urn:example:b"]);
    write_ontology(dir.path(), "b.ttl", "urn:example:b", &[]);

    let mut env = OntoGraphEnv::create(offline_config(dir.path()), false).unwrap();
    env.add(dir.path().join("a.ttl")).unwrap();
    assert_eq!(env.ids().unwrap().len(), 2);

    std::fs::remove_file(dir.path().join("b.ttl")).unwrap();
    let report = env.update(false).unwrap();
    assert_eq!(report.removed, vec!["urn:example:b"]);
    assert_eq!(env.ids().unwrap(), vec!["urn:example:a"]);
    assert_eq!(env.missing_imports().unwrap(), vec!["urn:example:b"]);
}

#[test]
fn test_strict_add_commits_nothing_on_missing_import() {
    let dir = TempDir::new().unwrap();
    write_ontology(dir.path(), "a.ttl", "urn:example:a", &["urn:example:b"]);
    write_ontology(dir.path(), "b.ttl", "urn:example:b", &["urn:example:missing"]);

    let config = Config::builder(dir.path())
        .offline(true)
        .strict(true)
        .build()
        .unwrap();
    let mut env = OntoGraphEnv::create(config, false).unwrap();

    let result = env.add(dir.path().join("a.ttl"));
    assert!(matches!(
        result,
        Err(EnvError::UnresolvedImport(iri)) if iri == "urn:example:missing"
    ));
    assert!(env.ids().unwrap().is_empty());
    assert_eq!(env.stats().unwrap().num_graphs, 0);
}

#[test]
fn test_lenient_add_retains_resolved_intermediates() {
    let dir = TempDir::new().unwrap();
    write_ontology(dir.path(), "a.ttl", "urn:example:a", &["urn:example:b"]);
    write_ontology(dir.path(), "b.ttl", "urn:example:b", &["urn:example:missing"]);

    let mut env = OntoGraphEnv::create(offline_config(dir.path()), false).unwrap();
    env.add(dir.path().join("a.ttl")).unwrap();

    assert_eq!(env.ids().unwrap(), vec!["urn:example:a", "urn:example:b"]);
    assert_eq!(env.missing_imports().unwrap(), vec!["urn:example:missing"]);
}

#[test]
fn test_load_uses_persisted_config() {
    let dir = TempDir::new().unwrap();
    write_ontology(dir.path(), "a.ttl", "urn:example:a", &[]);

    {
        let mut env = OntoGraphEnv::create(offline_config(dir.path()), false).unwrap();
        env.add(dir.path().join("a.ttl")).unwrap();
        env.close().unwrap();
    }

    let env = OntoGraphEnv::load(dir.path()).unwrap();
    assert!(env.config().offline);
    assert_eq!(env.ids().unwrap(), vec!["urn:example:a"]);
}

#[test]
fn test_load_without_store_fails() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        OntoGraphEnv::load(dir.path()),
        Err(EnvError::StoreNotFound(_))
    ));
}
