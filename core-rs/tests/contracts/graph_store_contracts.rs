//! Contract suite both graph store backends must satisfy.

use ontograph::{EnvError, GraphStore, MemoryGraphStore, PersistentGraphStore};
use oxigraph::model::{Graph, NamedNode, Triple};
use tempfile::TempDir;

fn node(iri: &str) -> NamedNode {
    NamedNode::new(iri).unwrap()
}

fn graph_with(triples: usize) -> Graph {
    let mut graph = Graph::new();
    for i in 0..triples {
        graph.insert(&Triple::new(
            node(&format!("http://example.com/s{i}")),
            node("http://example.com/p"),
            node("http://example.com/o"),
        ));
    }
    graph
}

fn check_contract(mut store: impl GraphStore) {
    let a = node("http://example.com/a");
    let b = node("http://example.com/b");

    // empty store
    assert!(store.ids().unwrap().is_empty());
    assert!(!store.contains(&a).unwrap());
    assert!(matches!(store.get(&a), Err(EnvError::NotFound(_))));
    assert!(matches!(store.remove(&a), Err(EnvError::NotFound(_))));

    // add and read back
    assert!(store.add(&a, &graph_with(3), false).unwrap());
    assert!(store.contains(&a).unwrap());
    assert_eq!(store.get(&a).unwrap().len(), 3);

    // present without overwrite: untouched
    assert!(!store.add(&a, &graph_with(5), false).unwrap());
    assert_eq!(store.get(&a).unwrap().len(), 3);

    // overwrite replaces rather than merges
    assert!(store.add(&a, &graph_with(2), true).unwrap());
    assert_eq!(store.get(&a).unwrap().len(), 2);

    // adding twice is idempotent for the observable state
    store.add(&b, &graph_with(1), false).unwrap();
    let before = store.size().unwrap();
    store.add(&b, &graph_with(1), true).unwrap();
    assert_eq!(store.size().unwrap(), before);

    // ids are sorted
    assert_eq!(
        store.ids().unwrap(),
        vec!["http://example.com/a", "http://example.com/b"]
    );

    // counters
    let stats = store.size().unwrap();
    assert_eq!(stats.num_graphs, 2);
    assert_eq!(stats.num_triples, 3);

    // removal
    store.remove(&a).unwrap();
    assert!(!store.contains(&a).unwrap());
    assert_eq!(store.size().unwrap().num_graphs, 1);

    store.flush().unwrap();
}

#[test]
fn test_memory_store_satisfies_contract() {
    check_contract(MemoryGraphStore::new().unwrap());
}

#[test]
fn test_persistent_store_satisfies_contract() {
    let dir = TempDir::new().unwrap();
    check_contract(PersistentGraphStore::open(dir.path()).unwrap());
}

#[test]
fn test_persistent_store_reopen_equality() {
    let dir = TempDir::new().unwrap();
    let a = node("http://example.com/a");
    let b = node("http://example.com/b");

    let (ids, a_body, stats) = {
        let mut store = PersistentGraphStore::open(dir.path()).unwrap();
        store.add(&a, &graph_with(4), false).unwrap();
        store.add(&b, &graph_with(2), false).unwrap();
        store.flush().unwrap();
        (
            store.ids().unwrap(),
            store.get(&a).unwrap(),
            store.size().unwrap(),
        )
    };

    let reopened = PersistentGraphStore::open(dir.path()).unwrap();
    assert_eq!(reopened.ids().unwrap(), ids);
    assert_eq!(reopened.get(&a).unwrap(), a_body);
    assert_eq!(reopened.size().unwrap(), stats);
}
