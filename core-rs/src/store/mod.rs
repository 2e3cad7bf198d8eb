//! Graph storage behind a backend-neutral trait.
//!
//! Both backends wrap an oxigraph [`Store`] and keep one named graph per
//! ontology, named by the ontology IRI. The environment only ever talks to
//! [`GraphStore`], so persistence is a construction-time choice.

mod memory;
mod persistent;

pub use memory::MemoryGraphStore;
pub use persistent::{PersistentGraphStore, STORE_FILE_NAME};

use crate::errors::{EnvError, Result};
use oxigraph::model::{Graph, GraphNameRef, NamedNode, NamedOrBlankNode, QuadRef, Triple};
use oxigraph::store::Store;
use serde::Serialize;

/// Counters reported by [`GraphStore::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub num_graphs: usize,
    pub num_triples: usize,
}

/// One named graph per ontology, keyed by ontology IRI.
pub trait GraphStore {
    /// Stores `graph` under `id`. An existing graph is left untouched
    /// unless `overwrite` is set. Returns true when the store changed.
    fn add(&mut self, id: &NamedNode, graph: &Graph, overwrite: bool) -> Result<bool>;

    /// Returns the stored graph for `id`, failing with `NotFound` when
    /// no such graph exists.
    fn get(&self, id: &NamedNode) -> Result<Graph>;

    fn contains(&self, id: &NamedNode) -> Result<bool>;

    /// Drops the named graph, failing with `NotFound` when absent.
    fn remove(&mut self, id: &NamedNode) -> Result<()>;

    /// IRIs of all stored graphs, sorted.
    fn ids(&self) -> Result<Vec<String>>;

    fn size(&self) -> Result<StoreStats>;

    /// Persists pending writes. A no-op for in-memory backends.
    fn flush(&self) -> Result<()>;
}

// The two backends share every operation except construction and flush.

pub(crate) fn add_graph(
    store: &Store,
    id: &NamedNode,
    graph: &Graph,
    overwrite: bool,
) -> Result<bool> {
    if store.contains_named_graph(id.as_ref())? {
        if !overwrite {
            return Ok(false);
        }
        store.remove_named_graph(id.as_ref())?;
    }
    let name = GraphNameRef::NamedNode(id.as_ref());
    for triple in graph.iter() {
        store.insert(QuadRef::new(
            triple.subject,
            triple.predicate,
            triple.object,
            name,
        ))?;
    }
    Ok(true)
}

pub(crate) fn get_graph(store: &Store, id: &NamedNode) -> Result<Graph> {
    if !store.contains_named_graph(id.as_ref())? {
        return Err(EnvError::NotFound(id.as_str().to_string()));
    }
    let mut graph = Graph::new();
    for quad in store.quads_for_pattern(
        None,
        None,
        None,
        Some(GraphNameRef::NamedNode(id.as_ref())),
    ) {
        let quad = quad?;
        graph.insert(&Triple::new(quad.subject, quad.predicate, quad.object));
    }
    Ok(graph)
}

pub(crate) fn contains_graph(store: &Store, id: &NamedNode) -> Result<bool> {
    Ok(store.contains_named_graph(id.as_ref())?)
}

pub(crate) fn remove_graph(store: &Store, id: &NamedNode) -> Result<()> {
    if !store.remove_named_graph(id.as_ref())? {
        return Err(EnvError::NotFound(id.as_str().to_string()));
    }
    Ok(())
}

pub(crate) fn graph_ids(store: &Store) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    for name in store.named_graphs() {
        if let NamedOrBlankNode::NamedNode(node) = name? {
            ids.push(node.into_string());
        }
    }
    ids.sort();
    Ok(ids)
}

pub(crate) fn store_stats(store: &Store) -> Result<StoreStats> {
    Ok(StoreStats {
        num_graphs: graph_ids(store)?.len(),
        num_triples: store.len()?,
    })
}
