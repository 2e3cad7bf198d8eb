//! In-memory graph store for temporary environments.

use super::{GraphStore, StoreStats};
use crate::errors::Result;
use oxigraph::model::{Graph, NamedNode};
use oxigraph::store::Store;

/// Backend that never touches disk; used for temporary environments
/// and throughout the test suite.
pub struct MemoryGraphStore {
    store: Store,
}

impl MemoryGraphStore {
    pub fn new() -> Result<Self> {
        Ok(Self {
            store: Store::new()?,
        })
    }
}

impl GraphStore for MemoryGraphStore {
    fn add(&mut self, id: &NamedNode, graph: &Graph, overwrite: bool) -> Result<bool> {
        super::add_graph(&self.store, id, graph, overwrite)
    }

    fn get(&self, id: &NamedNode) -> Result<Graph> {
        super::get_graph(&self.store, id)
    }

    fn contains(&self, id: &NamedNode) -> Result<bool> {
        super::contains_graph(&self.store, id)
    }

    fn remove(&mut self, id: &NamedNode) -> Result<()> {
        super::remove_graph(&self.store, id)
    }

    fn ids(&self) -> Result<Vec<String>> {
        super::graph_ids(&self.store)
    }

    fn size(&self) -> Result<StoreStats> {
        super::store_stats(&self.store)
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
