//! Metadata registry for stored ontologies.
//!
//! The registry is the JSON-persisted side table next to the graph store:
//! one [`Ontology`] record per stored graph, plus an in-memory reverse
//! import index rebuilt on load. The graph store holds triples; the
//! registry answers "what do we have, where did it come from, and who
//! imports whom" without opening any graph.

use crate::errors::Result;
use crate::ontology::Ontology;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

/// Name of the registry file inside the store marker directory.
pub const REGISTRY_FILE_NAME: &str = "registry.json";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Registry {
    ontologies: BTreeMap<String, Ontology>,
    /// Reverse import index: target IRI to the IRIs that import it.
    /// Derived data; rebuilt from `ontologies` after deserialization.
    #[serde(skip)]
    importers: BTreeMap<String, BTreeSet<String>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a record, keeping the reverse index in step.
    pub fn insert(&mut self, ontology: Ontology) {
        let id = ontology.id.clone();
        if let Some(previous) = self.ontologies.remove(&id) {
            self.unlink_imports(&previous);
        }
        for import in &ontology.imports {
            self.importers
                .entry(import.clone())
                .or_default()
                .insert(id.clone());
        }
        self.ontologies.insert(id, ontology);
    }

    pub fn remove(&mut self, id: &str) -> Option<Ontology> {
        let removed = self.ontologies.remove(id)?;
        self.unlink_imports(&removed);
        Some(removed)
    }

    fn unlink_imports(&mut self, ontology: &Ontology) {
        for import in &ontology.imports {
            if let Some(set) = self.importers.get_mut(import) {
                set.remove(&ontology.id);
                if set.is_empty() {
                    self.importers.remove(import);
                }
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Ontology> {
        self.ontologies.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ontologies.contains_key(id)
    }

    /// Registered IRIs in sorted order.
    pub fn ids(&self) -> Vec<String> {
        self.ontologies.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ontology> {
        self.ontologies.values()
    }

    pub fn len(&self) -> usize {
        self.ontologies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ontologies.is_empty()
    }

    /// IRIs of registered ontologies that import `id`, sorted.
    pub fn importers_of(&self, id: &str) -> Vec<String> {
        self.importers
            .get(id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Imported IRIs that no registered ontology provides, sorted.
    pub fn missing_imports(&self) -> Vec<String> {
        self.importers
            .keys()
            .filter(|target| !self.ontologies.contains_key(*target))
            .cloned()
            .collect()
    }

    /// The record whose source is the given local file, if any.
    pub fn find_by_path(&self, path: &Path) -> Option<&Ontology> {
        self.ontologies
            .values()
            .find(|ont| ont.source.as_path() == Some(path))
    }

    /// Recomputes the reverse index from scratch. Called after load.
    fn rebuild_importers(&mut self) {
        self.importers.clear();
        for (id, ontology) in &self.ontologies {
            for import in &ontology.imports {
                self.importers
                    .entry(import.clone())
                    .or_default()
                    .insert(id.clone());
            }
        }
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        debug!(path = %path.display(), entries = self.ontologies.len(), "saving registry");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut registry: Registry = serde_json::from_str(&content)?;
        registry.rebuild_importers();
        Ok(registry)
    }
}
