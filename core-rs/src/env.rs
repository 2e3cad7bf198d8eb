//! The environment facade: one handle tying configuration, the store
//! lock, the graph store, the registry, and the resolution machinery
//! together.
//!
//! A handle is either open (read-write or read-only) or closed. The store
//! lock is taken at open time and held for the lifetime of the handle;
//! dropping or closing the handle releases it. Every operation checks the
//! handle state first, so a closed handle fails fast instead of touching
//! a store someone else may now own.

use crate::closure::{self, ClosureEngine};
use crate::config::Config;
use crate::errors::{EnvError, Result};
use crate::lock::{LockGuard, LockKind};
use crate::ontology::{Ontology, Source, SourceRef};
use crate::reader;
use crate::registry::{Registry, REGISTRY_FILE_NAME};
use crate::resolver::{discover_files, Resolution, ResolveOptions, Resolver};
use crate::store::{
    GraphStore, MemoryGraphStore, PersistentGraphStore, StoreStats, STORE_FILE_NAME,
};
use chrono::{DateTime, Utc};
use oxigraph::model::Graph;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the persisted configuration inside the store marker directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Changes applied by [`OntoGraphEnv::update`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
}

pub struct OntoGraphEnv {
    config: Config,
    registry: Registry,
    store: Box<dyn GraphStore>,
    /// Held for the lifetime of the handle; `None` for temporary
    /// environments and after close.
    lock: Option<LockGuard>,
    closed: bool,
}

impl OntoGraphEnv {
    /// Opens an existing environment. Fails with `StoreNotFound` when the
    /// marker directory is absent; use [`create`](Self::create) to make one.
    pub fn open(config: Config) -> Result<Self> {
        if config.temporary {
            return Self::temporary_env(config);
        }
        let marker = config.marker_dir();
        if !marker.is_dir() {
            return Err(EnvError::StoreNotFound(marker));
        }
        let kind = if config.read_only {
            LockKind::Shared
        } else {
            LockKind::Exclusive
        };
        let lock = LockGuard::acquire(&marker, kind, config.lock_wait)?;
        let registry = Self::load_registry(&marker)?;
        let store = Box::new(PersistentGraphStore::open(&marker)?);
        info!(
            root = %config.root.display(),
            read_only = config.read_only,
            ontologies = registry.len(),
            "opened ontology environment"
        );
        Ok(Self {
            config,
            registry,
            store,
            lock: Some(lock),
            closed: false,
        })
    }

    /// Creates the environment if needed and opens it read-write. With
    /// `recreate` any existing store contents are discarded first.
    pub fn create(config: Config, recreate: bool) -> Result<Self> {
        if config.read_only {
            return Err(EnvError::ReadOnlyViolation);
        }
        if config.temporary {
            return Self::temporary_env(config);
        }
        let marker = config.marker_dir();
        std::fs::create_dir_all(&marker)?;
        let lock = LockGuard::acquire(&marker, LockKind::Exclusive, config.lock_wait)?;

        if recreate {
            let store_file = marker.join(STORE_FILE_NAME);
            if store_file.exists() {
                std::fs::remove_file(&store_file)?;
            }
            let registry_path = marker.join(REGISTRY_FILE_NAME);
            if registry_path.exists() {
                std::fs::remove_file(&registry_path)?;
            }
            info!(root = %config.root.display(), "recreated ontology environment");
        }

        config.save_to_file(&marker.join(CONFIG_FILE_NAME))?;
        let registry = Self::load_registry(&marker)?;
        let store = Box::new(PersistentGraphStore::open(&marker)?);
        Ok(Self {
            config,
            registry,
            store,
            lock: Some(lock),
            closed: false,
        })
    }

    /// Opens an existing environment using the configuration persisted at
    /// create time.
    pub fn load(root: &Path) -> Result<Self> {
        let marker = root.join(crate::config::MARKER_DIR_NAME);
        let config_path = marker.join(CONFIG_FILE_NAME);
        if !config_path.is_file() {
            return Err(EnvError::StoreNotFound(marker));
        }
        Self::open(Config::from_file(&config_path)?)
    }

    fn temporary_env(config: Config) -> Result<Self> {
        debug!("creating temporary in-memory environment");
        Ok(Self {
            config,
            registry: Registry::new(),
            store: Box::new(MemoryGraphStore::new()?),
            lock: None,
            closed: false,
        })
    }

    fn load_registry(marker: &Path) -> Result<Registry> {
        let path = marker.join(REGISTRY_FILE_NAME);
        if path.is_file() {
            Registry::from_file(&path)
        } else {
            Ok(Registry::new())
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(EnvError::ClosedHandle);
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<()> {
        self.ensure_open()?;
        if self.config.read_only {
            return Err(EnvError::ReadOnlyViolation);
        }
        Ok(())
    }

    fn engine(&self) -> ClosureEngine<'_> {
        ClosureEngine::new(&self.registry, self.store.as_ref())
    }

    /// Resolves `source` (and its imports, per configuration) and commits
    /// the result. Adding an IRI the registry already holds is a no-op
    /// that returns the existing record.
    pub fn add(&mut self, source: impl Into<SourceRef>) -> Result<Ontology> {
        let opts = ResolveOptions::from_config(&self.config);
        self.add_with_options(source.into(), &opts, false)
    }

    /// Like [`add`](Self::add) with explicit resolution options. With
    /// `overwrite` an existing graph under the resolved IRI is replaced.
    pub fn add_with_options(
        &mut self,
        source: SourceRef,
        opts: &ResolveOptions,
        overwrite: bool,
    ) -> Result<Ontology> {
        self.ensure_writable()?;
        let resolution = {
            let mut resolver = Resolver::new(&self.config, &self.registry);
            resolver.resolve(source, opts)?
        };
        if !resolution.unresolved.is_empty() {
            debug!(unresolved = ?resolution.unresolved, "add completed with unresolved imports");
        }
        self.commit(resolution, overwrite)
    }

    fn commit(&mut self, resolution: Resolution, overwrite_root: bool) -> Result<Ontology> {
        for resolved in resolution.imported {
            self.commit_one(resolved, false)?;
        }
        self.commit_one(resolution.root, overwrite_root)
    }

    fn commit_one(
        &mut self,
        resolved: crate::resolver::ResolvedOntology,
        overwrite: bool,
    ) -> Result<Ontology> {
        let name = resolved.ontology.name()?;
        let written = self.store.add(&name, &resolved.graph, overwrite)?;
        if !written {
            if let Some(existing) = self.registry.get(&resolved.ontology.id) {
                return Ok(existing.clone());
            }
        }
        self.registry.insert(resolved.ontology.clone());
        Ok(resolved.ontology)
    }

    /// The stored graph body for `id`.
    pub fn get_graph(&self, id: &str) -> Result<Graph> {
        self.ensure_open()?;
        let name = oxigraph::model::NamedNode::new(id)?;
        self.store.get(&name)
    }

    /// The registry record for `id`.
    pub fn get_ontology(&self, id: &str) -> Result<&Ontology> {
        self.ensure_open()?;
        self.registry
            .get(id)
            .ok_or_else(|| EnvError::NotFound(id.to_string()))
    }

    /// Removes an ontology from both the store and the registry. The graph
    /// body goes first so a store failure leaves the metadata intact
    /// instead of orphaning the graph.
    pub fn remove(&mut self, id: &str) -> Result<Ontology> {
        self.ensure_writable()?;
        let record = self
            .registry
            .get(id)
            .cloned()
            .ok_or_else(|| EnvError::NotFound(id.to_string()))?;
        let name = record.name()?;
        if self.store.contains(&name)? {
            self.store.remove(&name)?;
        }
        self.registry.remove(id);
        Ok(record)
    }

    pub fn ids(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        Ok(self.registry.ids())
    }

    pub fn ontologies(&self) -> Result<Vec<&Ontology>> {
        self.ensure_open()?;
        Ok(self.registry.iter().collect())
    }

    pub fn list_closure(&self, id: &str) -> Result<Vec<String>> {
        self.ensure_open()?;
        self.engine().list_closure(id)
    }

    pub fn get_closure(&self, id: &str, depth: i32) -> Result<(Graph, Vec<String>)> {
        self.ensure_open()?;
        self.engine().get_closure(id, depth)
    }

    pub fn get_closure_into(&self, id: &str, depth: i32, dest: &mut Graph) -> Result<Vec<String>> {
        self.ensure_open()?;
        self.engine().get_closure_into(id, depth, dest)
    }

    pub fn get_importers(&self, id: &str) -> Result<Vec<String>> {
        self.ensure_open()?;
        Ok(self.engine().get_importers(id))
    }

    /// Merges the closures of `graph`'s declared imports into it, removing
    /// the import statements that resolved. With `fetch_missing`, imports
    /// the registry does not hold are resolved and committed first (best
    /// effort; failures leave the statement in place).
    pub fn import_dependencies(
        &mut self,
        graph: &mut Graph,
        fetch_missing: bool,
    ) -> Result<Vec<String>> {
        self.ensure_open()?;
        if fetch_missing {
            self.ensure_writable()?;
            let opts = ResolveOptions {
                strict: false,
                ..ResolveOptions::from_config(&self.config)
            };
            for target in closure::declared_import_targets(graph) {
                if self.registry.contains(target.as_str()) {
                    continue;
                }
                let resolution = {
                    let mut resolver = Resolver::new(&self.config, &self.registry);
                    resolver.resolve_iri(target.as_str(), &opts)
                };
                match resolution {
                    Ok(resolution) => {
                        self.commit(resolution, false)?;
                    }
                    Err(err) => {
                        warn!(iri = %target, error = %err, "could not fetch missing import");
                    }
                }
            }
        }
        self.engine().import_dependencies(graph)
    }

    /// Merges the closure of `id` into `graph` and flattens the result
    /// into a single rooted ontology.
    pub fn import_graph(&self, graph: &mut Graph, id: &str, depth: i32) -> Result<Vec<String>> {
        self.ensure_open()?;
        self.engine().import_graph(graph, id, depth)
    }

    /// Walks the search directories and adds RDF files the registry does
    /// not know yet. Returns the newly added IRIs, sorted.
    pub fn scan(&mut self) -> Result<Vec<String>> {
        self.ensure_writable()?;
        let mut added = Vec::new();
        if self.config.no_search {
            return Ok(added);
        }
        for path in discover_files(&self.config)? {
            if self.registry.find_by_path(&path).is_some() {
                continue;
            }
            match self.add(SourceRef::Path(path.clone())) {
                Ok(ontology) => added.push(ontology.id),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping file during scan");
                }
            }
        }
        added.sort();
        added.dedup();
        Ok(added)
    }

    /// Brings the environment in line with its sources: drops records
    /// whose file vanished, picks up new files, and reloads local files
    /// whose content changed. `all` forces a reload of every refreshable
    /// record regardless of staleness.
    pub fn update(&mut self, all: bool) -> Result<UpdateReport> {
        self.ensure_writable()?;
        let mut report = UpdateReport::default();

        let vanished: Vec<String> = self
            .registry
            .iter()
            .filter(|o| o.source.as_path().map(|p| !p.exists()).unwrap_or(false))
            .map(|o| o.id.clone())
            .collect();
        for id in vanished {
            self.remove(&id)?;
            report.removed.push(id);
        }

        if !self.config.no_search {
            report.added = self.scan()?;
        }

        let locals: Vec<(String, PathBuf, DateTime<Utc>, Option<String>)> = self
            .registry
            .iter()
            .filter(|o| o.is_refreshable() && !report.added.contains(&o.id))
            .filter_map(|o| {
                o.source
                    .as_path()
                    .map(|p| (o.id.clone(), p.to_path_buf(), o.last_updated, o.content_hash.clone()))
            })
            .collect();
        for (id, path, last_updated, content_hash) in locals {
            if !(all || Self::is_stale(&path, last_updated, content_hash.as_deref())?) {
                continue;
            }
            let loaded = reader::read_file(&path)?;
            let mut ontology = Ontology::from_graph(&loaded.graph, &Source::local(&path))?;
            ontology.content_hash = Some(loaded.checksum);
            if ontology.id != id {
                // the file now declares a different ontology
                self.remove(&id)?;
                report.removed.push(id);
            }
            let name = ontology.name()?;
            self.store.add(&name, &loaded.graph, true)?;
            self.registry.insert(ontology.clone());
            report.updated.push(ontology.id);
        }

        // remote sources have no cheap staleness signal; refresh on demand
        if all && !self.config.offline {
            let remotes: Vec<(String, String)> = self
                .registry
                .iter()
                .filter(|o| !report.added.contains(&o.id))
                .filter_map(|o| match &o.source {
                    Source::RemoteUrl { url } => Some((o.id.clone(), url.clone())),
                    _ => None,
                })
                .collect();
            let opts = ResolveOptions {
                fetch_imports: false,
                ..ResolveOptions::from_config(&self.config)
            };
            for (id, url) in remotes {
                let resolution = {
                    let mut resolver = Resolver::new(&self.config, &self.registry);
                    resolver.resolve(SourceRef::Url(url.clone()), &opts)
                };
                match resolution {
                    Ok(resolution) => {
                        if resolution.root.ontology.id != id {
                            self.remove(&id)?;
                            report.removed.push(id);
                        }
                        let committed = self.commit(resolution, true)?;
                        report.updated.push(committed.id);
                    }
                    Err(err) => {
                        warn!(url = %url, error = %err, "failed to refresh remote ontology");
                    }
                }
            }
        }

        report.removed.sort();
        report.updated.sort();
        Ok(report)
    }

    /// mtime first, then the content hash; a touch without a content
    /// change does not count as stale.
    fn is_stale(
        path: &Path,
        last_updated: DateTime<Utc>,
        content_hash: Option<&str>,
    ) -> Result<bool> {
        let modified = DateTime::<Utc>::from(std::fs::metadata(path)?.modified()?);
        if modified <= last_updated {
            return Ok(false);
        }
        let Some(known) = content_hash else {
            return Ok(true);
        };
        let bytes = std::fs::read(path)?;
        Ok(reader::checksum(&bytes) != known)
    }

    /// Runs the default diagnostic checks over the environment.
    pub fn doctor(&self) -> Result<Vec<crate::doctor::Problem>> {
        self.ensure_open()?;
        crate::doctor::Doctor::with_default_checks().run(self)
    }

    /// Import IRIs referenced by registered ontologies that the registry
    /// does not hold.
    pub fn missing_imports(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        Ok(self.registry.missing_imports())
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.ensure_open()?;
        self.store.size()
    }

    /// Location of the on-disk database, `None` for temporary
    /// environments.
    pub fn store_path(&self) -> Option<PathBuf> {
        if self.config.temporary {
            None
        } else {
            Some(self.config.marker_dir().join(STORE_FILE_NAME))
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Persists store and metadata so a subsequent reader observes the
    /// committed state. A no-op for temporary and read-only handles.
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.config.temporary || self.config.read_only {
            return Ok(());
        }
        self.store.flush()?;
        let marker = self.config.marker_dir();
        self.registry.save_to_file(&marker.join(REGISTRY_FILE_NAME))?;
        self.config.save_to_file(&marker.join(CONFIG_FILE_NAME))?;
        Ok(())
    }

    /// Flushes, releases the store lock, and marks the handle closed.
    /// Idempotent; later mutations fail with `ClosedHandle`.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if !self.config.read_only {
            self.flush()?;
        }
        self.lock.take();
        self.closed = true;
        debug!(root = %self.config.root.display(), "closed ontology environment");
        Ok(())
    }
}

impl Drop for OntoGraphEnv {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(err) = self.close() {
                warn!(error = %err, "error while closing environment on drop");
            }
        }
    }
}
