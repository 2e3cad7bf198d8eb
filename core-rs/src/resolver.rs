//! Import resolution: turning a source reference into a root ontology plus
//! the transitively imported ontologies it pulls in.
//!
//! Resolution never writes to the store or registry. It stages everything
//! it managed to load and reports what it could not, so the environment can
//! commit the result atomically (strict) or partially (lenient).

use crate::config::Config;
use crate::errors::{EnvError, Result};
use crate::fetch;
use crate::ontology::{Ontology, Source, SourceRef};
use crate::reader;
use crate::registry::Registry;
use oxigraph::model::Graph;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Flags governing one resolution run. Defaults mirror the environment
/// configuration but individual calls may override them.
#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    /// Recursively resolve declared imports.
    pub fetch_imports: bool,
    /// Never reach for the network; remote imports become unresolved.
    pub offline: bool,
    /// Fail the whole run on the first unresolvable import.
    pub strict: bool,
}

impl ResolveOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fetch_imports: true,
            offline: config.offline,
            strict: config.strict,
        }
    }
}

/// A loaded ontology together with its parsed graph, ready to commit.
#[derive(Debug)]
pub struct ResolvedOntology {
    pub ontology: Ontology,
    pub graph: Graph,
}

/// Outcome of a resolution run.
#[derive(Debug)]
pub struct Resolution {
    pub root: ResolvedOntology,
    /// Transitively imported ontologies, in resolution order.
    pub imported: Vec<ResolvedOntology>,
    /// Import IRIs that could not be resolved, sorted.
    pub unresolved: Vec<String>,
}

/// Resolves sources against the search directories, the registry, and
/// (unless offline) the network.
pub struct Resolver<'a> {
    config: &'a Config,
    registry: &'a Registry,
    /// Ontology IRI to file path for everything under the search
    /// directories. Built on first use, search dirs are parsed once.
    local_index: Option<BTreeMap<String, PathBuf>>,
}

impl<'a> Resolver<'a> {
    pub fn new(config: &'a Config, registry: &'a Registry) -> Self {
        Self {
            config,
            registry,
            local_index: None,
        }
    }

    /// Resolves `source` and, when requested, its transitive imports.
    pub fn resolve(&mut self, source: SourceRef, opts: &ResolveOptions) -> Result<Resolution> {
        let root = self.load_source(source, opts)?;
        debug!(id = %root.ontology.id, "resolved root ontology");
        self.resolve_from(root, opts)
    }

    /// Resolves a bare ontology IRI the way an import reference is
    /// resolved: search directories first, then the network.
    pub fn resolve_iri(&mut self, iri: &str, opts: &ResolveOptions) -> Result<Resolution> {
        let root = self.resolve_import(iri, opts)?;
        self.resolve_from(root, opts)
    }

    fn resolve_from(&mut self, root: ResolvedOntology, opts: &ResolveOptions) -> Result<Resolution> {
        let mut imported = Vec::new();
        let mut unresolved = BTreeSet::new();

        if opts.fetch_imports {
            let mut visited: BTreeSet<String> = BTreeSet::new();
            visited.insert(root.ontology.id.clone());

            let mut queue: VecDeque<String> = root.ontology.imports.iter().cloned().collect();
            while let Some(iri) = queue.pop_front() {
                if !visited.insert(iri.clone()) || self.registry.contains(&iri) {
                    continue;
                }
                match self.resolve_import(&iri, opts) {
                    Ok(resolved) => {
                        queue.extend(resolved.ontology.imports.iter().cloned());
                        imported.push(resolved);
                    }
                    Err(err) => {
                        if opts.strict {
                            return Err(EnvError::UnresolvedImport(iri));
                        }
                        warn!(iri = %iri, error = %err, "skipping unresolvable import");
                        unresolved.insert(iri);
                    }
                }
            }
        }

        Ok(Resolution {
            root,
            imported,
            unresolved: unresolved.into_iter().collect(),
        })
    }

    fn load_source(&mut self, source: SourceRef, opts: &ResolveOptions) -> Result<ResolvedOntology> {
        match source {
            SourceRef::Path(path) => self.load_file(&path),
            SourceRef::Url(url) => self.load_url(&url, opts),
            SourceRef::Graph(graph) => {
                let ontology = Ontology::from_graph(&graph, &Source::InMemory)?;
                Ok(ResolvedOntology { ontology, graph })
            }
        }
    }

    fn load_file(&self, path: &Path) -> Result<ResolvedOntology> {
        let path = std::path::absolute(path)?;
        let loaded = reader::read_file(&path)?;
        let mut ontology = Ontology::from_graph(&loaded.graph, &Source::local(path))?;
        ontology.content_hash = Some(loaded.checksum);
        Ok(ResolvedOntology {
            ontology,
            graph: loaded.graph,
        })
    }

    fn load_url(&self, url: &str, opts: &ResolveOptions) -> Result<ResolvedOntology> {
        if opts.offline {
            return Err(EnvError::FetchFailure {
                url: url.to_string(),
                reason: "offline mode".to_string(),
            });
        }
        let loaded = fetch::fetch_graph(url)?;
        let mut ontology = Ontology::from_graph(&loaded.graph, &Source::remote(url))?;
        ontology.content_hash = Some(loaded.checksum);
        Ok(ResolvedOntology {
            ontology,
            graph: loaded.graph,
        })
    }

    /// One import IRI: search directories first, then the network.
    fn resolve_import(&mut self, iri: &str, opts: &ResolveOptions) -> Result<ResolvedOntology> {
        let local = self.find_local(iri)?;
        if let Some(path) = local {
            return self.load_file(&path);
        }
        if iri.starts_with("http://") || iri.starts_with("https://") {
            return self.load_url(iri, opts);
        }
        Err(EnvError::UnresolvedImport(iri.to_string()))
    }

    fn find_local(&mut self, iri: &str) -> Result<Option<PathBuf>> {
        if self.local_index.is_none() {
            self.local_index = Some(build_local_index(self.config)?);
        }
        Ok(self
            .local_index
            .as_ref()
            .and_then(|index| index.get(iri))
            .cloned())
    }
}

/// RDF files under the configured search directories, sorted.
pub fn discover_files(config: &Config) -> Result<Vec<PathBuf>> {
    let matcher = config.file_matcher()?;
    let mut files = Vec::new();
    for dir in &config.search_directories {
        if !dir.is_dir() {
            continue;
        }
        for entry in walkdir::WalkDir::new(dir).follow_links(true) {
            let entry = entry.map_err(|e| EnvError::Io(e.into()))?;
            if entry.file_type().is_file() && matcher.is_included(entry.path()) {
                files.push(std::path::absolute(entry.path())?);
            }
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

/// Parses every discovered file and maps declared ontology IRIs to their
/// paths. Unparseable files are skipped with a warning; the first file
/// declaring an IRI wins.
fn build_local_index(config: &Config) -> Result<BTreeMap<String, PathBuf>> {
    let mut index = BTreeMap::new();
    for path in discover_files(config)? {
        let loaded = match reader::read_file(&path) {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable file");
                continue;
            }
        };
        match Ontology::from_graph(&loaded.graph, &Source::local(&path)) {
            Ok(ontology) => {
                index.entry(ontology.id).or_insert(path);
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unidentifiable file");
            }
        }
    }
    debug!(entries = index.len(), "built local ontology index");
    Ok(index)
}
