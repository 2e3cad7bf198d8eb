//! Ontology metadata: identity, provenance, declared imports, and prefix
//! declarations extracted from a parsed graph.
//!
//! An [`Ontology`] record is what the registry persists for each stored
//! graph. The graph body itself lives in the graph store under the
//! ontology IRI; the record carries everything the resolver and closure
//! engine need without touching triples again.

use crate::errors::{EnvError, Result};
use crate::vocab;
use chrono::{DateTime, Utc};
use oxigraph::model::{Graph, NamedNode, NamedNodeRef, SubjectRef, TermRef};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// Where a stored ontology came from. Persisted in the registry so update
/// runs know whether a graph can be refreshed and from where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Source {
    /// A file under one of the configured search directories.
    LocalPath { path: PathBuf },
    /// A document fetched over HTTP.
    RemoteUrl { url: String },
    /// A graph handed to the environment directly; not refreshable.
    InMemory,
}

impl Source {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Source::LocalPath { path: path.into() }
    }

    pub fn remote(url: impl Into<String>) -> Self {
        Source::RemoteUrl { url: url.into() }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Source::LocalPath { .. })
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Source::LocalPath { path } => Some(path),
            _ => None,
        }
    }

    /// IRI standing in for an ontology that carries no declaration.
    fn location_iri(&self) -> Option<String> {
        match self {
            Source::LocalPath { path } => Some(format!("file://{}", path.display())),
            Source::RemoteUrl { url } => Some(url.clone()),
            Source::InMemory => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::LocalPath { path } => write!(f, "{}", path.display()),
            Source::RemoteUrl { url } => write!(f, "{url}"),
            Source::InMemory => write!(f, "<in-memory>"),
        }
    }
}

/// An ontology handed to the environment for ingestion. Distinct from
/// [`Source`] because a caller-supplied graph has no persistable location.
#[derive(Debug)]
pub enum SourceRef {
    Path(PathBuf),
    Url(String),
    Graph(Graph),
}

impl From<PathBuf> for SourceRef {
    fn from(path: PathBuf) -> Self {
        SourceRef::Path(path)
    }
}

impl From<&Path> for SourceRef {
    fn from(path: &Path) -> Self {
        SourceRef::Path(path.to_path_buf())
    }
}

impl From<Graph> for SourceRef {
    fn from(graph: Graph) -> Self {
        SourceRef::Graph(graph)
    }
}

/// Registry record for one stored ontology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ontology {
    /// Ontology IRI; also the named-graph name in the store.
    pub id: String,
    pub source: Source,
    /// Declared owl:imports, deduplicated and sorted; never contains `id`.
    pub imports: Vec<String>,
    pub last_updated: DateTime<Utc>,
    /// Checksum of the raw document bytes, absent for in-memory graphs.
    pub content_hash: Option<String>,
    /// Declared version metadata, taken from the first version property
    /// present on the ontology subject.
    #[serde(default)]
    pub version: Option<String>,
    /// Prefix declarations (sh:declare) hung off the ontology subject.
    pub prefixes: BTreeMap<String, String>,
}

impl Ontology {
    /// Extracts ontology metadata from a parsed graph.
    ///
    /// Identity comes from the owl:Ontology declaration; when several
    /// subjects are declared the lexicographically smallest wins so the
    /// result is deterministic. A graph without a declaration falls back
    /// to its location IRI, and an in-memory graph without one is rejected
    /// because nothing can name it.
    pub fn from_graph(graph: &Graph, source: &Source) -> Result<Self> {
        let mut declared: Vec<NamedNode> = graph
            .iter()
            .filter(|t| {
                t.predicate == vocab::TYPE && t.object == TermRef::NamedNode(vocab::ONTOLOGY)
            })
            .filter_map(|t| match t.subject {
                SubjectRef::NamedNode(n) => Some(n.into_owned()),
                _ => None,
            })
            .collect();
        declared.sort();
        declared.dedup();

        let (id, id_node) = match declared.into_iter().next() {
            Some(node) => (node.as_str().to_string(), Some(node)),
            None => {
                let iri = source.location_iri().ok_or(EnvError::AmbiguousIdentity)?;
                (iri, None)
            }
        };

        let imports = collect_imports(graph, id_node.as_ref(), &id);
        let (prefixes, version) = match &id_node {
            Some(node) => (
                collect_prefixes(graph, node.as_ref().into())?,
                collect_version(graph, node.as_ref()),
            ),
            None => (BTreeMap::new(), None),
        };

        Ok(Ontology {
            id,
            source: source.clone(),
            imports,
            last_updated: Utc::now(),
            content_hash: None,
            version,
            prefixes,
        })
    }

    /// The ontology IRI as a node, usable as a named-graph name.
    pub fn name(&self) -> Result<NamedNode> {
        Ok(NamedNode::new(&self.id)?)
    }

    /// True when the ontology can be re-read from its source.
    pub fn is_refreshable(&self) -> bool {
        !matches!(self.source, Source::InMemory)
    }
}

impl fmt::Display for Ontology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.source)
    }
}

/// Declared imports of the ontology subject. When the graph carries no
/// declaration, every owl:imports statement counts.
fn collect_imports(graph: &Graph, subject: Option<&NamedNode>, own_id: &str) -> Vec<String> {
    let mut imports = BTreeSet::new();
    for triple in graph.iter() {
        if triple.predicate != vocab::IMPORTS {
            continue;
        }
        if let Some(subject) = subject {
            if triple.subject != SubjectRef::NamedNode(subject.as_ref()) {
                continue;
            }
        }
        if let TermRef::NamedNode(target) = triple.object {
            if target.as_str() != own_id {
                imports.insert(target.as_str().to_string());
            }
        }
    }
    imports.into_iter().collect()
}

/// Version metadata of the ontology subject: the first property of
/// [`vocab::ONTOLOGY_VERSION_IRIS`] that carries a value, in priority
/// order (owl:versionInfo and owl:versionIRI first).
fn collect_version(graph: &Graph, subject: NamedNodeRef<'_>) -> Option<String> {
    for predicate in vocab::ONTOLOGY_VERSION_IRIS {
        for triple in graph.iter() {
            if triple.subject != SubjectRef::NamedNode(subject) || triple.predicate != predicate {
                continue;
            }
            match triple.object {
                TermRef::Literal(lit) => return Some(lit.value().to_string()),
                TermRef::NamedNode(n) => return Some(n.as_str().to_string()),
                _ => {}
            }
        }
    }
    None
}

/// Prefix declarations reachable from the ontology subject via sh:declare.
/// Two declarations of the same prefix with different namespaces in one
/// document are rejected outright.
fn collect_prefixes(
    graph: &Graph,
    subject: SubjectRef<'_>,
) -> Result<BTreeMap<String, String>> {
    let mut prefixes: BTreeMap<String, String> = BTreeMap::new();
    for triple in graph.iter() {
        if triple.subject != subject || triple.predicate != vocab::SH_DECLARE {
            continue;
        }
        let declaration = match triple.object {
            TermRef::NamedNode(n) => SubjectRef::NamedNode(n),
            TermRef::BlankNode(b) => SubjectRef::BlankNode(b),
            _ => continue,
        };

        let mut prefix = None;
        let mut namespace = None;
        for inner in graph.iter() {
            if inner.subject != declaration {
                continue;
            }
            if inner.predicate == vocab::SH_PREFIX {
                if let TermRef::Literal(lit) = inner.object {
                    prefix = Some(lit.value().to_string());
                }
            } else if inner.predicate == vocab::SH_NAMESPACE {
                namespace = match inner.object {
                    TermRef::Literal(lit) => Some(lit.value().to_string()),
                    TermRef::NamedNode(n) => Some(n.as_str().to_string()),
                    _ => None,
                };
            }
        }

        if let (Some(prefix), Some(namespace)) = (prefix, namespace) {
            if let Some(existing) = prefixes.get(&prefix) {
                if existing != &namespace {
                    return Err(EnvError::PrefixConflict {
                        prefix,
                        first: existing.clone(),
                        second: namespace,
                    });
                }
            } else {
                prefixes.insert(prefix, namespace);
            }
        }
    }
    Ok(prefixes)
}
