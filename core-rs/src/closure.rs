//! Import closure traversal, merging, and flattening.
//!
//! Traversal works off registry metadata alone; graph bodies are only read
//! from the store when a merge actually needs them. All traversals carry a
//! visited set so import cycles terminate.

use crate::errors::{EnvError, Result};
use crate::ontology::Ontology;
use crate::registry::Registry;
use crate::store::GraphStore;
use crate::vocab;
use oxigraph::model::{
    Graph, NamedNode, NamedNodeRef, Subject, SubjectRef, Term, TermRef, Triple, TripleRef,
};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

/// Depth bound for closure merges; `UNBOUNDED` follows imports all the way.
pub const UNBOUNDED: i32 = -1;

/// Read-only view over the registry and store for closure operations.
pub struct ClosureEngine<'a> {
    registry: &'a Registry,
    store: &'a dyn GraphStore,
}

impl<'a> ClosureEngine<'a> {
    pub fn new(registry: &'a Registry, store: &'a dyn GraphStore) -> Self {
        Self { registry, store }
    }

    /// IRIs in the import closure of `id`: the root first, then breadth
    /// first in declared-import order. Imports missing from the registry
    /// are skipped.
    pub fn list_closure(&self, id: &str) -> Result<Vec<String>> {
        let root = self
            .registry
            .get(id)
            .ok_or_else(|| EnvError::NotFound(id.to_string()))?;

        let mut order = vec![root.id.clone()];
        let mut visited: BTreeSet<String> = BTreeSet::new();
        visited.insert(root.id.clone());

        let mut queue: VecDeque<String> = root.imports.iter().cloned().collect();
        while let Some(iri) = queue.pop_front() {
            if !visited.insert(iri.clone()) {
                continue;
            }
            if let Some(member) = self.registry.get(&iri) {
                order.push(iri);
                queue.extend(member.imports.iter().cloned());
            }
        }
        Ok(order)
    }

    /// Direct importers of `id`, from the reverse index.
    pub fn get_importers(&self, id: &str) -> Vec<String> {
        self.registry.importers_of(id)
    }

    /// Merged union of all closure members within `depth` hops of `id`
    /// (0 keeps the root alone, [`UNBOUNDED`] follows every import).
    /// Stored graphs are never mutated. Fails with `PrefixConflict`
    /// before merging anything when two members bind one prefix to
    /// different namespaces.
    pub fn get_closure(&self, id: &str, depth: i32) -> Result<(Graph, Vec<String>)> {
        let mut graph = Graph::new();
        let members = self.get_closure_into(id, depth, &mut graph)?;
        Ok((graph, members))
    }

    /// Like [`get_closure`](Self::get_closure) but merges into `dest`.
    pub fn get_closure_into(
        &self,
        id: &str,
        depth: i32,
        dest: &mut Graph,
    ) -> Result<Vec<String>> {
        let members = self.members_within(id, depth)?;
        self.check_prefix_conflicts(&members)?;

        for member in &members {
            let name = NamedNode::new(member.as_str())?;
            let body = self.store.get(&name)?;
            for triple in body.iter() {
                dest.insert(triple);
            }
        }
        debug!(id, depth, members = members.len(), "materialized closure");
        Ok(members)
    }

    /// Merges the closure of each declared import that the registry can
    /// supply into `graph` and removes the owl:imports statements that
    /// resolved. Statements for unknown imports stay behind. Returns the
    /// merged member IRIs, sorted.
    pub fn import_dependencies(&self, graph: &mut Graph) -> Result<Vec<String>> {
        let targets = declared_import_targets(graph);
        let resolvable: Vec<NamedNode> = targets
            .into_iter()
            .filter(|t| self.registry.contains(t.as_str()))
            .collect();

        // conflict check spans the union of all closures before any merge
        let mut all_members: BTreeSet<String> = BTreeSet::new();
        for target in &resolvable {
            all_members.extend(self.list_closure(target.as_str())?);
        }
        self.check_prefix_conflicts(&all_members.iter().cloned().collect::<Vec<_>>())?;

        for member in &all_members {
            let body = self.store.get(&NamedNode::new(member.as_str())?)?;
            for triple in body.iter() {
                graph.insert(triple);
            }
        }
        // an import edge is satisfied once its target is merged in,
        // no matter which member declared it
        for member in &all_members {
            remove_import_edges_to(graph, NamedNode::new(member.as_str())?.as_ref());
        }
        Ok(all_members.into_iter().collect())
    }

    /// Merges the closure of `id` into `graph` and flattens the result:
    /// one owl:Ontology declaration at the root, import edges re-rooted
    /// and deduplicated with self edges dropped, and prefix declarations
    /// relocated to the root. The root is `graph`'s own declared ontology
    /// when it has one, otherwise `id`.
    pub fn import_graph(&self, graph: &mut Graph, id: &str, depth: i32) -> Result<Vec<String>> {
        let root = match ontology_subject(graph) {
            Some(subject) => subject,
            None => NamedNode::new(id)?,
        };

        let members = self.get_closure_into(id, depth, graph)?;
        flatten(graph, root.as_ref());
        Ok(members)
    }

    /// Registry members within `depth` hops of `id`, root first. Any
    /// negative depth counts as unbounded.
    fn members_within(&self, id: &str, depth: i32) -> Result<Vec<String>> {
        let depth = if depth < 0 { UNBOUNDED } else { depth };
        let root = self
            .registry
            .get(id)
            .ok_or_else(|| EnvError::NotFound(id.to_string()))?;

        let mut order = vec![root.id.clone()];
        let mut visited: BTreeSet<String> = BTreeSet::new();
        visited.insert(root.id.clone());

        let mut queue: VecDeque<(String, i32)> = VecDeque::new();
        if depth != 0 {
            queue.extend(root.imports.iter().map(|i| (i.clone(), 1)));
        }
        while let Some((iri, hops)) = queue.pop_front() {
            if !visited.insert(iri.clone()) {
                continue;
            }
            if let Some(member) = self.registry.get(&iri) {
                order.push(iri);
                if depth == UNBOUNDED || hops < depth {
                    queue.extend(member.imports.iter().map(|i| (i.clone(), hops + 1)));
                }
            }
        }
        Ok(order)
    }

    /// All-or-nothing prefix agreement across the given members.
    fn check_prefix_conflicts(&self, members: &[String]) -> Result<()> {
        let records = members.iter().filter_map(|id| self.registry.get(id));
        merged_prefixes(records).map(|_| ())
    }
}

/// Union of the members' prefix maps; a prefix bound to two namespaces is
/// a conflict.
pub fn merged_prefixes<'i>(
    members: impl Iterator<Item = &'i Ontology>,
) -> Result<BTreeMap<String, String>> {
    let mut merged: BTreeMap<String, String> = BTreeMap::new();
    for member in members {
        for (prefix, namespace) in &member.prefixes {
            match merged.get(prefix) {
                Some(existing) if existing != namespace => {
                    return Err(EnvError::PrefixConflict {
                        prefix: prefix.clone(),
                        first: existing.clone(),
                        second: namespace.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    merged.insert(prefix.clone(), namespace.clone());
                }
            }
        }
    }
    Ok(merged)
}

/// The declared ontology subject of `graph`, smallest IRI first for
/// determinism.
fn ontology_subject(graph: &Graph) -> Option<NamedNode> {
    graph
        .iter()
        .filter(|t| t.predicate == vocab::TYPE && t.object == TermRef::NamedNode(vocab::ONTOLOGY))
        .filter_map(|t| match t.subject {
            SubjectRef::NamedNode(n) => Some(n.into_owned()),
            _ => None,
        })
        .min()
}

/// Distinct owl:imports targets in `graph`, sorted.
pub(crate) fn declared_import_targets(graph: &Graph) -> Vec<NamedNode> {
    let mut targets: Vec<NamedNode> = graph
        .iter()
        .filter(|t| t.predicate == vocab::IMPORTS)
        .filter_map(|t| match t.object {
            TermRef::NamedNode(n) => Some(n.into_owned()),
            _ => None,
        })
        .collect();
    targets.sort();
    targets.dedup();
    targets
}

fn remove_import_edges_to(graph: &mut Graph, target: NamedNodeRef<'_>) {
    let edges: Vec<Triple> = graph
        .iter()
        .filter(|t| t.predicate == vocab::IMPORTS && t.object == TermRef::NamedNode(target))
        .map(|t| t.into_owned())
        .collect();
    for edge in &edges {
        graph.remove(edge.as_ref());
    }
}

/// Rewrites a merged closure so it reads as a single ontology rooted at
/// `root`.
fn flatten(graph: &mut Graph, root: NamedNodeRef<'_>) {
    collapse_ontology_declarations(graph, root);
    redirect_import_edges(graph, root);
    rewrite_prefix_ownership(graph, root);
}

/// Exactly one owl:Ontology declaration survives, at the root.
fn collapse_ontology_declarations(graph: &mut Graph, root: NamedNodeRef<'_>) {
    let declarations: Vec<Triple> = graph
        .iter()
        .filter(|t| t.predicate == vocab::TYPE && t.object == TermRef::NamedNode(vocab::ONTOLOGY))
        .map(|t| t.into_owned())
        .collect();
    for declaration in &declarations {
        graph.remove(declaration.as_ref());
    }
    graph.insert(TripleRef::new(root, vocab::TYPE, vocab::ONTOLOGY));
}

/// Every import edge originates at the root afterwards; duplicates merge
/// and self edges vanish.
fn redirect_import_edges(graph: &mut Graph, root: NamedNodeRef<'_>) {
    let edges: Vec<Triple> = graph
        .iter()
        .filter(|t| t.predicate == vocab::IMPORTS)
        .map(|t| t.into_owned())
        .collect();
    for edge in &edges {
        graph.remove(edge.as_ref());
    }
    for edge in edges {
        if let Term::NamedNode(target) = edge.object {
            if target.as_ref() != root {
                graph.insert(TripleRef::new(root, vocab::IMPORTS, target.as_ref()));
            }
        }
    }
}

/// Points sh:prefixes references at the root and relocates sh:declare
/// blocks there, keeping one declaration per (prefix, namespace) pair.
fn rewrite_prefix_ownership(graph: &mut Graph, root: NamedNodeRef<'_>) {
    let references: Vec<Triple> = graph
        .iter()
        .filter(|t| t.predicate == vocab::SH_PREFIXES)
        .map(|t| t.into_owned())
        .collect();
    for reference in &references {
        graph.remove(reference.as_ref());
    }
    for reference in references {
        graph.insert(TripleRef::new(
            reference.subject.as_ref(),
            vocab::SH_PREFIXES,
            root,
        ));
    }

    let declarations: Vec<Triple> = graph
        .iter()
        .filter(|t| t.predicate == vocab::SH_DECLARE)
        .map(|t| t.into_owned())
        .collect();
    for declaration in &declarations {
        graph.remove(declaration.as_ref());
    }

    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
    for declaration in declarations {
        let node = match &declaration.object {
            Term::NamedNode(n) => Subject::NamedNode(n.clone()),
            Term::BlankNode(b) => Subject::BlankNode(b.clone()),
            _ => continue,
        };
        match declaration_pair(graph, node.as_ref()) {
            Some(pair) if !seen.insert(pair.clone()) => {
                // duplicate declaration body; drop it entirely
                remove_subject(graph, node.as_ref());
            }
            _ => {
                graph.insert(TripleRef::new(
                    root,
                    vocab::SH_DECLARE,
                    declaration.object.as_ref(),
                ));
            }
        }
    }
}

fn declaration_pair(graph: &Graph, node: SubjectRef<'_>) -> Option<(String, String)> {
    let mut prefix = None;
    let mut namespace = None;
    for triple in graph.iter() {
        if triple.subject != node {
            continue;
        }
        if triple.predicate == vocab::SH_PREFIX {
            if let TermRef::Literal(lit) = triple.object {
                prefix = Some(lit.value().to_string());
            }
        } else if triple.predicate == vocab::SH_NAMESPACE {
            namespace = match triple.object {
                TermRef::Literal(lit) => Some(lit.value().to_string()),
                TermRef::NamedNode(n) => Some(n.as_str().to_string()),
                _ => None,
            };
        }
    }
    Some((prefix?, namespace?))
}

fn remove_subject(graph: &mut Graph, subject: SubjectRef<'_>) {
    let triples: Vec<Triple> = graph
        .iter()
        .filter(|t| t.subject == subject)
        .map(|t| t.into_owned())
        .collect();
    for triple in &triples {
        graph.remove(triple.as_ref());
    }
}
