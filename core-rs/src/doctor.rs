//! Environment diagnostics: a set of checks that flag configuration and
//! content problems an update run would silently work around, such as
//! files without an ontology declaration or two files claiming the same
//! ontology IRI.

use crate::env::OntoGraphEnv;
use crate::errors::Result;
use crate::reader;
use crate::resolver::discover_files;
use crate::vocab;
use oxigraph::model::{Graph, SubjectRef, TermRef};
use std::collections::BTreeMap;

/// One diagnostic finding: the files or IRIs involved plus a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub locations: Vec<String>,
    pub message: String,
}

/// A single diagnostic over an open environment.
pub trait EnvironmentCheck {
    fn name(&self) -> &str;
    fn check(&self, env: &OntoGraphEnv, problems: &mut Vec<Problem>) -> Result<()>;
}

/// Runs a configurable set of checks and collects their findings.
pub struct Doctor {
    checks: Vec<Box<dyn EnvironmentCheck>>,
}

impl Default for Doctor {
    fn default() -> Self {
        Self::with_default_checks()
    }
}

impl Doctor {
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    pub fn with_default_checks() -> Self {
        let mut doctor = Self::new();
        doctor.add_check(Box::new(OntologyDeclaration));
        doctor.add_check(Box::new(DuplicateOntology));
        doctor.add_check(Box::new(VanishedSource));
        doctor.add_check(Box::new(UnresolvedImports));
        doctor
    }

    pub fn add_check(&mut self, check: Box<dyn EnvironmentCheck>) {
        self.checks.push(check);
    }

    pub fn run(&self, env: &OntoGraphEnv) -> Result<Vec<Problem>> {
        let mut problems = Vec::new();
        for check in &self.checks {
            check.check(env, &mut problems)?;
        }
        Ok(problems)
    }
}

/// Distinct named subjects declared as owl:Ontology, sorted.
fn declared_subjects(graph: &Graph) -> Vec<String> {
    let mut subjects: Vec<String> = graph
        .iter()
        .filter(|t| t.predicate == vocab::TYPE && t.object == TermRef::NamedNode(vocab::ONTOLOGY))
        .filter_map(|t| match t.subject {
            SubjectRef::NamedNode(n) => Some(n.as_str().to_string()),
            _ => None,
        })
        .collect();
    subjects.sort();
    subjects.dedup();
    subjects
}

/// Every discovered file should declare exactly one ontology.
pub struct OntologyDeclaration;

impl EnvironmentCheck for OntologyDeclaration {
    fn name(&self) -> &str {
        "ontology declaration"
    }

    fn check(&self, env: &OntoGraphEnv, problems: &mut Vec<Problem>) -> Result<()> {
        for path in discover_files(env.config())? {
            let location = path.display().to_string();
            let loaded = match reader::read_file(&path) {
                Ok(loaded) => loaded,
                Err(err) => {
                    problems.push(Problem {
                        locations: vec![location],
                        message: format!("failed to load graph: {err}"),
                    });
                    continue;
                }
            };
            let subjects = declared_subjects(&loaded.graph);
            if subjects.is_empty() {
                problems.push(Problem {
                    locations: vec![location],
                    message: "no ontology declaration found".to_string(),
                });
            } else if subjects.len() > 1 {
                problems.push(Problem {
                    locations: vec![location],
                    message: "multiple ontology declarations found".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Two files declaring the same ontology IRI; only one of them can be
/// registered under it.
pub struct DuplicateOntology;

impl EnvironmentCheck for DuplicateOntology {
    fn name(&self) -> &str {
        "duplicate ontology"
    }

    fn check(&self, env: &OntoGraphEnv, problems: &mut Vec<Problem>) -> Result<()> {
        let mut by_id: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for path in discover_files(env.config())? {
            // unreadable files are the declaration check's business
            let Ok(loaded) = reader::read_file(&path) else {
                continue;
            };
            for id in declared_subjects(&loaded.graph) {
                by_id.entry(id).or_default().push(path.display().to_string());
            }
        }
        for (id, locations) in by_id {
            if locations.len() > 1 {
                problems.push(Problem {
                    locations,
                    message: format!("multiple files declare ontology {id}"),
                });
            }
        }
        Ok(())
    }
}

/// Registered local sources whose file no longer exists.
pub struct VanishedSource;

impl EnvironmentCheck for VanishedSource {
    fn name(&self) -> &str {
        "vanished source"
    }

    fn check(&self, env: &OntoGraphEnv, problems: &mut Vec<Problem>) -> Result<()> {
        for ontology in env.ontologies()? {
            if !ontology.source.is_local() {
                continue;
            }
            if let Some(path) = ontology.source.as_path() {
                if !path.exists() {
                    problems.push(Problem {
                        locations: vec![path.display().to_string()],
                        message: format!("source file for {} has vanished", ontology.id),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Imports referenced by registered ontologies that nothing resolves.
pub struct UnresolvedImports;

impl EnvironmentCheck for UnresolvedImports {
    fn name(&self) -> &str {
        "unresolved imports"
    }

    fn check(&self, env: &OntoGraphEnv, problems: &mut Vec<Problem>) -> Result<()> {
        for iri in env.missing_imports()? {
            let importers = env.get_importers(&iri)?;
            problems.push(Problem {
                locations: importers,
                message: format!("import {iri} is not registered"),
            });
        }
        Ok(())
    }
}
