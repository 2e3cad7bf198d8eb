//! Error types for the ontograph core

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvError {
    #[error("Ontology not found: {0}")]
    NotFound(String),

    #[error("Cannot determine ontology IRI: graph carries no owl:Ontology declaration")]
    AmbiguousIdentity,

    #[error("Environment is open read-only")]
    ReadOnlyViolation,

    #[error("Environment handle is closed")]
    ClosedHandle,

    #[error("No ontology store found at {0}")]
    StoreNotFound(PathBuf),

    #[error("Store lock at {path} is held by another process")]
    LockHeld { path: PathBuf },

    #[error("Timed out after {waited_ms}ms waiting for store lock at {path}")]
    LockTimeout { path: PathBuf, waited_ms: u64 },

    #[error("Unresolved import: {0}")]
    UnresolvedImport(String),

    #[error("Conflicting declarations for prefix \"{prefix}\": {first} vs {second}")]
    PrefixConflict {
        prefix: String,
        first: String,
        second: String,
    },

    #[error("Failed to fetch {url}: {reason}")]
    FetchFailure { url: String, reason: String },

    #[error("Failed to parse RDF: {0}")]
    Parse(String),

    #[error("Graph store error: {0}")]
    Store(String),

    #[error("Invalid IRI: {0}")]
    InvalidIri(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<oxigraph::store::StorageError> for EnvError {
    fn from(err: oxigraph::store::StorageError) -> Self {
        EnvError::Store(err.to_string())
    }
}

impl From<oxigraph::model::IriParseError> for EnvError {
    fn from(err: oxigraph::model::IriParseError) -> Self {
        EnvError::InvalidIri(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EnvError>;
