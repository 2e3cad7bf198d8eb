//! Persistent ontology graph store with owl:imports dependency resolution
//! and multi-process concurrency control.
//!
//! An environment keeps a collection of named ontology graphs plus the
//! metadata needed to walk their import graph: which ontology came from
//! where, what it imports, and who imports it. On top of that it offers
//! closure materialization (merged, optionally flattened unions of an
//! ontology and its imports) and safe concurrent access to one on-disk
//! store from multiple processes via advisory file locks.
//!
//! ```
//! use ontograph::{Config, OntoGraphEnv};
//!
//! let config = Config::builder(std::env::temp_dir())
//!     .temporary(true)
//!     .offline(true)
//!     .build()?;
//! let mut env = OntoGraphEnv::create(config, false)?;
//! assert!(env.ids()?.is_empty());
//! # Ok::<(), ontograph::EnvError>(())
//! ```

pub mod closure;
pub mod config;
pub mod doctor;
pub mod env;
pub mod errors;
pub mod fetch;
pub mod lock;
pub mod ontology;
pub mod reader;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod vocab;

pub use closure::{ClosureEngine, UNBOUNDED};
pub use config::{Config, ConfigBuilder};
pub use doctor::{Doctor, EnvironmentCheck, Problem};
pub use env::{OntoGraphEnv, UpdateReport};
pub use errors::{EnvError, Result};
pub use lock::{LockGuard, LockKind, LockWait};
pub use ontology::{Ontology, Source, SourceRef};
pub use registry::Registry;
pub use resolver::{Resolution, ResolvedOntology, ResolveOptions, Resolver};
pub use store::{GraphStore, MemoryGraphStore, PersistentGraphStore, StoreStats};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
