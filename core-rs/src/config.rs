//! Environment configuration: where the store lives, where to search for
//! ontology files, and the resolution flags that govern add/update behavior.

use crate::errors::{EnvError, Result};
use crate::lock::LockWait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the marker directory that identifies a store root.
pub const MARKER_DIR_NAME: &str = ".ontograph";

/// File name patterns considered ontology documents when scanning
/// search directories.
const DEFAULT_INCLUDES: &[&str] = &["*.ttl", "*.owl", "*.xml", "*.n3", "*.nt"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Directory the store marker lives under.
    pub root: PathBuf,
    /// Directories scanned for ontology files; defaults to `root`.
    pub search_directories: Vec<PathBuf>,
    includes: Vec<String>,
    excludes: Vec<String>,
    /// Never fetch remote ontologies when true.
    pub offline: bool,
    /// Abort whole operations on any unresolved import when true.
    pub strict: bool,
    /// Keep everything in memory; never touch disk.
    pub temporary: bool,
    /// Open with a shared lock and reject mutations.
    pub read_only: bool,
    /// Skip directory scanning entirely.
    pub no_search: bool,
    /// How long to wait for the store lock at open time.
    #[serde(default)]
    pub lock_wait: LockWait,
}

impl Config {
    pub fn builder(root: impl Into<PathBuf>) -> ConfigBuilder {
        ConfigBuilder {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Path of the marker directory for this configuration.
    pub fn marker_dir(&self) -> PathBuf {
        self.root.join(MARKER_DIR_NAME)
    }

    /// Compiles the include/exclude patterns into matchers for scanning.
    pub fn file_matcher(&self) -> Result<FileMatcher> {
        FileMatcher::new(&self.includes, &self.excludes)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Compiled include/exclude globs applied to candidate file names.
#[derive(Debug)]
pub struct FileMatcher {
    includes: GlobSet,
    excludes: GlobSet,
    has_excludes: bool,
}

impl FileMatcher {
    fn new(includes: &[String], excludes: &[String]) -> Result<Self> {
        let mut inc = GlobSetBuilder::new();
        for pattern in includes {
            inc.add(
                Glob::new(pattern)
                    .map_err(|e| EnvError::Store(format!("invalid include pattern: {e}")))?,
            );
        }
        let mut exc = GlobSetBuilder::new();
        for pattern in excludes {
            exc.add(
                Glob::new(pattern)
                    .map_err(|e| EnvError::Store(format!("invalid exclude pattern: {e}")))?,
            );
        }
        Ok(Self {
            includes: inc
                .build()
                .map_err(|e| EnvError::Store(format!("invalid include patterns: {e}")))?,
            excludes: exc
                .build()
                .map_err(|e| EnvError::Store(format!("invalid exclude patterns: {e}")))?,
            has_excludes: !excludes.is_empty(),
        })
    }

    /// Returns true when the path should be picked up by a scan. Patterns
    /// are matched against the file name, excludes win over includes.
    pub fn is_included(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        if self.has_excludes && self.excludes.is_match(name) {
            return false;
        }
        self.includes.is_match(name)
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    root: PathBuf,
    search_directories: Option<Vec<PathBuf>>,
    includes: Option<Vec<String>>,
    excludes: Option<Vec<String>>,
    offline: bool,
    strict: bool,
    temporary: bool,
    read_only: bool,
    no_search: bool,
    lock_wait: Option<LockWait>,
}

impl ConfigBuilder {
    pub fn search_directories(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_directories = Some(dirs);
        self
    }

    pub fn includes(mut self, includes: Vec<String>) -> Self {
        self.includes = Some(includes);
        self
    }

    pub fn excludes(mut self, excludes: Vec<String>) -> Self {
        self.excludes = Some(excludes);
        self
    }

    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn temporary(mut self, temporary: bool) -> Self {
        self.temporary = temporary;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn no_search(mut self, no_search: bool) -> Self {
        self.no_search = no_search;
        self
    }

    pub fn lock_wait(mut self, wait: LockWait) -> Self {
        self.lock_wait = Some(wait);
        self
    }

    pub fn build(self) -> Result<Config> {
        let search_directories = self.search_directories.unwrap_or_else(|| {
            if self.no_search {
                vec![]
            } else {
                vec![self.root.clone()]
            }
        });

        let includes = self
            .includes
            .unwrap_or_else(|| DEFAULT_INCLUDES.iter().map(|s| s.to_string()).collect());
        let excludes = self.excludes.unwrap_or_default();

        let config = Config {
            root: self.root,
            search_directories,
            includes,
            excludes,
            offline: self.offline,
            strict: self.strict,
            temporary: self.temporary,
            read_only: self.read_only,
            no_search: self.no_search,
            lock_wait: self.lock_wait.unwrap_or_default(),
        };
        // fail early on malformed patterns
        config.file_matcher()?;
        Ok(config)
    }
}
