//! On-disk graph store: an in-memory oxigraph store backed by an N-Quads
//! snapshot file.
//!
//! The snapshot is loaded in full at open and written back on flush, with
//! an atomic rename so readers never observe a half-written file. The
//! store lock (held by the environment) serializes snapshot writes across
//! processes; each reader loads its own copy, so any number of readers
//! can share one snapshot.

use super::{GraphStore, StoreStats};
use crate::errors::{EnvError, Result};
use oxigraph::io::RdfFormat;
use oxigraph::model::{Graph, NamedNode};
use oxigraph::store::Store;
use std::cell::Cell;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Name of the snapshot file inside the store marker directory.
pub const STORE_FILE_NAME: &str = "store.nq";

pub struct PersistentGraphStore {
    store: Store,
    path: PathBuf,
    dirty: Cell<bool>,
}

impl PersistentGraphStore {
    /// Opens the store under `marker_dir`, loading the snapshot when one
    /// exists.
    pub fn open(marker_dir: &Path) -> Result<Self> {
        let path = marker_dir.join(STORE_FILE_NAME);
        let store = Store::new()?;
        if path.is_file() {
            let reader = BufReader::new(std::fs::File::open(&path)?);
            store
                .load_from_reader(RdfFormat::NQuads, reader)
                .map_err(|e| EnvError::Store(format!("failed to load store snapshot: {e}")))?;
            debug!(path = %path.display(), "loaded store snapshot");
        }
        Ok(Self {
            store,
            path,
            dirty: Cell::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_snapshot(&self) -> Result<()> {
        let tmp = self.path.with_extension("nq.tmp");
        let writer = BufWriter::new(std::fs::File::create(&tmp)?);
        let mut writer = self
            .store
            .dump_to_writer(RdfFormat::NQuads, writer)
            .map_err(|e| EnvError::Store(format!("failed to write store snapshot: {e}")))?;
        writer.flush()?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "wrote store snapshot");
        Ok(())
    }
}

impl GraphStore for PersistentGraphStore {
    fn add(&mut self, id: &NamedNode, graph: &Graph, overwrite: bool) -> Result<bool> {
        let written = super::add_graph(&self.store, id, graph, overwrite)?;
        if written {
            self.dirty.set(true);
        }
        Ok(written)
    }

    fn get(&self, id: &NamedNode) -> Result<Graph> {
        super::get_graph(&self.store, id)
    }

    fn contains(&self, id: &NamedNode) -> Result<bool> {
        super::contains_graph(&self.store, id)
    }

    fn remove(&mut self, id: &NamedNode) -> Result<()> {
        super::remove_graph(&self.store, id)?;
        self.dirty.set(true);
        Ok(())
    }

    fn ids(&self) -> Result<Vec<String>> {
        super::graph_ids(&self.store)
    }

    fn size(&self) -> Result<StoreStats> {
        super::store_stats(&self.store)
    }

    fn flush(&self) -> Result<()> {
        if !self.dirty.get() {
            return Ok(());
        }
        self.write_snapshot()?;
        self.dirty.set(false);
        Ok(())
    }
}

impl Drop for PersistentGraphStore {
    fn drop(&mut self) {
        if self.dirty.get() {
            if let Err(err) = self.flush() {
                error!(path = %self.path.display(), error = %err, "failed to flush store on drop");
            }
        }
    }
}
