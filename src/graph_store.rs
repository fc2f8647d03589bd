use crate::error::{CrawlError, Result};
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

/// Player name -> teammates in table order.
pub type Graph = BTreeMap<String, Vec<String>>;

/// The crawl's only durable output. Every key in it belongs to a player that
/// was fully resolved and fetched.
pub struct GraphStore {
    path: PathBuf,
    graph: Graph,
    dirty: bool,
}

impl GraphStore {
    /// Load the graph at `path`. A missing file starts an empty graph; so
    /// does one that exists but cannot be read or parsed, after a warning and
    /// a `.corrupt` copy.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No graph file at {}. Starting fresh.", path.display());
                return GraphStore::empty(path);
            }
            Err(e) => return GraphStore::start_over(path, e.to_string()),
        };

        match serde_json::from_slice::<Graph>(&bytes) {
            Ok(graph) => {
                info!("Resumed previous session: {} players already mapped.", graph.len());
                GraphStore { path, graph, dirty: false }
            }
            Err(e) => GraphStore::start_over(path, e.to_string()),
        }
    }

    /// Set the unusable file aside before the first flush replaces it.
    fn start_over(path: PathBuf, reason: String) -> Self {
        let err = CrawlError::PersistenceCorruption { path: path.clone(), reason };
        warn!("{}. Starting fresh.", err);
        let backup = sibling(&path, "corrupt");
        if let Err(e) = fs::copy(&path, &backup) {
            warn!("Could not keep a copy of the unreadable graph at {}: {}", backup.display(), e);
        }
        GraphStore::empty(path)
    }

    pub fn empty(path: impl Into<PathBuf>) -> Self {
        GraphStore { path: path.into(), graph: Graph::new(), dirty: false }
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.graph.contains_key(entity)
    }

    pub fn get(&self, entity: &str) -> Option<&[String]> {
        self.graph.get(entity).map(Vec::as_slice)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Record a player's teammates. Returns false (and stays clean) when the
    /// exact same list is already stored.
    pub fn put(&mut self, entity: &str, related: Vec<String>) -> bool {
        if self.graph.get(entity) == Some(&related) {
            return false;
        }
        // Flag first: a flush can only miss a mutation that never happened.
        self.dirty = true;
        self.graph.insert(entity.to_string(), related);
        true
    }

    /// Write the whole graph if anything changed since the last flush.
    /// Returns whether a write happened.
    pub fn flush_if_dirty(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        info!("Saving {}...", self.path.display());
        self.write()?;
        self.dirty = false;
        Ok(true)
    }

    fn write(&self) -> Result<()> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.graph.serialize(&mut ser)?;

        let io_err = |source: std::io::Error| CrawlError::Persistence { path: self.path.clone(), source };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        // Write-then-rename so a crash mid-write leaves the old file intact.
        let tmp = sibling(&self.path, "tmp");
        fs::write(&tmp, &buf).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Owns the store for the length of a run and flushes it on the way out,
/// whichever way that is.
pub struct StoreGuard {
    store: GraphStore,
}

impl StoreGuard {
    pub fn new(store: GraphStore) -> Self {
        StoreGuard { store }
    }

    /// Flush now and surface the error, instead of only logging it on drop.
    pub fn finish(mut self) -> Result<bool> {
        self.store.flush_if_dirty()
    }
}

impl Deref for StoreGuard {
    type Target = GraphStore;

    fn deref(&self) -> &GraphStore {
        &self.store
    }
}

impl DerefMut for StoreGuard {
    fn deref_mut(&mut self) -> &mut GraphStore {
        &mut self.store
    }
}

impl Drop for StoreGuard {
    fn drop(&mut self) {
        if let Err(e) = self.store.flush_if_dirty() {
            log::error!("Final flush failed: {}", e);
        }
    }
}
