//! Persistent, deduplicated link store.
//!
//! The store is a JSON object keyed by URL. It is loaded once, mutated only by
//! merging, and always written back whole: the map is serialized into a
//! temporary file next to the target and renamed over it, so an interrupted
//! run leaves either the previous or the new file, never a truncated one.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::{DorkError, LinkMap, Result};

/// Durable url → metadata mapping for one link file.
#[derive(Debug)]
pub struct LinkStore {
    path: PathBuf,
    links: LinkMap,
    flushes: usize,
}

impl LinkStore {
    /// Loads the store at `path`.
    ///
    /// Never fails: a missing file gives an empty store, and so does a
    /// malformed one (with a warning).
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let links = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => LinkMap::new(),
            Ok(raw) => match serde_json::from_str::<LinkMap>(&raw) {
                Ok(links) => links,
                Err(e) => {
                    warn!(
                        "Link store {} is malformed, starting empty: {}",
                        path.display(),
                        e
                    );
                    LinkMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No link store at {}, starting empty", path.display());
                LinkMap::new()
            }
            Err(e) => {
                warn!(
                    "Cannot read link store {}, starting empty: {}",
                    path.display(),
                    e
                );
                LinkMap::new()
            }
        };

        debug!("Loaded {} links from {}", links.len(), path.display());
        Self {
            path,
            links,
            flushes: 0,
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current records.
    pub fn links(&self) -> &LinkMap {
        &self.links
    }

    /// Number of stored links.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Returns true when the store holds no links.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Returns true if `url` is stored.
    pub fn contains(&self, url: &str) -> bool {
        self.links.contains_key(url)
    }

    /// Number of times the file was written by this instance.
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    /// Union of `existing` and `incoming`; existing records win on conflict.
    ///
    /// Returns the merged map and how many urls `incoming` added.
    pub fn merge(existing: &LinkMap, incoming: &LinkMap) -> (LinkMap, usize) {
        let mut merged = existing.clone();
        let added = Self::merge_into(&mut merged, incoming);
        (merged, added)
    }

    fn merge_into(target: &mut LinkMap, incoming: &LinkMap) -> usize {
        let mut added = 0;
        for (url, record) in incoming {
            if !target.contains_key(url) {
                target.insert(url.clone(), record.clone());
                added += 1;
            }
        }
        added
    }

    /// Merges `incoming` into the live store and writes it back.
    ///
    /// Nothing is written when no url was added and the file exists.
    /// Returns the number of urls added.
    pub fn merge_and_persist(&mut self, incoming: &LinkMap) -> Result<usize> {
        let added = Self::merge_into(&mut self.links, incoming);
        if added > 0 || !self.path.exists() {
            self.flush()?;
        }
        Ok(added)
    }

    /// Rebuilds the live store as `snapshot ∪ incoming ∪ live` and writes it
    /// back, earlier sources winning on conflict.
    ///
    /// Used for the end-of-run merge against the pre-run snapshot. Links that
    /// only reached the live store (pages persisted by a task that later
    /// crashed) are kept. Nothing is written when the result equals what is
    /// already stored on disk. Returns the number of urls not in `snapshot`.
    pub fn persist_merged(&mut self, snapshot: &LinkMap, incoming: &LinkMap) -> Result<usize> {
        let (mut merged, _) = Self::merge(snapshot, incoming);
        Self::merge_into(&mut merged, &self.links);
        let added = merged.keys().filter(|url| !snapshot.contains_key(*url)).count();
        if merged != self.links || !self.path.exists() {
            self.links = merged;
            self.flush()?;
        }
        Ok(added)
    }

    /// Writes the whole map atomically, creating parent directories.
    pub fn flush(&mut self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, &self.links)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| DorkError::Io(e.error))?;

        self.flushes += 1;
        debug!("Persisted {} links to {}", self.links.len(), self.path.display());
        Ok(())
    }
}
