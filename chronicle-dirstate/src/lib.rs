/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The dirstate: the working directory's parent pointers and per-path
//! tracked state (spec.md §4.3), plus the `status()` classification that
//! compares it against the actual working tree (spec.md §4.3, SPEC_FULL
//! §4.3 supplement).

mod codec;
mod entry;
mod error;

pub use entry::DirstateEntry;
pub use entry::DirstateState;
pub use error::DirstateError;
pub use error::Result;

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;
use types::Node;
use types::RepoPath;

use matcher::Matcher;

/// Supplies a tracked file's content at a given filenode, so `status()`
/// can fall back to a real comparison when a stat alone can't prove a
/// file clean. Implemented by the repository layer over its filelogs;
/// kept as a trait here so this crate never depends on the revlog store.
pub trait FileContentSource {
    fn read(&mut self, path: &RepoPath, node: &Node) -> std::io::Result<Vec<u8>>;
}

/// The working directory's recorded state.
pub struct Dirstate {
    p1: Node,
    p2: Node,
    entries: BTreeMap<RepoPath, DirstateEntry>,
}

/// The seven-way classification `status()` reports (SPEC_FULL §4.3
/// supplement; spec.md §4.3 names a subset, this is its full expansion).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Status {
    pub clean: Vec<RepoPath>,
    pub modified: Vec<RepoPath>,
    pub added: Vec<RepoPath>,
    pub removed: Vec<RepoPath>,
    pub deleted: Vec<RepoPath>,
    pub unknown: Vec<RepoPath>,
    pub ignored: Vec<RepoPath>,
}

impl Dirstate {
    pub fn empty() -> Self {
        Dirstate {
            p1: Node::default(),
            p2: Node::default(),
            entries: BTreeMap::new(),
        }
    }

    /// Reads a dirstate file, or returns the empty dirstate if none
    /// exists yet (a freshly initialized repository).
    pub fn open(path: &Path) -> Result<Self> {
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Dirstate::empty()),
            Err(source) => {
                return Err(DirstateError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let (p1, p2, entries) = codec::decode(path, &raw)?;
        Ok(Dirstate { p1, p2, entries })
    }

    /// Writes the dirstate atomically: a sibling temp file, fsync, then
    /// rename over the target (spec.md §4.3, "write to a temp file,
    /// fsync, rename").
    pub fn save(&self, path: &Path) -> Result<()> {
        let encoded = codec::encode(&self.p1, &self.p2, &self.entries);
        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, &encoded).map_err(|source| DirstateError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        {
            let file = std::fs::File::open(&tmp_path).map_err(|source| DirstateError::Io {
                path: tmp_path.clone(),
                source,
            })?;
            file.sync_all().map_err(|source| DirstateError::Io {
                path: tmp_path.clone(),
                source,
            })?;
        }
        std::fs::rename(&tmp_path, path).map_err(|source| DirstateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(?path, entries = self.entries.len(), "dirstate saved");
        Ok(())
    }

    pub fn parents(&self) -> (Node, Node) {
        (self.p1, self.p2)
    }

    pub fn set_parents(&mut self, p1: Node, p2: Node) {
        self.p1 = p1;
        self.p2 = p2;
    }

    pub fn entries(&self) -> &BTreeMap<RepoPath, DirstateEntry> {
        &self.entries
    }

    pub fn get(&self, path: &RepoPath) -> Option<&DirstateEntry> {
        self.entries.get(path)
    }

    pub fn set(&mut self, path: RepoPath, entry: DirstateEntry) {
        self.entries.insert(path, entry);
    }

    pub fn remove(&mut self, path: &RepoPath) -> Option<DirstateEntry> {
        self.entries.remove(path)
    }

    /// Compares the dirstate to the working directory rooted at `root`,
    /// scoped to `matcher`, filtering disk-only files through
    /// `ignore_matcher` (spec.md §4.3, SPEC_FULL §4.3 supplement).
    ///
    /// `manifest` maps each `p1`-tracked path to its filenode, so a
    /// stat-inconclusive `normal`/`merged` entry can be resolved by
    /// reading that revision's content through `content_source`.
    pub fn status<S: FileContentSource>(
        &self,
        root: &Path,
        manifest: &BTreeMap<RepoPath, Node>,
        matcher: &dyn Matcher,
        ignore_matcher: &dyn Matcher,
        content_source: &mut S,
        skip_dirs: &[&str],
    ) -> std::io::Result<Status> {
        let mut status = Status::default();

        for (path, entry) in &self.entries {
            if !matcher.matches(path) {
                continue;
            }
            self.classify_tracked(root, path, entry, manifest, content_source, &mut status)?;
        }

        for candidate in matcher::walk_working_dir(root, skip_dirs) {
            if self.entries.contains_key(&candidate) || !matcher.matches(&candidate) {
                continue;
            }
            if ignore_matcher.matches(&candidate) {
                status.ignored.push(candidate);
            } else {
                status.unknown.push(candidate);
            }
        }

        Ok(status)
    }

    fn classify_tracked<S: FileContentSource>(
        &self,
        root: &Path,
        path: &RepoPath,
        entry: &DirstateEntry,
        manifest: &BTreeMap<RepoPath, Node>,
        content_source: &mut S,
        status: &mut Status,
    ) -> std::io::Result<()> {
        if entry.state == DirstateState::Removed {
            status.removed.push(path.clone());
            return Ok(());
        }

        let full_path = root.join(path.as_str());
        let metadata = match std::fs::metadata(&full_path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                status.deleted.push(path.clone());
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if entry.state == DirstateState::Added {
            status.added.push(path.clone());
            return Ok(());
        }

        let (size, mtime) = stat_size_and_mtime(&metadata);
        if entry.stat_matches(size, mtime) {
            status.clean.push(path.clone());
            return Ok(());
        }

        let Some(tracked_node) = manifest.get(path) else {
            status.modified.push(path.clone());
            return Ok(());
        };
        let disk_content = std::fs::read(&full_path)?;
        let tracked_content = content_source.read(path, tracked_node)?;
        if disk_content == tracked_content {
            status.clean.push(path.clone());
        } else {
            status.modified.push(path.clone());
        }
        Ok(())
    }
}

#[cfg(unix)]
fn stat_size_and_mtime(metadata: &std::fs::Metadata) -> (i32, i32) {
    use std::os::unix::fs::MetadataExt;
    (metadata.size() as i32, metadata.mtime() as i32)
}

#[cfg(not(unix))]
fn stat_size_and_mtime(metadata: &std::fs::Metadata) -> (i32, i32) {
    let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i32)
        .unwrap_or(entry::LOOKUP_MTIME);
    (metadata.len() as i32, mtime)
}
