/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The persisted mergestate: `unresolved -> resolved` per path, so a
//! merge can be interrupted and resumed across process restarts (spec.md
//! §4.6).

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use types::Node;
use types::RepoPath;

use crate::error::MergeError;
use crate::error::Result;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MergeRecord {
    pub local: Option<Node>,
    pub other: Option<Node>,
    pub base: Option<Node>,
    pub resolved: bool,
}

/// The in-progress (or just-finished) merge's state, keyed by path.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct MergeState {
    entries: BTreeMap<RepoPath, MergeRecord>,
}

impl MergeState {
    pub fn new() -> Self {
        MergeState::default()
    }

    /// Adds a path as unresolved, with the node identities a merge tool
    /// (or a future `resolve`/`unresolve` call) needs to redo the merge.
    pub fn add_unresolved(
        &mut self,
        path: RepoPath,
        local: Option<Node>,
        other: Option<Node>,
        base: Option<Node>,
    ) {
        self.entries.insert(
            path,
            MergeRecord {
                local,
                other,
                base,
                resolved: false,
            },
        );
    }

    pub fn mark_resolved(&mut self, path: &RepoPath) -> Result<()> {
        let record = self
            .entries
            .get_mut(path)
            .ok_or_else(|| MergeError::NoSuchPath(path.clone()))?;
        record.resolved = true;
        Ok(())
    }

    pub fn mark_unresolved(&mut self, path: &RepoPath) -> Result<()> {
        let record = self
            .entries
            .get_mut(path)
            .ok_or_else(|| MergeError::NoSuchPath(path.clone()))?;
        record.resolved = false;
        Ok(())
    }

    pub fn is_resolved(&self, path: &RepoPath) -> Option<bool> {
        self.entries.get(path).map(|r| r.resolved)
    }

    pub fn unresolved_paths(&self) -> Vec<RepoPath> {
        self.entries
            .iter()
            .filter(|(_, r)| !r.resolved)
            .map(|(p, _)| p.clone())
            .collect()
    }

    pub fn entries(&self) -> &BTreeMap<RepoPath, MergeRecord> {
        &self.entries
    }

    /// Refuses a commit while any path remains unresolved (spec.md
    /// §4.6, "A commit is refused while any path is unresolved").
    pub fn ensure_resolved(&self) -> Result<()> {
        let unresolved = self.unresolved_paths();
        if unresolved.is_empty() {
            Ok(())
        } else {
            Err(MergeError::UnresolvedConflicts(unresolved))
        }
    }

    /// Loads the mergestate file at `path`, or `None` if no merge is in
    /// progress (the file doesn't exist).
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(MergeError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let state = serde_json::from_slice(&raw).map_err(|source| MergeError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(state))
    }

    /// Persists the mergestate atomically (temp file, rename), the same
    /// discipline the dirstate uses, so an interrupted write never
    /// leaves a half-written file behind.
    pub fn save(&self, path: &Path) -> Result<()> {
        let encoded = serde_json::to_vec_pretty(self).expect("MergeState serializes infallibly");
        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, &encoded).map_err(|source| MergeError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, path).map_err(|source| MergeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(?path, entries = self.entries.len(), "mergestate saved");
        Ok(())
    }

    /// Removes the mergestate file once the merge is fully resolved and
    /// committed.
    pub fn clear(path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(MergeError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rp(s: &str) -> RepoPath {
        RepoPath::new(s).unwrap()
    }

    #[test]
    fn commit_is_refused_while_a_path_is_unresolved() {
        let mut state = MergeState::new();
        state.add_unresolved(rp("a"), None, None, None);
        assert!(state.ensure_resolved().is_err());
        state.mark_resolved(&rp("a")).unwrap();
        assert!(state.ensure_resolved().is_ok());
    }

    #[test]
    fn resolving_an_unknown_path_errors() {
        let mut state = MergeState::new();
        assert!(matches!(
            state.mark_resolved(&rp("missing")),
            Err(MergeError::NoSuchPath(_))
        ));
    }

    #[test]
    fn save_and_load_round_trips_and_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mergestate");

        assert!(MergeState::load(&path).unwrap().is_none());

        let mut state = MergeState::new();
        state.add_unresolved(rp("a"), Some(Node::from_bytes([1u8; types::NODE_BYTES])), None, None);
        state.save(&path).unwrap();

        let reloaded = MergeState::load(&path).unwrap().unwrap();
        assert_eq!(reloaded, state);

        MergeState::clear(&path).unwrap();
        assert!(MergeState::load(&path).unwrap().is_none());
    }
}
