/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The manifest: one revlog, fixed at `00manifest`, whose entries are
//! directory snapshots (spec.md §4.2, §3.1 "Manifest").
//!
//! A manifest's text format is a sorted, newline-terminated list of
//! `path \0 hex-filenode flag-char` lines, flag being empty, `x`
//! (executable), or `l` (symlink). Sortedness falls out of storing
//! entries in a `BTreeMap<RepoPath, _>`, which iterates in `RepoPath`'s
//! `Ord` (lexicographic byte) order.

use std::collections::BTreeMap;
use std::ops::Deref;
use std::ops::DerefMut;
use std::path::Path;

use config::Config;
use lock::Transaction;
use types::FileFlag;
use types::Node;
use types::RepoPath;
use types::Rev;

use crate::error::RevlogError;
use crate::error::Result;
use crate::payload::RevlogPayload;
use crate::revlog::Revlog;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ManifestEntry {
    pub filenode: Node,
    pub flag: FileFlag,
}

pub type ManifestMap = BTreeMap<RepoPath, ManifestEntry>;

impl RevlogPayload for ManifestMap {
    fn decode(raw: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(raw)
            .map_err(|e| RevlogError::Payload(format!("manifest is not utf8: {e}")))?;
        let mut map = BTreeMap::new();
        for line in text.split('\n') {
            if line.is_empty() {
                continue;
            }
            let (path_str, rest) = line
                .split_once('\0')
                .ok_or_else(|| RevlogError::Payload(format!("manifest line missing NUL: {line:?}")))?;
            if rest.len() < types::NODE_BYTES * 2 {
                return Err(RevlogError::Payload(format!(
                    "manifest line filenode too short: {line:?}"
                )));
            }
            let (hex, flag_str) = rest.split_at(types::NODE_BYTES * 2);
            let filenode = Node::from_hex(hex)
                .map_err(|e| RevlogError::Payload(format!("bad filenode in manifest: {e}")))?;
            let flag = FileFlag::from_char(flag_str.chars().next())
                .ok_or_else(|| RevlogError::Payload(format!("bad flag char in manifest: {flag_str:?}")))?;
            let path = RepoPath::new(path_str)
                .map_err(|e| RevlogError::Payload(format!("bad path in manifest: {e}")))?;
            map.insert(path, ManifestEntry { filenode, flag });
        }
        Ok(map)
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = String::new();
        for (path, entry) in self.iter() {
            out.push_str(path.as_str());
            out.push('\0');
            out.push_str(&entry.filenode.to_hex());
            if let Some(c) = entry.flag.as_char() {
                out.push(c);
            }
            out.push('\n');
        }
        out.into_bytes()
    }
}

/// The difference between two manifests (spec.md §4.2, `diff(node_a,
/// node_b)`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ManifestDiff {
    pub added: Vec<(RepoPath, ManifestEntry)>,
    pub removed: Vec<RepoPath>,
    pub changed: Vec<(RepoPath, ManifestEntry, ManifestEntry)>,
}

pub struct Manifest(Revlog<ManifestMap>);

impl Manifest {
    pub fn open(store_dir: &Path, config: &Config) -> Result<Self> {
        Ok(Manifest(Revlog::open(store_dir, "00manifest", config)?))
    }

    /// Appends a new manifest snapshot, returning its node.
    pub fn add(
        &mut self,
        txn: &mut Transaction,
        entries: &ManifestMap,
        link_rev: Rev,
        p1: Rev,
        p2: Rev,
    ) -> Result<Node> {
        let rev = self.0.append(txn, p1, p2, link_rev, entries)?;
        Ok(self.0.node(rev))
    }

    pub fn read(&mut self, node: &Node) -> Result<ManifestMap> {
        let rev = self
            .0
            .rev_for_node(node)
            .ok_or_else(|| RevlogError::NoSuchNode(*node))?;
        self.0.read(rev)
    }

    /// Computes the difference between two already-decoded manifests, as
    /// plain in-memory map comparison (spec.md SPEC_FULL §4.2: "without
    /// rebuilding maps when possible" — the maps are already built by
    /// the time this is called, so the diff never re-reads the revlog).
    pub fn diff(a: &ManifestMap, b: &ManifestMap) -> ManifestDiff {
        let mut diff = ManifestDiff::default();
        for (path, entry_b) in b.iter() {
            match a.get(path) {
                None => diff.added.push((path.clone(), *entry_b)),
                Some(entry_a) if entry_a != entry_b => {
                    diff.changed.push((path.clone(), *entry_a, *entry_b))
                }
                Some(_) => {}
            }
        }
        for path in a.keys() {
            if !b.contains_key(path) {
                diff.removed.push(path.clone());
            }
        }
        diff
    }
}

impl Deref for Manifest {
    type Target = Revlog<ManifestMap>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Manifest {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::NULL_REV;

    fn entry(byte: u8, flag: FileFlag) -> ManifestEntry {
        ManifestEntry {
            filenode: Node::from_bytes([byte; types::NODE_BYTES]),
            flag,
        }
    }

    #[test]
    fn manifest_map_round_trips() {
        let mut map = ManifestMap::new();
        map.insert(RepoPath::new("a").unwrap(), entry(1, FileFlag::Regular));
        map.insert(RepoPath::new("b/c").unwrap(), entry(2, FileFlag::Executable));
        map.insert(RepoPath::new("z").unwrap(), entry(3, FileFlag::Symlink));

        let encoded = map.encode();
        let decoded = ManifestMap::decode(&encoded).unwrap();
        assert_eq!(decoded, map);
    }

    #[test]
    fn diff_reports_added_removed_and_changed() {
        let mut a = ManifestMap::new();
        a.insert(RepoPath::new("keep").unwrap(), entry(1, FileFlag::Regular));
        a.insert(RepoPath::new("gone").unwrap(), entry(2, FileFlag::Regular));
        a.insert(RepoPath::new("change").unwrap(), entry(3, FileFlag::Regular));

        let mut b = ManifestMap::new();
        b.insert(RepoPath::new("keep").unwrap(), entry(1, FileFlag::Regular));
        b.insert(RepoPath::new("change").unwrap(), entry(4, FileFlag::Executable));
        b.insert(RepoPath::new("new").unwrap(), entry(5, FileFlag::Regular));

        let diff = Manifest::diff(&a, &b);
        assert_eq!(diff.added, vec![(RepoPath::new("new").unwrap(), entry(5, FileFlag::Regular))]);
        assert_eq!(diff.removed, vec![RepoPath::new("gone").unwrap()]);
        assert_eq!(
            diff.changed,
            vec![(
                RepoPath::new("change").unwrap(),
                entry(3, FileFlag::Regular),
                entry(4, FileFlag::Executable)
            )]
        );
    }

    #[test]
    fn add_and_read_round_trip_through_the_revlog() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::builder().build();
        let journal = dir.path().join("journal");
        let mut manifest = Manifest::open(dir.path(), &config).unwrap();

        let mut map = ManifestMap::new();
        map.insert(RepoPath::new("a").unwrap(), entry(9, FileFlag::Regular));

        let mut txn = Transaction::begin(&journal).unwrap();
        let node = manifest.add(&mut txn, &map, Rev::from(0usize), NULL_REV, NULL_REV).unwrap();
        txn.commit().unwrap();

        let read_back = manifest.read(&node).unwrap();
        assert_eq!(read_back, map);
    }
}
