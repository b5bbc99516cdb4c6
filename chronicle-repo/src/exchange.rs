/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Push and pull (spec.md §4.9): ancestor-sampling discovery against a
//! peer, then a changegroup bundle carrying exactly what discovery
//! found missing. Transport front-ends (HTTP/SSH) are out of scope
//! (spec.md Non-goals); exchange here runs directly between two
//! in-process [`Repository`] values, the same seam a transport would
//! sit behind.

use std::collections::BTreeMap;

use anyhow::Result;
use changegroup::apply;
use changegroup::Bundle;
use changegroup::BundleVersion;
use changegroup::RevisionChunk;
use dag::Dag;
use lock::Transaction;
use pushkey::discover;
use pushkey::DiscoveryPeer;
use revlog::Filelog;
use types::Node;
use types::Rev;
use types::RepoPath;

use crate::commit::ensure_filelog_dir;
use crate::hooks;
use crate::Repository;

const SAMPLE_SIZE: usize = 50;
const MAX_ROUNDS: usize = 10;

impl DiscoveryPeer for Repository {
    fn heads(&self) -> Vec<Node> {
        Dag::new(&self.changelog).heads()
    }

    fn known(&self, sample: &[Node]) -> Vec<bool> {
        sample
            .iter()
            .map(|n| n.is_null() || self.changelog.rev_for_node(n).is_some())
            .collect()
    }
}

impl Repository {
    /// Sends every changeset `remote` is missing, as judged by
    /// discovery against `remote`'s heads.
    pub fn push(&mut self, remote: &mut Repository) -> Result<Vec<Node>> {
        exchange(self, remote)
    }

    /// Fetches every changeset this repository is missing from `remote`.
    pub fn pull(&mut self, remote: &mut Repository) -> Result<Vec<Node>> {
        exchange(remote, self)
    }
}

fn exchange(source: &mut Repository, dest: &mut Repository) -> Result<Vec<Node>> {
    let dag = Dag::new(&source.changelog);
    let local_heads = dag.heads();
    let mut rng = rand::thread_rng();
    let discovery = discover(&dag, &local_heads, dest, SAMPLE_SIZE, MAX_ROUNDS, &mut rng)?;
    if discovery.missing.is_empty() {
        return Ok(Vec::new());
    }

    let mut revs: Vec<Rev> = discovery
        .missing
        .iter()
        .filter_map(|n| source.changelog.rev_for_node(n))
        .collect();
    revs.sort();

    let bundle = build_bundle(source, &revs)?;
    apply_bundle(dest, &bundle)
}

fn full_chunk(node: Node, p1: Node, p2: Node, linknode: Node, raw: &[u8]) -> RevisionChunk {
    let hunks = revlog::compute_patch(&[], raw);
    RevisionChunk {
        node,
        p1,
        p2,
        linknode,
        base_node: None,
        delta: revlog::encode_hunks(&hunks),
    }
}

/// Builds a bundle carrying exactly `revs` (source changelog revisions,
/// ascending), every manifest snapshot they reference, and every file
/// revision they introduced. Every chunk deltas against the null node
/// rather than chasing a minimal delta chain: `source` already stores
/// its own history compactly, and a bundle only has to let the receiver
/// reconstruct full content, not store it efficiently in flight.
fn build_bundle(source: &mut Repository, revs: &[Rev]) -> Result<Bundle> {
    let mut changelog_chunks = Vec::with_capacity(revs.len());
    let mut manifest_chunks = Vec::with_capacity(revs.len());
    let mut file_chunks: BTreeMap<RepoPath, Vec<RevisionChunk>> = BTreeMap::new();

    for &rev in revs {
        let node = source.changelog.node(rev);
        let (p1n, p2n) = source.changelog.parent_nodes(rev);
        let raw = source.changelog.raw_revision(rev)?;
        changelog_chunks.push(full_chunk(node, p1n, p2n, node, &raw));

        let changeset = source.changelog.read(rev)?;
        let manifest_rev = source
            .manifest
            .rev_for_node(&changeset.manifest_node)
            .ok_or(changegroup::ChangegroupError::UnknownBase(changeset.manifest_node))?;
        let (mp1n, mp2n) = source.manifest.parent_nodes(manifest_rev);
        let manifest_raw = source.manifest.raw_revision(manifest_rev)?;
        manifest_chunks.push(full_chunk(changeset.manifest_node, mp1n, mp2n, node, &manifest_raw));

        let manifest_map = source.manifest.read(&changeset.manifest_node)?;
        for path in &changeset.files {
            let Some(entry) = manifest_map.get(path) else {
                continue;
            };
            let mut filelog = Filelog::open(&source.paths.store_dir, path, &source.config)?;
            let Some(file_rev) = filelog.rev_for_node(&entry.filenode) else {
                continue;
            };
            if filelog.link_rev(file_rev) != rev {
                // Already sent as part of an earlier changeset in this range.
                continue;
            }
            let (fp1n, fp2n) = filelog.parent_nodes(file_rev);
            let raw_file = filelog.raw_revision(file_rev)?;
            file_chunks
                .entry(path.clone())
                .or_default()
                .push(full_chunk(entry.filenode, fp1n, fp2n, node, &raw_file));
        }
    }

    Ok(Bundle {
        version: BundleVersion::V2,
        changelog: changelog_chunks,
        manifest: manifest_chunks,
        files: file_chunks.into_iter().collect(),
    })
}

fn apply_bundle(dest: &mut Repository, bundle: &Bundle) -> Result<Vec<Node>> {
    let store_dir = dest.paths.store_dir.clone();
    let config = dest.config.clone();
    let mut txn = Transaction::begin(&dest.paths.journal)?;

    let applied = apply(bundle, &mut dest.changelog, &mut dest.manifest, &mut txn, |p| {
        ensure_filelog_dir(&store_dir, p)
            .map_err(|e| changegroup::ChangegroupError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        Ok(Filelog::open(&store_dir, p, &config)?)
    })?;

    if let Err(e) = hooks::fire_blocking(&dest.config, &dest.paths.root, "pretxnchangegroup", None) {
        txn.abort()?;
        return Err(e);
    }
    txn.commit()?;

    let _ = hooks::fire(&dest.config, &dest.paths.root, "changegroup", None);
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::CommitRequest;
    use matcher::AlwaysMatcher;

    #[test]
    fn push_carries_new_changesets_to_the_remote() {
        let local_dir = tempfile::tempdir().unwrap();
        let remote_dir = tempfile::tempdir().unwrap();
        let mut local = Repository::init(local_dir.path()).unwrap();
        let mut remote = Repository::init(remote_dir.path()).unwrap();

        std::fs::write(local_dir.path().join("a.txt"), b"hello").unwrap();
        local
            .dirstate_mut()
            .set(RepoPath::new("a.txt").unwrap(), dirstate::DirstateEntry::added(None));
        let node = local
            .commit(CommitRequest {
                matcher: &AlwaysMatcher,
                user: "alice".into(),
                time: 0,
                tz_offset: 0,
                message: "initial".into(),
            })
            .unwrap();

        let pushed = local.push(&mut remote).unwrap();
        assert_eq!(pushed, vec![node]);
        assert!(remote.changelog_len() >= 1);
    }
}
