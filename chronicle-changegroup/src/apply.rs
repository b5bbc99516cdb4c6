/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Apply semantics (spec.md §4.7): decode each chunk, materialize the
//! full revision against its delta base, verify the hash, and append to
//! the target revlog inside a single transaction. Files and the
//! manifest are applied first; changelog chunks are applied **last**,
//! matching the transaction's own durability barrier (spec.md §4.4:
//! "the changelog is extended last within a transaction").

use std::collections::HashMap;

use lock::Transaction;
use revlog::Changelog;
use revlog::Filelog;
use revlog::Manifest;
use revlog::ManifestMap;
use revlog::RevlogPayload;
use types::Node;
use types::RepoPath;
use types::Rev;
use types::NULL_REV;

use crate::bundle::Bundle;
use crate::error::ChangegroupError;
use crate::error::Result;
use crate::revision::BundleVersion;
use crate::revision::RevisionChunk;

fn resolve_rev<P: RevlogPayload>(revlog: &revlog::Revlog<P>, node: &Node) -> Result<Rev> {
    if node.is_null() {
        return Ok(NULL_REV);
    }
    revlog
        .rev_for_node(node)
        .ok_or(ChangegroupError::UnknownBase(*node))
}

fn materialize<P: RevlogPayload>(
    revlog: &mut revlog::Revlog<P>,
    cache: &HashMap<Node, Vec<u8>>,
    node: &Node,
) -> Result<Vec<u8>> {
    if node.is_null() {
        return Ok(Vec::new());
    }
    if let Some(content) = cache.get(node) {
        return Ok(content.clone());
    }
    let rev = resolve_rev(revlog, node)?;
    Ok(revlog.raw_revision(rev)?)
}

fn resolve_linknode(node: &Node, predicted: &HashMap<Node, Rev>, changelog: &Changelog) -> Result<Rev> {
    if node.is_null() {
        return Ok(NULL_REV);
    }
    if let Some(rev) = predicted.get(node) {
        return Ok(*rev);
    }
    changelog
        .rev_for_node(node)
        .ok_or(ChangegroupError::UnknownLinknode(*node))
}

/// Materializes one [`RevisionChunk`]'s full content against its delta
/// base, verifying the resulting node matches `chunk.node`.
fn materialize_and_verify<P: RevlogPayload>(
    version: BundleVersion,
    revlog: &mut revlog::Revlog<P>,
    cache: &HashMap<Node, Vec<u8>>,
    prev: &[u8],
    chunk: &RevisionChunk,
) -> Result<Vec<u8>> {
    let base_content = match version {
        BundleVersion::V1 => prev.to_vec(),
        BundleVersion::V2 => {
            materialize(revlog, cache, &chunk.base_node.unwrap_or(types::NULL_NODE))?
        }
    };
    let hunks = revlog::decode_hunks(&chunk.delta)?;
    let raw = revlog::apply_patch(&base_content, &hunks)?;
    let computed = Node::compute(&chunk.p1, &chunk.p2, &raw);
    if computed != chunk.node {
        return Err(ChangegroupError::HashMismatch {
            node: chunk.node,
            computed,
        });
    }
    Ok(raw)
}

/// Applies every file section's revisions, opening each path's filelog
/// through `open_filelog` (decoupling this crate from how the caller
/// lays out the store, the same seam `chronicle-dirstate` uses for file
/// content).
fn apply_files(
    bundle: &Bundle,
    predicted_changelog: &HashMap<Node, Rev>,
    changelog: &Changelog,
    txn: &mut Transaction,
    mut open_filelog: impl FnMut(&RepoPath) -> Result<Filelog>,
) -> Result<()> {
    for (path, revisions) in &bundle.files {
        let mut filelog = open_filelog(path)?;
        let mut cache: HashMap<Node, Vec<u8>> = HashMap::new();
        let mut prev = Vec::new();
        for chunk in revisions {
            let raw = materialize_and_verify(bundle.version, &mut filelog, &cache, &prev, chunk)?;
            if filelog.rev_for_node(&chunk.node).is_none() {
                let p1_rev = resolve_rev(&filelog, &chunk.p1)?;
                let p2_rev = resolve_rev(&filelog, &chunk.p2)?;
                let link_rev = resolve_linknode(&chunk.linknode, predicted_changelog, changelog)?;
                let (metadata, content) = revlog::parse_meta_header(&raw);
                filelog.add(txn, content.to_vec(), metadata, link_rev, p1_rev, p2_rev)?;
            }
            cache.insert(chunk.node, raw.clone());
            prev = raw;
        }
    }
    Ok(())
}

fn apply_manifest(
    bundle: &Bundle,
    predicted_changelog: &HashMap<Node, Rev>,
    changelog: &Changelog,
    manifest: &mut Manifest,
    txn: &mut Transaction,
) -> Result<()> {
    let mut cache: HashMap<Node, Vec<u8>> = HashMap::new();
    let mut prev = Vec::new();
    for chunk in &bundle.manifest {
        let raw = materialize_and_verify(bundle.version, manifest, &cache, &prev, chunk)?;
        if manifest.rev_for_node(&chunk.node).is_none() {
            let p1_rev = resolve_rev(manifest, &chunk.p1)?;
            let p2_rev = resolve_rev(manifest, &chunk.p2)?;
            let link_rev = resolve_linknode(&chunk.linknode, predicted_changelog, changelog)?;
            let entries = ManifestMap::decode(&raw)?;
            manifest.add(txn, &entries, link_rev, p1_rev, p2_rev)?;
        }
        cache.insert(chunk.node, raw.clone());
        prev = raw;
    }
    Ok(())
}

fn apply_changelog(bundle: &Bundle, changelog: &mut Changelog, txn: &mut Transaction) -> Result<Vec<Node>> {
    let mut cache: HashMap<Node, Vec<u8>> = HashMap::new();
    let mut prev = Vec::new();
    let mut applied = Vec::with_capacity(bundle.changelog.len());
    for chunk in &bundle.changelog {
        let raw = materialize_and_verify(bundle.version, changelog, &cache, &prev, chunk)?;
        if changelog.rev_for_node(&chunk.node).is_none() {
            let p1_rev = resolve_rev(changelog, &chunk.p1)?;
            let p2_rev = resolve_rev(changelog, &chunk.p2)?;
            let decoded = revlog::Changeset::decode(&raw)?;
            changelog.commit(
                txn,
                decoded.manifest_node,
                decoded.files,
                decoded.user,
                decoded.time,
                decoded.tz_offset,
                decoded.message,
                p1_rev,
                p2_rev,
                decoded.extras,
            )?;
            applied.push(chunk.node);
        }
        cache.insert(chunk.node, raw.clone());
        prev = raw;
    }
    Ok(applied)
}

/// Applies a whole bundle inside `txn`: files, then the manifest, then
/// the changelog. Returns the nodes of every changeset actually added,
/// in bundle order. Every chunk whose node is already present in its
/// destination revlog is skipped rather than re-appended, so applying
/// the same bundle twice is a no-op the second time. The caller owns
/// committing or aborting `txn`.
pub fn apply(
    bundle: &Bundle,
    changelog: &mut Changelog,
    manifest: &mut Manifest,
    txn: &mut Transaction,
    open_filelog: impl FnMut(&RepoPath) -> Result<Filelog>,
) -> Result<Vec<Node>> {
    let base_rev = changelog.len();
    let mut predicted_changelog = HashMap::new();
    for (i, chunk) in bundle.changelog.iter().enumerate() {
        predicted_changelog.insert(chunk.node, Rev::from(base_rev + i));
    }

    apply_files(bundle, &predicted_changelog, changelog, txn, open_filelog)?;
    apply_manifest(bundle, &predicted_changelog, changelog, manifest, txn)?;
    apply_changelog(bundle, changelog, txn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::Config;
    use types::NULL_NODE;

    fn open_store(dir: &std::path::Path) -> (Config, Changelog, Manifest) {
        let config = Config::builder().build();
        let changelog = Changelog::open(dir, &config).unwrap();
        let manifest = Manifest::open(dir, &config).unwrap();
        (config, changelog, manifest)
    }

    /// Builds a one-commit bundle (one file, one manifest snapshot, one
    /// changeset) the way a real sender would: hash-chained, each
    /// section's lone chunk deltaing against the null node.
    fn single_commit_bundle(path: &RepoPath, content: &[u8]) -> (Bundle, Node) {
        let file_node = Node::compute(&NULL_NODE, &NULL_NODE, content);
        let file_hunks = revlog::compute_patch(&[], content);
        let file_chunk = RevisionChunk {
            node: file_node,
            p1: NULL_NODE,
            p2: NULL_NODE,
            linknode: Node::from_bytes([0xAAu8; types::NODE_BYTES]),
            base_node: None,
            delta: revlog::encode_hunks(&file_hunks),
        };

        let mut entries = std::collections::BTreeMap::new();
        entries.insert(
            path.clone(),
            revlog::ManifestEntry {
                filenode: file_node,
                flag: types::FileFlag::Regular,
            },
        );
        let manifest_raw = ManifestMap::encode(&entries);
        let manifest_node = Node::compute(&NULL_NODE, &NULL_NODE, &manifest_raw);
        let manifest_hunks = revlog::compute_patch(&[], &manifest_raw);
        let manifest_chunk = RevisionChunk {
            node: manifest_node,
            p1: NULL_NODE,
            p2: NULL_NODE,
            linknode: Node::from_bytes([0xAAu8; types::NODE_BYTES]),
            base_node: None,
            delta: revlog::encode_hunks(&manifest_hunks),
        };

        let changeset = revlog::Changeset {
            manifest_node,
            user: "alice".into(),
            time: 1_700_000_000,
            tz_offset: 0,
            extras: std::collections::BTreeMap::new(),
            files: vec![path.clone()],
            message: "initial".into(),
        };
        let changeset_raw = changeset.encode();
        let changelog_node = Node::compute(&NULL_NODE, &NULL_NODE, &changeset_raw);
        let changelog_hunks = revlog::compute_patch(&[], &changeset_raw);
        let changelog_chunk = RevisionChunk {
            node: changelog_node,
            p1: NULL_NODE,
            p2: NULL_NODE,
            linknode: changelog_node,
            base_node: None,
            delta: revlog::encode_hunks(&changelog_hunks),
        };

        (
            Bundle {
                version: BundleVersion::V2,
                changelog: vec![changelog_chunk],
                manifest: vec![manifest_chunk],
                files: vec![(path.clone(), vec![file_chunk])],
            },
            changelog_node,
        )
    }

    #[test]
    fn applies_a_single_commit_bundle_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let (config, mut changelog, mut manifest) = open_store(dir.path());
        let journal = dir.path().join("journal");

        let path = RepoPath::new("greeting.txt").unwrap();
        let (bundle, expected_node) = single_commit_bundle(&path, b"hello\n");

        let mut txn = Transaction::begin(&journal).unwrap();
        let applied = apply(&bundle, &mut changelog, &mut manifest, &mut txn, |p| {
            Ok(Filelog::open(dir.path(), p, &config).unwrap())
        })
        .unwrap();
        txn.commit().unwrap();

        assert_eq!(applied, vec![expected_node]);
        assert_eq!(changelog.len(), 1);
        assert_eq!(manifest.len(), 1);

        let mut filelog = Filelog::open(dir.path(), &path, &config).unwrap();
        let manifest_node = manifest.node(Rev::from(0usize));
        let file_node = manifest.read(&manifest_node).unwrap()[&path].filenode;
        assert_eq!(filelog.read_content(&file_node).unwrap(), b"hello\n");
    }

    #[test]
    fn applying_the_same_bundle_twice_is_a_no_op_the_second_time() {
        let dir = tempfile::tempdir().unwrap();
        let (config, mut changelog, mut manifest) = open_store(dir.path());
        let journal = dir.path().join("journal");

        let path = RepoPath::new("greeting.txt").unwrap();
        let (bundle, expected_node) = single_commit_bundle(&path, b"hello\n");

        let mut txn = Transaction::begin(&journal).unwrap();
        let applied = apply(&bundle, &mut changelog, &mut manifest, &mut txn, |p| {
            Ok(Filelog::open(dir.path(), p, &config).unwrap())
        })
        .unwrap();
        txn.commit().unwrap();
        assert_eq!(applied, vec![expected_node]);
        assert_eq!(changelog.len(), 1);
        assert_eq!(manifest.len(), 1);

        let mut txn = Transaction::begin(&journal).unwrap();
        let applied_again = apply(&bundle, &mut changelog, &mut manifest, &mut txn, |p| {
            Ok(Filelog::open(dir.path(), p, &config).unwrap())
        })
        .unwrap();
        txn.commit().unwrap();

        assert!(applied_again.is_empty());
        assert_eq!(changelog.len(), 1);
        assert_eq!(manifest.len(), 1);

        let mut filelog = Filelog::open(dir.path(), &path, &config).unwrap();
        assert_eq!(filelog.len(), 1);
    }

    #[test]
    fn a_tampered_delta_fails_hash_verification() {
        let dir = tempfile::tempdir().unwrap();
        let (config, mut changelog, mut manifest) = open_store(dir.path());
        let journal = dir.path().join("journal");

        let path = RepoPath::new("greeting.txt").unwrap();
        let (mut bundle, _) = single_commit_bundle(&path, b"hello\n");
        bundle.files[0].1[0].delta = revlog::encode_hunks(&revlog::compute_patch(&[], b"tampered\n"));

        let mut txn = Transaction::begin(&journal).unwrap();
        let result = apply(&bundle, &mut changelog, &mut manifest, &mut txn, |p| {
            Ok(Filelog::open(dir.path(), p, &config).unwrap())
        });
        assert!(matches!(result, Err(ChangegroupError::HashMismatch { .. })));
    }
}
