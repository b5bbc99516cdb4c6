/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The revlog engine itself (spec.md §4.1): two files, `.i` (index) and
//! `.d` (data), or a single inline file when the revlog is small enough
//! that keeping data appended to the index halves the syscall count.
//!
//! Delta chain model: a revision names a `base_rev`, the snapshot that
//! starts its chain. Reconstructing revision `r` means decompressing
//! `base_rev`'s snapshot, then applying the patch stored at every index
//! position from `base_rev + 1` through `r` in order — each such
//! patch was computed against the *previous index position's*
//! reconstructed text when it was written, not against its own parent
//! revision. This is the classic, non-generaldelta revlog chain (see
//! `DESIGN.md` for why this implementation picked it over a per-revision
//! explicit delta-base field, which spec.md's fixed-width index record
//! does not have room for).

use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::marker::PhantomData;
use std::path::Path;
use std::path::PathBuf;

use config::Config;
use lock::Transaction;
use tracing::debug;
use tracing::trace;
use types::Node;
use types::Rev;
use types::NULL_NODE;
use types::NULL_REV;

use crate::compress;
use crate::delta;
use crate::error::RevlogError;
use crate::error::Result;
use crate::index::decode_record;
use crate::index::encode_record;
use crate::index::IndexRecord;
use crate::index::FLAG_INLINE;
use crate::index::FORMAT_VERSION;
use crate::index::RECORD_LEN;
use crate::payload::RevlogPayload;

/// Inline revlogs are converted to split `.i`/`.d` once their combined
/// size passes this many bytes (spec.md §4.1.3 point 5; the exact
/// threshold is explicitly an Open Question in spec.md §9 — "performance
/// tuning, not semantics"). 64 KiB matches the historical default.
pub const DEFAULT_INLINE_SPLIT_THRESHOLD: u64 = 64 * 1024;

/// A chain longer than this many revisions forces a fresh snapshot even
/// if the cumulative-size rule (§4.1.3 step 2) would not yet trigger
/// one, bounding worst-case read amplification.
pub const DEFAULT_MAX_CHAIN_DEPTH: u32 = 1000;

/// The cumulative chain / fresh-text size multiple at which a snapshot
/// is forced (spec.md §4.1.3 step 2: "~4x the uncompressed size").
pub const CHAIN_SIZE_MULTIPLE: u64 = 4;

struct MaterializeCache {
    rev: Rev,
    text: Vec<u8>,
}

/// The append-only delta-compressed revision log.
///
/// Generic over a [`RevlogPayload`] codec: the engine itself only reads
/// and writes raw bytes, and the codec interprets them, so the three
/// concrete revlogs (changelog, manifest, filelog) are just
/// instantiations of this type over three different codecs.
pub struct Revlog<P: RevlogPayload> {
    index_path: PathBuf,
    data_path: PathBuf,
    inline: bool,
    inline_split_threshold: u64,
    max_chain_depth: u32,
    records: Vec<IndexRecord>,
    node_to_rev: HashMap<Node, Rev>,
    /// For inline revlogs, the byte offset of each revision's data
    /// within the `.i` file (not stored on disk; recomputed on open by
    /// scanning sequentially, since the on-disk offset field is only
    /// meaningful for split revlogs).
    inline_offsets: Vec<u64>,
    cache: Option<MaterializeCache>,
    _marker: PhantomData<P>,
}

impl<P: RevlogPayload> Revlog<P> {
    /// Opens (creating if absent) the revlog `<dir>/<name>.i` /
    /// `<dir>/<name>.d`.
    pub fn open(dir: &Path, name: &str, config: &Config) -> Result<Self> {
        let index_path = dir.join(format!("{name}.i"));
        let data_path = dir.join(format!("{name}.d"));
        let inline_split_threshold = config
            .get_int_or(
                "revlog",
                "inline-split-threshold",
                DEFAULT_INLINE_SPLIT_THRESHOLD as i64,
            )
            .max(0) as u64;
        let max_chain_depth = config
            .get_int_or("revlog", "max-chain-depth", DEFAULT_MAX_CHAIN_DEPTH as i64)
            .max(1) as u32;

        if !index_path.exists() {
            return Ok(Revlog {
                index_path,
                data_path,
                inline: true,
                inline_split_threshold,
                max_chain_depth,
                records: Vec::new(),
                node_to_rev: HashMap::new(),
                inline_offsets: Vec::new(),
                cache: None,
                _marker: PhantomData,
            });
        }

        let bytes = std::fs::read(&index_path).map_err(|source| RevlogError::Io {
            path: index_path.clone(),
            source,
        })?;
        let mut records = Vec::new();
        let mut node_to_rev = HashMap::new();
        let mut inline_offsets = Vec::new();
        let mut inline = false;
        let mut cursor = 0usize;
        let mut rev_index = 0usize;

        while cursor + RECORD_LEN <= bytes.len() {
            let mut raw = [0u8; RECORD_LEN];
            raw.copy_from_slice(&bytes[cursor..cursor + RECORD_LEN]);
            let rev = Rev::from(rev_index);
            let (record, header) = decode_record(rev, &raw)?;
            cursor += RECORD_LEN;

            if rev_index == 0 {
                let header = header.expect("rev 0 always carries the header word");
                let version = header & !FLAG_INLINE;
                if version != FORMAT_VERSION {
                    return Err(RevlogError::UnsupportedVersion { version });
                }
                inline = header & FLAG_INLINE != 0;
            }

            if inline {
                inline_offsets.push(cursor as u64);
                cursor += record.compressed_len as usize;
            }

            node_to_rev.insert(record.node, rev);
            records.push(record);
            rev_index += 1;
        }

        Ok(Revlog {
            index_path,
            data_path,
            inline,
            inline_split_threshold,
            max_chain_depth,
            records,
            node_to_rev,
            inline_offsets,
            cache: None,
            _marker: PhantomData,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The highest-numbered revision, or `NULL_REV` for an empty revlog
    /// (spec.md §8.3, "Empty revlog").
    pub fn tip(&self) -> Rev {
        if self.records.is_empty() {
            NULL_REV
        } else {
            Rev::from(self.records.len() - 1)
        }
    }

    pub fn node(&self, rev: Rev) -> Node {
        if rev.is_null() {
            return NULL_NODE;
        }
        self.records[rev.as_usize().unwrap()].node
    }

    pub fn rev_for_node(&self, node: &Node) -> Option<Rev> {
        if node.is_null() {
            return Some(NULL_REV);
        }
        self.node_to_rev.get(node).copied()
    }

    pub fn link_rev(&self, rev: Rev) -> Rev {
        self.records[rev.as_usize().unwrap()].link_rev
    }

    /// Parents of `rev` as local revs. Parents of `NULL_REV` are
    /// `(NULL_REV, NULL_REV)` (spec.md §8.3).
    pub fn parents(&self, rev: Rev) -> (Rev, Rev) {
        match rev.as_usize() {
            None => (NULL_REV, NULL_REV),
            Some(idx) => (self.records[idx].p1_rev, self.records[idx].p2_rev),
        }
    }

    pub fn parent_nodes(&self, rev: Rev) -> (Node, Node) {
        let (p1, p2) = self.parents(rev);
        (self.node(p1), self.node(p2))
    }

    /// Revisions with no child (spec.md §4.5), ordered by descending
    /// rev.
    pub fn heads(&self) -> Vec<Rev> {
        let mut has_child = vec![false; self.records.len()];
        for record in &self.records {
            if let Some(idx) = record.p1_rev.as_usize() {
                has_child[idx] = true;
            }
            if let Some(idx) = record.p2_rev.as_usize() {
                has_child[idx] = true;
            }
        }
        let mut heads: Vec<Rev> = (0..self.records.len())
            .filter(|&i| !has_child[i])
            .map(Rev::from)
            .collect();
        heads.sort_by(|a, b| b.cmp(a));
        heads
    }

    /// Direct children of `rev`, ascending.
    pub fn children(&self, rev: Rev) -> Vec<Rev> {
        let mut out = Vec::new();
        for (idx, record) in self.records.iter().enumerate() {
            if record.p1_rev == rev || record.p2_rev == rev {
                out.push(Rev::from(idx));
            }
        }
        out
    }

    /// All descendants of any of `roots`, excluding the roots
    /// themselves, ascending.
    pub fn descendants(&self, roots: &[Rev]) -> Vec<Rev> {
        let mut is_descendant = vec![false; self.records.len()];
        let root_set: HashSet<Rev> = roots.iter().copied().collect();
        for (idx, record) in self.records.iter().enumerate() {
            let rev = Rev::from(idx);
            if root_set.contains(&rev) {
                continue;
            }
            let ancestor_is_marked = |r: Rev| -> bool {
                r.as_usize()
                    .map(|i| is_descendant[i] || root_set.contains(&r))
                    .unwrap_or(false)
            };
            if ancestor_is_marked(record.p1_rev) || ancestor_is_marked(record.p2_rev) {
                is_descendant[idx] = true;
            }
        }
        (0..self.records.len())
            .filter(|&i| is_descendant[i])
            .map(Rev::from)
            .collect()
    }

    /// All ancestors of `rev` (inclusive), via a simple backward walk.
    fn ancestor_set(&self, rev: Rev) -> HashSet<Rev> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        if !rev.is_null() {
            queue.push_back(rev);
        }
        while let Some(r) = queue.pop_front() {
            if !seen.insert(r) {
                continue;
            }
            let (p1, p2) = self.parents(r);
            if !p1.is_null() {
                queue.push_back(p1);
            }
            if !p2.is_null() {
                queue.push_back(p2);
            }
        }
        seen
    }

    /// One lowest common ancestor of `a` and `b`: the common ancestor
    /// with the highest rev number among those with no descendant that
    /// is itself a common ancestor (spec.md §4.1.4).
    pub fn ancestor(&self, a: Rev, b: Rev) -> Rev {
        let ancestors_a = self.ancestor_set(a);
        let ancestors_b = self.ancestor_set(b);
        let mut common: Vec<Rev> = ancestors_a.intersection(&ancestors_b).copied().collect();
        if common.is_empty() {
            return NULL_REV;
        }
        common.sort();
        // The highest-numbered common ancestor is always maximal
        // (nothing with a higher rev and all-common-ancestor parents
        // can be its own descendant and still be common), because revs
        // are topologically ordered (spec.md §3.2 invariant 1).
        *common.last().unwrap()
    }

    /// Every rev reachable from any root and an ancestor of some head,
    /// plus the roots and heads themselves (spec.md §4.5).
    pub fn nodesbetween(&self, roots: &[Rev], heads: &[Rev]) -> Vec<Rev> {
        let root_ancestry: HashSet<Rev> = roots
            .iter()
            .flat_map(|&r| self.ancestor_set(r))
            .collect();
        let mut out = HashSet::new();
        for &head in heads {
            for rev in self.ancestor_set(head) {
                if root_ancestry.contains(&rev) || roots.contains(&rev) {
                    out.insert(rev);
                }
            }
            out.insert(head);
        }
        for &root in roots {
            out.insert(root);
        }
        let mut out: Vec<Rev> = out.into_iter().collect();
        out.sort();
        out
    }

    fn data_offset_and_len(&self, rev: Rev) -> (u64, u32) {
        let idx = rev.as_usize().unwrap();
        let record = &self.records[idx];
        if self.inline {
            (self.inline_offsets[idx], record.compressed_len)
        } else {
            (record.offset, record.compressed_len)
        }
    }

    fn read_raw_chunk(&self, rev: Rev) -> Result<Vec<u8>> {
        let (offset, len) = self.data_offset_and_len(rev);
        let path = if self.inline {
            &self.index_path
        } else {
            &self.data_path
        };
        let mut file = File::open(path).map_err(|source| RevlogError::Io {
            path: path.clone(),
            source,
        })?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|source| RevlogError::Io {
                path: path.clone(),
                source,
            })?;
        let mut buf = vec![0u8; len as usize];
        file.read_exact(&mut buf).map_err(|source| RevlogError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(buf)
    }

    /// Reconstructs the full, uncompressed bytes of `rev` by walking
    /// its delta chain back to the nearest snapshot (spec.md §4.1.4,
    /// §8.1 property 3). The last materialized chain tip is cached to
    /// amortize sequential reads (spec.md §4.1.4: "implementations MUST
    /// cache the last materialized snapshot+chain").
    pub fn raw_revision(&mut self, rev: Rev) -> Result<Vec<u8>> {
        if rev.is_null() {
            return Ok(Vec::new());
        }
        let idx = rev.as_usize().ok_or(RevlogError::NoSuchRev(usize::MAX))?;
        if idx >= self.records.len() {
            return Err(RevlogError::NoSuchRev(idx));
        }

        if let Some(cache) = &self.cache {
            if cache.rev == rev {
                return Ok(cache.text.clone());
            }
        }

        let base_rev = self.records[idx].base_rev;
        let base_idx = base_rev.as_usize().ok_or(RevlogError::BrokenChain { rev: idx })?;

        let mut text = if let Some(cache) = &self.cache {
            if let Some(cache_idx) = cache.rev.as_usize() {
                if cache_idx >= base_idx && cache_idx < idx && self.records[cache_idx].base_rev == base_rev {
                    Some((cache_idx, cache.text.clone()))
                } else {
                    None
                }
            } else {
                None
            }
        } else {
            None
        };

        let (mut cursor, mut buf) = match text.take() {
            Some((cache_idx, cache_text)) => (cache_idx, cache_text),
            None => {
                let chunk = self.read_raw_chunk(base_rev)?;
                let buf = compress::unpack(&chunk)?;
                (base_idx, buf)
            }
        };

        while cursor < idx {
            cursor += 1;
            let next_rev = Rev::from(cursor);
            let chunk = self.read_raw_chunk(next_rev)?;
            let unpacked = compress::unpack(&chunk)?;
            if self.records[cursor].is_snapshot(next_rev) {
                buf = unpacked;
            } else {
                let hunks = delta::decode_hunks(&unpacked)?;
                buf = delta::apply_patch(&buf, &hunks)?;
            }
        }

        self.cache = Some(MaterializeCache {
            rev,
            text: buf.clone(),
        });
        Ok(buf)
    }

    /// Reconstructs and parses revision `rev` through the payload codec.
    pub fn read(&mut self, rev: Rev) -> Result<P> {
        let raw = self.raw_revision(rev)?;
        P::decode(&raw)
    }

    /// Appends a new revision, returning its local rev.
    ///
    /// `txn` must guard the whole append (journal the old lengths
    /// before any file is extended) so a crash partway through leaves
    /// nothing but truncatable garbage (spec.md §4.4).
    pub fn append(
        &mut self,
        txn: &mut Transaction,
        p1: Rev,
        p2: Rev,
        link_rev: Rev,
        payload: &P,
    ) -> Result<Rev> {
        let raw = payload.encode();
        let p1_node = self.node(p1);
        let p2_node = self.node(p2);
        let node = Node::compute(&p1_node, &p2_node, &raw);
        let new_rev = Rev::from(self.records.len());

        let (base_rev, chunk_to_store) = self.choose_representation(new_rev, &raw)?;
        let packed = compress::pack(&chunk_to_store);

        txn.note(&self.index_path)?;
        if !self.inline {
            txn.note(&self.data_path)?;
        }

        let offset = if self.inline {
            let index_len = std::fs::metadata(&self.index_path).map(|m| m.len()).unwrap_or(0);
            index_len + RECORD_LEN as u64
        } else {
            std::fs::metadata(&self.data_path).map(|m| m.len()).unwrap_or(0)
        };

        let record = IndexRecord {
            offset: if self.inline { 0 } else { offset },
            flags: types::RevFlags::empty(),
            compressed_len: packed.len() as u32,
            uncompressed_len: chunk_to_store.len() as u32,
            base_rev,
            link_rev,
            p1_rev: p1,
            p2_rev: p2,
            node,
        };

        let header = if new_rev == Rev::from(0usize) {
            let mut h = FORMAT_VERSION;
            if self.inline {
                h |= FLAG_INLINE;
            }
            Some(h)
        } else {
            None
        };
        let encoded_record = encode_record(new_rev, &record, header);

        if self.inline {
            let mut f = OpenOptions::new()
                .append(true)
                .create(true)
                .open(&self.index_path)
                .map_err(|source| RevlogError::Io {
                    path: self.index_path.clone(),
                    source,
                })?;
            f.write_all(&encoded_record).map_err(|source| RevlogError::Io {
                path: self.index_path.clone(),
                source,
            })?;
            f.write_all(&packed).map_err(|source| RevlogError::Io {
                path: self.index_path.clone(),
                source,
            })?;
            f.sync_all().map_err(|source| RevlogError::Io {
                path: self.index_path.clone(),
                source,
            })?;
            self.inline_offsets.push(offset);
        } else {
            let mut data_file = OpenOptions::new()
                .append(true)
                .create(true)
                .open(&self.data_path)
                .map_err(|source| RevlogError::Io {
                    path: self.data_path.clone(),
                    source,
                })?;
            data_file.write_all(&packed).map_err(|source| RevlogError::Io {
                path: self.data_path.clone(),
                source,
            })?;
            data_file.sync_all().map_err(|source| RevlogError::Io {
                path: self.data_path.clone(),
                source,
            })?;

            let mut index_file = OpenOptions::new()
                .append(true)
                .create(true)
                .open(&self.index_path)
                .map_err(|source| RevlogError::Io {
                    path: self.index_path.clone(),
                    source,
                })?;
            index_file
                .write_all(&encoded_record)
                .map_err(|source| RevlogError::Io {
                    path: self.index_path.clone(),
                    source,
                })?;
            index_file.sync_all().map_err(|source| RevlogError::Io {
                path: self.index_path.clone(),
                source,
            })?;
        }

        self.node_to_rev.insert(node, new_rev);
        self.records.push(record);
        self.cache = Some(MaterializeCache {
            rev: new_rev,
            text: raw,
        });

        trace!(rev = ?new_rev, node = %node, "appended revision");

        if self.inline
            && std::fs::metadata(&self.index_path)
                .map(|m| m.len())
                .unwrap_or(0)
                > self.inline_split_threshold
        {
            self.split_to_separate_files(txn)?;
        }

        Ok(new_rev)
    }

    /// Decides whether the new revision should be a fresh snapshot or a
    /// delta against the current tip, and returns the chosen
    /// `(base_rev, bytes_to_compress)` (spec.md §4.1.3 steps 1-2).
    fn choose_representation(&mut self, new_rev: Rev, raw: &[u8]) -> Result<(Rev, Vec<u8>)> {
        let tip = self.tip();
        if tip.is_null() {
            return Ok((new_rev, raw.to_vec()));
        }

        let tip_text = self.raw_revision(tip)?;
        let tip_record = self.records[tip.as_usize().unwrap()];
        let base_rev = tip_record.base_rev;
        let chain_depth = tip.as_usize().unwrap() - base_rev.as_usize().unwrap() + 1;
        let chain_bytes: u64 = self.records[base_rev.as_usize().unwrap()..=tip.as_usize().unwrap()]
            .iter()
            .map(|r| r.uncompressed_len as u64)
            .sum();

        let would_exceed_size = chain_bytes + raw.len() as u64 > CHAIN_SIZE_MULTIPLE * raw.len().max(1) as u64;
        let would_exceed_depth = chain_depth as u32 >= self.max_chain_depth;

        if would_exceed_size || would_exceed_depth {
            Ok((new_rev, raw.to_vec()))
        } else {
            let hunks = delta::compute_patch(&tip_text, raw);
            Ok((base_rev, delta::encode_hunks(&hunks)))
        }
    }

    /// Converts an inline revlog to split `.i`/`.d` files, atomically
    /// within `txn` (spec.md §4.1.3 point 5).
    fn split_to_separate_files(&mut self, txn: &mut Transaction) -> Result<()> {
        debug!(path = ?self.index_path, "converting inline revlog to split .i/.d");
        let old_index = std::fs::read(&self.index_path).map_err(|source| RevlogError::Io {
            path: self.index_path.clone(),
            source,
        })?;

        txn.note(&self.data_path)?;
        let mut new_data = Vec::new();
        let mut new_records = self.records.clone();
        for (idx, record) in new_records.iter_mut().enumerate() {
            let (offset, len) = (self.inline_offsets[idx], record.compressed_len);
            let chunk = &old_index[offset as usize..offset as usize + len as usize];
            record.offset = new_data.len() as u64;
            new_data.extend_from_slice(chunk);
        }

        std::fs::write(&self.data_path, &new_data).map_err(|source| RevlogError::Io {
            path: self.data_path.clone(),
            source,
        })?;

        let mut new_index = Vec::new();
        for (idx, record) in new_records.iter().enumerate() {
            let rev = Rev::from(idx);
            let header = if idx == 0 {
                Some(FORMAT_VERSION)
            } else {
                None
            };
            new_index.extend_from_slice(&encode_record(rev, record, header));
        }
        std::fs::write(&self.index_path, &new_index).map_err(|source| RevlogError::Io {
            path: self.index_path.clone(),
            source,
        })?;

        self.records = new_records;
        self.inline = false;
        self.inline_offsets.clear();
        Ok(())
    }

    /// Recomputes and checks every stored node's hash, failing at the
    /// first mismatch with a precise rev + expected/actual node (spec.md
    /// §4.1.5, §8.1 property 1).
    pub fn verify(&mut self) -> Result<()> {
        for idx in 0..self.records.len() {
            let rev = Rev::from(idx);
            let raw = self.raw_revision(rev)?;
            let (p1, p2) = self.parent_nodes(rev);
            let expected = self.records[idx].node;
            let actual = Node::compute(&p1, &p2, &raw);
            if actual != expected {
                return Err(RevlogError::HashMismatch {
                    rev: idx,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// A diagnostic snapshot of this revlog's delta-chain shape (spec.md
    /// SPEC_FULL §4.1: "purely observability, not new semantics").
    pub fn stats(&self) -> RevlogStats {
        let mut chain_depth_histogram = HashMap::new();
        let mut snapshot_count = 0u64;
        for (idx, record) in self.records.iter().enumerate() {
            let rev = Rev::from(idx);
            if record.is_snapshot(rev) {
                snapshot_count += 1;
            }
            let depth = idx - record.base_rev.as_usize().unwrap_or(idx) + 1;
            *chain_depth_histogram.entry(depth as u32).or_insert(0u64) += 1;
        }
        RevlogStats {
            revision_count: self.records.len() as u64,
            snapshot_count,
            chain_depth_histogram,
        }
    }
}

/// See [`Revlog::stats`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RevlogStats {
    pub revision_count: u64,
    pub snapshot_count: u64,
    /// Chain depth (number of revisions from the nearest snapshot,
    /// inclusive, to a given revision) mapped to how many revisions have
    /// that depth.
    pub chain_depth_histogram: HashMap<u32, u64>,
}

impl RevlogStats {
    /// Fraction of revisions stored as full snapshots rather than deltas.
    pub fn snapshot_ratio(&self) -> f64 {
        if self.revision_count == 0 {
            0.0
        } else {
            self.snapshot_count as f64 / self.revision_count as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::OpaquePayload;

    fn open_tmp() -> (tempfile::TempDir, Revlog<OpaquePayload>) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::builder().build();
        let revlog = Revlog::open(dir.path(), "test", &config).unwrap();
        (dir, revlog)
    }

    fn append(
        revlog: &mut Revlog<OpaquePayload>,
        journal: &Path,
        p1: Rev,
        p2: Rev,
        content: &[u8],
    ) -> Rev {
        let mut txn = Transaction::begin(journal).unwrap();
        let rev = revlog
            .append(&mut txn, p1, p2, Rev::from(0usize), &OpaquePayload(content.to_vec()))
            .unwrap();
        txn.commit().unwrap();
        rev
    }

    #[test]
    fn empty_revlog_has_no_heads_and_null_tip() {
        let (_dir, revlog) = open_tmp();
        assert!(revlog.heads().is_empty());
        assert_eq!(revlog.tip(), NULL_REV);
    }

    #[test]
    fn linear_append_and_read_back() {
        let (dir, mut revlog) = open_tmp();
        let journal = dir.path().join("journal");
        let r0 = append(&mut revlog, &journal, NULL_REV, NULL_REV, b"hello\n");
        let r1 = append(&mut revlog, &journal, r0, NULL_REV, b"hello world\n");

        assert_eq!(revlog.raw_revision(r0).unwrap(), b"hello\n");
        assert_eq!(revlog.raw_revision(r1).unwrap(), b"hello world\n");
        assert_eq!(revlog.heads(), vec![r1]);
        assert_eq!(revlog.parents(r1), (r0, NULL_REV));
    }

    #[test]
    fn node_identity_depends_on_parentage() {
        let (dir, mut revlog) = open_tmp();
        let journal = dir.path().join("journal");
        let r0 = append(&mut revlog, &journal, NULL_REV, NULL_REV, b"same");
        // Re-open a second, independent revlog to commit identical
        // content but with r0 as parent instead of null.
        let r1 = append(&mut revlog, &journal, r0, NULL_REV, b"same");
        assert_ne!(revlog.node(r0), revlog.node(r1));
    }

    #[test]
    fn verify_passes_on_a_well_formed_chain() {
        let (dir, mut revlog) = open_tmp();
        let journal = dir.path().join("journal");
        let r0 = append(&mut revlog, &journal, NULL_REV, NULL_REV, b"one");
        append(&mut revlog, &journal, r0, NULL_REV, b"two");
        revlog.verify().unwrap();
    }

    #[test]
    fn reopen_reconstructs_identical_state() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::builder().build();
        let journal = dir.path().join("journal");
        let (node0, node1) = {
            let mut revlog: Revlog<OpaquePayload> = Revlog::open(dir.path(), "test", &config).unwrap();
            let r0 = append(&mut revlog, &journal, NULL_REV, NULL_REV, b"alpha");
            let r1 = append(&mut revlog, &journal, r0, NULL_REV, b"alpha beta");
            (revlog.node(r0), revlog.node(r1))
        };

        let mut reopened: Revlog<OpaquePayload> = Revlog::open(dir.path(), "test", &config).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.node(Rev::from(0usize)), node0);
        assert_eq!(reopened.node(Rev::from(1usize)), node1);
        assert_eq!(reopened.raw_revision(Rev::from(1usize)).unwrap(), b"alpha beta");
        reopened.verify().unwrap();
    }

    #[test]
    fn heads_and_children_reflect_a_merge() {
        let (dir, mut revlog) = open_tmp();
        let journal = dir.path().join("journal");
        let base = append(&mut revlog, &journal, NULL_REV, NULL_REV, b"base");
        let left = append(&mut revlog, &journal, base, NULL_REV, b"left");
        let right = append(&mut revlog, &journal, base, NULL_REV, b"right");
        let merge = append(&mut revlog, &journal, left, right, b"merged");

        assert_eq!(revlog.heads(), vec![merge]);
        let mut children_of_base = revlog.children(base);
        children_of_base.sort();
        assert_eq!(children_of_base, vec![left, right]);
        assert_eq!(revlog.ancestor(left, right), base);
    }

    /// Two tips each merging the same pair of parents in opposite order,
    /// so neither parent is an ancestor of the other: both are maximal
    /// common ancestors, and `ancestor` must tie-break to the
    /// higher-numbered one.
    #[test]
    fn ancestor_of_a_criss_cross_merge_ties_to_the_higher_rev() {
        let (dir, mut revlog) = open_tmp();
        let journal = dir.path().join("journal");
        let base = append(&mut revlog, &journal, NULL_REV, NULL_REV, b"base");
        let b = append(&mut revlog, &journal, base, NULL_REV, b"b");
        let c = append(&mut revlog, &journal, base, NULL_REV, b"c");
        let d = append(&mut revlog, &journal, b, c, b"d");
        let e = append(&mut revlog, &journal, c, b, b"e");

        assert_eq!(revlog.ancestor(d, e), c);
    }

    #[test]
    fn inline_to_split_conversion_preserves_content() {
        let dir = tempfile::tempdir().unwrap();
        let mut config_builder = Config::builder();
        config_builder = config_builder
            .layer("revlog.inline-split-threshold = 10\n", config::ConfigSource::Builtin)
            .unwrap();
        let config = config_builder.build();
        let journal = dir.path().join("journal");
        let mut revlog: Revlog<OpaquePayload> = Revlog::open(dir.path(), "test", &config).unwrap();

        let r0 = append(&mut revlog, &journal, NULL_REV, NULL_REV, b"0123456789abcdef");
        let r1 = append(&mut revlog, &journal, r0, NULL_REV, b"0123456789abcdef0123456789abcdef");

        assert!(!revlog.inline, "revlog should have split once past the threshold");
        assert_eq!(revlog.raw_revision(r0).unwrap(), b"0123456789abcdef");
        assert_eq!(
            revlog.raw_revision(r1).unwrap(),
            b"0123456789abcdef0123456789abcdef"
        );
        revlog.verify().unwrap();
    }

    #[test]
    fn stats_count_snapshots_and_chain_depth() {
        let (dir, mut revlog) = open_tmp();
        let journal = dir.path().join("journal");
        let r0 = append(&mut revlog, &journal, NULL_REV, NULL_REV, b"one");
        append(&mut revlog, &journal, r0, NULL_REV, b"one two");

        let stats = revlog.stats();
        assert_eq!(stats.revision_count, 2);
        assert_eq!(stats.snapshot_count, 1);
        assert_eq!(stats.chain_depth_histogram.get(&2), Some(&1));
    }

    #[test]
    fn unknown_flag_bits_fail_closed_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::builder().build();
        let journal = dir.path().join("journal");
        let mut revlog: Revlog<OpaquePayload> = Revlog::open(dir.path(), "test", &config).unwrap();
        append(&mut revlog, &journal, NULL_REV, NULL_REV, b"data");
        drop(revlog);

        // Corrupt the stored flags field (bytes 6..8 of the single
        // record) with an unrecognized high bit.
        let index_path = dir.path().join("test.i");
        let mut bytes = std::fs::read(&index_path).unwrap();
        bytes[6] = 0b1000_0000;
        std::fs::write(&index_path, bytes).unwrap();

        let err = Revlog::<OpaquePayload>::open(dir.path(), "test", &config).unwrap_err();
        assert!(matches!(err, RevlogError::UnknownFlagBits { .. }));
    }
}
