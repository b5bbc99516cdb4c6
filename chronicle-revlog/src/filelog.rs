/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Filelogs: one revlog per tracked path, stored under an injectively
//! encoded file name (spec.md §6.4, `types::encode_store_path`), whose
//! entries are file content plus optional copy/rename metadata
//! (spec.md §4.2, §3.1 "Filelog").
//!
//! Copy metadata is framed by a pair of `\x01\n` marker lines at the
//! very start of the payload, containing `copy: <src>` and
//! `copyrev: <hex filenode>`. Parsing is exposed standalone
//! ([`parse_meta_header`]) so the merge engine's rename detection can
//! call it without reading through a whole `Filelog`.

use std::ops::Deref;
use std::ops::DerefMut;
use std::path::Path;

use config::Config;
use lock::Transaction;
use types::encode_store_path;
use types::Node;
use types::RepoPath;
use types::Rev;

use crate::error::RevlogError;
use crate::error::Result;
use crate::payload::RevlogPayload;
use crate::revlog::Revlog;

const META_MARKER: &[u8] = b"\x01\n";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileMetadata {
    pub copy_from: Option<RepoPath>,
    pub copy_rev: Option<Node>,
}

impl FileMetadata {
    pub fn is_empty(&self) -> bool {
        self.copy_from.is_none() && self.copy_rev.is_none()
    }
}

/// Splits `raw` into its copy metadata (if any) and its file content.
pub fn parse_meta_header(raw: &[u8]) -> (FileMetadata, &[u8]) {
    if !raw.starts_with(META_MARKER) {
        return (FileMetadata::default(), raw);
    }
    let after_open = &raw[META_MARKER.len()..];
    let Some(end) = find_subslice(after_open, META_MARKER) else {
        return (FileMetadata::default(), raw);
    };
    let header = &after_open[..end];
    let content = &after_open[end + META_MARKER.len()..];

    let mut metadata = FileMetadata::default();
    for line in header.split(|&b| b == b'\n') {
        if line.is_empty() {
            continue;
        }
        let line = String::from_utf8_lossy(line);
        if let Some(value) = line.strip_prefix("copy: ") {
            metadata.copy_from = RepoPath::new(value.to_owned()).ok();
        } else if let Some(value) = line.strip_prefix("copyrev: ") {
            metadata.copy_rev = Node::from_hex(value).ok();
        }
    }
    (metadata, content)
}

/// Reassembles a payload from metadata and content, the inverse of
/// [`parse_meta_header`]. Omits the header entirely when there is no
/// metadata to carry.
pub fn encode_meta_header(metadata: &FileMetadata, content: &[u8]) -> Vec<u8> {
    if metadata.is_empty() {
        return content.to_vec();
    }
    let mut out = Vec::new();
    out.extend_from_slice(META_MARKER);
    if let Some(path) = &metadata.copy_from {
        out.extend_from_slice(format!("copy: {}\n", path.as_str()).as_bytes());
    }
    if let Some(node) = &metadata.copy_rev {
        out.extend_from_slice(format!("copyrev: {}\n", node.to_hex()).as_bytes());
    }
    out.extend_from_slice(META_MARKER);
    out.extend_from_slice(content);
    out
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileRevision {
    pub metadata: FileMetadata,
    pub content: Vec<u8>,
}

impl RevlogPayload for FileRevision {
    fn decode(raw: &[u8]) -> Result<Self> {
        let (metadata, content) = parse_meta_header(raw);
        Ok(FileRevision {
            metadata,
            content: content.to_vec(),
        })
    }

    fn encode(&self) -> Vec<u8> {
        encode_meta_header(&self.metadata, &self.content)
    }
}

/// One tracked path's revision history.
pub struct Filelog(Revlog<FileRevision>);

impl Filelog {
    pub fn open(store_dir: &Path, path: &RepoPath, config: &Config) -> Result<Self> {
        let data_dir = store_dir.join("data");
        let name = encode_store_path(path);
        Ok(Filelog(Revlog::open(&data_dir, &name, config)?))
    }

    pub fn add(
        &mut self,
        txn: &mut Transaction,
        content: Vec<u8>,
        metadata: FileMetadata,
        link_rev: Rev,
        p1: Rev,
        p2: Rev,
    ) -> Result<Node> {
        let revision = FileRevision { metadata, content };
        let rev = self.0.append(txn, p1, p2, link_rev, &revision)?;
        Ok(self.0.node(rev))
    }

    pub fn read_content(&mut self, node: &Node) -> Result<Vec<u8>> {
        let rev = self
            .0
            .rev_for_node(node)
            .ok_or_else(|| RevlogError::NoSuchNode(*node))?;
        Ok(self.0.read(rev)?.content)
    }
}

impl Deref for Filelog {
    type Target = Revlog<FileRevision>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Filelog {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::NULL_REV;

    #[test]
    fn plain_content_has_no_metadata() {
        let (meta, content) = parse_meta_header(b"hello\n");
        assert!(meta.is_empty());
        assert_eq!(content, b"hello\n");
    }

    #[test]
    fn meta_header_round_trips() {
        let meta = FileMetadata {
            copy_from: Some(RepoPath::new("a").unwrap()),
            copy_rev: Some(Node::from_bytes([7u8; types::NODE_BYTES])),
        };
        let encoded = encode_meta_header(&meta, b"B");
        let (decoded_meta, decoded_content) = parse_meta_header(&encoded);
        assert_eq!(decoded_meta, meta);
        assert_eq!(decoded_content, b"B");
    }

    #[test]
    fn file_revision_round_trips_through_payload_codec() {
        let revision = FileRevision {
            metadata: FileMetadata {
                copy_from: Some(RepoPath::new("src/old.rs").unwrap()),
                copy_rev: Some(Node::from_bytes([3u8; types::NODE_BYTES])),
            },
            content: b"fn main() {}\n".to_vec(),
        };
        let encoded = revision.encode();
        let decoded = FileRevision::decode(&encoded).unwrap();
        assert_eq!(decoded, revision);
    }

    #[test]
    fn add_and_read_content_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::builder().build();
        let journal = dir.path().join("journal");
        let path = RepoPath::new("src/lib.rs").unwrap();
        let mut filelog = Filelog::open(dir.path(), &path, &config).unwrap();

        let mut txn = Transaction::begin(&journal).unwrap();
        let node = filelog
            .add(
                &mut txn,
                b"hello\n".to_vec(),
                FileMetadata::default(),
                Rev::from(0usize),
                NULL_REV,
                NULL_REV,
            )
            .unwrap();
        txn.commit().unwrap();

        assert_eq!(filelog.read_content(&node).unwrap(), b"hello\n");
    }
}
