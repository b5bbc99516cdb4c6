/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The dirstate file's binary format (spec.md §4.3):
//!
//! ```text
//! header: p1_node(20) | p2_node(20)
//! entry:  state(1) | mode(4) | size(4) | mtime(4) | path_len(4)
//!           | path[|\0 copy_source]
//! ```
//!
//! `path_len` counts the whole trailing byte string, including the NUL
//! separator and copy source when present, so a reader that doesn't
//! care about copies can still skip an entry without parsing it.

use std::collections::BTreeMap;
use std::path::Path;

use byteorder::BigEndian;
use byteorder::ByteOrder;
use types::Node;
use types::RepoPath;
use types::NODE_BYTES;

use crate::entry::DirstateEntry;
use crate::entry::DirstateState;
use crate::error::DirstateError;
use crate::error::Result;

const HEADER_LEN: usize = NODE_BYTES * 2;
const ENTRY_FIXED_LEN: usize = 1 + 4 + 4 + 4 + 4;

pub fn encode(p1: &Node, p2: &Node, entries: &BTreeMap<RepoPath, DirstateEntry>) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + entries.len() * 64);
    out.extend_from_slice(p1.as_bytes());
    out.extend_from_slice(p2.as_bytes());

    for (path, entry) in entries {
        let mut path_bytes = path.as_bytes().to_vec();
        if let Some(source) = &entry.copy_source {
            path_bytes.push(0);
            path_bytes.extend_from_slice(source.as_bytes());
        }

        out.push(entry.state.to_byte());
        let mut buf4 = [0u8; 4];
        BigEndian::write_i32(&mut buf4, entry.mode);
        out.extend_from_slice(&buf4);
        BigEndian::write_i32(&mut buf4, entry.size);
        out.extend_from_slice(&buf4);
        BigEndian::write_i32(&mut buf4, entry.mtime);
        out.extend_from_slice(&buf4);
        BigEndian::write_u32(&mut buf4, path_bytes.len() as u32);
        out.extend_from_slice(&buf4);
        out.extend_from_slice(&path_bytes);
    }

    out
}

pub fn decode(path: &Path, raw: &[u8]) -> Result<(Node, Node, BTreeMap<RepoPath, DirstateEntry>)> {
    if raw.is_empty() {
        return Ok((Node::default(), Node::default(), BTreeMap::new()));
    }
    if raw.len() < HEADER_LEN {
        return Err(DirstateError::Truncated {
            path: path.to_path_buf(),
            what: "header",
        });
    }

    let mut p1_bytes = [0u8; NODE_BYTES];
    p1_bytes.copy_from_slice(&raw[0..NODE_BYTES]);
    let mut p2_bytes = [0u8; NODE_BYTES];
    p2_bytes.copy_from_slice(&raw[NODE_BYTES..HEADER_LEN]);
    let p1 = Node::from_bytes(p1_bytes);
    let p2 = Node::from_bytes(p2_bytes);

    let mut entries = BTreeMap::new();
    let mut cursor = HEADER_LEN;
    while cursor < raw.len() {
        if raw.len() - cursor < ENTRY_FIXED_LEN {
            return Err(DirstateError::Truncated {
                path: path.to_path_buf(),
                what: "entry header",
            });
        }
        let state = DirstateState::from_byte(raw[cursor], path)?;
        cursor += 1;
        let mode = BigEndian::read_i32(&raw[cursor..cursor + 4]);
        cursor += 4;
        let size = BigEndian::read_i32(&raw[cursor..cursor + 4]);
        cursor += 4;
        let mtime = BigEndian::read_i32(&raw[cursor..cursor + 4]);
        cursor += 4;
        let path_len = BigEndian::read_u32(&raw[cursor..cursor + 4]) as usize;
        cursor += 4;

        if raw.len() - cursor < path_len {
            return Err(DirstateError::Truncated {
                path: path.to_path_buf(),
                what: "entry path",
            });
        }
        let path_bytes = &raw[cursor..cursor + path_len];
        cursor += path_len;

        let (path_str, copy_source) = match path_bytes.iter().position(|&b| b == 0) {
            Some(nul) => {
                let source_bytes = &path_bytes[nul + 1..];
                let source_str = std::str::from_utf8(source_bytes)
                    .map_err(|_| DirstateError::InvalidPath { path: path.to_path_buf() })?;
                (&path_bytes[..nul], Some(RepoPath::new(source_str.to_owned())?))
            }
            None => (path_bytes, None),
        };
        let path_str = std::str::from_utf8(path_str)
            .map_err(|_| DirstateError::InvalidPath { path: path.to_path_buf() })?;
        let repo_path = RepoPath::new(path_str.to_owned())?;

        entries.insert(
            repo_path,
            DirstateEntry {
                state,
                mode,
                size,
                mtime,
                copy_source,
            },
        );
    }

    Ok((p1, p2, entries))
}
