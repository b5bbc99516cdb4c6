/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! One revision's wire representation within a section (spec.md §4.7):
//! `node(20) | p1(20) | p2(20) | linknode(20) | [base_node(20)] | delta`.
//! `base_node` is present only in [`BundleVersion::V2`]; in V1 a chunk
//! always deltas against the previous chunk materialized in its section
//! (or the null node, for the section's first chunk).

use types::Node;
use types::NODE_BYTES;
use types::NULL_NODE;

use crate::error::ChangegroupError;
use crate::error::Result;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BundleVersion {
    V1,
    V2,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RevisionChunk {
    pub node: Node,
    pub p1: Node,
    pub p2: Node,
    pub linknode: Node,
    /// `Some` only for [`BundleVersion::V2`].
    pub base_node: Option<Node>,
    /// Encoded hunks (`revlog::encode_hunks`) against the base text:
    /// the previous chunk's materialized content in V1, or the revision
    /// named by `base_node` in V2.
    pub delta: Vec<u8>,
}

impl RevisionChunk {
    pub fn encode(&self, version: BundleVersion) -> Vec<u8> {
        let mut out = Vec::with_capacity(NODE_BYTES * 5 + self.delta.len());
        out.extend_from_slice(self.node.as_bytes());
        out.extend_from_slice(self.p1.as_bytes());
        out.extend_from_slice(self.p2.as_bytes());
        out.extend_from_slice(self.linknode.as_bytes());
        if version == BundleVersion::V2 {
            out.extend_from_slice(self.base_node.unwrap_or(NULL_NODE).as_bytes());
        }
        out.extend_from_slice(&self.delta);
        out
    }

    pub fn decode(version: BundleVersion, raw: &[u8]) -> Result<Self> {
        let header_len = match version {
            BundleVersion::V1 => NODE_BYTES * 4,
            BundleVersion::V2 => NODE_BYTES * 5,
        };
        if raw.len() < header_len {
            return Err(ChangegroupError::TruncatedChunk {
                expected: header_len,
                found: raw.len(),
            });
        }
        let node = read_node(&raw[0..NODE_BYTES]);
        let p1 = read_node(&raw[NODE_BYTES..NODE_BYTES * 2]);
        let p2 = read_node(&raw[NODE_BYTES * 2..NODE_BYTES * 3]);
        let linknode = read_node(&raw[NODE_BYTES * 3..NODE_BYTES * 4]);
        let (base_node, delta) = match version {
            BundleVersion::V1 => (None, raw[NODE_BYTES * 4..].to_vec()),
            BundleVersion::V2 => (
                Some(read_node(&raw[NODE_BYTES * 4..NODE_BYTES * 5])),
                raw[NODE_BYTES * 5..].to_vec(),
            ),
        };
        Ok(RevisionChunk {
            node,
            p1,
            p2,
            linknode,
            base_node,
            delta,
        })
    }
}

fn read_node(bytes: &[u8]) -> Node {
    let mut buf = [0u8; NODE_BYTES];
    buf.copy_from_slice(bytes);
    Node::from_bytes(buf)
}
