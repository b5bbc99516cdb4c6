/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::fmt;
use std::str::FromStr;

use sha1::Digest;
use sha1::Sha1;

/// Number of bytes in a node identifier.
pub const NODE_BYTES: usize = 20;

/// The all-zero sentinel node, denoting "no revision".
pub const NULL_NODE: Node = Node([0u8; NODE_BYTES]);

/// A content-addressed identifier for a revlog entry.
///
/// `node = H(sorted(p1, p2) || payload)`, where `H` is a cryptographic
/// hash (SHA-1, for compatibility with the wire format in spec.md §3.1)
/// and `p1`/`p2` are the 20-byte parent node identifiers with the
/// lexicographically smaller one first. Node identity therefore depends
/// on parentage: identical content committed with different parents
/// yields distinct nodes.
#[derive(Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Node([u8; NODE_BYTES]);

#[derive(thiserror::Error, Debug)]
pub enum NodeParseError {
    #[error("node hex string has wrong length: expected {expected}, got {got}")]
    WrongLength { expected: usize, got: usize },
    #[error("node hex string contains non-hex characters: {0}")]
    InvalidHex(String),
}

impl Node {
    /// Builds a node from raw bytes.
    pub const fn from_bytes(bytes: [u8; NODE_BYTES]) -> Self {
        Node(bytes)
    }

    /// Computes the node identifier for a revision: `H(sorted(p1, p2) || payload)`.
    ///
    /// The two parents are ordered with the lexicographically smaller
    /// byte string first before hashing, independent of which is `p1`
    /// and which is `p2` in the revlog record (spec.md §3.1).
    pub fn compute(p1: &Node, p2: &Node, payload: &[u8]) -> Node {
        let (a, b) = if p1.0 <= p2.0 { (p1, p2) } else { (p2, p1) };
        let mut hasher = Sha1::new();
        hasher.update(a.0);
        hasher.update(b.0);
        hasher.update(payload);
        let digest = hasher.finalize();
        let mut out = [0u8; NODE_BYTES];
        out.copy_from_slice(&digest);
        Node(out)
    }

    pub fn is_null(&self) -> bool {
        self.0 == NULL_NODE.0
    }

    pub fn as_bytes(&self) -> &[u8; NODE_BYTES] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        let mut s = String::with_capacity(NODE_BYTES * 2);
        for byte in &self.0 {
            s.push_str(&format!("{:02x}", byte));
        }
        s
    }

    pub fn from_hex(s: &str) -> Result<Node, NodeParseError> {
        if s.len() != NODE_BYTES * 2 {
            return Err(NodeParseError::WrongLength {
                expected: NODE_BYTES * 2,
                got: s.len(),
            });
        }
        let mut out = [0u8; NODE_BYTES];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hi = hex_val(chunk[0]).ok_or_else(|| NodeParseError::InvalidHex(s.to_owned()))?;
            let lo = hex_val(chunk[1]).ok_or_else(|| NodeParseError::InvalidHex(s.to_owned()))?;
            out[i] = (hi << 4) | lo;
        }
        Ok(Node(out))
    }
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.to_hex())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Default for Node {
    fn default() -> Self {
        NULL_NODE
    }
}

impl FromStr for Node {
    type Err = NodeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Node::from_hex(s)
    }
}

impl AsRef<[u8]> for Node {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
