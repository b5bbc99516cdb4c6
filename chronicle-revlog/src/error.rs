/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::path::PathBuf;

use types::Node;

#[derive(thiserror::Error, Debug)]
pub enum RevlogError {
    #[error("revision {rev} has unrecognized flag bits {bits:#018b}")]
    UnknownFlagBits { rev: usize, bits: u16 },

    #[error("unsupported revlog format version {version}")]
    UnsupportedVersion { version: u16 },

    #[error("no such revision {0}")]
    NoSuchRev(usize),

    #[error("no such node {0}")]
    NoSuchNode(Node),

    #[error("integrity check failed at rev {rev}: expected node {expected}, computed {actual}")]
    HashMismatch {
        rev: usize,
        expected: Node,
        actual: Node,
    },

    #[error("delta chain for rev {rev} does not terminate in a snapshot")]
    BrokenChain { rev: usize },

    #[error("patch for rev {rev} is out of bounds of its base text")]
    PatchOutOfBounds { rev: usize },

    #[error("payload decode failed: {0}")]
    Payload(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Lock(#[from] lock::LockError),
}

pub type Result<T> = std::result::Result<T, RevlogError>;
