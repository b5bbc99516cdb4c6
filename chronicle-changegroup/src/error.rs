/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use types::Node;

#[derive(thiserror::Error, Debug)]
pub enum ChangegroupError {
    #[error("truncated chunk: expected {expected} more bytes, found {found}")]
    TruncatedChunk { expected: usize, found: usize },

    #[error("chunk length prefix {0} is shorter than the 4-byte length field itself")]
    ChunkTooShort(u32),

    #[error("unrecognized compression magic {0:?}")]
    UnknownCompression([u8; 6]),

    #[error("unsupported changegroup version {0}")]
    UnsupportedVersion(u32),

    #[error("revision {node} failed hash verification: expected {node}, computed {computed}")]
    HashMismatch { node: Node, computed: Node },

    #[error("revision {0} references a base/parent this bundle never supplies and the local store does not have")]
    UnknownBase(Node),

    #[error("revision's linknode {0} names a changelog entry neither in this bundle nor the local store")]
    UnknownLinknode(Node),

    #[error("file section is missing its filename chunk")]
    MissingFilename,

    #[error(transparent)]
    Revlog(#[from] revlog::RevlogError),

    #[error(transparent)]
    Lock(#[from] lock::LockError),

    #[error(transparent)]
    Path(#[from] types::RepoPathError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ChangegroupError>;
