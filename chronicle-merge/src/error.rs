/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::path::PathBuf;

use types::RepoPath;

#[derive(thiserror::Error, Debug)]
pub enum MergeError {
    #[error("commit refused: unresolved conflicts in {0:?}")]
    UnresolvedConflicts(Vec<RepoPath>),

    #[error("no mergestate entry for {0}")]
    NoSuchPath(RepoPath),

    #[error("i/o error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed mergestate at {path:?}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, MergeError>;
