/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum DirstateError {
    #[error("dirstate {path:?} is truncated: {what}")]
    Truncated { path: PathBuf, what: &'static str },

    #[error("dirstate {path:?} has an unrecognized state byte {byte:#04x}")]
    UnknownState { path: PathBuf, byte: u8 },

    #[error("dirstate {path:?} has a path that is not valid utf8")]
    InvalidPath { path: PathBuf },

    #[error(transparent)]
    Path(#[from] types::RepoPathError),

    #[error("i/o error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, DirstateError>;
