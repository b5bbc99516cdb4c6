/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum LockError {
    #[error("timed out waiting for lock {path}, currently held by {holder}")]
    Timeout { path: PathBuf, holder: String },

    #[error("lock file {path} is unparseable: {reason}")]
    Unparseable { path: PathBuf, reason: String },

    #[error("lock {path} was stolen out from under us (expected holder {expected}, found {found})")]
    Stolen {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("I/O error operating on lock {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
