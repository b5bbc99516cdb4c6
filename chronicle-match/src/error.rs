/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

#[derive(thiserror::Error, Debug)]
pub enum MatchError {
    #[error("invalid glob pattern {0:?}: {1}")]
    Glob(String, globset::Error),

    #[error("invalid regular expression {0:?}: {1}")]
    Regexp(String, regex::Error),

    #[error(transparent)]
    Path(#[from] types::RepoPathError),
}

pub type Result<T> = std::result::Result<T, MatchError>;
