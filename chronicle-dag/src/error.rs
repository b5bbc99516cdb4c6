/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use types::Node;

#[derive(thiserror::Error, Debug)]
pub enum DagError {
    #[error("no such node {0}")]
    NoSuchNode(Node),

    #[error(transparent)]
    Revlog(#[from] revlog::RevlogError),
}

pub type Result<T> = std::result::Result<T, DagError>;
