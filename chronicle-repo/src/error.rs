/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Repository-specific conditions that don't belong to any one
//! subsystem crate. Every public `Repository` method returns
//! `anyhow::Result`, attaching context as it crosses subsystem
//! boundaries (SPEC_FULL §7); these variants are the repo-level facts
//! `anyhow::Error::downcast_ref` can still recover when a caller needs
//! to branch on *why* an operation failed, not just log it.

use std::path::PathBuf;

use types::Node;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("{0} is not a chronicle repository (no metadata directory)")]
    NotARepository(PathBuf),

    #[error("{0} already contains a chronicle repository")]
    AlreadyExists(PathBuf),

    #[error("unknown revision {0}")]
    UnknownRevision(Node),

    #[error("no changes to commit")]
    NothingToCommit,

    #[error(
        "phase of {node} cannot move from {from:?} to {to:?} without an explicit override"
    )]
    PhaseRegression {
        node: Node,
        from: crate::phase::Phase,
        to: crate::phase::Phase,
    },

    #[error("bookmark {0:?} compare-and-swap failed: it moved under us")]
    BookmarkMoved(String),

    #[error("hook {name:?} failed with exit status {status}")]
    HookFailed { name: String, status: i32 },

    #[error("unsupported repository requirement: {0:?}")]
    UnsupportedRequirement(String),

    #[error("uncommitted changes in the working directory; commit, discard, or pass force")]
    DirtyWorkingDirectory,

    #[error("updating to {0} would require a real merge; use Repository::merge instead")]
    UpdateNeedsMerge(Node),

    #[error("a merge is already in progress")]
    MergeInProgress,

    #[error("no merge is in progress")]
    NoMergeInProgress,
}
