/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The per-path dirstate entry (spec.md §4.3) and its four tracked
//! states.

use std::path::Path;

use types::RepoPath;

use crate::error::DirstateError;
use crate::error::Result;

/// A dirstate entry's tracked state, the `state(1)` byte in the on-disk
/// record (spec.md §4.3).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DirstateState {
    /// `n` — tracked, matches p1.
    Normal,
    /// `a` — scheduled for the next commit, not in p1.
    Added,
    /// `r` — tracked in p1, scheduled for deletion.
    Removed,
    /// `m` — tracked in p1 and p2, content may differ.
    Merged,
}

impl DirstateState {
    pub(crate) fn to_byte(self) -> u8 {
        match self {
            DirstateState::Normal => b'n',
            DirstateState::Added => b'a',
            DirstateState::Removed => b'r',
            DirstateState::Merged => b'm',
        }
    }

    pub(crate) fn from_byte(byte: u8, path: &Path) -> Result<Self> {
        match byte {
            b'n' => Ok(DirstateState::Normal),
            b'a' => Ok(DirstateState::Added),
            b'r' => Ok(DirstateState::Removed),
            b'm' => Ok(DirstateState::Merged),
            _ => Err(DirstateError::UnknownState {
                path: path.to_path_buf(),
                byte,
            }),
        }
    }
}

/// A value that can never be matched by a real `stat()` result, forcing
/// [`crate::Dirstate::status`] to fall back to a content comparison
/// rather than trusting a size/mtime that was never actually observed
/// (e.g. a freshly-added entry, or one recorded in the same second the
/// file was later rewritten).
pub const LOOKUP_SIZE: i32 = -1;
pub const LOOKUP_MTIME: i32 = -1;

/// One tracked path's dirstate record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DirstateEntry {
    pub state: DirstateState,
    pub mode: i32,
    pub size: i32,
    pub mtime: i32,
    /// The source path this entry was copied/renamed from, if any —
    /// stored after a NUL byte in the path field (spec.md §4.3,
    /// `path[|\0 copy_source]`).
    pub copy_source: Option<RepoPath>,
}

impl DirstateEntry {
    pub fn tracked(mode: i32, size: i32, mtime: i32) -> Self {
        DirstateEntry {
            state: DirstateState::Normal,
            mode,
            size,
            mtime,
            copy_source: None,
        }
    }

    pub fn added(copy_source: Option<RepoPath>) -> Self {
        DirstateEntry {
            state: DirstateState::Added,
            mode: 0,
            size: LOOKUP_SIZE,
            mtime: LOOKUP_MTIME,
            copy_source,
        }
    }

    pub fn removed() -> Self {
        DirstateEntry {
            state: DirstateState::Removed,
            mode: 0,
            size: 0,
            mtime: 0,
            copy_source: None,
        }
    }

    pub fn merged() -> Self {
        DirstateEntry {
            state: DirstateState::Merged,
            mode: 0,
            size: LOOKUP_SIZE,
            mtime: LOOKUP_MTIME,
            copy_source: None,
        }
    }

    /// Whether a `stat()` result with this size and mtime can be
    /// trusted as "unchanged" without reading the file's content.
    pub fn stat_matches(&self, size: i32, mtime: i32) -> bool {
        self.size != LOOKUP_SIZE && self.mtime != LOOKUP_MTIME && self.size == size && self.mtime == mtime
    }
}
