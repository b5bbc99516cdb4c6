/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Three-way merge over the manifest (spec.md §4.6): for every path
//! present in any of the base/local/other manifests, decide one
//! [`MergeAction`].

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use types::FileFlag;
use types::Node;
use types::RepoPath;

/// One manifest entry's identity for merge purposes: which filenode and
/// which mode flag. Deliberately a plain tuple-like struct rather than
/// reusing `manifest::ManifestEntry`, so this crate has no dependency on
/// `chronicle-revlog`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MergeEntry {
    pub filenode: Node,
    pub flag: FileFlag,
}

/// The decision for one path (spec.md §4.6).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MergeAction {
    /// Unchanged in other vs base: keep the local (or, if also absent
    /// everywhere else, simply stay as-is).
    Keep,
    /// Changed in other vs base, unchanged in local vs base: take
    /// other's version.
    Get,
    /// Changed in both local and other, relative to base, differently:
    /// needs a real content merge.
    Merge,
    /// Present in local and base, absent in other: delete.
    Delete,
    /// The path was renamed in other; remove this (old) path and fetch
    /// content under the new name.
    RemoveAndGet { renamed_to: RepoPath },
    /// Present in local, absent in base, present in other with
    /// different content: independently added on both sides.
    Conflict,
    /// Content identical, only the executable/symlink flag differs.
    FlagChange,
}

/// The plan for one commit's working-directory update: path -> action.
pub type MergePlan = BTreeMap<RepoPath, MergeAction>;

/// Computes the merge plan for three manifests (spec.md §4.6), given
/// `other_renames`: a map from a new path in `other` back to the base/
/// local path it was renamed from (derived from filelog copy metadata
/// by the caller, since this crate never reads filelogs itself).
pub fn plan(
    base: &BTreeMap<RepoPath, MergeEntry>,
    local: &BTreeMap<RepoPath, MergeEntry>,
    other: &BTreeMap<RepoPath, MergeEntry>,
    other_renames: &BTreeMap<RepoPath, RepoPath>,
) -> MergePlan {
    let mut paths: BTreeSet<&RepoPath> = BTreeSet::new();
    paths.extend(base.keys());
    paths.extend(local.keys());
    paths.extend(other.keys());

    let mut result = MergePlan::new();
    for path in paths {
        let b = base.get(path);
        let l = local.get(path);
        let o = other.get(path);
        let action = match (b, l, o) {
            (Some(b), Some(l), Some(o)) => three_way(l, o, b),
            (Some(_), Some(_), None) => {
                if let Some(dest) = other_renames.iter().find(|(_, src)| *src == path).map(|(dest, _)| dest) {
                    MergeAction::RemoveAndGet {
                        renamed_to: dest.clone(),
                    }
                } else {
                    MergeAction::Delete
                }
            }
            (Some(b), None, Some(o)) => {
                if o == b {
                    MergeAction::Keep
                } else {
                    MergeAction::Conflict
                }
            }
            (Some(_), None, None) => MergeAction::Keep,
            (None, Some(l), Some(o)) => {
                if l == o {
                    MergeAction::Keep
                } else {
                    MergeAction::Conflict
                }
            }
            (None, Some(_), None) => MergeAction::Keep,
            (None, None, Some(_)) => MergeAction::Get,
            (None, None, None) => continue,
        };
        result.insert(path.clone(), action);
    }
    result
}

fn three_way(l: &MergeEntry, o: &MergeEntry, b: &MergeEntry) -> MergeAction {
    if l.filenode == o.filenode {
        if l.flag != o.flag {
            MergeAction::FlagChange
        } else {
            MergeAction::Keep
        }
    } else if o == b {
        MergeAction::Keep
    } else if l == b {
        MergeAction::Get
    } else {
        MergeAction::Merge
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(byte: u8) -> Node {
        Node::from_bytes([byte; types::NODE_BYTES])
    }

    fn entry(byte: u8) -> MergeEntry {
        MergeEntry {
            filenode: node(byte),
            flag: FileFlag::Regular,
        }
    }

    fn rp(s: &str) -> RepoPath {
        RepoPath::new(s).unwrap()
    }

    #[test]
    fn unchanged_in_other_keeps_local() {
        let mut base = BTreeMap::new();
        base.insert(rp("a"), entry(1));
        let mut local = BTreeMap::new();
        local.insert(rp("a"), entry(2));
        let mut other = BTreeMap::new();
        other.insert(rp("a"), entry(1));

        let p = plan(&base, &local, &other, &BTreeMap::new());
        assert_eq!(p[&rp("a")], MergeAction::Keep);
    }

    #[test]
    fn unchanged_locally_takes_other() {
        let mut base = BTreeMap::new();
        base.insert(rp("a"), entry(1));
        let mut local = BTreeMap::new();
        local.insert(rp("a"), entry(1));
        let mut other = BTreeMap::new();
        other.insert(rp("a"), entry(2));

        let p = plan(&base, &local, &other, &BTreeMap::new());
        assert_eq!(p[&rp("a")], MergeAction::Get);
    }

    #[test]
    fn changed_both_ways_needs_merge() {
        let mut base = BTreeMap::new();
        base.insert(rp("a"), entry(1));
        let mut local = BTreeMap::new();
        local.insert(rp("a"), entry(2));
        let mut other = BTreeMap::new();
        other.insert(rp("a"), entry(3));

        let p = plan(&base, &local, &other, &BTreeMap::new());
        assert_eq!(p[&rp("a")], MergeAction::Merge);
    }

    #[test]
    fn removed_in_other_without_rename_deletes() {
        let mut base = BTreeMap::new();
        base.insert(rp("a"), entry(1));
        let mut local = BTreeMap::new();
        local.insert(rp("a"), entry(1));
        let other = BTreeMap::new();

        let p = plan(&base, &local, &other, &BTreeMap::new());
        assert_eq!(p[&rp("a")], MergeAction::Delete);
    }

    #[test]
    fn removed_in_other_with_rename_removes_and_gets() {
        let mut base = BTreeMap::new();
        base.insert(rp("old"), entry(1));
        let mut local = BTreeMap::new();
        local.insert(rp("old"), entry(1));
        let mut other = BTreeMap::new();
        other.insert(rp("new"), entry(1));

        let mut renames = BTreeMap::new();
        renames.insert(rp("new"), rp("old"));

        let p = plan(&base, &local, &other, &renames);
        assert_eq!(
            p[&rp("old")],
            MergeAction::RemoveAndGet {
                renamed_to: rp("new")
            }
        );
        assert_eq!(p[&rp("new")], MergeAction::Get);
    }

    #[test]
    fn independently_added_with_different_content_conflicts() {
        let base = BTreeMap::new();
        let mut local = BTreeMap::new();
        local.insert(rp("a"), entry(1));
        let mut other = BTreeMap::new();
        other.insert(rp("a"), entry(2));

        let p = plan(&base, &local, &other, &BTreeMap::new());
        assert_eq!(p[&rp("a")], MergeAction::Conflict);
    }

    #[test]
    fn independently_added_with_same_content_keeps() {
        let base = BTreeMap::new();
        let mut local = BTreeMap::new();
        local.insert(rp("a"), entry(1));
        let mut other = BTreeMap::new();
        other.insert(rp("a"), entry(1));

        let p = plan(&base, &local, &other, &BTreeMap::new());
        assert_eq!(p[&rp("a")], MergeAction::Keep);
    }

    #[test]
    fn removed_locally_but_unchanged_remotely_stays_deleted() {
        let mut base = BTreeMap::new();
        base.insert(rp("a"), entry(1));
        let local = BTreeMap::new();
        let mut other = BTreeMap::new();
        other.insert(rp("a"), entry(1));

        let p = plan(&base, &local, &other, &BTreeMap::new());
        assert_eq!(p[&rp("a")], MergeAction::Keep);
    }

    #[test]
    fn removed_locally_but_modified_remotely_conflicts() {
        let mut base = BTreeMap::new();
        base.insert(rp("a"), entry(1));
        let local = BTreeMap::new();
        let mut other = BTreeMap::new();
        other.insert(rp("a"), entry(2));

        let p = plan(&base, &local, &other, &BTreeMap::new());
        assert_eq!(p[&rp("a")], MergeAction::Conflict);
    }

    #[test]
    fn flag_only_change_is_reported_distinctly() {
        let mut base = BTreeMap::new();
        base.insert(rp("a"), entry(1));
        let mut local = BTreeMap::new();
        local.insert(rp("a"), entry(1));
        let mut other = BTreeMap::new();
        other.insert(
            rp("a"),
            MergeEntry {
                filenode: node(1),
                flag: FileFlag::Executable,
            },
        );

        let p = plan(&base, &local, &other, &BTreeMap::new());
        assert_eq!(p[&rp("a")], MergeAction::FlagChange);
    }
}
