/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! DAG algorithms over the changelog's implicit parent graph (spec.md
//! §4.5).
//!
//! [`revlog::Revlog`] already exposes the cheap, purely-local-rev
//! operations (`heads`, `children`, `descendants`, `ancestor`,
//! `nodesbetween`) that only need the in-memory index. This crate adds
//! the richer, discovery-oriented operations spec.md §4.5 describes at
//! the changelog level — common-ancestor sets, `is_ancestor`, and
//! bounded missing-revision discovery between two sets of heads — and
//! translates between [`Node`] (the stable, portable identifier
//! callers use) and [`Rev`] (the local index the algorithms walk) at
//! the boundary, per spec.md §4.5's "expressed over local integer revs
//! ... translated at the boundary".

mod error;

pub use error::DagError;
pub use error::Result;

use std::collections::BinaryHeap;
use std::collections::HashSet;
use std::collections::VecDeque;

use revlog::Changelog;
use types::Node;
use types::Rev;

/// A view over a changelog's DAG. Borrows the changelog rather than
/// owning it, since every other repository subsystem needs concurrent
/// read access to the same changelog (spec.md §9 REDESIGN FLAGS: a
/// central repository context owns subsystems by value; this is a
/// narrow, borrowed capability, not a second owner).
pub struct Dag<'a> {
    changelog: &'a Changelog,
}

impl<'a> Dag<'a> {
    pub fn new(changelog: &'a Changelog) -> Self {
        Dag { changelog }
    }

    fn rev(&self, node: &Node) -> Result<Rev> {
        self.changelog
            .rev_for_node(node)
            .ok_or(DagError::NoSuchNode(*node))
    }

    fn ancestor_revs(&self, rev: Rev) -> HashSet<Rev> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        if !rev.is_null() {
            queue.push_back(rev);
        }
        while let Some(r) = queue.pop_front() {
            if !seen.insert(r) {
                continue;
            }
            let (p1, p2) = self.changelog.parents(r);
            if !p1.is_null() {
                queue.push_back(p1);
            }
            if !p2.is_null() {
                queue.push_back(p2);
            }
        }
        seen
    }

    /// Every ancestor of `node`, inclusive.
    pub fn ancestors(&self, node: &Node) -> Result<Vec<Node>> {
        let rev = self.rev(node)?;
        let mut out: Vec<Rev> = self.ancestor_revs(rev).into_iter().collect();
        out.sort();
        Ok(out.into_iter().map(|r| self.changelog.node(r)).collect())
    }

    /// Heads of the whole changelog (spec.md §4.5).
    pub fn heads(&self) -> Vec<Node> {
        self.changelog
            .heads()
            .into_iter()
            .map(|r| self.changelog.node(r))
            .collect()
    }

    /// All descendants of any of `roots`, excluding the roots themselves.
    pub fn descendants(&self, roots: &[Node]) -> Result<Vec<Node>> {
        let root_revs: Vec<Rev> = roots.iter().map(|n| self.rev(n)).collect::<Result<_>>()?;
        Ok(self
            .changelog
            .descendants(&root_revs)
            .into_iter()
            .map(|r| self.changelog.node(r))
            .collect())
    }

    /// The set of common ancestors of `nodes` (spec.md §4.5
    /// `commonancestors`).
    pub fn commonancestors(&self, nodes: &[Node]) -> Result<Vec<Node>> {
        let revs: Vec<Rev> = nodes.iter().map(|n| self.rev(n)).collect::<Result<_>>()?;
        let Some((first, rest)) = revs.split_first() else {
            return Ok(Vec::new());
        };
        let mut common = self.ancestor_revs(*first);
        for &rev in rest {
            let ancestors = self.ancestor_revs(rev);
            common.retain(|r| ancestors.contains(r));
        }
        let mut out: Vec<Rev> = common.into_iter().collect();
        out.sort();
        Ok(out.into_iter().map(|r| self.changelog.node(r)).collect())
    }

    /// One deterministic lowest common ancestor of `a` and `b` (spec.md
    /// SPEC_FULL §4.5: `gca`, as opposed to `gca_all`'s full set) — the
    /// highest-numbered rev among the maximal common ancestors, which is
    /// always unique since revs are topologically ordered.
    pub fn gca(&self, a: &Node, b: &Node) -> Result<Node> {
        let ra = self.rev(a)?;
        let rb = self.rev(b)?;
        Ok(self.changelog.node(self.changelog.ancestor(ra, rb)))
    }

    /// The full maximal set of common ancestors of `a` and `b`: common
    /// ancestors with no common-ancestor descendant among them (spec.md
    /// SPEC_FULL §4.5: `gca_all`).
    pub fn gca_all(&self, a: &Node, b: &Node) -> Result<Vec<Node>> {
        let ra = self.rev(a)?;
        let rb = self.rev(b)?;
        let common: HashSet<Rev> = self
            .ancestor_revs(ra)
            .intersection(&self.ancestor_revs(rb))
            .copied()
            .collect();
        let maximal: Vec<Rev> = common
            .iter()
            .filter(|&&candidate| {
                !common
                    .iter()
                    .any(|&other| other != candidate && self.is_ancestor_rev(candidate, other))
            })
            .copied()
            .collect();
        let mut maximal = maximal;
        maximal.sort();
        Ok(maximal.into_iter().map(|r| self.changelog.node(r)).collect())
    }

    fn is_ancestor_rev(&self, a: Rev, b: Rev) -> bool {
        self.ancestor_revs(b).contains(&a)
    }

    /// Whether `a` is an ancestor of (or equal to) `b` (spec.md
    /// SPEC_FULL §4.5).
    pub fn is_ancestor(&self, a: &Node, b: &Node) -> Result<bool> {
        let ra = self.rev(a)?;
        let rb = self.rev(b)?;
        Ok(self.is_ancestor_rev(ra, rb))
    }

    /// Revisions that are ancestors of `local_heads` but not of any of
    /// `remote_heads` (spec.md §4.5 `findmissing`): what a push would
    /// need to send. Walks the local and remote sides as two
    /// interleaved frontiers ordered by descending rev — since a
    /// revision's parents always have a lower rev than the revision
    /// itself, merging both frontiers through one max-heap guarantees a
    /// revision reachable from both sides is discovered by whichever
    /// side reaches it first, before the other side wastes work walking
    /// past it. The local walk stops as soon as its own frontier is
    /// exhausted; the remote walk only ever expands as far as the local
    /// walk still has outstanding work, so the traversal is bounded by
    /// the two sides' actual divergence rather than the whole graph
    /// (spec.md §4.5, "bidirectional-BFS bounded").
    pub fn findmissing(&self, local_heads: &[Node], remote_heads: &[Node]) -> Result<Vec<Node>> {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
        enum Side {
            Remote,
            Local,
        }

        let mut heap: BinaryHeap<(Rev, Side)> = BinaryHeap::new();
        let mut local_seen = HashSet::new();
        let mut remote_seen = HashSet::new();
        let mut missing = HashSet::new();
        let mut local_pending: usize = 0;

        for node in local_heads {
            let rev = self.rev(node)?;
            if !rev.is_null() {
                heap.push((rev, Side::Local));
                local_pending += 1;
            }
        }
        for node in remote_heads {
            let rev = self.rev(node)?;
            if !rev.is_null() {
                heap.push((rev, Side::Remote));
            }
        }

        while local_pending > 0 {
            let Some((rev, side)) = heap.pop() else {
                break;
            };
            if side == Side::Local {
                local_pending -= 1;
            }
            match side {
                Side::Remote => {
                    if !remote_seen.insert(rev) {
                        continue;
                    }
                    missing.remove(&rev);
                    let (p1, p2) = self.changelog.parents(rev);
                    if !p1.is_null() {
                        heap.push((p1, Side::Remote));
                    }
                    if !p2.is_null() {
                        heap.push((p2, Side::Remote));
                    }
                }
                Side::Local => {
                    if !local_seen.insert(rev) || remote_seen.contains(&rev) {
                        continue;
                    }
                    missing.insert(rev);
                    let (p1, p2) = self.changelog.parents(rev);
                    if !p1.is_null() {
                        heap.push((p1, Side::Local));
                        local_pending += 1;
                    }
                    if !p2.is_null() {
                        heap.push((p2, Side::Local));
                        local_pending += 1;
                    }
                }
            }
        }

        let mut out: Vec<Rev> = missing.into_iter().collect();
        out.sort();
        Ok(out.into_iter().map(|r| self.changelog.node(r)).collect())
    }

    /// Every rev reachable from a root and an ancestor of a head, plus
    /// the roots and heads themselves (spec.md §4.5 `nodesbetween`).
    pub fn nodesbetween(&self, roots: &[Node], heads: &[Node]) -> Result<Vec<Node>> {
        let root_revs: Vec<Rev> = roots.iter().map(|n| self.rev(n)).collect::<Result<_>>()?;
        let head_revs: Vec<Rev> = heads.iter().map(|n| self.rev(n)).collect::<Result<_>>()?;
        Ok(self
            .changelog
            .nodesbetween(&root_revs, &head_revs)
            .into_iter()
            .map(|r| self.changelog.node(r))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::Config;
    use lock::Transaction;
    use std::collections::BTreeMap;
    use types::RepoPath;
    use types::NULL_REV;

    fn commit(
        changelog: &mut Changelog,
        journal: &std::path::Path,
        p1: Rev,
        p2: Rev,
        message: &str,
    ) -> Node {
        let mut txn = Transaction::begin(journal).unwrap();
        let rev = changelog
            .commit(
                &mut txn,
                Node::from_hex(&"00".repeat(20)).unwrap(),
                vec![RepoPath::new("f").unwrap()],
                "u".into(),
                0,
                0,
                message.into(),
                p1,
                p2,
                BTreeMap::new(),
            )
            .unwrap();
        txn.commit().unwrap();
        changelog.node(rev)
    }

    fn build_diamond() -> (tempfile::TempDir, Changelog, Node, Node, Node, Node) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::builder().build();
        let journal = dir.path().join("journal");
        let mut changelog = Changelog::open(dir.path(), &config).unwrap();

        let base = commit(&mut changelog, &journal, NULL_REV, NULL_REV, "base");
        let base_rev = changelog.rev_for_node(&base).unwrap();
        let left = commit(&mut changelog, &journal, base_rev, NULL_REV, "left");
        let right = commit(&mut changelog, &journal, base_rev, NULL_REV, "right");
        let left_rev = changelog.rev_for_node(&left).unwrap();
        let right_rev = changelog.rev_for_node(&right).unwrap();
        let merge = commit(&mut changelog, &journal, left_rev, right_rev, "merge");
        (dir, changelog, base, left, right, merge)
    }

    #[test]
    fn gca_of_diamond_tips_is_the_base() {
        let (_dir, changelog, base, left, right, _merge) = build_diamond();
        let dag = Dag::new(&changelog);
        assert_eq!(dag.gca(&left, &right).unwrap(), base);
        assert_eq!(dag.gca_all(&left, &right).unwrap(), vec![base]);
    }

    /// Two tips each merging the same pair of parents in opposite order
    /// (`d = merge(b, c)`, `e = merge(c, b)`), so neither `b` nor `c` is
    /// an ancestor of the other: both are maximal common ancestors of
    /// `d` and `e`, and `gca` must tie-break to the higher-numbered one.
    #[test]
    fn gca_of_a_criss_cross_merge_ties_to_the_higher_rev() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::builder().build();
        let journal = dir.path().join("journal");
        let mut changelog = Changelog::open(dir.path(), &config).unwrap();

        let base = commit(&mut changelog, &journal, NULL_REV, NULL_REV, "base");
        let base_rev = changelog.rev_for_node(&base).unwrap();
        let b = commit(&mut changelog, &journal, base_rev, NULL_REV, "b");
        let c = commit(&mut changelog, &journal, base_rev, NULL_REV, "c");
        let b_rev = changelog.rev_for_node(&b).unwrap();
        let c_rev = changelog.rev_for_node(&c).unwrap();
        let d = commit(&mut changelog, &journal, b_rev, c_rev, "d");
        let e = commit(&mut changelog, &journal, c_rev, b_rev, "e");

        let dag = Dag::new(&changelog);
        let mut all = dag.gca_all(&d, &e).unwrap();
        all.sort_by_key(|n| changelog.rev_for_node(n).unwrap());
        assert_eq!(all, vec![b, c]);
        assert_eq!(dag.gca(&d, &e).unwrap(), c);
    }

    #[test]
    fn is_ancestor_reflects_the_diamond() {
        let (_dir, changelog, base, left, _right, merge) = build_diamond();
        let dag = Dag::new(&changelog);
        assert!(dag.is_ancestor(&base, &merge).unwrap());
        assert!(dag.is_ancestor(&left, &merge).unwrap());
        assert!(!dag.is_ancestor(&merge, &base).unwrap());
    }

    #[test]
    fn findmissing_reports_only_the_diverging_side() {
        let (_dir, changelog, base, left, right, _merge) = build_diamond();
        let dag = Dag::new(&changelog);
        let missing = dag.findmissing(&[right], &[left]).unwrap();
        assert_eq!(missing, vec![right]);
        assert!(!missing.contains(&base));
    }

    #[test]
    fn heads_reports_the_single_merge_tip() {
        let (_dir, changelog, _base, _left, _right, merge) = build_diamond();
        let dag = Dag::new(&changelog);
        assert_eq!(dag.heads(), vec![merge]);
    }
}
