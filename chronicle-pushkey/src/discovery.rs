/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Ancestor-sampling discovery (spec.md §4.9): "two peers exchange
//! their head sets; the local side computes `common = ancestors(local_
//! heads) ∩ ancestors(remote_heads)` using only hash identities
//! exchanged ... probabilistic sampling of ancestors — at each round,
//! the asker sends a sample of its nodes and the responder replies
//! which it has; rounds continue until the common frontier is tight.
//! Bandwidth is bounded; correctness degrades gracefully to 'send a
//! superset' rather than 'miss a revision.'"

use std::collections::HashSet;

use dag::Dag;
use rand::seq::SliceRandom;
use rand::Rng;
use types::Node;

use crate::error::Result;

/// The other side of a discovery round. A real transport implements
/// this over the wire; tests implement it directly over a second
/// in-process changelog.
pub trait DiscoveryPeer {
    /// The peer's current changelog heads.
    fn heads(&self) -> Vec<Node>;

    /// For each node in `sample`, whether the peer already has it.
    /// Order-preserving: `response[i]` answers `sample[i]`.
    fn known(&self, sample: &[Node]) -> Vec<bool>;
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DiscoveryResult {
    /// Nodes confirmed present on both sides.
    pub common: Vec<Node>,
    /// Nodes the local side has that the remote side needs (an
    /// ancestor of a local head, not confirmed common). A push sends
    /// exactly this set; discovery never omits a node it isn't sure
    /// about.
    pub missing: Vec<Node>,
}

/// Runs ancestor-sampling discovery against `peer`, starting from
/// `local_heads`. `sample_size` bounds per-round bandwidth;
/// `max_rounds` bounds total bandwidth — if the common frontier hasn't
/// converged by then, every still-undecided node is reported missing
/// rather than silently dropped (spec.md §4.9's "send a superset").
pub fn discover(
    dag: &Dag,
    local_heads: &[Node],
    peer: &impl DiscoveryPeer,
    sample_size: usize,
    max_rounds: usize,
    rng: &mut impl Rng,
) -> Result<DiscoveryResult> {
    let mut undecided: HashSet<Node> = HashSet::new();
    for head in local_heads {
        undecided.extend(dag.ancestors(head)?);
    }

    let mut common: HashSet<Node> = HashSet::new();
    let mut missing: HashSet<Node> = HashSet::new();

    let mut rounds = 0;
    while !undecided.is_empty() && rounds < max_rounds {
        let mut pool: Vec<Node> = undecided.iter().copied().collect();
        pool.sort();
        let take = sample_size.min(pool.len());
        let sample: Vec<Node> = pool.choose_multiple(rng, take).copied().collect();

        let responses = peer.known(&sample);
        for (node, known) in sample.iter().zip(responses) {
            undecided.remove(node);
            if known {
                common.insert(*node);
                for ancestor in dag.ancestors(node)? {
                    if undecided.remove(&ancestor) {
                        common.insert(ancestor);
                    }
                }
            } else {
                missing.insert(*node);
            }
        }
        rounds += 1;
    }

    // Anything the round budget left undecided is reported missing: a
    // push that sends a few extra already-known revisions is wasteful,
    // a push that omits one is wrong.
    missing.extend(undecided.drain());

    let mut common: Vec<Node> = common.into_iter().collect();
    common.sort();
    let mut missing: Vec<Node> = missing.into_iter().collect();
    missing.sort();
    Ok(DiscoveryResult { common, missing })
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::Config;
    use lock::Transaction;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use revlog::Changelog;
    use std::collections::BTreeMap;
    use types::RepoPath;
    use types::Rev;
    use types::NULL_REV;

    struct RemoteChangelog {
        changelog: Changelog,
    }

    impl DiscoveryPeer for RemoteChangelog {
        fn heads(&self) -> Vec<Node> {
            Dag::new(&self.changelog).heads()
        }

        fn known(&self, sample: &[Node]) -> Vec<bool> {
            sample
                .iter()
                .map(|node| self.changelog.rev_for_node(node).is_some())
                .collect()
        }
    }

    fn commit(changelog: &mut Changelog, journal: &std::path::Path, p1: Rev, p2: Rev, message: &str) -> Node {
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

    /// Two changelogs that share a common prefix and then diverge: both
    /// get `base`, then the local side adds two more commits the remote
    /// has never seen.
    fn diverging_pair() -> (tempfile::TempDir, tempfile::TempDir, Changelog, RemoteChangelog, Node, Node) {
        let local_dir = tempfile::tempdir().unwrap();
        let remote_dir = tempfile::tempdir().unwrap();
        let config = Config::builder().build();

        let local_journal = local_dir.path().join("journal");
        let remote_journal = remote_dir.path().join("journal");
        let mut local = Changelog::open(local_dir.path(), &config).unwrap();
        let mut remote = Changelog::open(remote_dir.path(), &config).unwrap();

        let base = commit(&mut local, &local_journal, NULL_REV, NULL_REV, "base");
        commit(&mut remote, &remote_journal, NULL_REV, NULL_REV, "base");

        let base_rev = local.rev_for_node(&base).unwrap();
        let mid = commit(&mut local, &local_journal, base_rev, NULL_REV, "mid");
        let mid_rev = local.rev_for_node(&mid).unwrap();
        let tip = commit(&mut local, &local_journal, mid_rev, NULL_REV, "tip");

        (local_dir, remote_dir, local, RemoteChangelog { changelog: remote }, base, tip)
    }

    #[test]
    fn discovery_finds_exactly_the_diverging_commits() {
        let (_local_dir, _remote_dir, local, remote, base, tip) = diverging_pair();
        let dag = Dag::new(&local);
        let mut rng = SmallRng::seed_from_u64(7);

        let result = discover(&dag, &[tip], &remote, 10, 20, &mut rng).unwrap();

        assert!(result.common.contains(&base));
        assert!(!result.missing.contains(&base));
        assert_eq!(result.missing.len(), 2);
    }

    #[test]
    fn identical_histories_have_nothing_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::builder().build();
        let journal = dir.path().join("journal");
        let mut changelog = Changelog::open(dir.path(), &config).unwrap();
        let base = commit(&mut changelog, &journal, NULL_REV, NULL_REV, "base");

        let remote_dir = tempfile::tempdir().unwrap();
        let remote_journal = remote_dir.path().join("journal");
        let mut remote_changelog = Changelog::open(remote_dir.path(), &config).unwrap();
        commit(&mut remote_changelog, &remote_journal, NULL_REV, NULL_REV, "base");
        let remote = RemoteChangelog {
            changelog: remote_changelog,
        };

        let dag = Dag::new(&changelog);
        let mut rng = SmallRng::seed_from_u64(1);
        let result = discover(&dag, &[base], &remote, 10, 20, &mut rng).unwrap();

        assert_eq!(result.common, vec![base]);
        assert!(result.missing.is_empty());
    }

    #[test]
    fn exhausting_the_round_budget_reports_the_remainder_as_missing() {
        let (_local_dir, _remote_dir, local, remote, _base, tip) = diverging_pair();
        let dag = Dag::new(&local);
        let mut rng = SmallRng::seed_from_u64(3);

        // Zero rounds: nothing gets a chance to be confirmed common, so
        // every local ancestor is reported missing. A superset, never a
        // silent omission.
        let result = discover(&dag, &[tip], &remote, 10, 0, &mut rng).unwrap();
        assert_eq!(result.common.len(), 0);
        assert_eq!(result.missing.len(), dag.ancestors(&tip).unwrap().len());
    }
}
