/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Rename detection for unlinked/added pairs within one side of a merge
//! (spec.md §4.6, "a similarity heuristic for unlinked/added pairs in
//! the same changeset"). Copy metadata recorded by the filelog is
//! always preferred over this heuristic; it only runs over pairs that
//! arrive with no such metadata.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::hash::Hash;
use std::hash::Hasher;

use types::RepoPath;

/// The default rename-similarity threshold (spec.md §9 Open Questions:
/// left to the implementation). Two files whose line-hash overlap meets
/// or exceeds this score are considered a rename candidate.
pub const DEFAULT_RENAME_THRESHOLD: f64 = 0.5;

/// A deterministic line-hash-overlap similarity score in `[0.0, 1.0]`:
/// the Dice coefficient of the two contents' line-hash sets. Two empty
/// contents are defined as identical (`1.0`); one empty and one
/// non-empty are unrelated (`0.0`).
pub fn similarity(a: &[u8], b: &[u8]) -> f64 {
    let lines_a = line_hashes(a);
    let lines_b = line_hashes(b);
    if lines_a.is_empty() && lines_b.is_empty() {
        return 1.0;
    }
    if lines_a.is_empty() || lines_b.is_empty() {
        return 0.0;
    }
    let shared = lines_a.intersection(&lines_b).count();
    (2 * shared) as f64 / (lines_a.len() + lines_b.len()) as f64
}

fn line_hashes(content: &[u8]) -> HashSet<u64> {
    content
        .split(|&b| b == b'\n')
        .filter(|line| !line.is_empty())
        .map(|line| {
            let mut hasher = DefaultHasher::new();
            line.hash(&mut hasher);
            hasher.finish()
        })
        .collect()
}

/// Greedily pairs each removed path with the added path most similar to
/// it, provided the similarity meets `threshold`. Each path is used in
/// at most one pair. Iterates candidates in descending similarity order
/// so the strongest matches are claimed first; ties break on path
/// order, keeping the result deterministic.
pub fn rename_candidates(
    removed: &[(RepoPath, Vec<u8>)],
    added: &[(RepoPath, Vec<u8>)],
    threshold: f64,
) -> BTreeMap<RepoPath, RepoPath> {
    let mut scored: Vec<(f64, &RepoPath, &RepoPath)> = Vec::new();
    for (removed_path, removed_content) in removed {
        for (added_path, added_content) in added {
            let score = similarity(removed_content, added_content);
            if score >= threshold {
                scored.push((score, removed_path, added_path));
            }
        }
    }
    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap()
            .then_with(|| a.1.cmp(b.1))
            .then_with(|| a.2.cmp(b.2))
    });

    let mut taken_removed = HashSet::new();
    let mut taken_added = HashSet::new();
    let mut result = BTreeMap::new();
    for (_, removed_path, added_path) in scored {
        if taken_removed.contains(removed_path) || taken_added.contains(added_path) {
            continue;
        }
        taken_removed.insert(removed_path);
        taken_added.insert(added_path);
        result.insert(added_path.clone(), removed_path.clone());
    }
    result
}
