/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Path matchers (spec.md §4.8): a matcher is a pure predicate
//! `path -> {match, no-match}` used to filter `status`, `commit`, and
//! working-directory walks down to a caller-chosen subset of the tree.
//!
//! [`IncludeExcludeMatcher`] is the one matcher every caller actually
//! builds; [`AlwaysMatcher`] and [`NeverMatcher`] exist for the common
//! degenerate cases (no patterns given at all, or a deliberately empty
//! selection) so callers never need to special-case "no filter".

mod error;
mod pattern;

pub use error::MatchError;
pub use error::Result;
pub use pattern::Pattern;

use pattern::Compiled;
use types::RepoPath;

/// A pure predicate over repo-relative paths.
///
/// `file_set` lets a matcher declare its exact membership when it knows
/// one up front (only `path:`/`relpath:` patterns without globs or
/// regexps can); callers doing a manifest walk can then iterate the
/// declared set directly instead of testing every tracked path.
pub trait Matcher {
    fn matches(&self, path: &RepoPath) -> bool;

    fn file_set(&self) -> Option<&[RepoPath]> {
        None
    }
}

/// Matches every path. The default when a caller supplies no patterns.
pub struct AlwaysMatcher;

impl Matcher for AlwaysMatcher {
    fn matches(&self, _path: &RepoPath) -> bool {
        true
    }
}

/// Matches no path. Useful as an explicit "select nothing" rather than
/// `Option<Box<dyn Matcher>>` threading through every call site.
pub struct NeverMatcher;

impl Matcher for NeverMatcher {
    fn matches(&self, _path: &RepoPath) -> bool {
        false
    }
}

/// The general-purpose matcher: includes and excludes compose by
/// `match = (includes_empty ∨ any_include) ∧ ¬any_exclude` (spec.md
/// §4.8).
pub struct IncludeExcludeMatcher {
    includes: Vec<Compiled>,
    excludes: Vec<Compiled>,
    file_set: Option<Vec<RepoPath>>,
}

impl IncludeExcludeMatcher {
    /// Builds a matcher from parsed patterns, anchoring any `relpath:`
    /// pattern to `cwd` (a repo-relative directory, `""` for the root).
    pub fn new(includes: &[Pattern], excludes: &[Pattern], cwd: &str) -> Result<Self> {
        let includes: Vec<Compiled> = includes
            .iter()
            .map(|p| Compiled::compile(p, cwd))
            .collect::<Result<_>>()?;
        let excludes: Vec<Compiled> = excludes
            .iter()
            .map(|p| Compiled::compile(p, cwd))
            .collect::<Result<_>>()?;

        // Only path/relpath patterns (no globs, no regexps) yield a
        // known-finite file set; anything else forces a per-path test.
        let file_set = if !includes.is_empty()
            && includes.iter().all(|c| matches!(c, Compiled::Subtree(_)))
        {
            Some(
                includes
                    .iter()
                    .filter_map(|c| match c {
                        Compiled::Subtree(root) => RepoPath::new(root.clone()).ok(),
                        _ => None,
                    })
                    .collect(),
            )
        } else {
            None
        };

        Ok(IncludeExcludeMatcher {
            includes,
            excludes,
            file_set,
        })
    }
}

impl Matcher for IncludeExcludeMatcher {
    fn matches(&self, path: &RepoPath) -> bool {
        let includes_empty = self.includes.is_empty();
        let any_include = self.includes.iter().any(|p| p.matches(path));
        let any_exclude = self.excludes.iter().any(|p| p.matches(path));
        (includes_empty || any_include) && !any_exclude
    }

    fn file_set(&self) -> Option<&[RepoPath]> {
        self.file_set.as_deref()
    }
}

/// A lazy, finite, non-restartable view over `candidates` filtered by
/// `matcher` (spec.md §4.8 `walk`). Once `next()` returns `None` the
/// underlying candidate source has been fully drained and every later
/// call keeps returning `None`, even if `candidates` could in principle
/// produce more.
pub struct Walk<'m, M: Matcher + ?Sized, I> {
    matcher: &'m M,
    candidates: I,
    done: bool,
}

impl<'m, M, I> Iterator for Walk<'m, M, I>
where
    M: Matcher + ?Sized,
    I: Iterator<Item = RepoPath>,
{
    type Item = RepoPath;

    fn next(&mut self) -> Option<RepoPath> {
        if self.done {
            return None;
        }
        for candidate in self.candidates.by_ref() {
            if self.matcher.matches(&candidate) {
                return Some(candidate);
            }
        }
        self.done = true;
        None
    }
}

/// Builds the lazy walk over an arbitrary candidate source (a manifest's
/// tracked paths, a dirstate's entries, or both chained together).
pub fn walk<'m, M, I>(matcher: &'m M, candidates: I) -> Walk<'m, M, I::IntoIter>
where
    M: Matcher + ?Sized,
    I: IntoIterator<Item = RepoPath>,
{
    Walk {
        matcher,
        candidates: candidates.into_iter(),
        done: false,
    }
}

/// Lists regular files under `root`, skipping any directory named in
/// `skip_dirs` (the repository's metadata directory, typically), and
/// yielding each as a [`RepoPath`] relative to `root`. Symlinks are not
/// followed, matching the teacher's convention of treating a symlink as
/// a leaf file rather than a traversal edge.
pub fn walk_working_dir(
    root: &std::path::Path,
    skip_dirs: &[&str],
) -> impl Iterator<Item = RepoPath> + '_ {
    let skip_dirs: Vec<String> = skip_dirs.iter().map(|s| s.to_string()).collect();
    ignore::WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .hidden(false)
        .filter_entry(move |entry| {
            if entry.depth() == 0 {
                return true;
            }
            !skip_dirs.iter().any(|skip| entry.file_name() == skip.as_str())
        })
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .filter_map(move |entry| {
            let relative = entry.path().strip_prefix(root).ok()?;
            let slash_path = relative.to_str()?.replace('\\', "/");
            RepoPath::new(slash_path).ok()
        })
}
