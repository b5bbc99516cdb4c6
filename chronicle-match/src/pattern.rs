/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Pattern kinds (spec.md §4.8) and their compiled, path-matching form.
//!
//! A pattern string is `kind:rest`; an absent `kind:` prefix defaults to
//! `glob`, mirroring the ordinary command-line pattern syntax this
//! matcher is modeled on.

use crate::error::MatchError;
use crate::error::Result;
use types::RepoPath;

/// An uncompiled pattern as written by a caller (command-line argument,
/// ignore file line, config value).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Pattern {
    /// Shell glob over the whole repo-relative path (e.g. `*.rs`,
    /// `src/**/*.md`).
    Glob(String),
    /// Regular expression matched anywhere the path fully matches.
    Regexp(String),
    /// Exact subtree, anchored at the repo root.
    Path(String),
    /// Exact subtree, anchored at the caller's current directory.
    RelPath(String),
}

impl Pattern {
    /// Splits a `kind:rest` pattern string; unprefixed patterns are glob.
    pub fn parse(spec: &str) -> Pattern {
        match spec.split_once(':') {
            Some(("glob", rest)) => Pattern::Glob(rest.to_string()),
            Some(("re", rest)) | Some(("regexp", rest)) => Pattern::Regexp(rest.to_string()),
            Some(("path", rest)) => Pattern::Path(rest.to_string()),
            Some(("relpath", rest)) => Pattern::RelPath(rest.to_string()),
            _ => Pattern::Glob(spec.to_string()),
        }
    }
}

/// A [`Pattern`] compiled against a particular `cwd` anchor, ready to
/// test repo-relative paths.
pub(crate) enum Compiled {
    Glob(globset::GlobMatcher),
    Regexp(regex::Regex),
    Subtree(String),
}

impl Compiled {
    pub(crate) fn compile(pattern: &Pattern, cwd: &str) -> Result<Compiled> {
        match pattern {
            Pattern::Glob(raw) => {
                let glob = globset::Glob::new(raw)
                    .map_err(|e| MatchError::Glob(raw.clone(), e))?
                    .compile_matcher();
                Ok(Compiled::Glob(glob))
            }
            Pattern::Regexp(raw) => {
                let re = regex::Regex::new(raw).map_err(|e| MatchError::Regexp(raw.clone(), e))?;
                Ok(Compiled::Regexp(re))
            }
            Pattern::Path(raw) => Ok(Compiled::Subtree(normalize_subtree(raw))),
            Pattern::RelPath(raw) => {
                let anchored = if cwd.is_empty() {
                    raw.clone()
                } else {
                    format!("{cwd}/{raw}")
                };
                Ok(Compiled::Subtree(normalize_subtree(&anchored)))
            }
        }
    }

    pub(crate) fn matches(&self, path: &RepoPath) -> bool {
        match self {
            Compiled::Glob(g) => g.is_match(path.as_str()),
            Compiled::Regexp(r) => r.is_match(path.as_str()),
            Compiled::Subtree(root) => {
                let p = path.as_str();
                p == root || p.strip_prefix(root.as_str()).is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }
}

fn normalize_subtree(raw: &str) -> String {
    raw.trim_matches('/').to_string()
}
