/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The changelog: one revlog, fixed at `00changelog`, whose entries are
//! commits (spec.md §4.2, §3.1 "Changeset").
//!
//! A changeset's text format is
//! `manifest-hex \n user \n time tz[ extras] \n file \n file \n \n message`,
//! with `extras` (when present) a `\0`-joined list of `key:value` pairs
//! appended to the date line and `message` running verbatim to the end
//! of the payload, including embedded blank lines.

use std::collections::BTreeMap;
use std::ops::Deref;
use std::ops::DerefMut;
use std::path::Path;

use config::Config;
use lock::Transaction;
use types::Node;
use types::RepoPath;
use types::Rev;

use crate::error::RevlogError;
use crate::error::Result;
use crate::payload::RevlogPayload;
use crate::revlog::Revlog;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Changeset {
    pub manifest_node: Node,
    pub user: String,
    pub time: i64,
    pub tz_offset: i32,
    pub extras: BTreeMap<String, String>,
    pub files: Vec<RepoPath>,
    pub message: String,
}

impl RevlogPayload for Changeset {
    fn decode(raw: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(raw)
            .map_err(|e| RevlogError::Payload(format!("changeset is not utf8: {e}")))?;
        let mut lines = text.split('\n');

        let manifest_hex = lines
            .next()
            .ok_or_else(|| RevlogError::Payload("changeset missing manifest line".into()))?;
        let manifest_node = Node::from_hex(manifest_hex)
            .map_err(|e| RevlogError::Payload(format!("bad manifest node: {e}")))?;

        let user = lines
            .next()
            .ok_or_else(|| RevlogError::Payload("changeset missing user line".into()))?
            .to_owned();

        let date_line = lines
            .next()
            .ok_or_else(|| RevlogError::Payload("changeset missing date line".into()))?;
        let mut date_parts = date_line.splitn(3, ' ');
        let time: i64 = date_parts
            .next()
            .ok_or_else(|| RevlogError::Payload("changeset date line missing time".into()))?
            .parse()
            .map_err(|_| RevlogError::Payload("changeset time is not an integer".into()))?;
        let tz_offset: i32 = date_parts
            .next()
            .ok_or_else(|| RevlogError::Payload("changeset date line missing timezone".into()))?
            .parse()
            .map_err(|_| RevlogError::Payload("changeset timezone is not an integer".into()))?;
        let extras = match date_parts.next() {
            None => BTreeMap::new(),
            Some(rest) => parse_extras(rest)?,
        };

        let remaining: Vec<&str> = lines.collect();
        let mut files = Vec::new();
        let mut idx = 0;
        while idx < remaining.len() && !remaining[idx].is_empty() {
            let path = RepoPath::new(remaining[idx])
                .map_err(|e| RevlogError::Payload(format!("bad file path in changeset: {e}")))?;
            files.push(path);
            idx += 1;
        }
        let message = if idx < remaining.len() {
            remaining[idx + 1..].join("\n")
        } else {
            String::new()
        };

        Ok(Changeset {
            manifest_node,
            user,
            time,
            tz_offset,
            extras,
            files,
            message,
        })
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = String::new();
        out.push_str(&self.manifest_node.to_hex());
        out.push('\n');
        out.push_str(&self.user);
        out.push('\n');
        out.push_str(&self.time.to_string());
        out.push(' ');
        out.push_str(&self.tz_offset.to_string());
        if !self.extras.is_empty() {
            out.push(' ');
            let parts: Vec<String> = self
                .extras
                .iter()
                .map(|(k, v)| format!("{k}:{v}"))
                .collect();
            out.push_str(&parts.join("\0"));
        }
        out.push('\n');
        for file in &self.files {
            out.push_str(file.as_str());
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.message);
        out.into_bytes()
    }
}

fn parse_extras(rest: &str) -> Result<BTreeMap<String, String>> {
    let mut extras = BTreeMap::new();
    for chunk in rest.split('\0') {
        if chunk.is_empty() {
            continue;
        }
        let (k, v) = chunk
            .split_once(':')
            .ok_or_else(|| RevlogError::Payload(format!("malformed extra {chunk:?}")))?;
        extras.insert(k.to_owned(), v.to_owned());
    }
    Ok(extras)
}

/// The changelog: every commit, in order, the root of trust for what
/// has and has not been committed (spec.md §3.2 invariant 4).
pub struct Changelog(Revlog<Changeset>);

impl Changelog {
    pub fn open(store_dir: &Path, config: &Config) -> Result<Self> {
        Ok(Changelog(Revlog::open(store_dir, "00changelog", config)?))
    }

    /// Appends a new commit, returning its node.
    #[allow(clippy::too_many_arguments)]
    pub fn commit(
        &mut self,
        txn: &mut Transaction,
        manifest_node: Node,
        files: Vec<RepoPath>,
        user: String,
        time: i64,
        tz_offset: i32,
        message: String,
        p1: Rev,
        p2: Rev,
        extras: BTreeMap<String, String>,
    ) -> Result<Rev> {
        let changeset = Changeset {
            manifest_node,
            user,
            time,
            tz_offset,
            extras,
            files,
            message,
        };
        let link_rev = Rev::from(self.0.len());
        self.0.append(txn, p1, p2, link_rev, &changeset)
    }
}

impl Deref for Changelog {
    type Target = Revlog<Changeset>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Changelog {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::NULL_REV;

    fn sample(message: &str, extras: BTreeMap<String, String>) -> Changeset {
        Changeset {
            manifest_node: Node::from_hex(&"ab".repeat(20)).unwrap(),
            user: "alice".into(),
            time: 1_700_000_000,
            tz_offset: -3600,
            extras,
            files: vec![RepoPath::new("src/lib.rs").unwrap(), RepoPath::new("README").unwrap()],
            message: message.to_owned(),
        }
    }

    #[test]
    fn changeset_round_trips_without_extras() {
        let cs = sample("fix the thing\n\nlonger body", BTreeMap::new());
        let encoded = cs.encode();
        let decoded = Changeset::decode(&encoded).unwrap();
        assert_eq!(decoded, cs);
    }

    #[test]
    fn changeset_round_trips_with_extras() {
        let mut extras = BTreeMap::new();
        extras.insert("branch".to_owned(), "default".to_owned());
        extras.insert("rebase_source".to_owned(), "deadbeef".to_owned());
        let cs = sample("message", extras);
        let encoded = cs.encode();
        let decoded = Changeset::decode(&encoded).unwrap();
        assert_eq!(decoded, cs);
    }

    #[test]
    fn commit_through_changelog_sets_link_rev_to_self() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::builder().build();
        let journal = dir.path().join("journal");
        let mut changelog = Changelog::open(dir.path(), &config).unwrap();

        let mut txn = Transaction::begin(&journal).unwrap();
        let rev = changelog
            .commit(
                &mut txn,
                Node::from_hex(&"00".repeat(20)).unwrap(),
                vec![RepoPath::new("a").unwrap()],
                "bob".into(),
                0,
                0,
                "c1".into(),
                NULL_REV,
                NULL_REV,
                BTreeMap::new(),
            )
            .unwrap();
        txn.commit().unwrap();

        assert_eq!(changelog.link_rev(rev), rev);
        let read_back = changelog.read(rev).unwrap();
        assert_eq!(read_back.message, "c1");
    }
}
