/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Phases (SPEC_FULL §3 supplement): a changeset's mutable visibility
//! tag, `public < draft < secret`, tracked outside the revlog in
//! `store/phaseroots` via [`pushkey::PushkeyStore`].
//!
//! A phase may only move to a *lower* number (towards `public`) without
//! an explicit override; moving to a higher number (towards `secret`)
//! needs one, since it would otherwise let a changeset quietly become
//! less visible than something that already depends on it.

use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use pushkey::PushkeyStore;
use pushkey::NAMESPACE_PHASES;
use serde::Deserialize;
use serde::Serialize;
use types::Node;

use crate::error::RepoError;

#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    Public = 0,
    Draft = 1,
    Secret = 2,
}

/// A freshly committed changeset starts here unless configured
/// otherwise (`phases.new-commit`).
pub const DEFAULT_NEW_COMMIT_PHASE: Phase = Phase::Draft;

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Public => "public",
            Phase::Draft => "draft",
            Phase::Secret => "secret",
        }
    }

    pub fn parse(s: &str) -> Option<Phase> {
        match s {
            "public" => Some(Phase::Public),
            "draft" => Some(Phase::Draft),
            "secret" => Some(Phase::Secret),
            _ => None,
        }
    }
}

pub struct PhaseStore {
    store: PushkeyStore,
}

impl PhaseStore {
    pub fn open(path: &Path) -> Result<Self> {
        let store = PushkeyStore::open(path)
            .with_context(|| format!("opening phase store at {}", path.display()))?;
        Ok(PhaseStore { store })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.store
            .save(path)
            .with_context(|| format!("saving phase store at {}", path.display()))
    }

    /// A node with no recorded phase is [`DEFAULT_NEW_COMMIT_PHASE`]:
    /// everything this repository has ever committed started there, and
    /// nothing demotes it implicitly.
    pub fn get(&self, node: &Node) -> Phase {
        self.store
            .get(NAMESPACE_PHASES, &node.to_hex())
            .and_then(Phase::parse)
            .unwrap_or(DEFAULT_NEW_COMMIT_PHASE)
    }

    /// Moves `node` to `phase`. Refuses a move to a *higher* number
    /// (more private) unless `force` is set (SPEC_FULL §3 supplement).
    pub fn set(&mut self, node: &Node, phase: Phase, force: bool) -> Result<()> {
        let current = self.get(node);
        if phase > current && !force {
            return Err(RepoError::PhaseRegression {
                node: *node,
                from: current,
                to: phase,
            }
            .into());
        }
        let key = node.to_hex();
        let old = self.store.get(NAMESPACE_PHASES, &key).map(str::to_owned);
        self.store
            .push(NAMESPACE_PHASES, &key, old.as_deref(), Some(phase.as_str()));
        Ok(())
    }

    pub fn entries(&self) -> Vec<(Node, Phase)> {
        self.store
            .list(NAMESPACE_PHASES)
            .into_iter()
            .filter_map(|(k, v)| Some((Node::from_hex(k).ok()?, Phase::parse(v)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(byte: u8) -> Node {
        Node::from_bytes([byte; types::NODE_BYTES])
    }

    #[test]
    fn unrecorded_node_defaults_to_draft() {
        let store = PhaseStore::open(&std::path::PathBuf::from("/nonexistent")).unwrap();
        assert_eq!(store.get(&node(1)), Phase::Draft);
    }

    #[test]
    fn publishing_is_allowed_without_force() {
        let mut store = PhaseStore::open(&std::path::PathBuf::from("/nonexistent")).unwrap();
        store.set(&node(1), Phase::Public, false).unwrap();
        assert_eq!(store.get(&node(1)), Phase::Public);
    }

    #[test]
    fn hiding_a_public_node_requires_force() {
        let mut store = PhaseStore::open(&std::path::PathBuf::from("/nonexistent")).unwrap();
        store.set(&node(1), Phase::Public, false).unwrap();
        assert!(store.set(&node(1), Phase::Secret, false).is_err());
        store.set(&node(1), Phase::Secret, true).unwrap();
        assert_eq!(store.get(&node(1)), Phase::Secret);
    }

    #[test]
    fn save_and_open_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phaseroots");
        let mut store = PhaseStore::open(&path).unwrap();
        store.set(&node(3), Phase::Public, false).unwrap();
        store.save(&path).unwrap();

        let reloaded = PhaseStore::open(&path).unwrap();
        assert_eq!(reloaded.get(&node(3)), Phase::Public);
    }
}
