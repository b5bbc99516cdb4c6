/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Bookmarks (SPEC_FULL §3 supplement): named movable pointers to
//! changelog nodes, stored as CAS entries in `store/bookmarks` via
//! [`pushkey::PushkeyStore`] rather than through the revlog.

use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use pushkey::PushkeyStore;
use pushkey::NAMESPACE_BOOKMARKS;
use types::Node;

use crate::error::RepoError;

pub struct Bookmarks {
    store: PushkeyStore,
}

impl Bookmarks {
    pub fn open(path: &Path) -> Result<Self> {
        let store = PushkeyStore::open(path)
            .with_context(|| format!("opening bookmark store at {}", path.display()))?;
        Ok(Bookmarks { store })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.store
            .save(path)
            .with_context(|| format!("saving bookmark store at {}", path.display()))
    }

    pub fn get(&self, name: &str) -> Option<Node> {
        self.store.get(NAMESPACE_BOOKMARKS, name).and_then(|hex| Node::from_hex(hex).ok())
    }

    pub fn list(&self) -> Vec<(String, Node)> {
        self.store
            .list(NAMESPACE_BOOKMARKS)
            .into_iter()
            .filter_map(|(name, hex)| Some((name.to_owned(), Node::from_hex(hex).ok()?)))
            .collect()
    }

    /// Moves (or creates) `name` to point at `target`. Fails if the
    /// bookmark moved out from under the caller between reading it and
    /// calling this (compare-and-swap, spec.md §4.9).
    pub fn set(&mut self, name: &str, target: Node) -> Result<()> {
        let old_hex = self.store.get(NAMESPACE_BOOKMARKS, name).map(str::to_owned);
        let new_hex = target.to_hex();
        if !self.store.push(NAMESPACE_BOOKMARKS, name, old_hex.as_deref(), Some(&new_hex)) {
            return Err(RepoError::BookmarkMoved(name.to_owned()).into());
        }
        Ok(())
    }

    pub fn delete(&mut self, name: &str) -> Result<()> {
        let old_hex = self.store.get(NAMESPACE_BOOKMARKS, name).map(str::to_owned);
        if old_hex.is_none() {
            return Ok(());
        }
        if !self.store.push(NAMESPACE_BOOKMARKS, name, old_hex.as_deref(), None) {
            return Err(RepoError::BookmarkMoved(name.to_owned()).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(byte: u8) -> Node {
        Node::from_bytes([byte; types::NODE_BYTES])
    }

    #[test]
    fn set_and_get_round_trip() {
        let mut bookmarks = Bookmarks::open(&std::path::PathBuf::from("/nonexistent")).unwrap();
        bookmarks.set("main", node(1)).unwrap();
        assert_eq!(bookmarks.get("main"), Some(node(1)));
    }

    #[test]
    fn delete_is_idempotent() {
        let mut bookmarks = Bookmarks::open(&std::path::PathBuf::from("/nonexistent")).unwrap();
        bookmarks.delete("never-existed").unwrap();
        bookmarks.set("main", node(1)).unwrap();
        bookmarks.delete("main").unwrap();
        assert_eq!(bookmarks.get("main"), None);
        bookmarks.delete("main").unwrap();
    }

    #[test]
    fn save_and_open_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bookmarks");
        let mut bookmarks = Bookmarks::open(&path).unwrap();
        bookmarks.set("main", node(7)).unwrap();
        bookmarks.save(&path).unwrap();

        let reloaded = Bookmarks::open(&path).unwrap();
        assert_eq!(reloaded.get("main"), Some(node(7)));
    }
}
