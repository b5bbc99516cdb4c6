/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The generic `(namespace, key) -> value` side channel (spec.md §4.9):
//! "lightweight metadata (phases, bookmarks) that must not go through
//! the revlog machinery." Persisted the same way the dirstate and
//! mergestate are: a JSON snapshot written to a sibling temp file and
//! renamed over the target.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::error::PushkeyError;
use crate::error::Result;

/// Phase markers live here (SPEC_FULL §3, §4.9 supplement).
pub const NAMESPACE_PHASES: &str = "phases";
/// Bookmarks live here (SPEC_FULL §3, §4.9 supplement).
pub const NAMESPACE_BOOKMARKS: &str = "bookmarks";

/// A compare-and-swap side channel keyed by `(namespace, key)`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PushkeyStore {
    namespaces: BTreeMap<String, BTreeMap<String, String>>,
}

impl PushkeyStore {
    pub fn empty() -> Self {
        PushkeyStore::default()
    }

    /// Loads a pushkey store, or an empty one if the file doesn't exist
    /// yet (a freshly initialized repository has no phases or
    /// bookmarks recorded).
    pub fn open(path: &Path) -> Result<Self> {
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(PushkeyStore::empty()),
            Err(source) => {
                return Err(PushkeyError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_slice(&raw).map_err(|source| PushkeyError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let encoded = serde_json::to_vec_pretty(self).expect("PushkeyStore serializes infallibly");
        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, &encoded).map_err(|source| PushkeyError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, path).map_err(|source| PushkeyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(?path, namespaces = self.namespaces.len(), "pushkey store saved");
        Ok(())
    }

    pub fn get(&self, namespace: &str, key: &str) -> Option<&str> {
        self.namespaces.get(namespace)?.get(key).map(String::as_str)
    }

    /// Every `(key, value)` pair in `namespace`, in key order.
    pub fn list(&self, namespace: &str) -> Vec<(&str, &str)> {
        self.namespaces
            .get(namespace)
            .map(|entries| entries.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect())
            .unwrap_or_default()
    }

    /// Compare-and-swap: replaces `(namespace, key)`'s value with `new`
    /// only if its current value equals `old`, per spec.md §4.9
    /// (`push(ns, key, old, new) -> bool`). `None` stands for absence on
    /// either side, so a fresh key is set with `old: None` and a key is
    /// removed with `new: None`. Returns whether the swap happened.
    pub fn push(&mut self, namespace: &str, key: &str, old: Option<&str>, new: Option<&str>) -> bool {
        if self.get(namespace, key) != old {
            return false;
        }
        let entries = self.namespaces.entry(namespace.to_owned()).or_default();
        match new {
            Some(value) => {
                entries.insert(key.to_owned(), value.to_owned());
            }
            None => {
                entries.remove(key);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_sets_a_fresh_key_only_when_old_is_none() {
        let mut store = PushkeyStore::empty();
        assert!(store.push(NAMESPACE_BOOKMARKS, "main", None, Some("abc")));
        assert_eq!(store.get(NAMESPACE_BOOKMARKS, "main"), Some("abc"));

        assert!(!store.push(NAMESPACE_BOOKMARKS, "main", None, Some("def")));
        assert_eq!(store.get(NAMESPACE_BOOKMARKS, "main"), Some("abc"));
    }

    #[test]
    fn push_swaps_only_when_old_matches() {
        let mut store = PushkeyStore::empty();
        store.push(NAMESPACE_BOOKMARKS, "main", None, Some("abc"));

        assert!(!store.push(NAMESPACE_BOOKMARKS, "main", Some("wrong"), Some("def")));
        assert_eq!(store.get(NAMESPACE_BOOKMARKS, "main"), Some("abc"));

        assert!(store.push(NAMESPACE_BOOKMARKS, "main", Some("abc"), Some("def")));
        assert_eq!(store.get(NAMESPACE_BOOKMARKS, "main"), Some("def"));
    }

    #[test]
    fn push_can_delete_a_key() {
        let mut store = PushkeyStore::empty();
        store.push(NAMESPACE_PHASES, "deadbeef", None, Some("draft"));
        assert!(store.push(NAMESPACE_PHASES, "deadbeef", Some("draft"), None));
        assert_eq!(store.get(NAMESPACE_PHASES, "deadbeef"), None);
    }

    #[test]
    fn namespaces_do_not_collide() {
        let mut store = PushkeyStore::empty();
        store.push(NAMESPACE_PHASES, "k", None, Some("public"));
        store.push(NAMESPACE_BOOKMARKS, "k", None, Some("deadbeef"));
        assert_eq!(store.get(NAMESPACE_PHASES, "k"), Some("public"));
        assert_eq!(store.get(NAMESPACE_BOOKMARKS, "k"), Some("deadbeef"));
    }

    #[test]
    fn save_and_open_round_trips_and_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pushkey");

        let store = PushkeyStore::open(&path).unwrap();
        assert_eq!(store, PushkeyStore::empty());

        let mut store = PushkeyStore::empty();
        store.push(NAMESPACE_BOOKMARKS, "main", None, Some("abc"));
        store.save(&path).unwrap();

        let reloaded = PushkeyStore::open(&path).unwrap();
        assert_eq!(reloaded, store);
    }

    #[test]
    fn list_reports_every_entry_in_key_order() {
        let mut store = PushkeyStore::empty();
        store.push(NAMESPACE_BOOKMARKS, "zzz", None, Some("1"));
        store.push(NAMESPACE_BOOKMARKS, "aaa", None, Some("2"));
        assert_eq!(store.list(NAMESPACE_BOOKMARKS), vec![("aaa", "2"), ("zzz", "1")]);
    }
}
