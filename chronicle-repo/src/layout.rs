/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The on-disk repository layout (spec.md §6.1) and the paths every
//! other module in this crate derives from it.
//!
//! The metadata directory is named `.chronicle`, not `.hg`; every path
//! *inside* it keeps the structure spec.md §6.1 describes (`store/`,
//! `dirstate`, `journal`, ...) unchanged, since the rename only applies
//! to the top-level directory name, not the layout semantics.

use std::path::Path;
use std::path::PathBuf;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;

use crate::error::RepoError;

pub const METADATA_DIR: &str = ".chronicle";

/// Requirement tokens this implementation understands (spec.md §6.1,
/// "one feature token per line; unknown ⇒ abort"). `fncache` and
/// `strip` from the original layout are deliberately absent: this
/// store's path encoding (`types::encode_store_path`) is already
/// self-describing, and history-rewriting (`strip`) is outside
/// spec.md's component list.
const KNOWN_REQUIREMENTS: &[&str] = &["revlogv1", "store"];

/// Absolute paths to every file and directory this crate touches,
/// derived once from the repository root.
#[derive(Clone, Debug)]
pub struct Paths {
    pub root: PathBuf,
    pub dot_dir: PathBuf,
    pub store_dir: PathBuf,
    pub requires: PathBuf,
    pub dirstate: PathBuf,
    pub config: PathBuf,
    pub branch: PathBuf,
    pub wlock: PathBuf,
    pub lock: PathBuf,
    pub journal: PathBuf,
    pub last_message: PathBuf,
    pub phaseroots: PathBuf,
    pub bookmarks: PathBuf,
    pub merge_state: PathBuf,
}

impl Paths {
    pub fn new(root: &Path) -> Self {
        let dot_dir = root.join(METADATA_DIR);
        let store_dir = dot_dir.join("store");
        Paths {
            requires: dot_dir.join("requires"),
            dirstate: dot_dir.join("dirstate"),
            config: dot_dir.join("config"),
            branch: dot_dir.join("branch"),
            wlock: dot_dir.join("wlock"),
            lock: dot_dir.join("lock"),
            journal: dot_dir.join("journal"),
            last_message: dot_dir.join("last-message.txt"),
            phaseroots: store_dir.join("phaseroots"),
            bookmarks: store_dir.join("bookmarks"),
            merge_state: dot_dir.join("merge-state"),
            store_dir,
            dot_dir,
            root: root.to_path_buf(),
        }
    }

    pub fn exists(&self) -> bool {
        self.dot_dir.is_dir()
    }
}

/// Creates a fresh repository at `root` (spec.md §6.1): the metadata
/// directory, the store subtree, and the `requires` file. Fails if a
/// repository already exists there.
pub fn init(root: &Path) -> Result<Paths> {
    let paths = Paths::new(root);
    if paths.exists() {
        bail!(RepoError::AlreadyExists(root.to_path_buf()));
    }
    std::fs::create_dir_all(paths.store_dir.join("data"))
        .with_context(|| format!("creating store directory at {}", paths.store_dir.display()))?;
    std::fs::write(&paths.requires, KNOWN_REQUIREMENTS.join("\n") + "\n")
        .with_context(|| format!("writing requires file at {}", paths.requires.display()))?;
    std::fs::write(&paths.branch, "default\n")
        .with_context(|| format!("writing branch file at {}", paths.branch.display()))?;
    Ok(paths)
}

/// Validates an existing repository's `requires` file, failing closed
/// on any token this implementation doesn't understand (spec.md §6.1).
pub fn check_requirements(paths: &Paths) -> Result<()> {
    let text = std::fs::read_to_string(&paths.requires)
        .with_context(|| format!("reading requires file at {}", paths.requires.display()))?;
    for token in text.lines().filter(|l| !l.is_empty()) {
        if !KNOWN_REQUIREMENTS.contains(&token) {
            bail!(RepoError::UnsupportedRequirement(token.to_owned()));
        }
    }
    Ok(())
}

pub fn open_paths(root: &Path) -> Result<Paths> {
    let paths = Paths::new(root);
    if !paths.exists() {
        bail!(RepoError::NotARepository(root.to_path_buf()));
    }
    check_requirements(&paths)?;
    Ok(paths)
}

pub fn current_branch(paths: &Paths) -> Result<String> {
    match std::fs::read_to_string(&paths.branch) {
        Ok(text) => Ok(text.trim().to_owned()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok("default".to_owned()),
        Err(e) => Err(e).with_context(|| format!("reading branch file at {}", paths.branch.display())),
    }
}

pub fn set_current_branch(paths: &Paths, name: &str) -> Result<()> {
    std::fs::write(&paths.branch, format!("{name}\n"))
        .with_context(|| format!("writing branch file at {}", paths.branch.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_the_metadata_directory_and_requires_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = init(dir.path()).unwrap();
        assert!(paths.store_dir.is_dir());
        assert!(paths.requires.is_file());
        assert_eq!(current_branch(&paths).unwrap(), "default");
    }

    #[test]
    fn init_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        init(dir.path()).unwrap();
        assert!(init(dir.path()).is_err());
    }

    #[test]
    fn open_paths_rejects_a_non_repository() {
        let dir = tempfile::tempdir().unwrap();
        assert!(open_paths(dir.path()).is_err());
    }

    #[test]
    fn open_paths_rejects_an_unknown_requirement() {
        let dir = tempfile::tempdir().unwrap();
        let paths = init(dir.path()).unwrap();
        std::fs::write(&paths.requires, "revlogv1\nstore\nfrobnicate\n").unwrap();
        assert!(open_paths(dir.path()).is_err());
    }

    #[test]
    fn set_current_branch_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let paths = init(dir.path()).unwrap();
        set_current_branch(&paths, "feature").unwrap();
        assert_eq!(current_branch(&paths).unwrap(), "feature");
    }
}
