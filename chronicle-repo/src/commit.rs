/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The commit operation (spec.md §4.5): snapshot the working directory
//! against the matcher-scoped set of changed paths, write new filelog
//! and manifest revisions, then append a changeset — all inside one
//! transaction, with the `pretxncommit` hook able to abort it before
//! anything becomes durable.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use lock::Transaction;
use matcher::Matcher;
use revlog::FileMetadata;
use revlog::Filelog;
use revlog::ManifestEntry;
use revlog::ManifestMap;
use types::Node;
use types::RepoPath;
use types::Rev;
use types::NULL_REV;

use crate::content::RepoFileSource;
use crate::error::RepoError;
use crate::fsflag;
use crate::hooks;
use crate::layout;
use crate::phase::DEFAULT_NEW_COMMIT_PHASE;
use crate::Repository;

/// Parameters a caller supplies for one commit; everything else
/// (parents, manifest base, branch) is derived from repository state.
pub struct CommitRequest<'a> {
    pub matcher: &'a dyn Matcher,
    pub user: String,
    pub time: i64,
    pub tz_offset: i32,
    pub message: String,
}

impl Repository {
    /// The base manifest a fresh `commit`/`status` call compares the
    /// working directory against: the first parent's manifest, or empty
    /// for the initial commit.
    fn base_manifest(&mut self) -> Result<ManifestMap> {
        let (p1, _) = self.dirstate.parents();
        if p1.is_null() {
            return Ok(ManifestMap::new());
        }
        let p1_rev = self.rev_of(&p1)?;
        let manifest_node = self.changelog.read(p1_rev)?.manifest_node;
        Ok(self.manifest.read(&manifest_node)?)
    }

    /// Working-directory status against the first parent, scoped to
    /// `matcher` (spec.md §4.3 supplement).
    pub fn status(&mut self, matcher: &dyn Matcher) -> Result<dirstate::Status> {
        let base_manifest = self.base_manifest()?;
        let tracked: BTreeMap<RepoPath, Node> =
            base_manifest.iter().map(|(p, e)| (p.clone(), e.filenode)).collect();
        let ignore = self.ignore_matcher()?;
        let mut content_source = RepoFileSource::new(self.paths.store_dir.clone(), &self.config);
        Ok(self.dirstate.status(
            &self.paths.root,
            &tracked,
            matcher,
            &ignore,
            &mut content_source,
            &[layout::METADATA_DIR],
        )?)
    }

    /// Records a new changeset from the working directory, scoped to
    /// `request.matcher` (spec.md §4.5). Refuses to run while an earlier
    /// merge has unresolved paths, and refuses an empty commit.
    pub fn commit(&mut self, request: CommitRequest<'_>) -> Result<Node> {
        let merge_state = merge::MergeState::load(&self.paths.merge_state)?;
        if let Some(state) = &merge_state {
            state.ensure_resolved()?;
        }

        let (p1, p2) = self.dirstate.parents();
        let p1_rev = self.rev_of(&p1)?;
        let p2_rev = self.rev_of(&p2)?;

        let base_manifest = self.base_manifest()?;
        let status = self.status(request.matcher)?;

        if status.added.is_empty()
            && status.modified.is_empty()
            && status.removed.is_empty()
            && status.deleted.is_empty()
        {
            return Err(RepoError::NothingToCommit.into());
        }

        let mut new_manifest = base_manifest.clone();
        let mut touched_files: Vec<RepoPath> = Vec::new();
        let link_rev = Rev::from(self.changelog.len());

        let journal = self.paths.journal.clone();
        let mut txn = Transaction::begin(&journal)?;

        for path in status.removed.iter().chain(status.deleted.iter()) {
            new_manifest.remove(path);
            touched_files.push(path.clone());
        }

        for path in status.added.iter().chain(status.modified.iter()) {
            let full_path = self.paths.root.join(path.as_str());
            let content = std::fs::read(&full_path)
                .with_context(|| format!("reading {}", full_path.display()))?;
            let flag = fsflag::read_flag(&full_path)
                .with_context(|| format!("reading file mode of {}", full_path.display()))?;
            let copy_from = self
                .dirstate
                .get(path)
                .and_then(|entry| entry.copy_source.clone());
            let metadata = FileMetadata {
                copy_rev: copy_from
                    .as_ref()
                    .and_then(|src| base_manifest.get(src))
                    .map(|e| e.filenode),
                copy_from,
            };

            ensure_filelog_dir(&self.paths.store_dir, path)?;
            let mut filelog = Filelog::open(&self.paths.store_dir, path, &self.config)?;
            let filelog_p1 = match base_manifest.get(path) {
                Some(existing) => filelog.rev_for_node(&existing.filenode).unwrap_or(NULL_REV),
                None => NULL_REV,
            };
            let filelog_p2 = merge_state
                .as_ref()
                .and_then(|state| state.entries().get(path))
                .and_then(|record| record.other)
                .and_then(|other_node| filelog.rev_for_node(&other_node))
                .unwrap_or(NULL_REV);
            let filenode = filelog.add(&mut txn, content, metadata, link_rev, filelog_p1, filelog_p2)?;
            new_manifest.insert(path.clone(), ManifestEntry { filenode, flag });
            touched_files.push(path.clone());
        }

        touched_files.sort();
        touched_files.dedup();

        let manifest_node = self.manifest.add(&mut txn, &new_manifest, link_rev, p1_rev, p2_rev)?;

        let branch = layout::current_branch(&self.paths)?;
        let mut extras = BTreeMap::new();
        extras.insert("branch".to_owned(), branch);

        let new_rev = self.changelog.commit(
            &mut txn,
            manifest_node,
            touched_files,
            request.user,
            request.time,
            request.tz_offset,
            request.message.clone(),
            p1_rev,
            p2_rev,
            extras,
        )?;
        let new_node = self.changelog.node(new_rev);

        if let Err(e) = hooks::fire_blocking(&self.config, &self.paths.root, "pretxncommit", Some(new_node)) {
            txn.abort()?;
            return Err(e);
        }
        txn.commit()?;

        self.phases.set(&new_node, DEFAULT_NEW_COMMIT_PHASE, false)?;
        self.phases.save(&self.paths.phaseroots)?;

        self.dirstate.set_parents(new_node, Node::default());
        for path in status.removed.iter().chain(status.deleted.iter()) {
            self.dirstate.remove(path);
        }
        for path in status.added.iter().chain(status.modified.iter()) {
            let full_path = self.paths.root.join(path.as_str());
            let entry = stat_entry(&full_path)?;
            self.dirstate.set(path.clone(), entry);
        }
        self.dirstate.save(&self.paths.dirstate)?;

        std::fs::write(&self.paths.last_message, &request.message)
            .with_context(|| format!("writing {}", self.paths.last_message.display()))?;

        let _ = hooks::fire(&self.config, &self.paths.root, "commit", Some(new_node));

        Ok(new_node)
    }

    fn rev_of(&self, node: &Node) -> Result<Rev> {
        if node.is_null() {
            return Ok(NULL_REV);
        }
        self.changelog
            .rev_for_node(node)
            .ok_or(RepoError::UnknownRevision(*node))
            .map_err(Into::into)
    }

    pub(crate) fn ignore_matcher(&self) -> Result<matcher::IncludeExcludeMatcher> {
        let patterns: Vec<matcher::Pattern> = self
            .config
            .get_list("ui", "ignore")
            .iter()
            .map(|p| matcher::Pattern::parse(p))
            .collect();
        Ok(matcher::IncludeExcludeMatcher::new(&patterns, &[], "")?)
    }
}

pub(crate) fn stat_entry(path: &Path) -> Result<dirstate::DirstateEntry> {
    let metadata = std::fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
    let (size, mtime) = stat_size_and_mtime(&metadata);
    Ok(dirstate::DirstateEntry::tracked(mode_bits(&metadata), size, mtime))
}

#[cfg(unix)]
fn mode_bits(metadata: &std::fs::Metadata) -> i32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() as i32
}

#[cfg(not(unix))]
fn mode_bits(_metadata: &std::fs::Metadata) -> i32 {
    0
}

#[cfg(unix)]
fn stat_size_and_mtime(metadata: &std::fs::Metadata) -> (i32, i32) {
    use std::os::unix::fs::MetadataExt;
    (metadata.size() as i32, metadata.mtime() as i32)
}

#[cfg(not(unix))]
fn stat_size_and_mtime(metadata: &std::fs::Metadata) -> (i32, i32) {
    let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i32)
        .unwrap_or(-1);
    (metadata.len() as i32, mtime)
}

/// Revlog files are written with `OpenOptions::create(true)`, which
/// never creates a missing parent directory; `types::encode_store_path`
/// can itself contain `/` for a nested tracked path, so that parent has
/// to exist before the first write to a brand new path.
pub(crate) fn ensure_filelog_dir(store_dir: &Path, path: &RepoPath) -> Result<()> {
    let encoded = types::encode_store_path(path);
    let data_dir = store_dir.join("data");
    if let Some(parent) = Path::new(&encoded).parent() {
        if parent != Path::new("") {
            std::fs::create_dir_all(data_dir.join(parent))
                .with_context(|| format!("creating {}", data_dir.join(parent).display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Repository;
    use matcher::AlwaysMatcher;

    #[test]
    fn commit_writes_a_changeset_and_advances_the_dirstate() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = Repository::init(dir.path()).unwrap();

        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        repo.dirstate_mut()
            .set(RepoPath::new("a.txt").unwrap(), dirstate::DirstateEntry::added(None));

        let node = repo
            .commit(CommitRequest {
                matcher: &AlwaysMatcher,
                user: "alice".into(),
                time: 0,
                tz_offset: 0,
                message: "initial".into(),
            })
            .unwrap();

        assert_eq!(repo.dirstate().parents().0, node);
        assert!(repo.changelog_len() >= 1);
    }

    #[test]
    fn committing_with_no_changes_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = Repository::init(dir.path()).unwrap();
        let result = repo.commit(CommitRequest {
            matcher: &AlwaysMatcher,
            user: "alice".into(),
            time: 0,
            tz_offset: 0,
            message: "empty".into(),
        });
        assert!(result.is_err());
    }
}
