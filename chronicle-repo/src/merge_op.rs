/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Two-parent merge (spec.md §4.6): finds the merge base with
//! [`dag::Dag::gca`], plans the per-path actions with [`merge::plan`],
//! applies what it safely can to the working directory, and records
//! anything left over in a persisted [`merge::MergeState`] that
//! [`crate::commit::CommitRequest`] refuses to commit past while it has
//! unresolved paths.
//!
//! Real content merging (a path both sides touched differently) isn't
//! attempted here: those paths, and independently-added conflicts, are
//! left for the caller to resolve and mark via [`Repository::resolve`].

use std::collections::BTreeMap;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use dag::Dag;
use merge::MergeAction;
use merge::MergeEntry;
use merge::MergeState;
use merge::DEFAULT_RENAME_THRESHOLD;
use revlog::Filelog;
use revlog::ManifestMap;
use types::Node;
use types::RepoPath;

use crate::error::RepoError;
use crate::fsflag;
use crate::hooks;
use crate::Repository;

impl Repository {
    /// Merges `other` into the current working directory. Leaves any
    /// path the automatic plan can't resolve in the mergestate; the
    /// caller must resolve those and call [`Repository::resolve`]
    /// before the next commit succeeds.
    pub fn merge(&mut self, other: Node) -> Result<()> {
        if MergeState::load(&self.paths.merge_state)?.is_some() {
            bail!(RepoError::MergeInProgress);
        }

        let (p1, _) = self.dirstate.parents();
        let other_rev = self
            .changelog
            .rev_for_node(&other)
            .ok_or(RepoError::UnknownRevision(other))?;
        let dag = Dag::new(&self.changelog);
        let base = dag.gca(&p1, &other)?;

        let base_manifest = self.manifest_snapshot(&base)?;
        let local_manifest = self.manifest_snapshot(&p1)?;
        let changeset = self.changelog.read(other_rev)?;
        let other_manifest = self.manifest.read(&changeset.manifest_node)?;

        let base_entries = to_merge_entries(&base_manifest);
        let local_entries = to_merge_entries(&local_manifest);
        let other_entries = to_merge_entries(&other_manifest);

        let renames = self.detect_renames(&base_manifest, &other_manifest)?;
        let plan = merge::plan(&base_entries, &local_entries, &other_entries, &renames);

        let mut state = MergeState::new();
        let mut content_source =
            crate::content::RepoFileSource::new(self.paths.store_dir.clone(), &self.config);

        for (path, action) in &plan {
            match action {
                MergeAction::Keep => {}
                MergeAction::Get | MergeAction::FlagChange => {
                    self.write_from_other(path, &other_manifest, &mut content_source)?;
                    self.dirstate.set(path.clone(), dirstate::DirstateEntry::merged());
                }
                MergeAction::Delete => {
                    let full_path = self.paths.root.join(path.as_str());
                    let _ = std::fs::remove_file(&full_path);
                    self.dirstate.set(path.clone(), dirstate::DirstateEntry::removed());
                }
                MergeAction::RemoveAndGet { renamed_to } => {
                    let full_path = self.paths.root.join(path.as_str());
                    let _ = std::fs::remove_file(&full_path);
                    self.dirstate.set(path.clone(), dirstate::DirstateEntry::removed());
                    self.write_from_other(renamed_to, &other_manifest, &mut content_source)?;
                    let mut entry = dirstate::DirstateEntry::merged();
                    entry.copy_source = Some(path.clone());
                    self.dirstate.set(renamed_to.clone(), entry);
                }
                MergeAction::Merge | MergeAction::Conflict => {
                    state.add_unresolved(
                        path.clone(),
                        local_entries.get(path).map(|e| e.filenode),
                        other_entries.get(path).map(|e| e.filenode),
                        base_entries.get(path).map(|e| e.filenode),
                    );
                    self.dirstate.set(path.clone(), dirstate::DirstateEntry::merged());
                }
            }
        }

        state.save(&self.paths.merge_state)?;
        self.dirstate.set_parents(p1, other);
        self.dirstate.save(&self.paths.dirstate)?;

        let _ = hooks::fire(&self.config, &self.paths.root, "update", Some(other));
        Ok(())
    }

    /// Marks a conflicted path resolved (its working-directory content
    /// is taken as final) and, once nothing remains unresolved, clears
    /// the mergestate file.
    pub fn resolve(&mut self, path: &RepoPath) -> Result<()> {
        let Some(mut state) = MergeState::load(&self.paths.merge_state)? else {
            bail!(RepoError::NoMergeInProgress);
        };
        state.mark_resolved(path)?;
        if state.unresolved_paths().is_empty() {
            MergeState::clear(&self.paths.merge_state)?;
        } else {
            state.save(&self.paths.merge_state)?;
        }
        Ok(())
    }

    fn manifest_snapshot(&mut self, node: &Node) -> Result<ManifestMap> {
        if node.is_null() {
            return Ok(ManifestMap::new());
        }
        let rev = self.changelog.rev_for_node(node).ok_or(RepoError::UnknownRevision(*node))?;
        let changeset = self.changelog.read(rev)?;
        Ok(self.manifest.read(&changeset.manifest_node)?)
    }

    fn write_from_other(
        &mut self,
        path: &RepoPath,
        other_manifest: &ManifestMap,
        content_source: &mut crate::content::RepoFileSource<'_>,
    ) -> Result<()> {
        let entry = other_manifest
            .get(path)
            .with_context(|| format!("{path:?} missing from the merge source manifest"))?;
        let content = dirstate::FileContentSource::read(content_source, path, &entry.filenode)
            .with_context(|| format!("reading {path:?} from the merge source"))?;
        let full_path = self.paths.root.join(path.as_str());
        fsflag::write_file(&full_path, &content, entry.flag)
            .with_context(|| format!("writing {}", full_path.display()))
    }

    /// Copy metadata recorded on `other`'s side takes priority; paths
    /// added in `other` with no such metadata are matched against paths
    /// `other` removed (relative to `base`) by content similarity
    /// (spec.md §4.6, SPEC_FULL §4.6 supplement).
    fn detect_renames(
        &mut self,
        base_manifest: &ManifestMap,
        other_manifest: &ManifestMap,
    ) -> Result<BTreeMap<RepoPath, RepoPath>> {
        let mut renames = BTreeMap::new();
        let mut unexplained_added: Vec<(RepoPath, Vec<u8>)> = Vec::new();

        for (path, entry) in other_manifest {
            if base_manifest.contains_key(path) {
                continue;
            }
            let mut filelog = Filelog::open(&self.paths.store_dir, path, &self.config)?;
            let rev = filelog
                .rev_for_node(&entry.filenode)
                .ok_or(RepoError::UnknownRevision(entry.filenode))?;
            let revision = filelog.read(rev)?;
            match revision.metadata.copy_from {
                Some(src) if base_manifest.contains_key(&src) => {
                    renames.insert(path.clone(), src);
                }
                _ => unexplained_added.push((path.clone(), revision.content)),
            }
        }

        let mut unexplained_removed: Vec<(RepoPath, Vec<u8>)> = Vec::new();
        for (path, entry) in base_manifest {
            if other_manifest.contains_key(path) {
                continue;
            }
            let mut filelog = Filelog::open(&self.paths.store_dir, path, &self.config)?;
            let rev = filelog
                .rev_for_node(&entry.filenode)
                .ok_or(RepoError::UnknownRevision(entry.filenode))?;
            unexplained_removed.push((path.clone(), filelog.read(rev)?.content));
        }

        let heuristic =
            merge::rename_candidates(&unexplained_removed, &unexplained_added, DEFAULT_RENAME_THRESHOLD);
        renames.extend(heuristic);
        Ok(renames)
    }
}

fn to_merge_entries(manifest: &ManifestMap) -> BTreeMap<RepoPath, MergeEntry> {
    manifest
        .iter()
        .map(|(p, e)| {
            (
                p.clone(),
                MergeEntry {
                    filenode: e.filenode,
                    flag: e.flag,
                },
            )
        })
        .collect()
}
