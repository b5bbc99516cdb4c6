/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Update/checkout (spec.md §4.6): moves the working directory from its
//! current parent to a target revision. A clean-tree update is the
//! degenerate case of [`merge::plan`] with `local == base`: every path
//! either resolves to `Keep` or `Get`, never `Merge`/`Conflict`.

use std::collections::BTreeMap;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use merge::MergeAction;
use revlog::ManifestMap;
use types::Node;

use crate::error::RepoError;
use crate::fsflag;
use crate::hooks;
use crate::layout;
use crate::Repository;

impl Repository {
    /// Moves the working directory to `target`, refusing if there are
    /// uncommitted changes the caller hasn't asked to discard (`force`).
    pub fn update(&mut self, target: Node, force: bool) -> Result<()> {
        let target_rev = self
            .changelog
            .rev_for_node(&target)
            .ok_or(RepoError::UnknownRevision(target))?;

        let (current, _) = self.dirstate.parents();
        let current_manifest = self.manifest_at(&current)?;
        let target_changeset = self.changelog.read(target_rev)?;
        let target_manifest = self.manifest.read(&target_changeset.manifest_node)?;

        if !force {
            let tracked: BTreeMap<_, _> = current_manifest
                .iter()
                .map(|(p, e)| (p.clone(), e.filenode))
                .collect();
            let ignore = self.ignore_matcher()?;
            let mut content_source =
                crate::content::RepoFileSource::new(self.paths.store_dir.clone(), &self.config);
            let status = self.dirstate.status(
                &self.paths.root,
                &tracked,
                &matcher::AlwaysMatcher,
                &ignore,
                &mut content_source,
                &[layout::METADATA_DIR],
            )?;
            if !status.added.is_empty() || !status.modified.is_empty() || !status.removed.is_empty() {
                bail!(RepoError::DirtyWorkingDirectory);
            }
        }

        let base = to_merge_entries(&current_manifest);
        let local = base.clone();
        let other = to_merge_entries(&target_manifest);
        let plan = merge::plan(&base, &local, &other, &BTreeMap::new());

        let mut content_source =
            crate::content::RepoFileSource::new(self.paths.store_dir.clone(), &self.config);
        for (path, action) in &plan {
            match action {
                MergeAction::Keep => {}
                MergeAction::Get | MergeAction::FlagChange => {
                    let entry = target_manifest
                        .get(path)
                        .ok_or_else(|| RepoError::UnknownRevision(target))?;
                    let content = dirstate::FileContentSource::read(
                        &mut content_source,
                        path,
                        &entry.filenode,
                    )
                    .with_context(|| format!("reading {path:?} at target revision"))?;
                    let full_path = self.paths.root.join(path.as_str());
                    fsflag::write_file(&full_path, &content, entry.flag)
                        .with_context(|| format!("writing {}", full_path.display()))?;
                }
                MergeAction::Delete => {
                    let full_path = self.paths.root.join(path.as_str());
                    let _ = std::fs::remove_file(&full_path);
                }
                MergeAction::RemoveAndGet { .. } | MergeAction::Merge | MergeAction::Conflict => {
                    bail!(RepoError::UpdateNeedsMerge(target));
                }
            }
        }

        self.dirstate = dirstate::Dirstate::empty();
        self.dirstate.set_parents(target, Node::default());
        for path in target_manifest.keys() {
            let full_path = self.paths.root.join(path.as_str());
            if let Ok(entry) = crate::commit::stat_entry(&full_path) {
                self.dirstate.set(path.clone(), entry);
            }
        }
        self.dirstate.save(&self.paths.dirstate)?;

        let _ = hooks::fire(&self.config, &self.paths.root, "update", Some(target));
        Ok(())
    }

    fn manifest_at(&mut self, node: &Node) -> Result<ManifestMap> {
        if node.is_null() {
            return Ok(ManifestMap::new());
        }
        let rev = self.changelog.rev_for_node(node).ok_or(RepoError::UnknownRevision(*node))?;
        let changeset = self.changelog.read(rev)?;
        Ok(self.manifest.read(&changeset.manifest_node)?)
    }
}

fn to_merge_entries(manifest: &ManifestMap) -> BTreeMap<types::RepoPath, merge::MergeEntry> {
    manifest
        .iter()
        .map(|(p, e)| {
            (
                p.clone(),
                merge::MergeEntry {
                    filenode: e.filenode,
                    flag: e.flag,
                },
            )
        })
        .collect()
}
