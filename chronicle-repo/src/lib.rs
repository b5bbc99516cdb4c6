/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The repository context (SPEC_FULL §1): [`Repository`] owns and wires
//! every subsystem — config, locking, the changelog and manifest
//! revlogs, the dirstate, phases, bookmarks — and exposes the
//! operations (`commit`, `update`, `merge`, `push`/`pull`) that need
//! more than one of them at once. Every public method returns
//! `anyhow::Result`, attaching `.context(...)` as it crosses a
//! subsystem boundary (SPEC_FULL §7).

mod bookmark;
mod checkout;
mod commit;
mod content;
mod error;
mod exchange;
mod fsflag;
mod hooks;
mod layout;
mod merge_op;
mod phase;

use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use config::Config;
use config::ConfigSource;
use dirstate::Dirstate;
use revlog::Changelog;
use revlog::Manifest;

pub use bookmark::Bookmarks;
pub use commit::CommitRequest;
pub use error::RepoError;
pub use layout::Paths;
pub use phase::Phase;
pub use phase::PhaseStore;

/// A fully opened repository: every subsystem it takes to run the
/// operations in this crate, wired together against one on-disk layout.
pub struct Repository {
    paths: Paths,
    config: Config,
    changelog: Changelog,
    manifest: Manifest,
    dirstate: Dirstate,
    phases: PhaseStore,
    bookmarks: Bookmarks,
}

impl Repository {
    /// Creates a brand new repository at `root` and opens it.
    pub fn init(root: &Path) -> Result<Self> {
        let paths = layout::init(root)?;
        Self::open_at(paths)
    }

    /// Opens an existing repository at `root`, recovering an interrupted
    /// transaction first (SPEC_FULL §5 crash-recovery requirement) so no
    /// revlog is ever opened against a half-written journal.
    pub fn open(root: &Path) -> Result<Self> {
        let paths = layout::open_paths(root)?;
        lock::recover(&paths.journal).with_context(|| {
            format!("recovering interrupted transaction at {}", paths.journal.display())
        })?;
        Self::open_at(paths)
    }

    fn open_at(paths: Paths) -> Result<Self> {
        let config = load_config(&paths)?;
        let changelog = Changelog::open(&paths.store_dir, &config)
            .with_context(|| format!("opening changelog at {}", paths.store_dir.display()))?;
        let manifest = Manifest::open(&paths.store_dir, &config)
            .with_context(|| format!("opening manifest at {}", paths.store_dir.display()))?;
        let dirstate = if paths.dirstate.is_file() {
            Dirstate::open(&paths.dirstate)
                .with_context(|| format!("opening dirstate at {}", paths.dirstate.display()))?
        } else {
            Dirstate::empty()
        };
        let phases = PhaseStore::open(&paths.phaseroots)?;
        let bookmarks = Bookmarks::open(&paths.bookmarks)?;

        Ok(Repository {
            paths,
            config,
            changelog,
            manifest,
            dirstate,
            phases,
            bookmarks,
        })
    }

    pub fn root(&self) -> &Path {
        &self.paths.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dirstate(&self) -> &Dirstate {
        &self.dirstate
    }

    pub fn dirstate_mut(&mut self) -> &mut Dirstate {
        &mut self.dirstate
    }

    pub fn phases(&self) -> &PhaseStore {
        &self.phases
    }

    pub fn bookmarks(&self) -> &Bookmarks {
        &self.bookmarks
    }

    pub fn bookmarks_mut(&mut self) -> &mut Bookmarks {
        &mut self.bookmarks
    }

    pub fn changelog_len(&self) -> usize {
        self.changelog.len()
    }

    /// The changeset at `rev`, for callers (e.g. `chronicle-cli log`)
    /// that only need to read history, not mutate it.
    pub fn read_changeset(&mut self, rev: types::Rev) -> Result<revlog::Changeset> {
        self.changelog.read(rev).map_err(Into::into)
    }

    pub fn node_for_rev(&self, rev: types::Rev) -> types::Node {
        self.changelog.node(rev)
    }

    pub fn rev_for_node(&self, node: &types::Node) -> Option<types::Rev> {
        self.changelog.rev_for_node(node)
    }

    /// The changelog's current heads (SPEC_FULL §4.9 peer-discovery seam
    /// as seen by a local caller, not just a remote peer).
    pub fn heads(&self) -> Vec<types::Node> {
        dag::Dag::new(&self.changelog).heads()
    }
}

/// Assembles a [`Config`] the way SPEC_FULL §6.6 lays out: builtin
/// defaults, then system, user, and repo config files, then
/// `CHRONICLE_*` environment variables — each layer able to override
/// the one before it.
fn load_config(paths: &Paths) -> Result<Config> {
    let mut builder = Config::builder()
        .layer(BUILTIN_DEFAULTS, ConfigSource::Builtin)
        .context("parsing builtin default config")?;

    let system_path = Path::new("/etc/chronicle/config");
    builder = builder
        .layer_file(system_path, ConfigSource::System(system_path.to_path_buf()))
        .with_context(|| format!("reading system config at {}", system_path.display()))?;

    if let Some(home) = std::env::var_os("HOME") {
        let user_path = Path::new(&home).join(".chronicle").join("config");
        builder = builder
            .layer_file(&user_path, ConfigSource::User(user_path.clone()))
            .with_context(|| format!("reading user config at {}", user_path.display()))?;
    }

    builder = builder
        .layer_file(&paths.config, ConfigSource::Repo(paths.config.clone()))
        .with_context(|| format!("reading repo config at {}", paths.config.display()))?;

    let env_vars = std::env::vars().filter(|(name, _)| name.starts_with("CHRONICLE_"));
    builder = builder.layer_env(env_vars);

    Ok(builder.build())
}

const BUILTIN_DEFAULTS: &str = "\
ui.ignore =
phases.new-commit = draft
";
