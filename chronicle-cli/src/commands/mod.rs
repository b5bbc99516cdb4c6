/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

mod clone;
mod commit;
mod init;
mod log;
mod status;

use anyhow::Result;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum Command {
    /// Create a new, empty repository
    Init(init::Args),
    /// Record the working directory as a new changeset
    Commit(commit::Args),
    /// Show changed, added, removed, deleted, and unknown files
    Status(status::Args),
    /// Show changeset history
    Log(log::Args),
    /// Copy an existing repository, then update to its tip
    Clone(clone::Args),
}

pub fn run(command: Command) -> Result<()> {
    match command {
        Command::Init(args) => init::run(args),
        Command::Commit(args) => commit::run(args),
        Command::Status(args) => status::run(args),
        Command::Log(args) => log::run(args),
        Command::Clone(args) => clone::run(args),
    }
}
