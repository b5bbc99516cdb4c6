/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use repo::Repository;
use types::Rev;

#[derive(Args)]
pub struct Args {
    /// Repository root
    #[arg(long, default_value = ".")]
    repo: PathBuf,
    /// Maximum number of changesets to show, most recent first
    #[arg(short, long, default_value_t = 10)]
    limit: usize,
}

pub fn run(args: Args) -> Result<()> {
    let mut repository = Repository::open(&args.repo)?;
    let len = repository.changelog_len();
    let start = len.saturating_sub(args.limit);

    for rev in (start..len).rev() {
        let rev = Rev::from(rev);
        let node = repository.node_for_rev(rev);
        let changeset = repository.read_changeset(rev)?;

        println!("changeset: {}", node.to_hex());
        println!("user:      {}", changeset.user);
        println!("date:      {}", changeset.time);
        if let Some(branch) = changeset.extras.get("branch") {
            println!("branch:    {branch}");
        }
        println!("summary:   {}", changeset.message.lines().next().unwrap_or(""));
        println!();
    }
    Ok(())
}
