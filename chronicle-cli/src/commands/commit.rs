/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::path::PathBuf;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use anyhow::Result;
use clap::Args;
use matcher::AlwaysMatcher;
use repo::CommitRequest;
use repo::Repository;

#[derive(Args)]
pub struct Args {
    /// Repository root
    #[arg(long, default_value = ".")]
    repo: PathBuf,
    /// Commit message
    #[arg(short, long)]
    message: String,
    /// Author of this commit
    #[arg(short, long, default_value = "unknown")]
    user: String,
}

pub fn run(args: Args) -> Result<()> {
    let mut repository = Repository::open(&args.repo)?;
    let time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    let node = repository.commit(CommitRequest {
        matcher: &AlwaysMatcher,
        user: args.user,
        time,
        // This front end doesn't resolve a local UTC offset; every
        // commit it records is timestamped in UTC.
        tz_offset: 0,
        message: args.message,
    })?;

    println!("committed {}", node.to_hex());
    Ok(())
}
