/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use matcher::AlwaysMatcher;
use repo::Repository;

#[derive(Args)]
pub struct Args {
    /// Repository root
    #[arg(long, default_value = ".")]
    repo: PathBuf,
}

pub fn run(args: Args) -> Result<()> {
    let mut repository = Repository::open(&args.repo)?;
    let status = repository.status(&AlwaysMatcher)?;

    for path in &status.modified {
        println!("M {path}");
    }
    for path in &status.added {
        println!("A {path}");
    }
    for path in &status.removed {
        println!("R {path}");
    }
    for path in &status.deleted {
        println!("! {path}");
    }
    for path in &status.unknown {
        println!("? {path}");
    }
    Ok(())
}
