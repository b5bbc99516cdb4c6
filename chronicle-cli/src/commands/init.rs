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

#[derive(Args)]
pub struct Args {
    /// Directory to create the repository in
    #[arg(default_value = ".")]
    path: PathBuf,
}

pub fn run(args: Args) -> Result<()> {
    Repository::init(&args.path)?;
    println!("initialized a new repository in {}", args.path.display());
    Ok(())
}
