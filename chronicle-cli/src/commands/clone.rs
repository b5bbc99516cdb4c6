/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use clap::Args;
use repo::Repository;

#[derive(Args)]
pub struct Args {
    /// Path to the repository to copy
    source: PathBuf,
    /// Path to create the copy at
    dest: PathBuf,
}

pub fn run(args: Args) -> Result<()> {
    let mut source = Repository::open(&args.source)
        .with_context(|| format!("opening source repository at {}", args.source.display()))?;
    let mut dest = Repository::init(&args.dest)
        .with_context(|| format!("creating destination repository at {}", args.dest.display()))?;

    let pulled = dest.pull(&mut source)?;
    if let Some(&head) = dest.heads().first() {
        dest.update(head, false)
            .with_context(|| format!("updating to {}", head.to_hex()))?;
    }

    println!(
        "cloned {} into {} ({} changesets)",
        args.source.display(),
        args.dest.display(),
        pulled.len()
    );
    Ok(())
}
