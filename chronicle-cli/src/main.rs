/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! A thin subcommand front-end over `chronicle-repo` (SPEC_FULL §1):
//! `init`, `commit`, `status`, `log`, `clone`, enough to exercise the
//! core end-to-end. Not a complete CLI — no templating, no diff
//! rendering, no extension system (SPEC_FULL Non-goals).

mod commands;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chronicle", version, about = "A distributed version control storage engine")]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match commands::run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("chronicle: {err:#}");
            ExitCode::FAILURE
        }
    }
}
