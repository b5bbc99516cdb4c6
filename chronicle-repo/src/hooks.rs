/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The hook surface (spec.md §6.5): named events fired at defined
//! points, configured as shell commands under the `hooks.<name>`
//! config key. A hook that exits non-zero before a transaction commits
//! aborts it; a hook fired after a transaction is already durable
//! (`commit`, `update`, `changegroup`) is advisory only, its failure
//! logged rather than propagated.

use std::process::Command;

use anyhow::Context;
use anyhow::Result;
use config::Config;
use tracing::warn;
use types::Node;

/// Fires the hook named `event`, if one is configured. Returns whether
/// it succeeded (exit status zero, or no hook configured at all).
pub fn fire(config: &Config, root: &std::path::Path, event: &str, node: Option<Node>) -> Result<bool> {
    let Some(command) = config.get_str("hooks", event) else {
        return Ok(true);
    };

    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command).current_dir(root);
    cmd.env("CHRONICLE_HOOK", event);
    if let Some(node) = node {
        cmd.env("CHRONICLE_NODE", node.to_hex());
    }

    let status = cmd
        .status()
        .with_context(|| format!("running hook {event:?}: {command:?}"))?;
    if !status.success() {
        warn!(event, command, code = status.code(), "hook failed");
    }
    Ok(status.success())
}

/// Fires `event` and turns a non-zero exit into an error (for the
/// "before durable" hooks whose failure aborts the in-progress
/// transaction).
pub fn fire_blocking(
    config: &Config,
    root: &std::path::Path,
    event: &str,
    node: Option<Node>,
) -> Result<()> {
    if fire(config, root, event, node)? {
        Ok(())
    } else {
        Err(crate::error::RepoError::HookFailed {
            name: event.to_owned(),
            status: 1,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::ConfigSource;

    #[test]
    fn no_hook_configured_succeeds() {
        let config = Config::builder().build();
        let dir = tempfile::tempdir().unwrap();
        assert!(fire(&config, dir.path(), "commit", None).unwrap());
    }

    #[test]
    fn a_passing_hook_succeeds() {
        let config = Config::builder()
            .layer("hooks.commit = true\n", ConfigSource::Repo("t".into()))
            .unwrap()
            .build();
        let dir = tempfile::tempdir().unwrap();
        assert!(fire(&config, dir.path(), "commit", None).unwrap());
    }

    #[test]
    fn a_failing_hook_before_durable_aborts() {
        let config = Config::builder()
            .layer("hooks.pretxncommit = false\n", ConfigSource::Repo("t".into()))
            .unwrap()
            .build();
        let dir = tempfile::tempdir().unwrap();
        assert!(fire_blocking(&config, dir.path(), "pretxncommit", None).is_err());
    }

    #[test]
    fn a_hook_sees_the_committed_node() {
        let out_path_holder = tempfile::tempdir().unwrap();
        let out_file = out_path_holder.path().join("seen-node");
        let config = Config::builder()
            .layer(
                &format!("hooks.commit = echo \"$CHRONICLE_NODE\" > {}\n", out_file.display()),
                ConfigSource::Repo("t".into()),
            )
            .unwrap()
            .build();
        let node = Node::from_bytes([9u8; types::NODE_BYTES]);
        fire(&config, out_path_holder.path(), "commit", Some(node)).unwrap();
        let seen = std::fs::read_to_string(&out_file).unwrap();
        assert_eq!(seen.trim(), node.to_hex());
    }
}
