/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::path::PathBuf;

/// Where a config entry's effective value came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigSource {
    /// Compiled-in default.
    Builtin,
    /// The system-wide config file.
    System(PathBuf),
    /// The current user's config file.
    User(PathBuf),
    /// The repository-local config file.
    Repo(PathBuf),
    /// A `CHRONICLE_*` environment variable.
    Env,
    /// An explicit `--config` (or equivalent) override.
    CommandLine,
}
