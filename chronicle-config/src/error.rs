/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("config syntax error at line {line}: {reason}")]
    Syntax { line: usize, reason: String },

    #[error("could not read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{section}.{key} is not a valid boolean: {value:?}")]
    InvalidBool {
        section: String,
        key: String,
        value: String,
    },

    #[error("{section}.{key} is not a valid integer: {value:?}")]
    InvalidInt {
        section: String,
        key: String,
        value: String,
    },
}
