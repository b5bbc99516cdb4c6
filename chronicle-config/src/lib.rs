/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Hierarchical configuration (spec.md §9 REDESIGN FLAGS, "Lazy-loaded
//! global mutable state and process-wide configuration overlay").
//!
//! An immutable [`Config`] value is assembled once per invocation from
//! layered sources (builtin defaults, system, user, repo, environment,
//! explicit command-line overrides) and then passed explicitly to every
//! subsystem that needs it. Hot paths read it via the typed `get_*`
//! accessors below, never through ad hoc string lookups scattered across
//! the codebase.

mod error;
mod parser;
mod source;

pub use error::ConfigError;
pub use source::ConfigSource;

use std::collections::BTreeMap;
use std::path::Path;

/// One `section.key = value` entry plus where it came from, kept for
/// diagnostics (e.g. "this came from your user config, here's the
/// path").
#[derive(Clone, Debug, PartialEq, Eq)]
struct ConfigEntry {
    value: String,
    source: ConfigSource,
}

/// An immutable, layered configuration snapshot.
///
/// Layers are applied lowest to highest precedence as they are added;
/// a later [`ConfigBuilder::layer`] call overrides same-key entries from
/// earlier ones. Once built, a `Config` never changes — a new operation
/// that needs different overrides builds a new `Config`.
#[derive(Clone, Debug, Default)]
pub struct Config {
    entries: BTreeMap<(String, String), ConfigEntry>,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Returns the raw string value for `section.key`, if set in any
    /// layer.
    pub fn get_str(&self, section: &str, key: &str) -> Option<&str> {
        self.entries
            .get(&(section.to_owned(), key.to_owned()))
            .map(|e| e.value.as_str())
    }

    pub fn get_str_or<'a>(&'a self, section: &str, key: &str, default: &'a str) -> &'a str {
        self.get_str(section, key).unwrap_or(default)
    }

    pub fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.get_str(section, key) {
            None => Ok(None),
            Some(v) => parse_bool(v)
                .map(Some)
                .ok_or_else(|| ConfigError::InvalidBool {
                    section: section.to_owned(),
                    key: key.to_owned(),
                    value: v.to_owned(),
                }),
        }
    }

    pub fn get_bool_or(&self, section: &str, key: &str, default: bool) -> bool {
        self.get_bool(section, key).ok().flatten().unwrap_or(default)
    }

    pub fn get_int(&self, section: &str, key: &str) -> Result<Option<i64>, ConfigError> {
        match self.get_str(section, key) {
            None => Ok(None),
            Some(v) => v
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| ConfigError::InvalidInt {
                    section: section.to_owned(),
                    key: key.to_owned(),
                    value: v.to_owned(),
                }),
        }
    }

    pub fn get_int_or(&self, section: &str, key: &str, default: i64) -> i64 {
        self.get_int(section, key).ok().flatten().unwrap_or(default)
    }

    /// Comma-separated list value, trimmed and with empty entries
    /// dropped.
    pub fn get_list(&self, section: &str, key: &str) -> Vec<String> {
        match self.get_str(section, key) {
            None => Vec::new(),
            Some(v) => v
                .split(',')
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Where the effective value of `section.key` came from, for
    /// diagnostics.
    pub fn source_of(&self, section: &str, key: &str) -> Option<&ConfigSource> {
        self.entries
            .get(&(section.to_owned(), key.to_owned()))
            .map(|e| &e.source)
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Builds a [`Config`] by applying layers lowest-to-highest precedence:
/// builtin defaults, system file, user file, repo file, environment
/// variables, explicit command-line overrides (spec.md SPEC_FULL §6.6).
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Parses `text` as a flat `section.key = value` document and merges
    /// it in, attributing every entry to `source`.
    pub fn layer(mut self, text: &str, source: ConfigSource) -> Result<Self, ConfigError> {
        for (section, key, value) in parser::parse(text)? {
            self.config.entries.insert(
                (section, key),
                ConfigEntry {
                    value,
                    source: source.clone(),
                },
            );
        }
        Ok(self)
    }

    /// Reads and layers a config file if it exists; a missing file is
    /// not an error (the layer is simply absent), matching how system/
    /// user/repo config files are optional.
    pub fn layer_file(self, path: &Path, source: ConfigSource) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => self.layer(&text, source),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(self),
            Err(e) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Layers in `CHRONICLE_<SECTION>_<KEY>=value` environment variables.
    pub fn layer_env(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        const PREFIX: &str = "CHRONICLE_";
        for (name, value) in vars {
            if let Some(rest) = name.strip_prefix(PREFIX) {
                if let Some((section, key)) = rest.split_once('_') {
                    self.config.entries.insert(
                        (section.to_ascii_lowercase(), key.to_ascii_lowercase()),
                        ConfigEntry {
                            value,
                            source: ConfigSource::Env,
                        },
                    );
                }
            }
        }
        self
    }

    /// A single explicit `section.key=value` override, highest
    /// precedence (a front-end's `--config section.key=value` flag).
    pub fn override_value(
        mut self,
        section: &str,
        key: &str,
        value: impl Into<String>,
    ) -> Self {
        self.config.entries.insert(
            (section.to_owned(), key.to_owned()),
            ConfigEntry {
                value: value.into(),
                source: ConfigSource::CommandLine,
            },
        );
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
