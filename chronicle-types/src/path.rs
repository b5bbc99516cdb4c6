/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::fmt;

/// A tracked path inside a repository: a `/`-separated, slash-relative
/// byte string. Never absolute, never containing `.` or `..` components,
/// never empty.
#[derive(Clone, Eq, PartialEq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct RepoPath(String);

#[derive(thiserror::Error, Debug, Eq, PartialEq)]
pub enum RepoPathError {
    #[error("repo path must not be empty")]
    Empty,
    #[error("repo path must not be absolute: {0}")]
    Absolute(String),
    #[error("repo path escapes the repository root: {0}")]
    Escaping(String),
    #[error("repo path contains a NUL byte: {0}")]
    EmbeddedNul(String),
}

impl RepoPath {
    /// Validates and wraps a path. Rejects absolute paths, `.`/`..`
    /// components (which would escape the repository root), and NUL
    /// bytes, per spec.md §8.3 ("Path containing `/` sequences escaping
    /// the repo root: rejected by the match layer").
    pub fn new(raw: impl Into<String>) -> Result<Self, RepoPathError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(RepoPathError::Empty);
        }
        if raw.starts_with('/') || raw.starts_with('\\') {
            return Err(RepoPathError::Absolute(raw));
        }
        if raw.contains('\0') {
            return Err(RepoPathError::EmbeddedNul(raw));
        }
        for component in raw.split('/') {
            if component.is_empty() && raw.matches("//").count() > 0 {
                return Err(RepoPathError::Escaping(raw));
            }
            if component == "." || component == ".." {
                return Err(RepoPathError::Escaping(raw));
            }
        }
        Ok(RepoPath(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    pub fn parent(&self) -> Option<&str> {
        self.0.rsplit_once('/').map(|(dir, _)| dir)
    }

    pub fn basename(&self) -> &str {
        self.0.rsplit_once('/').map(|(_, b)| b).unwrap_or(&self.0)
    }
}

impl fmt::Debug for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RepoPath({:?})", self.0)
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RepoPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reserved device names on case-insensitive/DOS-derived file systems
/// that require a leading `~` escape when encoding a store path
/// (spec.md §6.4).
const RESERVED_BASENAMES: &[&str] = &["con", "prn", "aux", "nul"];

fn is_reserved_basename(lower: &str) -> bool {
    if RESERVED_BASENAMES.contains(&lower) {
        return true;
    }
    for prefix in ["com", "lpt"] {
        if let Some(rest) = lower.strip_prefix(prefix) {
            if rest.len() == 1 && rest.chars().all(|c| c.is_ascii_digit()) {
                return true;
            }
        }
    }
    false
}

/// Maximum length of a single encoded path component before it is
/// hashed into the long-name fallback prefix (spec.md §6.4). This
/// mirrors common on-disk filename limits; the exact boundary is an
/// implementation detail, not semantics (spec.md §9 Open Questions).
pub const MAX_ENCODED_COMPONENT_LEN: usize = 120;

/// Prefix under which long, hash-folded encoded names are stored.
pub const LONG_NAME_PREFIX: &str = "dh/";

/// Applies the reversible store path encoding described in spec.md §6.4
/// to a single repository path, returning the path (relative to
/// `store/data/`) on the host file system.
///
/// Encoding rules, applied byte-by-byte within each `/`-separated
/// component:
/// - Uppercase ASCII letters become `_<lower>`; a literal `_` becomes `__`.
/// - Bytes outside `[0-9A-Za-z._/-]` are percent-escaped as `~<hex><hex>`.
/// - A reserved device basename (`con`, `prn`, `aux`, `nul`, `com[0-9]`,
///   `lpt[0-9]`, case-insensitively) gets a leading `~` escape.
/// - A component whose encoded form would exceed
///   [`MAX_ENCODED_COMPONENT_LEN`] is hashed and stored under
///   [`LONG_NAME_PREFIX`] instead, keyed by the hash of the *original*
///   path so decoding a long name means recomputing the hash, not
///   reversing it (spec.md §8.3, "Long path ... stored under the hashed
///   prefix ... retrieval must still succeed by recomputing the hash").
pub fn encode_store_path(path: &RepoPath) -> String {
    let mut out = String::new();
    for (i, component) in path.components().enumerate() {
        let encoded = encode_component(component);
        if encoded.len() > MAX_ENCODED_COMPONENT_LEN {
            return format!("{}{}", LONG_NAME_PREFIX, hash_fallback_name(path));
        }
        if i > 0 {
            out.push('/');
        }
        out.push_str(&encoded);
    }
    out
}

fn encode_component(component: &str) -> String {
    let lower = component.to_ascii_lowercase();
    let mut encoded = String::with_capacity(component.len());
    if is_reserved_basename(&lower) {
        encoded.push('~');
    }
    for byte in component.bytes() {
        match byte {
            b'A'..=b'Z' => {
                encoded.push('_');
                encoded.push((byte + 32) as char);
            }
            b'_' => encoded.push_str("__"),
            b'0'..=b'9' | b'a'..=b'z' | b'.' | b'-' => encoded.push(byte as char),
            _ => encoded.push_str(&format!("~{:02x}", byte)),
        }
    }
    encoded
}

fn hash_fallback_name(path: &RepoPath) -> String {
    use sha1::Digest;
    let mut hasher = sha1::Sha1::new();
    hasher.update(path.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_absolute_and_traversal() {
        assert!(RepoPath::new("/etc/passwd").is_err());
        assert!(RepoPath::new("../outside").is_err());
        assert!(RepoPath::new("a/../../b").is_err());
        assert!(RepoPath::new("a/./b").is_err());
        assert!(RepoPath::new("").is_err());
    }

    #[test]
    fn accepts_ordinary_paths() {
        assert!(RepoPath::new("src/lib.rs").is_ok());
        assert!(RepoPath::new("README").is_ok());
    }

    #[test]
    fn basename_and_parent() {
        let p = RepoPath::new("a/b/c.txt").unwrap();
        assert_eq!(p.basename(), "c.txt");
        assert_eq!(p.parent(), Some("a/b"));
    }

    #[test]
    fn encodes_uppercase_and_underscore() {
        let p = RepoPath::new("Foo_Bar").unwrap();
        assert_eq!(encode_store_path(&p), "_foo__bar");
    }

    #[test]
    fn escapes_reserved_device_names() {
        let p = RepoPath::new("con").unwrap();
        assert_eq!(encode_store_path(&p), "~con");
        let p2 = RepoPath::new("com1").unwrap();
        assert_eq!(encode_store_path(&p2), "~com1");
    }

    #[test]
    fn percent_escapes_control_bytes() {
        let p = RepoPath::new("a b").unwrap();
        assert_eq!(encode_store_path(&p), "a~20b");
    }

    #[test]
    fn many_short_components_do_not_trigger_the_hash_fallback() {
        // Fifteen 20-byte components: ~300 bytes once joined, far past
        // MAX_ENCODED_COMPONENT_LEN in total, but no single component is.
        let segments: Vec<String> = (0..15).map(|i| format!("segment-number-{i:03}")).collect();
        let joined = segments.join("/");
        let p = RepoPath::new(joined.clone()).unwrap();
        let encoded = encode_store_path(&p);
        assert!(!encoded.starts_with(LONG_NAME_PREFIX));
        assert_eq!(encoded.split('/').count(), segments.len());
    }

    #[test]
    fn long_names_fall_back_to_hash_prefix() {
        let long = "x".repeat(500);
        let p = RepoPath::new(long).unwrap();
        let encoded = encode_store_path(&p);
        assert!(encoded.starts_with(LONG_NAME_PREFIX));
        // Recomputing the hash for the same path is deterministic.
        let encoded_again = encode_store_path(&p);
        assert_eq!(encoded, encoded_again);
    }
}
