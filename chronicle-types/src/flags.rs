/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use bitflags::bitflags;

bitflags! {
    /// Per-revision flags stored in a revlog index record (spec.md §4.1.6).
    ///
    /// Only bit 0 is defined. Any other bit set on a stored revision means
    /// a future format extension this implementation does not understand;
    /// reads MUST fail rather than silently return wrong data.
    #[derive(Clone, Copy, Eq, PartialEq, Debug, Default, serde::Serialize, serde::Deserialize)]
    pub struct RevFlags: u16 {
        /// The revision's content has been censored (replaced, tombstoned).
        const CENSORED = 0b0000_0001;
    }
}

impl RevFlags {
    /// All bits this implementation understands.
    pub const KNOWN: RevFlags = RevFlags::CENSORED;

    /// Returns the unrecognized bits, if any. A non-empty result means the
    /// revision must be rejected (spec.md §4.1.6, §9 Open Questions).
    pub fn unknown_bits(self) -> RevFlags {
        self & !Self::KNOWN
    }
}

/// The executable/symlink/regular classification carried alongside a
/// filenode in a manifest entry (spec.md §3.1).
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash, serde::Serialize, serde::Deserialize)]
pub enum FileFlag {
    Regular,
    Executable,
    Symlink,
}

impl FileFlag {
    /// The single-character encoding used in a manifest line, or empty
    /// for a regular file.
    pub fn as_char(&self) -> Option<char> {
        match self {
            FileFlag::Regular => None,
            FileFlag::Executable => Some('x'),
            FileFlag::Symlink => Some('l'),
        }
    }

    pub fn from_char(c: Option<char>) -> Option<FileFlag> {
        match c {
            None => Some(FileFlag::Regular),
            Some('x') => Some(FileFlag::Executable),
            Some('l') => Some(FileFlag::Symlink),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_bit_detection() {
        let known = RevFlags::CENSORED;
        assert!(known.unknown_bits().is_empty());

        let unknown = RevFlags::from_bits_retain(0b1000_0001);
        assert!(!unknown.unknown_bits().is_empty());
    }

    #[test]
    fn file_flag_char_round_trip() {
        for flag in [FileFlag::Regular, FileFlag::Executable, FileFlag::Symlink] {
            let c = flag.as_char();
            assert_eq!(FileFlag::from_char(c), Some(flag));
        }
    }
}
