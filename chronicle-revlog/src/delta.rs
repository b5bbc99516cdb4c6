/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Binary patches against a prior full text (spec.md §4.1.2).
//!
//! A patch is a sequence of `(start, end, replacement_bytes)` hunks,
//! applied against the previous revision's materialized text in order.
//! Hunk offsets are expressed against the *original* text, matching the
//! the classic bdiff convention, so hunks can be applied in a single
//! left-to-right pass without re-deriving offsets after each one.

use crate::error::RevlogError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hunk {
    pub start: usize,
    pub end: usize,
    pub replacement: Vec<u8>,
}

/// Computes a patch turning `old` into `new`.
///
/// This finds the longest common prefix and suffix and replaces
/// whatever differs in between with a single hunk. It is not the most
/// space-efficient delta an implementation could produce (a full
/// line-based diff would emit multiple hunks for scattered small
/// changes), but it is always correct, and correctness — not delta
/// size — is what spec.md §8.1 property 3 requires.
pub fn compute_patch(old: &[u8], new: &[u8]) -> Vec<Hunk> {
    if old == new {
        return Vec::new();
    }
    let prefix = old
        .iter()
        .zip(new.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let max_suffix = (old.len() - prefix).min(new.len() - prefix);
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    let start = prefix;
    let end = old.len() - suffix;
    let replacement = new[prefix..new.len() - suffix].to_vec();
    vec![Hunk {
        start,
        end,
        replacement,
    }]
}

/// Applies `hunks` to `base`, producing the new text. Hunks are applied
/// against `base`'s original offsets; this function assembles the
/// result by copying the untouched spans between them.
pub fn apply_patch(base: &[u8], hunks: &[Hunk]) -> Result<Vec<u8>, RevlogError> {
    let mut out = Vec::with_capacity(base.len());
    let mut cursor = 0usize;
    for hunk in hunks {
        if hunk.start < cursor || hunk.end > base.len() || hunk.start > hunk.end {
            return Err(RevlogError::PatchOutOfBounds { rev: 0 });
        }
        out.extend_from_slice(&base[cursor..hunk.start]);
        out.extend_from_slice(&hunk.replacement);
        cursor = hunk.end;
    }
    out.extend_from_slice(&base[cursor..]);
    Ok(out)
}

/// Serializes hunks to the on-the-wire/on-disk patch encoding: a
/// sequence of `start(4) | end(4) | len(4) | replacement_bytes` records,
/// big-endian, with no terminator (the patch's own compressed length
/// bounds it).
pub fn encode_hunks(hunks: &[Hunk]) -> Vec<u8> {
    use byteorder::BigEndian;
    use byteorder::WriteBytesExt;

    let mut out = Vec::new();
    for hunk in hunks {
        out.write_u32::<BigEndian>(hunk.start as u32).unwrap();
        out.write_u32::<BigEndian>(hunk.end as u32).unwrap();
        out.write_u32::<BigEndian>(hunk.replacement.len() as u32)
            .unwrap();
        out.extend_from_slice(&hunk.replacement);
    }
    out
}

pub fn decode_hunks(bytes: &[u8]) -> Result<Vec<Hunk>, RevlogError> {
    use byteorder::BigEndian;
    use byteorder::ReadBytesExt;
    use std::io::Cursor;

    let mut cursor = Cursor::new(bytes);
    let mut hunks = Vec::new();
    while (cursor.position() as usize) < bytes.len() {
        let start = cursor
            .read_u32::<BigEndian>()
            .map_err(|_| RevlogError::Payload("truncated patch header".into()))?
            as usize;
        let end = cursor
            .read_u32::<BigEndian>()
            .map_err(|_| RevlogError::Payload("truncated patch header".into()))?
            as usize;
        let len = cursor
            .read_u32::<BigEndian>()
            .map_err(|_| RevlogError::Payload("truncated patch header".into()))?
            as usize;
        let pos = cursor.position() as usize;
        if pos + len > bytes.len() {
            return Err(RevlogError::Payload("truncated patch body".into()));
        }
        let replacement = bytes[pos..pos + len].to_vec();
        cursor.set_position((pos + len) as u64);
        hunks.push(Hunk {
            start,
            end,
            replacement,
        });
    }
    Ok(hunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_texts_produce_no_hunks() {
        assert!(compute_patch(b"same", b"same").is_empty());
    }

    #[test]
    fn patch_round_trips_a_middle_edit() {
        let old = b"hello brave new world";
        let new = b"hello strange new world";
        let hunks = compute_patch(old, new);
        let applied = apply_patch(old, &hunks).unwrap();
        assert_eq!(applied, new);
    }

    #[test]
    fn patch_round_trips_append_and_prepend() {
        for (old, new) in [
            (&b"abc"[..], &b"abcdef"[..]),
            (&b"abc"[..], &b"xyzabc"[..]),
            (&b""[..], &b"abc"[..]),
            (&b"abc"[..], &b""[..]),
        ] {
            let hunks = compute_patch(old, new);
            assert_eq!(apply_patch(old, &hunks).unwrap(), new);
        }
    }

    #[test]
    fn hunk_wire_encoding_round_trips() {
        let hunks = compute_patch(b"hello brave new world", b"hello strange new world");
        let encoded = encode_hunks(&hunks);
        let decoded = decode_hunks(&encoded).unwrap();
        assert_eq!(decoded, hunks);
    }

    #[quickcheck_macros::quickcheck]
    fn patch_round_trips_for_arbitrary_inputs(old: Vec<u8>, new: Vec<u8>) -> bool {
        let hunks = compute_patch(&old, &new);
        apply_patch(&old, &hunks).unwrap() == new
    }
}
