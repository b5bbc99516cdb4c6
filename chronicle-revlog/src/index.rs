/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The fixed 64-byte index record format (spec.md §4.1.1, §6.2).
//!
//! ```text
//! offset(6) | flags(2) | compressed_len(4) | uncompressed_len(4)
//!   | base_rev(4) | link_rev(4) | p1_rev(4) | p2_rev(4) | node(32)
//! ```
//!
//! The very first record's first 4 bytes double as the file's
//! version/flags word: since revision 0 always starts at offset 0, the
//! high 4 bytes of its offset field are otherwise wasted, so the format
//! repurposes them (spec.md §4.1.1, §6.2).

use byteorder::BigEndian;
use byteorder::ByteOrder;
use types::Node;
use types::Rev;
use types::RevFlags;
use types::NODE_BYTES;
use types::NULL_REV;

use crate::error::RevlogError;

pub const RECORD_LEN: usize = 64;
const NODE_FIELD_LEN: usize = 32;

/// On-disk format version. Only version 1 is defined; any other value
/// read from a store must be rejected (spec.md §6.2, fail-closed on
/// anything unrecognized).
pub const FORMAT_VERSION: u16 = 1;

/// Bit in the version/flags word marking an inline revlog (data
/// appended directly after each index record rather than kept in a
/// separate `.d` file).
pub const FLAG_INLINE: u16 = 0b0000_0001;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct IndexRecord {
    pub offset: u64,
    pub flags: RevFlags,
    pub compressed_len: u32,
    pub uncompressed_len: u32,
    pub base_rev: Rev,
    pub link_rev: Rev,
    pub p1_rev: Rev,
    pub p2_rev: Rev,
    pub node: Node,
}

impl IndexRecord {
    /// A revision is stored as a full snapshot, rather than a delta,
    /// when its base is itself (spec.md §3.1).
    pub fn is_snapshot(&self, rev: Rev) -> bool {
        self.base_rev == rev
    }
}

/// Encodes `record` at local index `rev`. When `rev` is revision 0,
/// `header` (the version/flags word) is folded into the first 4 bytes
/// in place of the (always-zero) high bytes of the offset field.
pub fn encode_record(rev: Rev, record: &IndexRecord, header: Option<u16>) -> [u8; RECORD_LEN] {
    let mut buf = [0u8; RECORD_LEN];

    if rev == Rev::from(0usize) {
        let header = header.unwrap_or(FORMAT_VERSION);
        BigEndian::write_u16(&mut buf[0..2], header);
        BigEndian::write_u16(&mut buf[2..4], 0);
        debug_assert_eq!(record.offset, 0, "revision 0 must start at offset 0");
    } else {
        write_u48(&mut buf[0..6], record.offset);
    }

    BigEndian::write_u16(&mut buf[6..8], record.flags.bits());
    BigEndian::write_u32(&mut buf[8..12], record.compressed_len);
    BigEndian::write_u32(&mut buf[12..16], record.uncompressed_len);
    BigEndian::write_i32(&mut buf[16..20], rev_to_i32(record.base_rev));
    BigEndian::write_i32(&mut buf[20..24], rev_to_i32(record.link_rev));
    BigEndian::write_i32(&mut buf[24..28], rev_to_i32(record.p1_rev));
    BigEndian::write_i32(&mut buf[28..32], rev_to_i32(record.p2_rev));
    buf[32..32 + NODE_BYTES].copy_from_slice(record.node.as_bytes());
    // bytes [32+NODE_BYTES..64] stay zero padding, per spec.md §4.1.1
    // ("node(32, right-padded from 20)").
    let _ = NODE_FIELD_LEN;

    buf
}

/// Decodes the record at local index `rev`. For revision 0, also
/// returns the version/flags word folded into its offset field.
pub fn decode_record(
    rev: Rev,
    bytes: &[u8; RECORD_LEN],
) -> Result<(IndexRecord, Option<u16>), RevlogError> {
    let (offset, header) = if rev == Rev::from(0usize) {
        let header = BigEndian::read_u16(&bytes[0..2]);
        (0u64, Some(header))
    } else {
        (read_u48(&bytes[0..6]), None)
    };

    let flag_bits = BigEndian::read_u16(&bytes[6..8]);
    let flags = RevFlags::from_bits_retain(flag_bits);
    if !flags.unknown_bits().is_empty() {
        return Err(RevlogError::UnknownFlagBits {
            rev: rev.as_usize().unwrap_or(0),
            bits: flag_bits,
        });
    }

    let compressed_len = BigEndian::read_u32(&bytes[8..12]);
    let uncompressed_len = BigEndian::read_u32(&bytes[12..16]);
    let base_rev = i32_to_rev(BigEndian::read_i32(&bytes[16..20]));
    let link_rev = i32_to_rev(BigEndian::read_i32(&bytes[20..24]));
    let p1_rev = i32_to_rev(BigEndian::read_i32(&bytes[24..28]));
    let p2_rev = i32_to_rev(BigEndian::read_i32(&bytes[28..32]));
    let mut node_bytes = [0u8; NODE_BYTES];
    node_bytes.copy_from_slice(&bytes[32..32 + NODE_BYTES]);
    let node = Node::from_bytes(node_bytes);

    Ok((
        IndexRecord {
            offset,
            flags,
            compressed_len,
            uncompressed_len,
            base_rev,
            link_rev,
            p1_rev,
            p2_rev,
            node,
        },
        header,
    ))
}

fn write_u48(buf: &mut [u8], value: u64) {
    debug_assert!(value < (1u64 << 48), "offset overflows 48 bits");
    let bytes = value.to_be_bytes();
    buf.copy_from_slice(&bytes[2..8]);
}

fn read_u48(buf: &[u8]) -> u64 {
    let mut full = [0u8; 8];
    full[2..8].copy_from_slice(buf);
    u64::from_be_bytes(full)
}

fn rev_to_i32(rev: Rev) -> i32 {
    rev.as_usize().map(|v| v as i32).unwrap_or(-1)
}

fn i32_to_rev(v: i32) -> Rev {
    if v < 0 {
        NULL_REV
    } else {
        Rev::from(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::NULL_NODE;

    #[test]
    fn round_trips_a_snapshot_record() {
        let record = IndexRecord {
            offset: 0,
            flags: RevFlags::empty(),
            compressed_len: 10,
            uncompressed_len: 20,
            base_rev: Rev::from(0usize),
            link_rev: Rev::from(0usize),
            p1_rev: NULL_REV,
            p2_rev: NULL_REV,
            node: NULL_NODE,
        };
        let bytes = encode_record(Rev::from(0usize), &record, None);
        let (decoded, header) = decode_record(Rev::from(0usize), &bytes).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(header, Some(FORMAT_VERSION));
    }

    #[test]
    fn round_trips_a_non_first_record_with_large_offset() {
        let record = IndexRecord {
            offset: 1 << 40,
            flags: RevFlags::CENSORED,
            compressed_len: 123,
            uncompressed_len: 456,
            base_rev: Rev::from(3usize),
            link_rev: Rev::from(7usize),
            p1_rev: Rev::from(5usize),
            p2_rev: NULL_REV,
            node: Node::from_bytes([9u8; NODE_BYTES]),
        };
        let bytes = encode_record(Rev::from(8usize), &record, None);
        let (decoded, header) = decode_record(Rev::from(8usize), &bytes).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(header, None);
    }

    #[test]
    fn unknown_flag_bits_are_rejected() {
        let mut buf = [0u8; RECORD_LEN];
        BigEndian::write_u16(&mut buf[6..8], 0b1000_0000_0000_0000);
        let err = decode_record(Rev::from(1usize), &buf).unwrap_err();
        assert!(matches!(err, RevlogError::UnknownFlagBits { .. }));
    }
}
