/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The single-byte compression tag prefixing every stored chunk
//! (spec.md §4.1.3): `x` for zlib, `u` for uncompressed, and a leading
//! NUL for the uncompressed-empty special case.

use std::io::Read;
use std::io::Write;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::RevlogError;

const TAG_ZLIB: u8 = b'x';
const TAG_RAW: u8 = b'u';
const TAG_EMPTY: u8 = 0;

/// Compresses `raw`, keeping whichever of the zlib or uncompressed
/// encoding is shorter, and prefixes the result with its one-byte tag.
pub fn pack(raw: &[u8]) -> Vec<u8> {
    if raw.is_empty() {
        return vec![TAG_EMPTY];
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(raw).expect("writing to an in-memory encoder cannot fail");
    let compressed = encoder.finish().expect("finishing an in-memory encoder cannot fail");

    if compressed.len() + 1 < raw.len() + 1 {
        let mut out = Vec::with_capacity(compressed.len() + 1);
        out.push(TAG_ZLIB);
        out.extend_from_slice(&compressed);
        out
    } else {
        let mut out = Vec::with_capacity(raw.len() + 1);
        out.push(TAG_RAW);
        out.extend_from_slice(raw);
        out
    }
}

/// Reverses [`pack`].
pub fn unpack(tagged: &[u8]) -> Result<Vec<u8>, RevlogError> {
    match tagged.split_first() {
        None => Ok(Vec::new()),
        Some((&TAG_EMPTY, _)) => Ok(Vec::new()),
        Some((&TAG_RAW, rest)) => Ok(rest.to_vec()),
        Some((&TAG_ZLIB, rest)) => {
            let mut decoder = ZlibDecoder::new(rest);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| RevlogError::Payload(format!("zlib inflate failed: {e}")))?;
            Ok(out)
        }
        Some((tag, _)) => Err(RevlogError::Payload(format!(
            "unrecognized compression tag {tag:#04x}"
        ))),
    }
}
