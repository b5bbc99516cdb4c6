/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The whole-bundle compression wrapper (spec.md §4.7): a 6-byte magic
//! identifying one of three mutually exclusive encodings, prefixed to
//! the entire section stream.

use std::io::Read;
use std::io::Write;

use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::ChangegroupError;
use crate::error::Result;

const MAGIC_LEN: usize = 6;
const MAGIC_UNCOMPRESSED: &[u8; MAGIC_LEN] = b"HG10UN";
const MAGIC_BZIP2: &[u8; MAGIC_LEN] = b"HG10BZ";
const MAGIC_GZIP: &[u8; MAGIC_LEN] = b"HG10GZ";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Compressor {
    None,
    Bzip2,
    Gzip,
}

impl Compressor {
    fn magic(&self) -> &'static [u8; MAGIC_LEN] {
        match self {
            Compressor::None => MAGIC_UNCOMPRESSED,
            Compressor::Bzip2 => MAGIC_BZIP2,
            Compressor::Gzip => MAGIC_GZIP,
        }
    }
}

/// Wraps `body` (the already-framed chunk sections) with `compressor`'s
/// magic and, if applicable, compresses it.
pub fn wrap(compressor: Compressor, body: &[u8]) -> Result<Vec<u8>> {
    let mut out = compressor.magic().to_vec();
    match compressor {
        Compressor::None => out.extend_from_slice(body),
        Compressor::Bzip2 => {
            let mut encoder = BzEncoder::new(Vec::new(), bzip2::Compression::default());
            encoder.write_all(body)?;
            out.extend(encoder.finish()?);
        }
        Compressor::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(body)?;
            out.extend(encoder.finish()?);
        }
    }
    Ok(out)
}

/// Reverses [`wrap`]: reads the 6-byte magic and decompresses the rest.
pub fn unwrap(tagged: &[u8]) -> Result<Vec<u8>> {
    if tagged.len() < MAGIC_LEN {
        return Err(ChangegroupError::TruncatedChunk {
            expected: MAGIC_LEN,
            found: tagged.len(),
        });
    }
    let (magic, rest) = tagged.split_at(MAGIC_LEN);
    if magic == MAGIC_UNCOMPRESSED {
        Ok(rest.to_vec())
    } else if magic == MAGIC_BZIP2 {
        let mut decoder = BzDecoder::new(rest);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    } else if magic == MAGIC_GZIP {
        let mut decoder = GzDecoder::new(rest);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    } else {
        let mut found = [0u8; MAGIC_LEN];
        found.copy_from_slice(magic);
        Err(ChangegroupError::UnknownCompression(found))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncompressed_round_trips() {
        let wrapped = wrap(Compressor::None, b"payload").unwrap();
        assert!(wrapped.starts_with(MAGIC_UNCOMPRESSED));
        assert_eq!(unwrap(&wrapped).unwrap(), b"payload");
    }

    #[test]
    fn bzip2_round_trips() {
        let payload = vec![b'z'; 2048];
        let wrapped = wrap(Compressor::Bzip2, &payload).unwrap();
        assert!(wrapped.starts_with(MAGIC_BZIP2));
        assert_eq!(unwrap(&wrapped).unwrap(), payload);
    }

    #[test]
    fn gzip_round_trips() {
        let payload = vec![b'q'; 2048];
        let wrapped = wrap(Compressor::Gzip, &payload).unwrap();
        assert!(wrapped.starts_with(MAGIC_GZIP));
        assert_eq!(unwrap(&wrapped).unwrap(), payload);
    }

    #[test]
    fn unrecognized_magic_is_rejected() {
        let mut bad = b"HG10XX".to_vec();
        bad.extend_from_slice(b"whatever");
        assert!(matches!(
            unwrap(&bad),
            Err(ChangegroupError::UnknownCompression(_))
        ));
    }
}
