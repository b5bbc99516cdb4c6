/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The chunk framing primitive shared by every section of a bundle
//! (spec.md §4.7): a 4-byte big-endian length, counting itself, followed
//! by that many minus four bytes of body. A length of zero is a bare
//! terminator with no body and ends the enclosing `chunk*` run.

use std::io::Read;
use std::io::Write;

use byteorder::BigEndian;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;

use crate::error::ChangegroupError;
use crate::error::Result;

/// Reads one chunk. `Ok(None)` means the zero-length terminator was
/// read; `Ok(Some(body))` is a regular chunk's payload bytes.
pub fn read_chunk<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let len = reader.read_u32::<BigEndian>()?;
    if len == 0 {
        return Ok(None);
    }
    if len < 4 {
        return Err(ChangegroupError::ChunkTooShort(len));
    }
    let body_len = (len - 4) as usize;
    let mut body = vec![0u8; body_len];
    reader.read_exact(&mut body).map_err(|_| ChangegroupError::TruncatedChunk {
        expected: body_len,
        found: 0,
    })?;
    Ok(Some(body))
}

/// Writes one chunk carrying `body`.
pub fn write_chunk<W: Write>(writer: &mut W, body: &[u8]) -> Result<()> {
    let len = body.len() as u32 + 4;
    writer.write_u32::<BigEndian>(len)?;
    writer.write_all(body)?;
    Ok(())
}

/// Writes the zero-length section terminator.
pub fn write_terminator<W: Write>(writer: &mut W) -> Result<()> {
    writer.write_u32::<BigEndian>(0)?;
    Ok(())
}

/// Reads a `chunk* 0` run, collecting every body in order.
pub fn read_chunk_run<R: Read>(reader: &mut R) -> Result<Vec<Vec<u8>>> {
    let mut out = Vec::new();
    while let Some(body) = read_chunk(reader)? {
        out.push(body);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn single_chunk_round_trips() {
        let mut buf = Vec::new();
        write_chunk(&mut buf, b"hello").unwrap();
        write_terminator(&mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_chunk(&mut cursor).unwrap(), Some(b"hello".to_vec()));
        assert_eq!(read_chunk(&mut cursor).unwrap(), None);
    }

    #[test]
    fn chunk_run_reads_until_terminator() {
        let mut buf = Vec::new();
        write_chunk(&mut buf, b"a").unwrap();
        write_chunk(&mut buf, b"bb").unwrap();
        write_terminator(&mut buf).unwrap();
        write_chunk(&mut buf, b"not part of the run").unwrap();

        let mut cursor = Cursor::new(buf);
        let run = read_chunk_run(&mut cursor).unwrap();
        assert_eq!(run, vec![b"a".to_vec(), b"bb".to_vec()]);
    }

    #[test]
    fn empty_run_is_just_the_terminator() {
        let mut buf = Vec::new();
        write_terminator(&mut buf).unwrap();
        let mut cursor = Cursor::new(buf);
        assert!(read_chunk_run(&mut cursor).unwrap().is_empty());
    }

    #[test]
    fn truncated_body_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&10u32.to_be_bytes());
        buf.extend_from_slice(b"ab");
        let mut cursor = Cursor::new(buf);
        assert!(matches!(
            read_chunk(&mut cursor),
            Err(ChangegroupError::TruncatedChunk { .. })
        ));
    }

    #[test]
    fn length_shorter_than_the_prefix_itself_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&2u32.to_be_bytes());
        let mut cursor = Cursor::new(buf);
        assert!(matches!(
            read_chunk(&mut cursor),
            Err(ChangegroupError::ChunkTooShort(2))
        ));
    }
}
