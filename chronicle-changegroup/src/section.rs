/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The three section layouts of spec.md §4.7:
//! ```text
//! changelog-section ::= chunk* 0
//! manifest-section  ::= chunk* 0
//! file-section       ::= ( filename-chunk  chunk*  0 )*  0
//! ```

use std::io::Read;
use std::io::Write;

use types::RepoPath;

use crate::chunk;
use crate::error::ChangegroupError;
use crate::error::Result;
use crate::revision::BundleVersion;
use crate::revision::RevisionChunk;

/// Reads a bare `chunk* 0` run of revision chunks (changelog or
/// manifest section).
pub fn decode_revision_section<R: Read>(
    reader: &mut R,
    version: BundleVersion,
) -> Result<Vec<RevisionChunk>> {
    chunk::read_chunk_run(reader)?
        .into_iter()
        .map(|body| RevisionChunk::decode(version, &body))
        .collect()
}

/// Writes a bare `chunk* 0` run.
pub fn encode_revision_section<W: Write>(
    writer: &mut W,
    version: BundleVersion,
    revisions: &[RevisionChunk],
) -> Result<()> {
    for revision in revisions {
        chunk::write_chunk(writer, &revision.encode(version))?;
    }
    chunk::write_terminator(writer)
}

/// Reads the file section: a sequence of `(filename, revisions)` pairs,
/// terminated by an outer zero-length chunk once no further filename
/// chunk follows.
pub fn decode_file_section<R: Read>(
    reader: &mut R,
    version: BundleVersion,
) -> Result<Vec<(RepoPath, Vec<RevisionChunk>)>> {
    let mut files = Vec::new();
    loop {
        let Some(name_bytes) = chunk::read_chunk(reader)? else {
            break;
        };
        let name = String::from_utf8(name_bytes).map_err(|_| ChangegroupError::MissingFilename)?;
        let path = RepoPath::new(name)?;
        let revisions = decode_revision_section(reader, version)?;
        files.push((path, revisions));
    }
    Ok(files)
}

/// Writes the file section.
pub fn encode_file_section<W: Write>(
    writer: &mut W,
    version: BundleVersion,
    files: &[(RepoPath, Vec<RevisionChunk>)],
) -> Result<()> {
    for (path, revisions) in files {
        chunk::write_chunk(writer, path.as_bytes())?;
        encode_revision_section(writer, version, revisions)?;
    }
    chunk::write_terminator(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use types::Node;
    use types::NODE_BYTES;
    use types::NULL_NODE;

    fn sample(byte: u8) -> RevisionChunk {
        RevisionChunk {
            node: Node::from_bytes([byte; NODE_BYTES]),
            p1: NULL_NODE,
            p2: NULL_NODE,
            linknode: Node::from_bytes([byte; NODE_BYTES]),
            base_node: None,
            delta: vec![1, 2, 3],
        }
    }

    #[test]
    fn revision_section_round_trips() {
        let revisions = vec![sample(1), sample(2)];
        let mut buf = Vec::new();
        encode_revision_section(&mut buf, BundleVersion::V1, &revisions).unwrap();

        let mut cursor = Cursor::new(buf);
        let decoded = decode_revision_section(&mut cursor, BundleVersion::V1).unwrap();
        assert_eq!(decoded, revisions);
    }

    #[test]
    fn empty_revision_section_is_just_a_terminator() {
        let mut buf = Vec::new();
        encode_revision_section(&mut buf, BundleVersion::V1, &[]).unwrap();
        assert_eq!(buf, 0u32.to_be_bytes().to_vec());
    }

    #[test]
    fn file_section_round_trips_multiple_files() {
        let files = vec![
            (RepoPath::new("a.txt").unwrap(), vec![sample(1)]),
            (RepoPath::new("dir/b.txt").unwrap(), vec![sample(2), sample(3)]),
        ];
        let mut buf = Vec::new();
        encode_file_section(&mut buf, BundleVersion::V1, &files).unwrap();

        let mut cursor = Cursor::new(buf);
        let decoded = decode_file_section(&mut cursor, BundleVersion::V1).unwrap();
        assert_eq!(decoded, files);
    }

    #[test]
    fn empty_file_section_is_just_a_terminator() {
        let mut buf = Vec::new();
        encode_file_section(&mut buf, BundleVersion::V1, &[]).unwrap();
        assert_eq!(buf, 0u32.to_be_bytes().to_vec());
    }
}
