/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! A whole bundle: the three sections of spec.md §4.7 plus the
//! compression wrapper, encoded/decoded as one unit.

use std::io::Cursor;

use types::RepoPath;

use crate::error::ChangegroupError;
use crate::error::Result;
use crate::revision::BundleVersion;
use crate::revision::RevisionChunk;
use crate::section;
use crate::wrapper;
use crate::wrapper::Compressor;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Bundle {
    pub version: BundleVersion,
    pub changelog: Vec<RevisionChunk>,
    pub manifest: Vec<RevisionChunk>,
    pub files: Vec<(RepoPath, Vec<RevisionChunk>)>,
}

impl Bundle {
    /// Encodes the bundle's sections and wraps them with `compressor`.
    /// `version` is out of band (negotiated at capability exchange, per
    /// spec.md §4.7) and is not itself part of the wire bytes.
    pub fn encode(&self, compressor: Compressor) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        section::encode_revision_section(&mut body, self.version, &self.changelog)?;
        section::encode_revision_section(&mut body, self.version, &self.manifest)?;
        section::encode_file_section(&mut body, self.version, &self.files)?;
        wrapper::wrap(compressor, &body)
    }

    /// Decodes a wrapped bundle. `version` must be whatever the two
    /// peers already agreed on out of band.
    pub fn decode(version: BundleVersion, raw: &[u8]) -> Result<Self> {
        let body = wrapper::unwrap(raw)?;
        let mut cursor = Cursor::new(body);
        let changelog = section::decode_revision_section(&mut cursor, version)?;
        let manifest = section::decode_revision_section(&mut cursor, version)?;
        let files = section::decode_file_section(&mut cursor, version)?;
        Ok(Bundle {
            version,
            changelog,
            manifest,
            files,
        })
    }
}

impl BundleVersion {
    /// Maps a capability-exchange version number to a [`BundleVersion`],
    /// failing closed on anything this implementation doesn't speak
    /// (spec.md §4.7: "Decoders MUST ... fail closed on unknown
    /// versions").
    pub fn from_capability(n: u32) -> Result<Self> {
        match n {
            1 => Ok(BundleVersion::V1),
            2 => Ok(BundleVersion::V2),
            other => Err(ChangegroupError::UnsupportedVersion(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::Node;
    use types::NODE_BYTES;
    use types::NULL_NODE;

    fn sample_chunk(byte: u8) -> RevisionChunk {
        RevisionChunk {
            node: Node::from_bytes([byte; NODE_BYTES]),
            p1: NULL_NODE,
            p2: NULL_NODE,
            linknode: Node::from_bytes([byte; NODE_BYTES]),
            base_node: None,
            delta: vec![byte; 4],
        }
    }

    #[test]
    fn bundle_round_trips_through_each_compressor() {
        let bundle = Bundle {
            version: BundleVersion::V1,
            changelog: vec![sample_chunk(1)],
            manifest: vec![sample_chunk(2)],
            files: vec![(RepoPath::new("a").unwrap(), vec![sample_chunk(3)])],
        };

        for compressor in [Compressor::None, Compressor::Bzip2, Compressor::Gzip] {
            let encoded = bundle.encode(compressor).unwrap();
            let decoded = Bundle::decode(BundleVersion::V1, &encoded).unwrap();
            assert_eq!(decoded, bundle);
        }
    }

    #[test]
    fn capability_negotiation_rejects_unknown_versions() {
        assert_eq!(BundleVersion::from_capability(1).unwrap(), BundleVersion::V1);
        assert_eq!(BundleVersion::from_capability(2).unwrap(), BundleVersion::V2);
        assert!(matches!(
            BundleVersion::from_capability(3),
            Err(ChangegroupError::UnsupportedVersion(3))
        ));
    }
}
