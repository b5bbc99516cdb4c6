/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The append-only, delta-compressed revision log (spec.md §4.1) and
//! its three instantiations: changelog, manifest, filelog.

mod changelog;
mod compress;
mod delta;
mod error;
mod filelog;
mod index;
mod manifest;
mod payload;
mod revlog;

pub use changelog::Changelog;
pub use changelog::Changeset;
pub use delta::apply_patch;
pub use delta::compute_patch;
pub use delta::decode_hunks;
pub use delta::encode_hunks;
pub use delta::Hunk;
pub use error::Result;
pub use error::RevlogError;
pub use filelog::encode_meta_header;
pub use filelog::parse_meta_header;
pub use filelog::FileMetadata;
pub use filelog::FileRevision;
pub use filelog::Filelog;
pub use index::IndexRecord;
pub use manifest::Manifest;
pub use manifest::ManifestDiff;
pub use manifest::ManifestEntry;
pub use manifest::ManifestMap;
pub use payload::OpaquePayload;
pub use payload::RevlogPayload;
pub use revlog::Revlog;
pub use revlog::RevlogStats;
pub use revlog::CHAIN_SIZE_MULTIPLE;
pub use revlog::DEFAULT_INLINE_SPLIT_THRESHOLD;
pub use revlog::DEFAULT_MAX_CHAIN_DEPTH;
