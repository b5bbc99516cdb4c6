/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The payload codec seam (spec.md §9 REDESIGN FLAGS: "`getattr`-based
//! duck typing on revlog variants ... a generic `Revlog<P: Payload>`
//! parameterized on a payload codec; the three concrete types are
//! instantiations, and payload-specific operations live on the codec
//! trait").
//!
//! [`crate::Revlog`] itself only ever stores and reconstructs raw
//! bytes; changelog, manifest, and filelog differ solely in how those
//! bytes are interpreted, which this trait isolates.

use crate::error::RevlogError;

pub trait RevlogPayload: Sized {
    /// Parses the fully-materialized bytes of one revision.
    fn decode(raw: &[u8]) -> Result<Self, RevlogError>;

    /// Serializes this payload back to the bytes a revlog stores.
    fn encode(&self) -> Vec<u8>;
}

/// The trivial payload: revisions are opaque bytes, used by
/// [`crate::Revlog<OpaquePayload>`] in tests and tools that don't care
/// about a specific interpretation (e.g. `verify`, generic strip/bundle
/// plumbing).
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct OpaquePayload(pub Vec<u8>);

impl RevlogPayload for OpaquePayload {
    fn decode(raw: &[u8]) -> Result<Self, RevlogError> {
        Ok(OpaquePayload(raw.to_vec()))
    }

    fn encode(&self) -> Vec<u8> {
        self.0.clone()
    }
}
