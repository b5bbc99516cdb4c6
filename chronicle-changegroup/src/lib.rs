/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The changegroup wire format (spec.md §4.7): chunk framing, the
//! v1/v2 per-revision layout, the three compression wrappers, and the
//! apply-to-revlog semantics that turn a decoded bundle into new
//! changelog/manifest/filelog revisions inside one transaction.

mod apply;
mod bundle;
mod chunk;
mod error;
mod revision;
mod section;
mod wrapper;

pub use apply::apply;
pub use bundle::Bundle;
pub use error::ChangegroupError;
pub use error::Result;
pub use revision::BundleVersion;
pub use revision::RevisionChunk;
pub use wrapper::Compressor;
