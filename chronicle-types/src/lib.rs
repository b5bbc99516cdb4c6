/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Identifiers shared by every crate in the workspace: content-addressed
//! [`Node`]s, local [`Rev`] indices, repository [`RepoPath`]s and their
//! on-disk encoding, and the flag bits carried by revlog entries and
//! manifest lines.

mod flags;
mod node;
mod path;
mod rev;

pub use flags::FileFlag;
pub use flags::RevFlags;
pub use node::Node;
pub use node::NodeParseError;
pub use node::NODE_BYTES;
pub use node::NULL_NODE;
pub use path::encode_store_path;
pub use path::RepoPath;
pub use path::RepoPathError;
pub use path::LONG_NAME_PREFIX;
pub use path::MAX_ENCODED_COMPONENT_LEN;
pub use rev::Rev;
pub use rev::NULL_REV;
