/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! File-based locking and the transaction journal (spec.md §4.4, §5).
//!
//! Two locks guard a repository: [`mod@lock`]'s `Lock` is used for both
//! the store lock (`lock`) and the working-directory lock (`wlock`);
//! which path each guards is the caller's concern. [`Transaction`] is
//! the append-only journal that makes a multi-file store update atomic.

mod error;
mod lock;
mod transaction;

pub use error::LockError;
pub use lock::Lock;
pub use lock::LockHolder;
pub use lock::DEFAULT_TIMEOUT;
pub use lock::STALE_TTL;
pub use transaction::recover;
pub use transaction::Transaction;
