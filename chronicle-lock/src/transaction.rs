/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::collections::HashSet;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;
use tracing::info;

use crate::error::LockError;

/// An append-only, multi-file journal guarding a single atomic update
/// to the store (spec.md §4.4).
///
/// Before any store file is extended, the transaction records
/// `(filename, previous_length)` in the journal — on disk, not just in
/// memory, so a crash between the note and the write is still
/// recoverable. On [`Transaction::commit`] the journal is deleted. On
/// [`Transaction::abort`] (or a call to [`recover`] after a crash) every
/// journaled file is truncated back to its recorded length.
///
/// Revlog writes are strictly append-only, so "truncate to the
/// journaled length" is always sufficient to undo them — there is no
/// need to restore overwritten bytes.
pub struct Transaction {
    journal_path: PathBuf,
    journal_file: File,
    noted: HashSet<PathBuf>,
    finished: bool,
}

impl Transaction {
    /// Begins a new transaction, creating the journal file at
    /// `journal_path`. Fails if a journal already exists there — that
    /// indicates either a concurrent writer (a bug, since the store
    /// lock should have prevented it) or an unrecovered crash, which
    /// the caller must resolve via [`recover`] first.
    pub fn begin(journal_path: &Path) -> Result<Transaction, LockError> {
        let journal_file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(journal_path)
            .map_err(|source| LockError::Io {
                path: journal_path.to_path_buf(),
                source,
            })?;
        Ok(Transaction {
            journal_path: journal_path.to_path_buf(),
            journal_file,
            noted: HashSet::new(),
            finished: false,
        })
    }

    /// Records `path`'s current length, the first time this
    /// transaction touches it. Must be called before the file is
    /// extended.
    pub fn note(&mut self, path: &Path) -> Result<(), LockError> {
        if self.noted.contains(path) {
            return Ok(());
        }
        let len = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        writeln!(self.journal_file, "{}\t{}", path.display(), len).map_err(|source| {
            LockError::Io {
                path: self.journal_path.clone(),
                source,
            }
        })?;
        self.journal_file.sync_all().map_err(|source| LockError::Io {
            path: self.journal_path.clone(),
            source,
        })?;
        self.noted.insert(path.to_path_buf());
        debug!(?path, ?len, "journaled file length");
        Ok(())
    }

    /// Commits: deletes the journal. Every file this transaction wrote
    /// to is now durable and visible to readers.
    pub fn commit(mut self) -> Result<(), LockError> {
        self.finished = true;
        std::fs::remove_file(&self.journal_path).map_err(|source| LockError::Io {
            path: self.journal_path.clone(),
            source,
        })?;
        info!(journal = ?self.journal_path, "transaction committed");
        Ok(())
    }

    /// Aborts: truncates every journaled file back to its recorded
    /// length, then deletes the journal. Runs the same path a crash
    /// recovery pass would run.
    pub fn abort(mut self) -> Result<(), LockError> {
        self.finished = true;
        replay(&self.journal_path)?;
        let _ = std::fs::remove_file(&self.journal_path);
        info!(journal = ?self.journal_path, "transaction aborted");
        Ok(())
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.finished {
            // Not explicitly committed or aborted: treat like a crash.
            // Best-effort; an error here has nowhere to propagate to.
            let _ = replay(&self.journal_path);
            let _ = std::fs::remove_file(&self.journal_path);
        }
    }
}

/// Truncates every file listed in the journal at `journal_path` back to
/// its recorded length. Used both by [`Transaction::abort`] and by
/// repository-open-time crash recovery (spec.md §4.4, Scenario E).
fn replay(journal_path: &Path) -> Result<(), LockError> {
    let file = match File::open(journal_path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(LockError::Io {
                path: journal_path.to_path_buf(),
                source,
            })
        }
    };
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| LockError::Io {
            path: journal_path.to_path_buf(),
            source,
        })?;
        let Some((path_str, len_str)) = line.rsplit_once('\t') else {
            continue;
        };
        let Ok(len) = len_str.parse::<u64>() else {
            continue;
        };
        let path = PathBuf::from(path_str);
        if let Ok(existing) = std::fs::metadata(&path) {
            if existing.len() > len {
                let f = OpenOptions::new()
                    .write(true)
                    .open(&path)
                    .map_err(|source| LockError::Io {
                        path: path.clone(),
                        source,
                    })?;
                f.set_len(len).map_err(|source| LockError::Io { path, source })?;
            }
        }
    }
    Ok(())
}

/// Recovers from a crash: if a journal file exists at `journal_path`
/// (left behind because the process died before `commit`/`abort` ran),
/// replays it and removes it. Call this once, under the store lock,
/// before opening any revlog.
pub fn recover(journal_path: &Path) -> Result<bool, LockError> {
    if !journal_path.exists() {
        return Ok(false);
    }
    replay(journal_path)?;
    std::fs::remove_file(journal_path).map_err(|source| LockError::Io {
        path: journal_path.to_path_buf(),
        source,
    })?;
    Ok(true)
}
