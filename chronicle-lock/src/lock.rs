/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::path::Path;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use tracing::debug;
use tracing::warn;

use crate::error::LockError;

/// Default time an acquirer will wait before giving up (spec.md §5,
/// "Lock acquisition has a configurable timeout (default 10 minutes)").
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// A stale lock older than this, whose recorded owner process is no
/// longer alive, is broken automatically (spec.md §8.1 property 7).
pub const STALE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Identifies the process that holds a lock, encoded into the lock
/// file/symlink target as `hostname:pid`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockHolder {
    pub hostname: String,
    pub pid: u32,
}

impl LockHolder {
    pub fn current() -> Self {
        LockHolder {
            hostname: hostname(),
            pid: std::process::id(),
        }
    }

    fn encode(&self) -> String {
        format!("{}:{}", self.hostname, self.pid)
    }

    fn decode(s: &str) -> Option<LockHolder> {
        let (host, pid) = s.rsplit_once(':')?;
        let pid = pid.parse().ok()?;
        Some(LockHolder {
            hostname: host.to_owned(),
            pid,
        })
    }

    /// Best-effort liveness check. Only meaningful when the holder's
    /// hostname matches ours; a lock held by a different host is always
    /// treated as alive since we cannot check its process table.
    fn is_alive(&self) -> bool {
        if self.hostname != hostname() {
            return true;
        }
        process_exists(self.pid)
    }
}

impl std::fmt::Display for LockHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.hostname, self.pid)
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_owned())
}

#[cfg(target_os = "linux")]
fn process_exists(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_exists(_pid: u32) -> bool {
    // Conservative: assume alive when we have no reliable way to check.
    true
}

/// A held file lock. Releases on drop.
///
/// Acquisition is advisory (cooperative): correctness depends on every
/// writer going through [`Lock::acquire`], not on OS-enforced exclusion
/// (spec.md §5, "Shared resources").
pub struct Lock {
    path: PathBuf,
    holder: LockHolder,
}

impl Lock {
    /// Acquires the lock at `path`, retrying with exponential backoff
    /// until `timeout` elapses.
    ///
    /// A lock is represented as a symlink (or, on platforms without
    /// symlink support, a regular file) whose target/contents is
    /// `hostname:pid`. A lock older than [`STALE_TTL`] whose recorded
    /// process is no longer alive is broken automatically before the
    /// retry loop gives up.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Lock, LockError> {
        let holder = LockHolder::current();
        let start = Instant::now();
        let mut backoff = Duration::from_millis(10);
        loop {
            match try_create(path, &holder) {
                Ok(()) => {
                    debug!(?path, holder = %holder, "acquired lock");
                    return Ok(Lock {
                        path: path.to_path_buf(),
                        holder,
                    });
                }
                Err(LockError::Stolen { .. }) => unreachable!("try_create never returns Stolen"),
                Err(_create_err) => {
                    if let Some(existing) = read_holder(path)? {
                        if is_stale(path)? && !existing.is_alive() {
                            warn!(?path, holder = %existing, "breaking stale lock");
                            let _ = std::fs::remove_file(path);
                            continue;
                        }
                        if start.elapsed() >= timeout {
                            return Err(LockError::Timeout {
                                path: path.to_path_buf(),
                                holder: existing.to_string(),
                            });
                        }
                    } else if start.elapsed() >= timeout {
                        return Err(LockError::Timeout {
                            path: path.to_path_buf(),
                            holder: "<unknown>".to_owned(),
                        });
                    }
                    thread::sleep(backoff);
                    backoff = (backoff * 2).min(Duration::from_secs(1));
                }
            }
        }
    }

    pub fn holder(&self) -> &LockHolder {
        &self.holder
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        match read_holder(&self.path) {
            Ok(Some(existing)) if existing == self.holder => {
                let _ = std::fs::remove_file(&self.path);
                debug!(path = ?self.path, "released lock");
            }
            Ok(Some(other)) => {
                warn!(path = ?self.path, holder = %other, "lock was stolen before we released it");
            }
            _ => {}
        }
    }
}

#[cfg(unix)]
fn try_create(path: &Path, holder: &LockHolder) -> Result<(), LockError> {
    use std::os::unix::fs::symlink;
    symlink(holder.encode(), path).map_err(|source| LockError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(unix)]
fn read_holder(path: &Path) -> Result<Option<LockHolder>, LockError> {
    match std::fs::read_link(path) {
        Ok(target) => {
            let s = target.to_string_lossy().into_owned();
            LockHolder::decode(&s)
                .map(Some)
                .ok_or_else(|| LockError::Unparseable {
                    path: path.to_path_buf(),
                    reason: format!("could not parse lock target {s:?}"),
                })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(LockError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(not(unix))]
fn try_create(path: &Path, holder: &LockHolder) -> Result<(), LockError> {
    use std::fs::OpenOptions;
    use std::io::Write;
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|source| LockError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    file.write_all(holder.encode().as_bytes())
        .map_err(|source| LockError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(not(unix))]
fn read_holder(path: &Path) -> Result<Option<LockHolder>, LockError> {
    match std::fs::read_to_string(path) {
        Ok(s) => LockHolder::decode(s.trim())
            .map(Some)
            .ok_or_else(|| LockError::Unparseable {
                path: path.to_path_buf(),
                reason: format!("could not parse lock contents {s:?}"),
            }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(LockError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn is_stale(path: &Path) -> Result<bool, LockError> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(source) => {
            return Err(LockError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let age = meta
        .modified()
        .ok()
        .and_then(|m| m.elapsed().ok())
        .unwrap_or_default();
    Ok(age >= STALE_TTL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn acquire_and_release_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lock");
        let lock = Lock::acquire(&path, Duration::from_millis(100)).unwrap();
        assert_eq!(lock.holder(), &LockHolder::current());
        drop(lock);
        assert!(read_holder(&path).unwrap().is_none());
    }

    #[test]
    fn second_acquire_times_out_while_first_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lock");
        let _first = Lock::acquire(&path, Duration::from_millis(100)).unwrap();
        let err = Lock::acquire(&path, Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, LockError::Timeout { .. }));
    }

    #[test]
    fn holder_round_trips_through_encode_decode() {
        let holder = LockHolder {
            hostname: "box".to_owned(),
            pid: 4242,
        };
        assert_eq!(LockHolder::decode(&holder.encode()), Some(holder));
    }
}
