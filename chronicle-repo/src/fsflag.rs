/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Translates between a tracked file's on-disk representation (a
//! regular file, an executable bit, or a symlink) and the
//! [`types::FileFlag`] a manifest entry records for it.

use std::io;
use std::path::Path;

use types::FileFlag;

/// Reads `path`'s flag without following a symlink.
pub fn read_flag(path: &Path) -> io::Result<FileFlag> {
    let metadata = std::fs::symlink_metadata(path)?;
    if metadata.file_type().is_symlink() {
        return Ok(FileFlag::Symlink);
    }
    Ok(executable_bit(&metadata))
}

#[cfg(unix)]
fn executable_bit(metadata: &std::fs::Metadata) -> FileFlag {
    use std::os::unix::fs::PermissionsExt;
    if metadata.permissions().mode() & 0o111 != 0 {
        FileFlag::Executable
    } else {
        FileFlag::Regular
    }
}

#[cfg(not(unix))]
fn executable_bit(_metadata: &std::fs::Metadata) -> FileFlag {
    FileFlag::Regular
}

/// Writes `content` to `path` as `flag` demands: a symlink whose
/// target is `content` decoded as UTF-8, or a regular file with the
/// executable bit set or cleared.
pub fn write_file(path: &Path, content: &[u8], flag: FileFlag) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match flag {
        FileFlag::Symlink => {
            let _ = std::fs::remove_file(path);
            let target = String::from_utf8_lossy(content).into_owned();
            symlink(&target, path)
        }
        FileFlag::Regular | FileFlag::Executable => {
            std::fs::write(path, content)?;
            set_executable(path, flag == FileFlag::Executable)
        }
    }
}

#[cfg(unix)]
fn symlink(target: &str, path: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, path)
}

#[cfg(not(unix))]
fn symlink(_target: &str, path: &Path) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, format!("symlinks are not supported on this platform: {path:?}")))
}

#[cfg(unix)]
fn set_executable(path: &Path, executable: bool) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    let mode = if executable { 0o755 } else { 0o644 };
    perms.set_mode(mode);
    std::fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn set_executable(_path: &Path, _executable: bool) -> io::Result<()> {
    Ok(())
}
