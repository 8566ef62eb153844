//! Host filesystem collaborators: stat harvesting for entry construction and
//! identity-database lookups for symbolic uid/gid overrides.

use std::fs::Metadata;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::Path;

use crate::error::{Error, Result};
use crate::mode::EntryKind;

/// Snapshot of the header-relevant metadata of one path.
///
/// Taken with `symlink_metadata`, so the kind reflects the path itself and
/// symlinks are never dereferenced.
#[derive(Debug, Clone)]
pub(crate) struct PathInfo {
    pub kind: EntryKind,
    /// Low 12 mode bits of the host file.
    pub perm_bits: u32,
    pub mtime: u64,
    pub ino: u64,
    pub rdevmajor: u32,
    pub rdevminor: u32,
}

pub(crate) fn stat(path: &Path) -> Result<PathInfo> {
    let meta = std::fs::symlink_metadata(path)?;
    Ok(path_info(&meta))
}

fn path_info(meta: &Metadata) -> PathInfo {
    let file_type = meta.file_type();
    let kind = if file_type.is_symlink() {
        EntryKind::Symlink
    } else if file_type.is_dir() {
        EntryKind::Directory
    } else if file_type.is_char_device() {
        EntryKind::CharDevice
    } else if file_type.is_block_device() {
        EntryKind::BlockDevice
    } else if file_type.is_fifo() {
        EntryKind::Fifo
    } else if file_type.is_socket() {
        EntryKind::Socket
    } else {
        EntryKind::File
    };

    let rdev = meta.rdev();
    PathInfo {
        kind,
        perm_bits: meta.mode() & 0o7777,
        mtime: u64::try_from(meta.mtime()).unwrap_or(0),
        ino: meta.ino(),
        rdevmajor: nix::sys::stat::major(rdev) as u32,
        rdevminor: nix::sys::stat::minor(rdev) as u32,
    }
}

/// Resolve an account name to a uid (`getpwnam_r(3)`).
pub fn resolve_user(name: &str) -> Result<u32> {
    match nix::unistd::User::from_name(name) {
        Ok(Some(user)) => Ok(user.uid.as_raw()),
        Ok(None) => Err(Error::UnknownUser(name.to_string())),
        Err(err) => Err(Error::Io(err.into())),
    }
}

/// Resolve a group name to a gid (`getgrnam_r(3)`).
pub fn resolve_group(name: &str) -> Result<u32> {
    match nix::unistd::Group::from_name(name) {
        Ok(Some(group)) => Ok(group.gid.as_raw()),
        Ok(None) => Err(Error::UnknownGroup(name.to_string())),
        Err(err) => Err(Error::Io(err.into())),
    }
}
