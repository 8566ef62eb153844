use std::fmt;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::fs;
use crate::header::{Header, Overrides};
use crate::mode::EntryKind;

/// SHA-256 digest of an entry payload.
pub type ContentHash = [u8; 32];

pub(crate) fn content_hash(data: &[u8]) -> ContentHash {
    Sha256::digest(data).into()
}

/// One archive member. A closed set of kinds; the mode field's type bits
/// select the variant, and each variant owns its header and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    File(FileEntry),
    Directory(DirectoryEntry),
    Symlink(SymlinkEntry),
    CharDevice(CharDeviceEntry),
}

/// Regular file: payload is the full content, hashed for dedup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub header: Header,
    data: Vec<u8>,
    hash: Option<ContentHash>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub header: Header,
}

/// Symbolic link: payload is the target path, permissions always 0o777.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymlinkEntry {
    pub header: Header,
    target: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharDeviceEntry {
    pub header: Header,
}

impl FileEntry {
    pub fn new(header: Header, data: Vec<u8>) -> FileEntry {
        let mut entry = FileEntry {
            header,
            data: Vec::new(),
            hash: None,
        };
        entry.set_data(data);
        entry
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn hash(&self) -> Option<&ContentHash> {
        self.hash.as_ref()
    }

    /// Replace the payload, recomputing `filesize` and the content hash.
    /// The only way the payload changes; field edits cannot bypass it.
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.header.filesize = data.len() as u64;
        self.hash = if data.is_empty() {
            None
        } else {
            Some(content_hash(&data))
        };
        self.data = data;
    }

    /// Drop the payload, leaving a non-canonical hardlink member that
    /// serializes with filesize 0.
    pub(crate) fn take_data(&mut self) -> Vec<u8> {
        let data = std::mem::take(&mut self.data);
        self.header.filesize = 0;
        self.hash = None;
        data
    }
}

impl SymlinkEntry {
    pub fn new(header: Header, target: Vec<u8>) -> Result<SymlinkEntry> {
        if target.is_empty() {
            return Err(Error::format(format!(
                "symlink {:?} has no target",
                header.name()
            )));
        }
        let mut entry = SymlinkEntry {
            header,
            target: Vec::new(),
        };
        entry.set_target(target);
        Ok(entry)
    }

    #[inline]
    pub fn target(&self) -> &[u8] {
        &self.target
    }

    fn set_target(&mut self, target: Vec<u8>) {
        self.header.filesize = target.len() as u64;
        self.target = target;
    }
}

impl Entry {
    /// Build an entry from a filesystem snapshot of `path`, archived under
    /// `name`. The kind comes from the path's own type bits; header fields
    /// are host stat metadata merged with `overrides`.
    pub fn from_path(path: &Path, name: String, overrides: &Overrides) -> Result<Entry> {
        let info = fs::stat(path)?;
        if !info.kind.is_archivable() {
            return Err(Error::format(format!(
                "cannot archive {}: {} entries are not supported",
                path.display(),
                info.kind
            )));
        }

        let mut header = Header::new(name, info.kind);
        header.ino = Header::clamp_ino(info.ino);
        header.mtime = info.mtime;
        header.set_permissions(info.perm_bits);
        if info.kind == EntryKind::CharDevice {
            header.rdevmajor = info.rdevmajor;
            header.rdevminor = info.rdevminor;
        }
        header.apply_overrides(overrides)?;

        let entry = match info.kind {
            EntryKind::File => {
                let data = std::fs::read(path)?;
                Entry::File(FileEntry::new(header, data))
            }
            EntryKind::Directory => Entry::Directory(DirectoryEntry { header }),
            EntryKind::Symlink => {
                use std::os::unix::ffi::OsStrExt;
                let target = std::fs::read_link(path)?;
                let target = target.as_os_str().as_bytes().to_vec();
                // POSIX leaves symlink permissions unused; force them full.
                header.set_permissions(0o777);
                Entry::Symlink(SymlinkEntry::new(header, target)?)
            }
            EntryKind::CharDevice => Entry::CharDevice(CharDeviceEntry { header }),
            _ => unreachable!("checked archivable above"),
        };

        tracing::debug!(name = entry.name(), kind = %entry.kind(), "built entry from path");
        Ok(entry)
    }

    /// Build a symlink entry from explicit fields, mtime now.
    pub fn symlink(name: String, target: &str, overrides: &Overrides) -> Result<Entry> {
        let mut header = Header::new(name, EntryKind::Symlink);
        header.mtime = unix_now();
        header.apply_overrides(overrides)?;
        header.set_permissions(0o777);
        Ok(Entry::Symlink(SymlinkEntry::new(
            header,
            target.as_bytes().to_vec(),
        )?))
    }

    /// Build a character-device entry from explicit fields, mtime now.
    /// Permission bits default to 0o644 unless overridden.
    pub fn char_device(name: String, major: u32, minor: u32, overrides: &Overrides) -> Result<Entry> {
        let mut header = Header::new(name, EntryKind::CharDevice);
        header.mtime = unix_now();
        header.set_permissions(0o644);
        header.rdevmajor = major;
        header.rdevminor = minor;
        header.apply_overrides(overrides)?;
        Ok(Entry::CharDevice(CharDeviceEntry { header }))
    }

    /// Wrap a decoded header and its payload bytes. Used by the reader; the
    /// header's mode field has already fixed the kind.
    pub(crate) fn from_wire(header: Header, payload: Vec<u8>) -> Result<Entry> {
        match header.kind()? {
            EntryKind::File => Ok(Entry::File(FileEntry::new(header, payload))),
            EntryKind::Directory => Ok(Entry::Directory(DirectoryEntry { header })),
            EntryKind::Symlink => Ok(Entry::Symlink(SymlinkEntry::new(header, payload)?)),
            EntryKind::CharDevice => Ok(Entry::CharDevice(CharDeviceEntry { header })),
            kind => Err(Error::format(format!(
                "entry {:?} has unsupported kind {}",
                header.name(),
                kind
            ))),
        }
    }

    #[inline]
    pub fn header(&self) -> &Header {
        match self {
            Entry::File(e) => &e.header,
            Entry::Directory(e) => &e.header,
            Entry::Symlink(e) => &e.header,
            Entry::CharDevice(e) => &e.header,
        }
    }

    #[inline]
    pub(crate) fn header_mut(&mut self) -> &mut Header {
        match self {
            Entry::File(e) => &mut e.header,
            Entry::Directory(e) => &mut e.header,
            Entry::Symlink(e) => &mut e.header,
            Entry::CharDevice(e) => &mut e.header,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.header().name()
    }

    #[inline]
    pub fn kind(&self) -> EntryKind {
        match self {
            Entry::File(_) => EntryKind::File,
            Entry::Directory(_) => EntryKind::Directory,
            Entry::Symlink(_) => EntryKind::Symlink,
            Entry::CharDevice(_) => EntryKind::CharDevice,
        }
    }

    /// The bytes that follow the header on the wire.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        match self {
            Entry::File(e) => e.data(),
            Entry::Symlink(e) => e.target(),
            Entry::Directory(_) | Entry::CharDevice(_) => &[],
        }
    }

    /// Content digest; present only for files with a payload.
    #[inline]
    pub fn hash(&self) -> Option<&ContentHash> {
        match self {
            Entry::File(e) => e.hash(),
            _ => None,
        }
    }

    #[inline]
    pub fn as_file(&self) -> Option<&FileEntry> {
        match self {
            Entry::File(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn as_file_mut(&mut self) -> Option<&mut FileEntry> {
        match self {
            Entry::File(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = self.header();
        write!(f, "[{}] {}: {}", header.ino, header.name(), self.kind())?;
        match self {
            Entry::File(e) => write!(f, " ({} bytes)", e.data().len())?,
            Entry::Symlink(e) => {
                write!(f, " -> {}", String::from_utf8_lossy(e.target()))?
            }
            // Device permissions live in rdev, not the low mode bits.
            Entry::CharDevice(e) => {
                return write!(f, " ({}, {})", e.header.rdevmajor, e.header.rdevminor);
            }
            Entry::Directory(_) => {}
        }
        if header.nlink > 1 {
            write!(f, " nlink={}", header.nlink)?;
        }
        write!(f, " {} {} {}", header.permissions(), header.uid, header.gid)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
