//! Mode-field masks: the entry kind lives in the high bits, the permission
//! and setuid/setgid/sticky bits in the low 12.

use std::fmt;

use crate::error::{Error, Result};

/// Mask selecting the entry-kind bits of a mode field.
pub const MODE_TYPE_MASK: u32 = 0o170000;
/// Mask selecting permission, setuid, setgid and sticky bits.
pub const MODE_PERM_MASK: u32 = 0o7777;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Sentinel kind of the trailer record (mode field zero).
    None,
    File,
    Directory,
    Symlink,
    CharDevice,
    BlockDevice,
    Fifo,
    Socket,
}

impl EntryKind {
    pub const fn type_bits(self) -> u32 {
        use EntryKind::*;

        match self {
            None => 0,
            File => 0o100000,
            Directory => 0o040000,
            Symlink => 0o120000,
            CharDevice => 0o020000,
            BlockDevice => 0o060000,
            Fifo => 0o010000,
            Socket => 0o140000,
        }
    }

    pub fn from_mode(mode: u32) -> Result<EntryKind> {
        use EntryKind::*;

        if mode == 0 {
            return Ok(None);
        }

        match mode & MODE_TYPE_MASK {
            0o100000 => Ok(File),
            0o040000 => Ok(Directory),
            0o120000 => Ok(Symlink),
            0o020000 => Ok(CharDevice),
            0o060000 => Ok(BlockDevice),
            0o010000 => Ok(Fifo),
            0o140000 => Ok(Socket),
            bits => Err(Error::format(format!("invalid mode type bits: {:o}", bits))),
        }
    }

    /// Kinds the archive can hold as entries. Block devices, FIFOs and
    /// sockets decode but cannot be archived.
    pub const fn is_archivable(self) -> bool {
        use EntryKind::*;

        matches!(self, File | Directory | Symlink | CharDevice)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use EntryKind::*;

        let s = match self {
            None => "none",
            File => "file",
            Directory => "directory",
            Symlink => "symlink",
            CharDevice => "character device",
            BlockDevice => "block device",
            Fifo => "fifo",
            Socket => "socket",
        };

        write!(f, "{}", s)
    }
}

/// The low 12 mode bits, decoded as a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions(u16);

impl Permissions {
    pub const SUID: u16 = 0o4000;
    pub const SGID: u16 = 0o2000;
    pub const STICKY: u16 = 0o1000;

    pub fn from_mode(mode: u32) -> Permissions {
        Permissions((mode & MODE_PERM_MASK) as u16)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, bits: u16) -> bool {
        self.0 & bits == bits
    }
}

impl fmt::Display for Permissions {
    /// ls-style rendering: `rwsr-xr-t` and friends.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        let triad = |f: &mut fmt::Formatter<'_>, shift: u16, special: u16, low: char, cap: char| {
            let r = if b >> shift & 0o4 != 0 { 'r' } else { '-' };
            let w = if b >> shift & 0o2 != 0 { 'w' } else { '-' };
            let x = match (b >> shift & 0o1 != 0, b & special != 0) {
                (true, true) => low,
                (false, true) => cap,
                (true, false) => 'x',
                (false, false) => '-',
            };
            write!(f, "{}{}{}", r, w, x)
        };

        triad(f, 6, Self::SUID, 's', 'S')?;
        triad(f, 3, Self::SGID, 's', 'S')?;
        triad(f, 0, Self::STICKY, 't', 'T')
    }
}
