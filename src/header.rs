use std::fmt;

use crate::error::{Error, Result};
use crate::mode::{EntryKind, Permissions, MODE_PERM_MASK, MODE_TYPE_MASK};

/// Format discriminator, selected by the 6-byte magic that opens each record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Magic {
    /// "new ASCII" (`070701`): 13 fields of 8 hex chars, 4-byte alignment.
    #[default]
    Newc,
    /// "old ASCII" (`070707`): octal fields, 76-byte header, no alignment.
    /// Accepted on read only.
    Odc,
}

pub(crate) const MAGIC_NEWC: &[u8; 6] = b"070701";
pub(crate) const MAGIC_ODC: &[u8; 6] = b"070707";

impl Magic {
    pub fn from_bytes(bytes: &[u8]) -> Result<Magic> {
        match bytes {
            b if b == MAGIC_NEWC => Ok(Magic::Newc),
            b if b == MAGIC_ODC => Ok(Magic::Odc),
            b => Err(Error::format(format!("unknown magic: {:?}", b))),
        }
    }

    /// Total header length including the magic, excluding the name.
    pub(crate) const fn header_len(self) -> usize {
        match self {
            Magic::Newc => 110,
            Magic::Odc => 76,
        }
    }

    /// Block alignment. Odc packs records without padding.
    pub(crate) const fn alignment(self) -> usize {
        match self {
            Magic::Newc => 4,
            Magic::Odc => 1,
        }
    }
}

impl fmt::Display for Magic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Magic::Newc => write!(f, "newc"),
            Magic::Odc => write!(f, "odc"),
        }
    }
}

/// Decoded header of one archive record.
///
/// Fields are held as numbers; the fixed-width ASCII encoding is the concern
/// of [`parse`](crate::parse) and [`encode`](crate::encode). `namesize` and
/// the `check` field are derived at encoding time and never stored, so they
/// cannot drift out of sync with the name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub magic: Magic,
    pub ino: u32,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u32,
    pub mtime: u64,
    pub filesize: u64,
    pub devmajor: u32,
    pub devminor: u32,
    pub rdevmajor: u32,
    pub rdevminor: u32,
    name: String,
}

impl Header {
    /// A fresh header for the given kind, all other fields zeroed and
    /// `nlink` one. Sibling counts are maintained by the archive engine.
    pub fn new(name: impl Into<String>, kind: EntryKind) -> Header {
        Header {
            magic: Magic::Newc,
            ino: 0,
            mode: kind.type_bits(),
            uid: 0,
            gid: 0,
            nlink: 1,
            mtime: 0,
            filesize: 0,
            devmajor: 0,
            devminor: 0,
            rdevmajor: 0,
            rdevminor: 0,
            name: name.into(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Length of the name on the wire, including the NUL terminator.
    #[inline]
    pub fn namesize(&self) -> u32 {
        self.name.len() as u32 + 1
    }

    pub fn kind(&self) -> Result<EntryKind> {
        EntryKind::from_mode(self.mode)
    }

    pub fn permissions(&self) -> Permissions {
        Permissions::from_mode(self.mode)
    }

    /// Replace the permission bits, preserving the kind bits.
    pub fn set_permissions(&mut self, bits: u32) {
        self.mode = (self.mode & MODE_TYPE_MASK) | (bits & MODE_PERM_MASK);
    }

    /// Clamp an inode number into the 32-bit wire range. Oversized host
    /// inodes become 0 and are reassigned on insertion.
    pub(crate) fn clamp_ino(ino: u64) -> u32 {
        u32::try_from(ino).unwrap_or_else(|_| {
            tracing::warn!(ino, "inode exceeds 32 bits, resetting to 0");
            0
        })
    }

    /// Apply an overrides map. Every present field wins over the computed
    /// value, except `mode`, which only replaces the low 12 bits.
    pub fn apply_overrides(&mut self, overrides: &Overrides) -> Result<()> {
        if let Some(ino) = overrides.ino {
            self.ino = ino;
        }
        if let Some(mode) = overrides.mode {
            self.set_permissions(mode);
        }
        if let Some(uid) = &overrides.uid {
            self.uid = uid.resolve_user()?;
        }
        if let Some(gid) = &overrides.gid {
            self.gid = gid.resolve_group()?;
        }
        if let Some(mtime) = overrides.mtime {
            self.mtime = mtime;
        }
        if let Some(devmajor) = overrides.devmajor {
            self.devmajor = devmajor;
        }
        if let Some(devminor) = overrides.devminor {
            self.devminor = devminor;
        }
        if let Some(rdevmajor) = overrides.rdevmajor {
            self.rdevmajor = rdevmajor;
        }
        if let Some(rdevminor) = overrides.rdevminor {
            self.rdevminor = rdevminor;
        }
        Ok(())
    }
}

/// A numeric id or a symbolic name resolved against the host identity
/// database when the header is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ident {
    Id(u32),
    Name(String),
}

impl Ident {
    fn resolve_user(&self) -> Result<u32> {
        match self {
            Ident::Id(id) => Ok(*id),
            Ident::Name(name) => crate::fs::resolve_user(name),
        }
    }

    fn resolve_group(&self) -> Result<u32> {
        match self {
            Ident::Id(id) => Ok(*id),
            Ident::Name(name) => crate::fs::resolve_group(name),
        }
    }
}

impl From<u32> for Ident {
    fn from(id: u32) -> Ident {
        Ident::Id(id)
    }
}

impl From<&str> for Ident {
    fn from(name: &str) -> Ident {
        Ident::Name(name.to_string())
    }
}

/// Caller-supplied header fields that take precedence over values computed
/// from the filesystem. An archive applies its overrides uniformly to every
/// entry it builds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub ino: Option<u32>,
    /// Masked to the low 12 bits; the kind bits always come from the entry.
    pub mode: Option<u32>,
    pub uid: Option<Ident>,
    pub gid: Option<Ident>,
    pub mtime: Option<u64>,
    pub devmajor: Option<u32>,
    pub devminor: Option<u32>,
    pub rdevmajor: Option<u32>,
    pub rdevminor: Option<u32>,
}

impl Overrides {
    pub fn is_empty(&self) -> bool {
        *self == Overrides::default()
    }
}
