use std::io;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by the codec, the archive engine and the reader/writer.
#[derive(Debug, Error)]
pub enum Error {
    /// The byte stream violates the CPIO wire layout: bad magic, nonzero
    /// check field, non-hex digits, truncation, an empty name or an entry
    /// kind the format does not carry.
    #[error("invalid archive data: {0}")]
    Format(String),

    #[error("entry already exists: {0}")]
    DuplicateName(String),

    #[error("entry does not exist: {0}")]
    NotFound(String),

    #[error("no unused 32-bit inode numbers remain")]
    InodeExhausted,

    /// Two entries with differing payloads produced the same content digest.
    /// Treated as corruption, never resolved silently.
    #[error("content hash collision between {existing:?} and {incoming:?}")]
    HashCollision { existing: String, incoming: String },

    #[error("unsupported compression: {0:?}")]
    UnsupportedCompression(String),

    #[error("unknown user: {0:?}")]
    UnknownUser(String),

    #[error("unknown group: {0:?}")]
    UnknownGroup(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn format(msg: impl Into<String>) -> Error {
        Error::Format(msg.into())
    }
}
