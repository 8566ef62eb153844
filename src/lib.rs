mod archive;
mod compression;
mod entry;
mod error;
mod fs;
mod header;
mod mode;
mod reader;
mod writer;

pub mod encode;
pub mod parse;
pub mod path;

pub use archive::Archive;
pub use compression::Compression;
pub use encode::TRAILER_NAME;
pub use entry::{CharDeviceEntry, ContentHash, DirectoryEntry, Entry, FileEntry, SymlinkEntry};
pub use error::{Error, Result};
pub use fs::{resolve_group, resolve_user};
pub use header::{Header, Ident, Magic, Overrides};
pub use mode::{EntryKind, Permissions};
pub use reader::Reader;
pub use writer::Writer;
