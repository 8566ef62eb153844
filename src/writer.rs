use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::archive::Archive;
use crate::compression::Compression;
use crate::encode;
use crate::entry::Entry;
use crate::error::{Error, Result};

/// Serializes an archive to the newc wire format, with optional
/// whole-stream compression. The compression name is resolved up front so a
/// bad name fails before any bytes exist.
pub struct Writer<'a> {
    archive: &'a Archive,
    compression: Compression,
}

impl<'a> Writer<'a> {
    pub fn new(archive: &'a Archive) -> Writer<'a> {
        Writer {
            archive,
            compression: Compression::Stored,
        }
    }

    pub fn with_compression(archive: &'a Archive, name: &str) -> Result<Writer<'a>> {
        Ok(Writer {
            archive,
            compression: Compression::from_name(name)?,
        })
    }

    /// Serialize every entry in insertion order, append the trailer and
    /// apply the configured compression.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        self.check_links()?;

        let mut buf = Vec::new();
        for entry in self.archive.iter() {
            let mut header = entry.header().clone();
            if self.archive.is_reproducible() {
                header.mtime = 0;
            }
            encode::encode_header(&mut buf, &header)?;
            encode::encode_payload(&mut buf, entry.payload());
        }
        encode::encode_trailer(&mut buf);

        tracing::info!(
            entries = self.archive.len(),
            bytes = buf.len(),
            compression = %self.compression,
            "serialized archive"
        );
        self.compression.compress(&buf)
    }

    /// Serialize to a file and make it durable: write, flush, fsync.
    pub fn write_path(&self, path: &Path) -> Result<()> {
        let data = self.to_vec()?;
        let mut file = File::create(path)?;
        file.write_all(&data)?;
        file.flush()?;
        file.sync_all()?;
        tracing::info!(path = %path.display(), bytes = data.len(), "wrote archive");
        Ok(())
    }

    /// The archive indices guarantee these invariants; re-check them before
    /// committing bytes so a corrupted archive never serializes quietly.
    fn check_links(&self) -> Result<()> {
        let mut groups: HashMap<u32, Vec<&Entry>> = HashMap::new();
        for entry in self.archive.iter() {
            groups.entry(entry.header().ino).or_default().push(entry);
        }

        for (ino, group) in &groups {
            let holders = group.iter().filter(|e| {
                e.as_file().is_some() && !e.payload().is_empty()
            });
            if group.len() > 1 && holders.clone().count() > 1 {
                return Err(Error::format(format!(
                    "inode {} has multiple payload copies",
                    ino
                )));
            }
            if group.len() > 1 && group.iter().any(|e| e.as_file().is_none()) {
                return Err(Error::format(format!(
                    "inode {} is shared by non-file entries",
                    ino
                )));
            }
            for entry in group {
                if entry.header().nlink as usize != group.len() {
                    return Err(Error::format(format!(
                        "entry {:?} has nlink {} but inode {} has {} names",
                        entry.name(),
                        entry.header().nlink,
                        ino,
                        group.len()
                    )));
                }
                if entry.header().filesize != entry.payload().len() as u64 {
                    return Err(Error::format(format!(
                        "entry {:?} filesize {} does not match payload length {}",
                        entry.name(),
                        entry.header().filesize,
                        entry.payload().len()
                    )));
                }
            }
        }
        Ok(())
    }
}
