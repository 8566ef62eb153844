use std::path::Path;

use crate::archive::Archive;
use crate::encode::TRAILER_NAME;
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::header::Magic;
use crate::parse;

/// Single-pass decoder over a fully buffered archive.
///
/// The first record's magic fixes the structure for the whole archive; a
/// later record with a different magic is corruption. Reaching the end of
/// the buffer without seeing the trailer is downgraded to a warning and the
/// entries read so far are kept.
pub struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
    magic: Option<Magic>,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Reader<'a> {
        Reader {
            data,
            offset: 0,
            magic: None,
        }
    }

    /// Decode every record into a fresh archive.
    pub fn read(mut self) -> Result<Archive> {
        let mut archive = Archive::new();
        let mut saw_trailer = false;

        while self.offset < self.data.len() {
            match self.read_record()? {
                Some(entry) => archive.insert(entry)?,
                None => {
                    saw_trailer = true;
                    break;
                }
            }
        }

        if let Some(magic) = self.magic {
            archive.set_magic(magic);
        }
        if !saw_trailer {
            tracing::warn!(
                entries = archive.len(),
                "archive ended without a trailer record, result may be partial"
            );
        } else {
            tracing::debug!(entries = archive.len(), offset = self.offset, "archive read");
        }
        Ok(archive)
    }

    /// Decode one record. `None` is the trailer.
    fn read_record(&mut self) -> Result<Option<Entry>> {
        let ((mut header, namesize), consumed) = parse::parse_header(&self.data[self.offset..])?;

        let magic = match self.magic {
            Some(magic) if magic != header.magic => {
                return Err(Error::format(format!(
                    "record at offset {} has magic {} in a {} archive",
                    self.offset, header.magic, magic
                )));
            }
            Some(magic) => magic,
            None => {
                self.magic = Some(header.magic);
                header.magic
            }
        };
        self.offset += consumed;

        let (name, consumed) = parse::parse_name(&self.data[self.offset..], namesize)?;
        self.offset += consumed;
        self.offset += parse::pad_len(self.offset, magic.alignment());

        if name == TRAILER_NAME && header.mode == 0 {
            return Ok(None);
        }
        header.set_name(name);

        let filesize = header.filesize as usize;
        let payload = self
            .data
            .get(self.offset..self.offset + filesize)
            .ok_or_else(|| {
                Error::format(format!(
                    "truncated payload for {:?}: need {} bytes at offset {}",
                    header.name(),
                    filesize,
                    self.offset
                ))
            })?
            .to_vec();
        self.offset += filesize;
        self.offset += parse::pad_len(self.offset, magic.alignment());

        Entry::from_wire(header, payload).map(Some)
    }
}

impl Archive {
    /// Parse an archive from a byte buffer.
    pub fn from_bytes(data: &[u8]) -> Result<Archive> {
        Reader::new(data).read()
    }

    /// Read and parse an archive file, fully buffered.
    pub fn from_path(path: &Path) -> Result<Archive> {
        let data = std::fs::read(path)?;
        tracing::info!(path = %path.display(), bytes = data.len(), "reading archive");
        Archive::from_bytes(&data)
    }
}
