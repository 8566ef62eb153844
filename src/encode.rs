//! Sans-IO encoding primitives for CPIO records.
//!
//! Only the "new ASCII" structure is emitted; odc input is re-serialized as
//! newc. Every function appends to a caller-owned buffer, and padding is
//! computed from the block length, so a record that begins on a 4-byte
//! boundary also ends on one.

use crate::error::{Error, Result};
use crate::header::{Header, MAGIC_NEWC};
use crate::parse::pad_len;

/// Name of the sentinel record that terminates every archive.
pub const TRAILER_NAME: &str = "TRAILER!!!";

const ALIGN: usize = 4;

#[inline]
fn push_hex(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(format!("{:08X}", value).as_bytes());
}

fn hex_u64(value: u64, name: &'static str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::format(format!("{} {} does not fit in 8 hex chars", name, value)))
}

/// Append the 110-byte header, the NUL-terminated name and alignment
/// padding. `filesize` is taken from the header; the caller guarantees it
/// matches the payload it will write next.
pub fn encode_header(buf: &mut Vec<u8>, header: &Header) -> Result<()> {
    let start = buf.len();

    buf.extend_from_slice(MAGIC_NEWC);
    push_hex(buf, header.ino);
    push_hex(buf, header.mode);
    push_hex(buf, header.uid);
    push_hex(buf, header.gid);
    push_hex(buf, header.nlink);
    push_hex(buf, hex_u64(header.mtime, "mtime")?);
    push_hex(buf, hex_u64(header.filesize, "filesize")?);
    push_hex(buf, header.devmajor);
    push_hex(buf, header.devminor);
    push_hex(buf, header.rdevmajor);
    push_hex(buf, header.rdevminor);
    push_hex(buf, header.namesize());
    push_hex(buf, 0); // check

    buf.extend_from_slice(header.name().as_bytes());
    buf.push(0);

    let block = buf.len() - start;
    buf.resize(buf.len() + pad_len(block, ALIGN), 0);

    tracing::debug!(
        name = header.name(),
        bytes = buf.len() - start,
        "encoded header block"
    );
    Ok(())
}

/// Append a payload block plus alignment padding.
pub fn encode_payload(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend_from_slice(data);
    buf.resize(buf.len() + pad_len(data.len(), ALIGN), 0);
}

/// Append the trailer record: name `TRAILER!!!`, every numeric field zero.
pub fn encode_trailer(buf: &mut Vec<u8>) {
    let mut header = Header::new(TRAILER_NAME, crate::mode::EntryKind::None);
    header.nlink = 0;
    // A zeroed header always fits the fixed widths.
    encode_header(buf, &header).expect("trailer header encodes");
}
