//! Sans-IO parsing primitives for CPIO headers.
//!
//! These functions work on byte slices without any I/O traits. All of them
//! return `(value, bytes_consumed)` on success, letting the caller manage
//! buffer positions; the reader threads an absolute offset through them so
//! alignment is always measured from the start of the archive.

use crate::error::{Error, Result};
use crate::header::{Header, Magic};

pub type ParseResult<T> = Result<(T, usize)>;

/// Bytes of padding needed after `offset` to reach the next `align` boundary.
#[inline]
pub fn pad_len(offset: usize, align: usize) -> usize {
    if align <= 1 {
        return 0;
    }
    (align - offset % align) % align
}

fn field(data: &[u8], pos: &mut usize, width: usize, name: &'static str) -> Result<u64> {
    let end = *pos + width;
    let raw = data
        .get(*pos..end)
        .ok_or_else(|| Error::format(format!("truncated header in field {:?}", name)))?;
    *pos = end;

    let text = std::str::from_utf8(raw)
        .map_err(|_| Error::format(format!("non-ASCII data in field {:?}", name)))?;

    let radix = if width == 8 { 16 } else { 8 };
    u64::from_str_radix(text, radix)
        .map_err(|_| Error::format(format!("invalid digits in field {:?}: {}", name, text)))
}

/// Decode one fixed-width header at the start of `data`.
///
/// The name and payload follow the header on the wire but are length-prefixed
/// by it, so the caller reads them separately with [`parse_name`]. Returns
/// the header, its `namesize` field and the bytes consumed.
pub fn parse_header(data: &[u8]) -> ParseResult<(Header, u32)> {
    let magic_bytes = data
        .get(..6)
        .ok_or_else(|| Error::format("truncated header: no room for magic".to_string()))?;
    let magic = Magic::from_bytes(magic_bytes)?;

    let mut pos = 6;
    let (header, namesize) = match magic {
        Magic::Newc => parse_newc_fields(data, &mut pos)?,
        Magic::Odc => parse_odc_fields(data, &mut pos)?,
    };

    debug_assert_eq!(pos, magic.header_len());
    tracing::debug!(
        %magic,
        ino = header.ino,
        mode = format_args!("{:o}", header.mode),
        namesize,
        filesize = header.filesize,
        "parsed header"
    );

    Ok(((header, namesize), pos))
}

/// The thirteen 8-hex-char fields of the "new ASCII" structure, in wire
/// order: ino, mode, uid, gid, nlink, mtime, filesize, devmajor, devminor,
/// rdevmajor, rdevminor, namesize, check.
fn parse_newc_fields(data: &[u8], pos: &mut usize) -> Result<(Header, u32)> {
    let ino = field(data, pos, 8, "ino")?;
    let mode = field(data, pos, 8, "mode")? as u32;
    let uid = field(data, pos, 8, "uid")? as u32;
    let gid = field(data, pos, 8, "gid")? as u32;
    let nlink = field(data, pos, 8, "nlink")? as u32;
    let mtime = field(data, pos, 8, "mtime")?;
    let filesize = field(data, pos, 8, "filesize")?;
    let devmajor = field(data, pos, 8, "devmajor")? as u32;
    let devminor = field(data, pos, 8, "devminor")? as u32;
    let rdevmajor = field(data, pos, 8, "rdevmajor")? as u32;
    let rdevminor = field(data, pos, 8, "rdevminor")? as u32;
    let namesize = field(data, pos, 8, "namesize")? as u32;
    let check = field(data, pos, 8, "check")?;

    if check != 0 {
        return Err(Error::format(format!("nonzero check field: {:x}", check)));
    }

    let mut header = Header::new(String::new(), crate::mode::EntryKind::None);
    header.magic = Magic::Newc;
    header.ino = Header::clamp_ino(ino);
    header.mode = mode;
    header.uid = uid;
    header.gid = gid;
    header.nlink = nlink;
    header.mtime = mtime;
    header.filesize = filesize;
    header.devmajor = devmajor;
    header.devminor = devminor;
    header.rdevmajor = rdevmajor;
    header.rdevminor = rdevminor;

    // Reject modes with type bits the format does not define.
    header.kind()?;

    Ok((header, namesize))
}

/// The "old ASCII" structure: octal fields, combined dev/rdev numbers,
/// 11-char mtime and filesize. Read-only.
fn parse_odc_fields(data: &[u8], pos: &mut usize) -> Result<(Header, u32)> {
    let dev = field(data, pos, 6, "dev")?;
    let ino = field(data, pos, 6, "ino")?;
    let mode = field(data, pos, 6, "mode")? as u32;
    let uid = field(data, pos, 6, "uid")? as u32;
    let gid = field(data, pos, 6, "gid")? as u32;
    let nlink = field(data, pos, 6, "nlink")? as u32;
    let rdev = field(data, pos, 6, "rdev")?;
    let mtime = field(data, pos, 11, "mtime")?;
    let namesize = field(data, pos, 6, "namesize")? as u32;
    let filesize = field(data, pos, 11, "filesize")?;

    let mut header = Header::new(String::new(), crate::mode::EntryKind::None);
    header.magic = Magic::Odc;
    header.ino = Header::clamp_ino(ino);
    header.mode = mode;
    header.uid = uid;
    header.gid = gid;
    header.nlink = nlink;
    header.mtime = mtime;
    header.filesize = filesize;
    header.devmajor = (dev >> 8) as u32;
    header.devminor = (dev & 0xff) as u32;
    header.rdevmajor = (rdev >> 8) as u32;
    header.rdevminor = (rdev & 0xff) as u32;

    header.kind()?;

    Ok((header, namesize))
}

/// Decode the NUL-terminated name that follows a header. `namesize` counts
/// the terminator. An empty name is invalid.
pub fn parse_name(data: &[u8], namesize: u32) -> ParseResult<String> {
    let namesize = namesize as usize;
    let raw = data
        .get(..namesize)
        .ok_or_else(|| Error::format("truncated name".to_string()))?;

    let stripped = match raw.split_last() {
        Some((0, rest)) => rest,
        // Tolerate a missing terminator; some producers fill the whole field.
        _ => raw,
    };
    let stripped = match stripped.iter().position(|&b| b == 0) {
        Some(end) => &stripped[..end],
        None => stripped,
    };

    if stripped.is_empty() {
        return Err(Error::format("empty entry name".to_string()));
    }

    let name = std::str::from_utf8(stripped)
        .map_err(|_| Error::format("entry name is not valid UTF-8".to_string()))?
        .to_string();

    Ok((name, namesize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::EntryKind;

    // Known-good newc header: ino 1, mode 0o100755, uid/gid 1000, nlink 1,
    // mtime 1, filesize 255, devminor 35, namesize 2.
    const NEWC_VECTOR: &[u8] = b"070701\
        00000001\
        000081ED\
        000003E8\
        000003E8\
        00000001\
        00000001\
        000000FF\
        00000000\
        00000023\
        00000000\
        00000000\
        00000002\
        00000000";

    #[test]
    fn newc_vector_decodes() {
        let ((header, namesize), consumed) = parse_header(NEWC_VECTOR).unwrap();
        assert_eq!(consumed, 110);
        assert_eq!(header.magic, Magic::Newc);
        assert_eq!(header.ino, 1);
        assert_eq!(header.mode, 0x81ED);
        assert_eq!(header.kind().unwrap(), EntryKind::File);
        assert_eq!(header.uid, 1000);
        assert_eq!(header.gid, 1000);
        assert_eq!(header.nlink, 1);
        assert_eq!(header.mtime, 1);
        assert_eq!(header.filesize, 255);
        assert_eq!(header.devminor, 35);
        assert_eq!(namesize, 2);
    }

    #[test]
    fn nonzero_check_field_fails() {
        let mut bad = NEWC_VECTOR.to_vec();
        let len = bad.len();
        bad[len - 1] = b'1';
        assert!(matches!(parse_header(&bad), Err(Error::Format(_))));
    }

    #[test]
    fn truncated_header_fails() {
        assert!(matches!(parse_header(&NEWC_VECTOR[..60]), Err(Error::Format(_))));
    }

    #[test]
    fn non_hex_digits_fail() {
        let mut bad = NEWC_VECTOR.to_vec();
        bad[8] = b'g';
        assert!(matches!(parse_header(&bad), Err(Error::Format(_))));
    }

    #[test]
    fn odc_octal_fields_decode() {
        // dev 0, ino 1234, mode 100644, uid/gid 0, nlink 1, rdev 0,
        // mtime 11104531530, namesize 5, filesize 12.
        let raw = b"070707\
            000000\
            001234\
            100644\
            000000\
            000000\
            000001\
            000000\
            11104531530\
            000005\
            00000000012";
        let ((header, namesize), consumed) = parse_header(raw).unwrap();
        assert_eq!(consumed, 76);
        assert_eq!(header.magic, Magic::Odc);
        assert_eq!(header.ino, 0o1234);
        assert_eq!(header.mode, 0o100644);
        assert_eq!(header.mtime, 0o11104531530);
        assert_eq!(header.filesize, 10);
        assert_eq!(namesize, 5);
    }

    #[test]
    fn name_terminator_stripped() {
        let (name, consumed) = parse_name(b"bin/sh\0", 7).unwrap();
        assert_eq!(name, "bin/sh");
        assert_eq!(consumed, 7);
    }

    #[test]
    fn empty_name_fails() {
        assert!(matches!(parse_name(b"\0", 1), Err(Error::Format(_))));
    }

    #[test]
    fn padding_math() {
        assert_eq!(pad_len(0, 4), 0);
        assert_eq!(pad_len(110, 4), 2);
        assert_eq!(pad_len(111, 4), 1);
        assert_eq!(pad_len(112, 4), 0);
        assert_eq!(pad_len(76, 1), 0);
    }
}
