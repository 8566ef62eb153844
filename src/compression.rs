use std::fmt;
use std::io::Cursor;

#[cfg(feature = "xz")]
use comde::xz::{XzCompressor, XzDecompressor};
#[cfg(feature = "zstd")]
use comde::zstd::{ZstdCompressor, ZstdDecompressor};
use comde::{Compressor, Decompressor};

use crate::error::{Error, Result};

/// Whole-archive byte transform, selected by name. The serialized stream is
/// compressed as one unit after the trailer is appended; individual entries
/// are never compressed.
#[derive(Clone, Copy, Eq, PartialEq, Default)]
pub enum Compression {
    #[default]
    Stored,
    Zstd,
    Xz,
}

impl Compression {
    pub const fn available_variants() -> &'static [&'static str] {
        &["stored", "xz", "zstd"]
    }

    /// Look a transform up by name. Unknown or compiled-out names fail
    /// before any bytes are produced.
    pub fn from_name(name: &str) -> Result<Compression> {
        match name {
            "stored" | "none" => Ok(Compression::Stored),
            #[cfg(feature = "zstd")]
            "zstd" => Ok(Compression::Zstd),
            #[cfg(feature = "xz")]
            "xz" => Ok(Compression::Xz),
            other => Err(Error::UnsupportedCompression(other.to_string())),
        }
    }

    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>> {
        use Compression::*;

        let mut out = Cursor::new(Vec::with_capacity(data.len() / 2 + 64));
        match self {
            Stored => return Ok(data.to_vec()),
            #[cfg(feature = "zstd")]
            Zstd => ZstdCompressor.compress(&mut out, &mut &data[..])?,
            #[cfg(feature = "xz")]
            Xz => XzCompressor.compress(&mut out, &mut &data[..])?,
            #[allow(unreachable_patterns)]
            missing => return Err(Error::UnsupportedCompression(missing.to_string())),
        };
        Ok(out.into_inner())
    }

    pub fn decompress(self, data: &[u8]) -> Result<Vec<u8>> {
        use Compression::*;

        let mut out = Vec::new();
        match self {
            Stored => return Ok(data.to_vec()),
            #[cfg(feature = "zstd")]
            Zstd => ZstdDecompressor.copy(&data[..], &mut out)?,
            #[cfg(feature = "xz")]
            Xz => XzDecompressor.copy(&data[..], &mut out)?,
            #[allow(unreachable_patterns)]
            missing => return Err(Error::UnsupportedCompression(missing.to_string())),
        };
        Ok(out)
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Compression::*;

        let s = match self {
            Stored => "stored",
            Zstd => "zstd",
            Xz => "xz",
        };

        write!(f, "{}", s)
    }
}

impl fmt::Debug for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_name_is_fatal() {
        assert!(matches!(
            Compression::from_name("lzip"),
            Err(Error::UnsupportedCompression(_))
        ));
    }

    #[test]
    fn stored_is_identity() {
        let data = b"070701 not really".to_vec();
        let out = Compression::Stored.compress(&data).unwrap();
        assert_eq!(out, data);
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn zstd_roundtrip() {
        let data = vec![0x42u8; 4096];
        let packed = Compression::Zstd.compress(&data).unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(Compression::Zstd.decompress(&packed).unwrap(), data);
    }

    #[cfg(feature = "xz")]
    #[test]
    fn xz_roundtrip() {
        let data = b"repetitive repetitive repetitive data".repeat(64);
        let packed = Compression::Xz.compress(&data).unwrap();
        assert_eq!(Compression::Xz.decompress(&packed).unwrap(), data);
    }
}
