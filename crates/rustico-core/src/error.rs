use std::fmt;

use crate::cartridge::header::NES_HEADER_LEN;
use crate::cartridge::header::RomFormat;

/// Everything that can go wrong loading a cartridge image or a palette file.
#[derive(Debug)]
pub enum Error {
    /// Fewer bytes than [`NES_HEADER_LEN`] were supplied.
    TooShort { actual: usize },
    /// The leading `NES<EOF>` magic is missing or corrupted.
    InvalidMagic,
    /// The header describes a container format this crate has no parser for.
    UnsupportedFormat(RomFormat),
    /// A ROM section (trainer/PRG/CHR/...) is shorter than the header claims.
    SectionTooShort {
        section: &'static str,
        expected: usize,
        actual: usize,
    },
    /// The header names a mapper with no implementation in this crate.
    UnsupportedMapper(u16),
    /// A palette file isn't one of the two sizes this crate understands.
    InvalidPaletteSize { actual: usize },
    /// Propagated from the filesystem when loading a ROM/palette from disk.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { actual } => {
                write!(f, "header expected {NES_HEADER_LEN} bytes, got {actual}")
            }
            Self::InvalidMagic => write!(f, "missing NES magic bytes"),
            Self::UnsupportedFormat(format) => {
                write!(f, "unsupported iNES header format: {format:?}")
            }
            Self::SectionTooShort {
                section,
                expected,
                actual,
            } => write!(
                f,
                "{section} section expected {expected} bytes, got {actual}"
            ),
            Self::UnsupportedMapper(mapper) => {
                write!(f, "mapper {mapper} is not implemented")
            }
            Self::InvalidPaletteSize { actual } => {
                write!(f, "palette blobs must be 192 or 256 bytes (got {actual})")
            }
            Self::Io(err) => write!(f, "i/o error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
