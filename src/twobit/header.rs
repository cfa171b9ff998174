//! Header module for twoBit files
//!
//! The header is a fixed 16-byte block at the start of every twoBit file. Its
//! magic number also determines the byte order of every other integer in the file.

use std::io::{Read, Write};

use byteorder::{ByteOrder, LittleEndian};

use crate::endian::Endian;
use crate::error::{FormatError, Result};

/// Magic number identifying twoBit files (either byte order)
#[allow(clippy::unreadable_literal)]
pub const MAGIC: u32 = 0x1A412743;

/// The only supported format version
pub const VERSION: u32 = 0;

/// Size of the header in bytes
pub const SIZE_HEADER: usize = 16;

/// Longest sequence name the one-byte length prefix can describe
pub const MAX_NAME_LEN: usize = 255;

/// Header structure for twoBit files
///
/// The header is 16 bytes on disk:
/// - Bytes 0-3: magic number (byte order detecting)
/// - Bytes 4-7: version (must be 0)
/// - Bytes 8-11: number of sequences
/// - Bytes 12-15: reserved (must be 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwoBitHeader {
    /// Byte order detected from the magic number
    pub endian: Endian,

    /// Version of the file format
    pub version: u32,

    /// Number of sequences in the file
    pub sequence_count: u32,

    /// Reserved field, always zero
    pub reserved: u32,
}
impl TwoBitHeader {
    /// Creates a header for a file holding `sequence_count` sequences
    #[must_use]
    pub fn new(sequence_count: u32, endian: Endian) -> Self {
        Self {
            endian,
            version: VERSION,
            sequence_count,
            reserved: 0,
        }
    }

    /// Whether the file's integers are in the opposite order to the host
    #[must_use]
    pub fn is_byte_swapped(&self) -> bool {
        self.endian.is_swapped()
    }

    /// Parses a header from a fixed-size byte array
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The magic number matches in neither byte order
    /// * The version is not 0
    /// * The reserved field is not 0
    pub fn from_bytes(buffer: &[u8; SIZE_HEADER]) -> Result<Self> {
        let Some(endian) = Endian::detect(&buffer[0..4], MAGIC) else {
            return Err(FormatError::InvalidMagicNumber(LittleEndian::read_u32(&buffer[0..4])).into());
        };
        let version = endian.read_u32(&buffer[4..8]);
        if version != VERSION {
            return Err(FormatError::InvalidFormatVersion(version).into());
        }
        let sequence_count = endian.read_u32(&buffer[8..12]);
        let reserved = endian.read_u32(&buffer[12..16]);
        if reserved != 0 {
            return Err(FormatError::InvalidReservedField(reserved).into());
        }
        Ok(Self {
            endian,
            version,
            sequence_count,
            reserved,
        })
    }

    /// Reads exactly `SIZE_HEADER` bytes from a reader and parses them
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buffer = [0u8; SIZE_HEADER];
        reader.read_exact(&mut buffer)?;
        Self::from_bytes(&buffer)
    }

    /// Serializes the header in its own byte order
    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut buffer = [0u8; SIZE_HEADER];
        self.endian.write_u32(&mut buffer[0..4], MAGIC);
        self.endian.write_u32(&mut buffer[4..8], self.version);
        self.endian.write_u32(&mut buffer[8..12], self.sequence_count);
        self.endian.write_u32(&mut buffer[12..16], self.reserved);
        writer.write_all(&buffer)?;
        Ok(())
    }
}
