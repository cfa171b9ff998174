//! Byte order handling shared by every on-disk format in this crate
//!
//! All formats are self-describing: the first four bytes hold a magic number that
//! only reads back correctly in the byte order the file was written with. Every
//! multi-byte integer after the magic number is then decoded in that order.

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};

/// Byte order of the multi-byte integers in a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}
impl Default for Endian {
    fn default() -> Self {
        Self::native()
    }
}
impl Endian {
    /// The byte order of the host
    #[must_use]
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }

    /// Determines the byte order in which `bytes` decode to `magic`
    ///
    /// Returns `None` if the bytes match the magic number in neither order.
    #[must_use]
    pub fn detect(bytes: &[u8], magic: u32) -> Option<Self> {
        if LittleEndian::read_u32(bytes) == magic {
            Some(Self::Little)
        } else if BigEndian::read_u32(bytes) == magic {
            Some(Self::Big)
        } else {
            None
        }
    }

    /// Whether integers in this order must be swapped on the host
    #[must_use]
    pub fn is_swapped(self) -> bool {
        self != Self::native()
    }

    #[must_use]
    pub fn read_u16(self, buf: &[u8]) -> u16 {
        match self {
            Self::Little => LittleEndian::read_u16(buf),
            Self::Big => BigEndian::read_u16(buf),
        }
    }

    #[must_use]
    pub fn read_u32(self, buf: &[u8]) -> u32 {
        match self {
            Self::Little => LittleEndian::read_u32(buf),
            Self::Big => BigEndian::read_u32(buf),
        }
    }

    #[must_use]
    pub fn read_u64(self, buf: &[u8]) -> u64 {
        match self {
            Self::Little => LittleEndian::read_u64(buf),
            Self::Big => BigEndian::read_u64(buf),
        }
    }

    pub fn write_u16(self, buf: &mut [u8], value: u16) {
        match self {
            Self::Little => LittleEndian::write_u16(buf, value),
            Self::Big => BigEndian::write_u16(buf, value),
        }
    }

    pub fn write_u32(self, buf: &mut [u8], value: u32) {
        match self {
            Self::Little => LittleEndian::write_u32(buf, value),
            Self::Big => BigEndian::write_u32(buf, value),
        }
    }

    pub fn write_u64(self, buf: &mut [u8], value: u64) {
        match self {
            Self::Little => LittleEndian::write_u64(buf, value),
            Self::Big => BigEndian::write_u64(buf, value),
        }
    }

    /// Reads a single u32 from a reader
    pub fn read_u32_from<R: Read>(self, reader: &mut R) -> io::Result<u32> {
        match self {
            Self::Little => reader.read_u32::<LittleEndian>(),
            Self::Big => reader.read_u32::<BigEndian>(),
        }
    }

    /// Fills `dst` with consecutive u32 values from a reader
    pub fn read_u32_into<R: Read>(self, reader: &mut R, dst: &mut [u32]) -> io::Result<()> {
        match self {
            Self::Little => reader.read_u32_into::<LittleEndian>(dst),
            Self::Big => reader.read_u32_into::<BigEndian>(dst),
        }
    }

    pub fn write_u32_to<W: Write>(self, writer: &mut W, value: u32) -> io::Result<()> {
        match self {
            Self::Little => writer.write_u32::<LittleEndian>(value),
            Self::Big => writer.write_u32::<BigEndian>(value),
        }
    }

    pub fn write_u64_to<W: Write>(self, writer: &mut W, value: u64) -> io::Result<()> {
        match self {
            Self::Little => writer.write_u64::<LittleEndian>(value),
            Self::Big => writer.write_u64::<BigEndian>(value),
        }
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    const MAGIC: u32 = 0x1A41_2743;

    #[test]
    fn test_detect_both_orders() {
        assert_eq!(
            Endian::detect(&MAGIC.to_le_bytes(), MAGIC),
            Some(Endian::Little)
        );
        assert_eq!(Endian::detect(&MAGIC.to_be_bytes(), MAGIC), Some(Endian::Big));
        assert_eq!(Endian::detect(&[0, 1, 2, 3], MAGIC), None);
    }

    #[test]
    fn test_stream_and_slice_agree() -> std::io::Result<()> {
        for endian in [Endian::Little, Endian::Big] {
            let mut buf = Vec::new();
            endian.write_u32_to(&mut buf, 0xDEAD_BEEF)?;
            endian.write_u32_to(&mut buf, 7)?;
            assert_eq!(endian.read_u32(&buf[0..4]), 0xDEAD_BEEF);

            let mut values = [0u32; 2];
            endian.read_u32_into(&mut buf.as_slice(), &mut values)?;
            assert_eq!(values, [0xDEAD_BEEF, 7]);
        }
        Ok(())
    }

    #[test]
    fn test_swapped_is_relative_to_host() {
        assert!(!Endian::native().is_swapped());
        let other = match Endian::native() {
            Endian::Little => Endian::Big,
            Endian::Big => Endian::Little,
        };
        assert!(other.is_swapped());
    }
}
