//! Header module for B+-tree index files
//!
//! A B+-tree section starts with a fixed 32-byte header describing the fixed key
//! and value widths and the node fan-out, followed immediately by the root node.

use std::io::{Read, Write};

use byteorder::{ByteOrder, LittleEndian};

use crate::endian::Endian;
use crate::error::{FormatError, Result};

/// Magic number identifying a B+-tree section (either byte order)
#[allow(clippy::unreadable_literal)]
pub const BPT_MAGIC: u32 = 0x78CA8C91;

/// Size of the B+-tree header in bytes
pub const SIZE_BPT_HEADER: usize = 32;

/// Size of every node header (leaf flag, reserved byte, item count)
pub const SIZE_NODE_HEADER: usize = 4;

/// Largest fan-out expressible by the 16-bit node item count
pub const MAX_BLOCK_SIZE: u32 = u16::MAX as u32;

/// Longest key a tree may hold, matching the 255-byte sequence name limit
pub const MAX_KEY_SIZE: u32 = 255;

/// Widest value a tree may hold
pub const MAX_VAL_SIZE: u32 = 255;

/// Header of a B+-tree section
///
/// The header is 32 bytes on disk:
/// - Bytes 0-3: magic number
/// - Bytes 4-7: block size (maximum children per node)
/// - Bytes 8-11: key size in bytes
/// - Bytes 12-15: value size in bytes
/// - Bytes 16-23: number of items
/// - Bytes 24-31: reserved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BptHeader {
    /// Byte order detected from the magic number
    pub endian: Endian,

    /// Maximum number of items or children per node
    pub block_size: u32,

    /// Width of every (zero-padded) key
    pub key_size: u32,

    /// Width of every value
    pub val_size: u32,

    /// Number of leaf items in the tree
    pub item_count: u64,
}
impl BptHeader {
    #[must_use]
    pub fn new(endian: Endian, block_size: u32, key_size: u32, val_size: u32, item_count: u64) -> Self {
        Self {
            endian,
            block_size,
            key_size,
            val_size,
            item_count,
        }
    }

    /// Size of a leaf node padded to `block_size` slots
    #[must_use]
    pub fn leaf_node_size(&self) -> usize {
        SIZE_NODE_HEADER + self.block_size as usize * (self.key_size + self.val_size) as usize
    }

    /// Size of an internal node padded to `block_size` slots
    #[must_use]
    pub fn inner_node_size(&self) -> usize {
        SIZE_NODE_HEADER + self.block_size as usize * (self.key_size as usize + 8)
    }

    pub fn from_bytes(buffer: &[u8; SIZE_BPT_HEADER]) -> Result<Self> {
        let Some(endian) = Endian::detect(&buffer[0..4], BPT_MAGIC) else {
            return Err(FormatError::InvalidBptMagic(LittleEndian::read_u32(&buffer[0..4])).into());
        };
        let block_size = endian.read_u32(&buffer[4..8]);
        if !(2..=MAX_BLOCK_SIZE).contains(&block_size) {
            return Err(FormatError::InvalidBlockSize(block_size).into());
        }
        let key_size = endian.read_u32(&buffer[8..12]);
        if !(1..=MAX_KEY_SIZE).contains(&key_size) {
            return Err(FormatError::InvalidKeySize(key_size).into());
        }
        let val_size = endian.read_u32(&buffer[12..16]);
        if !(1..=MAX_VAL_SIZE).contains(&val_size) {
            return Err(FormatError::InvalidValueSize {
                expected: format!("1..={MAX_VAL_SIZE}"),
                got: val_size,
            }
            .into());
        }
        Ok(Self {
            endian,
            block_size,
            key_size,
            val_size,
            item_count: endian.read_u64(&buffer[16..24]),
        })
    }

    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buffer = [0u8; SIZE_BPT_HEADER];
        reader.read_exact(&mut buffer)?;
        Self::from_bytes(&buffer)
    }

    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut buffer = [0u8; SIZE_BPT_HEADER];
        self.endian.write_u32(&mut buffer[0..4], BPT_MAGIC);
        self.endian.write_u32(&mut buffer[4..8], self.block_size);
        self.endian.write_u32(&mut buffer[8..12], self.key_size);
        self.endian.write_u32(&mut buffer[12..16], self.val_size);
        self.endian.write_u64(&mut buffer[16..24], self.item_count);
        writer.write_all(&buffer)?;
        Ok(())
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::Error;

    #[test]
    fn test_header_both_orders() -> Result<()> {
        for endian in [Endian::Little, Endian::Big] {
            let header = BptHeader::new(endian, 4, 12, 8, 1000);
            let mut buf = Vec::new();
            header.write_bytes(&mut buf)?;
            assert_eq!(buf.len(), SIZE_BPT_HEADER);
            assert_eq!(BptHeader::from_reader(&mut buf.as_slice())?, header);
        }
        Ok(())
    }

    #[test]
    fn test_node_sizes() {
        let header = BptHeader::new(Endian::Little, 4, 12, 8, 0);
        assert_eq!(header.leaf_node_size(), 4 + 4 * 20);
        assert_eq!(header.inner_node_size(), 4 + 4 * 20);
        let header = BptHeader::new(Endian::Little, 3, 5, 4, 0);
        assert_eq!(header.leaf_node_size(), 4 + 3 * 9);
        assert_eq!(header.inner_node_size(), 4 + 3 * 13);
    }

    #[test]
    fn test_bad_magic_and_block_size() -> Result<()> {
        let buf = [0u8; SIZE_BPT_HEADER];
        assert!(matches!(
            BptHeader::from_bytes(&buf),
            Err(Error::FormatError(FormatError::InvalidBptMagic(0)))
        ));

        let mut buf = Vec::new();
        BptHeader::new(Endian::Big, 1, 4, 4, 0).write_bytes(&mut buf)?;
        assert!(matches!(
            BptHeader::from_reader(&mut buf.as_slice()),
            Err(Error::FormatError(FormatError::InvalidBlockSize(1)))
        ));
        Ok(())
    }

    #[test]
    fn test_rejects_unusable_widths() -> Result<()> {
        for (key_size, val_size) in [(0, 8), (256, 8), (u32::MAX, 8)] {
            let mut buf = Vec::new();
            BptHeader::new(Endian::Little, 4, key_size, val_size, 1).write_bytes(&mut buf)?;
            assert!(matches!(
                BptHeader::from_reader(&mut buf.as_slice()),
                Err(Error::FormatError(FormatError::InvalidKeySize(size))) if size == key_size
            ));
        }
        for val_size in [0, 256, u32::MAX] {
            let mut buf = Vec::new();
            BptHeader::new(Endian::Big, 4, 16, val_size, 1).write_bytes(&mut buf)?;
            assert!(matches!(
                BptHeader::from_reader(&mut buf.as_slice()),
                Err(Error::FormatError(FormatError::InvalidValueSize { got, .. })) if got == val_size
            ));
        }
        let mut buf = Vec::new();
        BptHeader::new(Endian::Big, 4, MAX_KEY_SIZE, MAX_VAL_SIZE, 1).write_bytes(&mut buf)?;
        assert!(BptHeader::from_reader(&mut buf.as_slice()).is_ok());
        Ok(())
    }
}
