//! Headers of crTree files and their R-tree section
//!
//! A crTree file starts with a 64-byte [`CrTreeHeader`] pointing at the two
//! sections that follow it: a B+-tree of chromosome names and an R-tree of
//! intervals, the latter introduced by its own 48-byte [`CirTreeHeader`].

use std::io::{Read, Write};

use byteorder::{ByteOrder, LittleEndian};

use crate::endian::Endian;
use crate::error::{FormatError, Result};

/// Magic number identifying crTree files (either byte order)
#[allow(clippy::unreadable_literal)]
pub const CRTREE_MAGIC: u32 = 0x2369E8A9;

/// Magic number identifying an R-tree section (either byte order)
#[allow(clippy::unreadable_literal)]
pub const CIRTREE_MAGIC: u32 = 0x2468ACE0;

/// Only supported crTree version
pub const CRTREE_VERSION: u32 = 0;

/// Size of the crTree file header in bytes
pub const SIZE_CRTREE_HEADER: usize = 64;

/// Size of the R-tree section header in bytes
pub const SIZE_CIRTREE_HEADER: usize = 48;

/// Header at the start of a crTree file
///
/// The header is 64 bytes on disk:
/// - Bytes 0-3: magic number
/// - Bytes 4-7: version (must be 0)
/// - Bytes 8-15: number of distinct chromosomes
/// - Bytes 16-23: number of indexed items
/// - Bytes 24-31: offset of the chromosome B+-tree
/// - Bytes 32-39: offset of the R-tree
/// - Bytes 40-63: reserved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrTreeHeader {
    pub endian: Endian,
    pub version: u32,
    pub chrom_count: u64,
    pub item_count: u64,
    pub chrom_tree_offset: u64,
    pub cir_tree_offset: u64,
}
impl CrTreeHeader {
    pub fn from_bytes(buffer: &[u8; SIZE_CRTREE_HEADER]) -> Result<Self> {
        let Some(endian) = Endian::detect(&buffer[0..4], CRTREE_MAGIC) else {
            return Err(FormatError::InvalidCrTreeMagic(LittleEndian::read_u32(&buffer[0..4])).into());
        };
        let version = endian.read_u32(&buffer[4..8]);
        if version != CRTREE_VERSION {
            return Err(FormatError::InvalidFormatVersion(version).into());
        }
        Ok(Self {
            endian,
            version,
            chrom_count: endian.read_u64(&buffer[8..16]),
            item_count: endian.read_u64(&buffer[16..24]),
            chrom_tree_offset: endian.read_u64(&buffer[24..32]),
            cir_tree_offset: endian.read_u64(&buffer[32..40]),
        })
    }

    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buffer = [0u8; SIZE_CRTREE_HEADER];
        reader.read_exact(&mut buffer)?;
        Self::from_bytes(&buffer)
    }

    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut buffer = [0u8; SIZE_CRTREE_HEADER];
        self.endian.write_u32(&mut buffer[0..4], CRTREE_MAGIC);
        self.endian.write_u32(&mut buffer[4..8], self.version);
        self.endian.write_u64(&mut buffer[8..16], self.chrom_count);
        self.endian.write_u64(&mut buffer[16..24], self.item_count);
        self.endian.write_u64(&mut buffer[24..32], self.chrom_tree_offset);
        self.endian.write_u64(&mut buffer[32..40], self.cir_tree_offset);
        writer.write_all(&buffer)?;
        Ok(())
    }
}

/// Header of the R-tree section
///
/// The bounding range spans from the first item's start to the last item's end,
/// as `(chromId, base)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CirTreeHeader {
    pub endian: Endian,

    /// Maximum number of children per node
    pub block_size: u32,

    /// Number of indexed items
    pub item_count: u64,

    pub start_chrom: u32,
    pub start_base: u32,
    pub end_chrom: u32,
    pub end_base: u32,

    /// End of the indexed data in the data file
    pub end_file_offset: u64,

    /// Maximum number of items summarized by one leaf entry
    pub items_per_slot: u32,
}
impl CirTreeHeader {
    pub fn from_bytes(buffer: &[u8; SIZE_CIRTREE_HEADER]) -> Result<Self> {
        let Some(endian) = Endian::detect(&buffer[0..4], CIRTREE_MAGIC) else {
            return Err(FormatError::InvalidCirTreeMagic(LittleEndian::read_u32(&buffer[0..4])).into());
        };
        let block_size = endian.read_u32(&buffer[4..8]);
        if !(2..=u32::from(u16::MAX)).contains(&block_size) {
            return Err(FormatError::InvalidBlockSize(block_size).into());
        }
        let items_per_slot = endian.read_u32(&buffer[40..44]);
        if items_per_slot == 0 {
            return Err(FormatError::InvalidItemsPerSlot(items_per_slot).into());
        }
        Ok(Self {
            endian,
            block_size,
            item_count: endian.read_u64(&buffer[8..16]),
            start_chrom: endian.read_u32(&buffer[16..20]),
            start_base: endian.read_u32(&buffer[20..24]),
            end_chrom: endian.read_u32(&buffer[24..28]),
            end_base: endian.read_u32(&buffer[28..32]),
            end_file_offset: endian.read_u64(&buffer[32..40]),
            items_per_slot,
        })
    }

    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buffer = [0u8; SIZE_CIRTREE_HEADER];
        reader.read_exact(&mut buffer)?;
        Self::from_bytes(&buffer)
    }

    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut buffer = [0u8; SIZE_CIRTREE_HEADER];
        self.endian.write_u32(&mut buffer[0..4], CIRTREE_MAGIC);
        self.endian.write_u32(&mut buffer[4..8], self.block_size);
        self.endian.write_u64(&mut buffer[8..16], self.item_count);
        self.endian.write_u32(&mut buffer[16..20], self.start_chrom);
        self.endian.write_u32(&mut buffer[20..24], self.start_base);
        self.endian.write_u32(&mut buffer[24..28], self.end_chrom);
        self.endian.write_u32(&mut buffer[28..32], self.end_base);
        self.endian.write_u64(&mut buffer[32..40], self.end_file_offset);
        self.endian.write_u32(&mut buffer[40..44], self.items_per_slot);
        writer.write_all(&buffer)?;
        Ok(())
    }
}
