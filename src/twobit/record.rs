//! Per-sequence record headers
//!
//! Each sequence in a twoBit file starts with a record header holding its base
//! count and its N-block and mask-block lists, followed by the packed bases.

use std::io::{Read, Write};

use super::block::{self, Block};
use crate::endian::Endian;
use crate::error::{FormatError, Result};

/// The header of a single sequence record
///
/// On disk:
/// - `baseCount: u32`
/// - `nBlockCount: u32`, `nBlockStarts: [u32]`, `nBlockSizes: [u32]`
/// - `maskBlockCount: u32`, `maskBlockStarts: [u32]`, `maskBlockSizes: [u32]`
/// - `reserved: u32` (zero)
///
/// Records are cheap to keep around and are what [`SequenceCache`](super::SequenceCache)
/// stores between fragment reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    /// Number of bases in the sequence
    pub base_count: u32,

    /// Runs of unknown bases, read back as `N`
    pub n_blocks: Vec<Block>,

    /// Runs of soft-masked bases, read back in lower case
    pub mask_blocks: Vec<Block>,
}
impl SequenceRecord {
    #[must_use]
    pub fn new(base_count: u32, n_blocks: Vec<Block>, mask_blocks: Vec<Block>) -> Self {
        Self {
            base_count,
            n_blocks,
            mask_blocks,
        }
    }

    /// Number of packed bytes following the header
    #[must_use]
    pub fn packed_size(&self) -> usize {
        (self.base_count as usize).div_ceil(4)
    }

    /// Size of the serialized record header in bytes
    #[must_use]
    pub fn header_size(&self) -> usize {
        4 + 4 + 8 * self.n_blocks.len() + 4 + 8 * self.mask_blocks.len() + 4
    }

    /// Size of the full record (header and packed bases) in bytes
    #[must_use]
    pub fn record_size(&self) -> usize {
        self.header_size() + self.packed_size()
    }

    /// Number of bases inside N-blocks
    #[must_use]
    pub fn n_base_count(&self) -> u64 {
        block::covered(&self.n_blocks)
    }

    /// Number of bases inside mask-blocks
    #[must_use]
    pub fn masked_base_count(&self) -> u64 {
        block::covered(&self.mask_blocks)
    }

    /// Checks both block lists against the base count
    pub fn validate(&self, name: &str) -> Result<()> {
        block::validate(&self.n_blocks, self.base_count, name, "N")?;
        block::validate(&self.mask_blocks, self.base_count, name, "mask")?;
        Ok(())
    }

    /// Reads a record header positioned at the start of a record
    ///
    /// Block counts larger than the base count are rejected before any block
    /// storage is allocated.
    pub fn from_reader<R: Read>(reader: &mut R, endian: Endian, name: &str) -> Result<Self> {
        let base_count = endian.read_u32_from(reader)?;
        let n_blocks = read_blocks(reader, endian, base_count, name, "N")?;
        let mask_blocks = read_blocks(reader, endian, base_count, name, "mask")?;
        let reserved = endian.read_u32_from(reader)?;
        if reserved != 0 {
            return Err(FormatError::InvalidReservedField(reserved).into());
        }
        let record = Self::new(base_count, n_blocks, mask_blocks);
        record.validate(name)?;
        Ok(record)
    }

    /// Serializes the record header
    pub fn write_bytes<W: Write>(&self, writer: &mut W, endian: Endian) -> Result<()> {
        let mut buffer = vec![0u8; self.header_size()];
        let mut pos = 0;
        let mut put = |value: u32| {
            endian.write_u32(&mut buffer[pos..pos + 4], value);
            pos += 4;
        };
        put(self.base_count);
        for blocks in [&self.n_blocks, &self.mask_blocks] {
            put(blocks.len() as u32);
            blocks.iter().for_each(|b| put(b.start));
            blocks.iter().for_each(|b| put(b.size));
        }
        put(0);
        writer.write_all(&buffer)?;
        Ok(())
    }
}

fn read_blocks<R: Read>(
    reader: &mut R,
    endian: Endian,
    base_count: u32,
    name: &str,
    kind: &'static str,
) -> Result<Vec<Block>> {
    let count = endian.read_u32_from(reader)?;
    if count > base_count {
        return Err(FormatError::InvalidBlock {
            name: name.to_string(),
            kind,
            index: count as usize,
            start: 0,
            size: 0,
            base_count,
            problem: "beyond the number of bases that could hold a block",
        }
        .into());
    }
    let mut starts = vec![0u32; count as usize];
    let mut sizes = vec![0u32; count as usize];
    endian.read_u32_into(reader, &mut starts)?;
    endian.read_u32_into(reader, &mut sizes)?;
    Ok(starts
        .into_iter()
        .zip(sizes)
        .map(|(start, size)| Block::new(start, size))
        .collect())
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::Error;

    fn sample() -> SequenceRecord {
        SequenceRecord::new(
            20,
            vec![Block::new(8, 4)],
            vec![Block::new(4, 4), Block::new(12, 4)],
        )
    }

    #[test]
    fn test_record_sizes() {
        let record = sample();
        assert_eq!(record.packed_size(), 5);
        assert_eq!(record.header_size(), 4 + 4 + 8 + 4 + 16 + 4);
        assert_eq!(record.n_base_count(), 4);
        assert_eq!(record.masked_base_count(), 8);
    }

    #[test]
    fn test_record_both_orders() -> Result<()> {
        for endian in [Endian::Little, Endian::Big] {
            let mut buf = Vec::new();
            sample().write_bytes(&mut buf, endian)?;
            assert_eq!(buf.len(), sample().header_size());
            let parsed = SequenceRecord::from_reader(&mut buf.as_slice(), endian, "chr1")?;
            assert_eq!(parsed, sample());
        }
        Ok(())
    }

    #[test]
    fn test_truncated_record_is_io_error() -> Result<()> {
        let mut buf = Vec::new();
        sample().write_bytes(&mut buf, Endian::Little)?;
        buf.truncate(10);
        let err = SequenceRecord::from_reader(&mut buf.as_slice(), Endian::Little, "chr1")
            .unwrap_err();
        assert!(matches!(err, Error::IoError(_)));
        Ok(())
    }

    #[test]
    fn test_absurd_block_count() -> Result<()> {
        let mut buf = Vec::new();
        Endian::Big.write_u32_to(&mut buf, 4)?;
        Endian::Big.write_u32_to(&mut buf, 1_000_000)?;
        let err = SequenceRecord::from_reader(&mut buf.as_slice(), Endian::Big, "chr1").unwrap_err();
        assert!(err.is_format());
        Ok(())
    }
}
