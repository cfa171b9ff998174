//! Writer for twoBit files
//!
//! The whole collection is packed in memory first: the directory stores absolute
//! record offsets, so every record size must be known before the first byte is
//! written.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use indexmap::IndexMap;

use super::codec::PackedSequence;
use super::header::{TwoBitHeader, SIZE_HEADER};
use crate::bpt::{BptEntry, BptWriterBuilder, DEFAULT_BLOCK_SIZE};
use crate::endian::Endian;
use crate::error::{FormatError, Result};

/// Builder for creating configured `TwoBitWriter` instances
///
/// # Examples
///
/// ```
/// # use twobit::{Endian, TwoBitWriterBuilder};
/// let writer = TwoBitWriterBuilder::default()
///     .endian(Endian::Big)
///     .apply_masking(false)
///     .build();
/// assert!(writer.is_empty());
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct TwoBitWriterBuilder {
    endian: Option<Endian>,
    apply_masking: Option<bool>,
}
impl TwoBitWriterBuilder {
    /// Byte order of every integer in the output (defaults to the host order)
    #[must_use]
    pub fn endian(mut self, endian: Endian) -> Self {
        self.endian = Some(endian);
        self
    }

    /// Whether lower case input is recorded as mask blocks (defaults to true)
    #[must_use]
    pub fn apply_masking(mut self, apply_masking: bool) -> Self {
        self.apply_masking = Some(apply_masking);
        self
    }

    #[must_use]
    pub fn build(self) -> TwoBitWriter {
        TwoBitWriter {
            endian: self.endian.unwrap_or_default(),
            apply_masking: self.apply_masking.unwrap_or(true),
            sequences: IndexMap::new(),
        }
    }
}

/// Collects packed sequences and writes them as a single twoBit file
///
/// Sequences are written in insertion order.
#[derive(Debug, Clone)]
pub struct TwoBitWriter {
    endian: Endian,
    apply_masking: bool,
    sequences: IndexMap<String, PackedSequence>,
}
impl TwoBitWriter {
    /// Packs `sequence` and adds it under `name`
    ///
    /// # Errors
    ///
    /// Returns a `FormatError` if the name is already taken or the sequence cannot
    /// be encoded.
    pub fn add_sequence(&mut self, name: &str, sequence: &[u8]) -> Result<()> {
        if self.sequences.contains_key(name) {
            return Err(FormatError::DuplicateName(name.to_string()).into());
        }
        let packed = PackedSequence::encode(name, sequence, self.apply_masking)?;
        self.sequences.insert(name.to_string(), packed);
        Ok(())
    }

    /// Adds an already packed sequence
    pub fn add_packed(&mut self, packed: PackedSequence) -> Result<()> {
        if self.sequences.contains_key(packed.name()) {
            return Err(FormatError::DuplicateName(packed.name().to_string()).into());
        }
        self.sequences.insert(packed.name().to_string(), packed);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    #[must_use]
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// The packed sequences in write order
    pub fn sequences(&self) -> impl Iterator<Item = &PackedSequence> {
        self.sequences.values()
    }

    /// Absolute file offset of every record, in write order
    ///
    /// # Errors
    ///
    /// Returns `FormatError::FileTooLarge` if a record would start beyond the
    /// reach of the 32-bit offset field.
    pub fn record_offsets(&self) -> Result<Vec<u64>> {
        let directory_size: u64 = self
            .sequences
            .keys()
            .map(|name| 1 + name.len() as u64 + 4)
            .sum();
        let mut offset = SIZE_HEADER as u64 + directory_size;
        let mut offsets = Vec::with_capacity(self.sequences.len());
        for packed in self.sequences.values() {
            if offset > u64::from(u32::MAX) {
                return Err(FormatError::FileTooLarge(offset).into());
            }
            offsets.push(offset);
            offset += packed.record().record_size() as u64;
        }
        Ok(offsets)
    }

    /// Writes the header, the directory and every record
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        let offsets = self.record_offsets()?;
        let header = TwoBitHeader::new(self.sequences.len() as u32, self.endian);
        header.write_bytes(writer)?;
        for (name, offset) in self.sequences.keys().zip(&offsets) {
            writer.write_all(&[name.len() as u8])?;
            writer.write_all(name.as_bytes())?;
            self.endian.write_u32_to(writer, *offset as u32)?;
        }
        for packed in self.sequences.values() {
            packed.write_bytes(writer, self.endian)?;
        }
        log::debug!(
            "wrote {} sequences ({} bases)",
            self.sequences.len(),
            self.sequences
                .values()
                .map(|packed| u64::from(packed.base_count()))
                .sum::<u64>()
        );
        Ok(())
    }

    /// Writes the twoBit file to `path`
    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = File::create(path).map(BufWriter::new)?;
        self.write(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Writes a B+-tree mapping every name to its 64-bit record offset
    ///
    /// The index can be opened together with the twoBit file through
    /// [`TwoBitFile::open_with_external_index`](super::TwoBitFile::open_with_external_index).
    pub fn write_bpt_index<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        let offsets = self.record_offsets()?;
        let entries = self
            .sequences
            .keys()
            .zip(offsets)
            .map(|(name, offset)| {
                let mut value = vec![0u8; 8];
                self.endian.write_u64(&mut value, offset);
                BptEntry::new(name.as_bytes(), value)
            })
            .collect();
        BptWriterBuilder::default()
            .block_size(DEFAULT_BLOCK_SIZE)
            .endian(self.endian)
            .build()?
            .write(writer, entries, 8)
    }

    /// Writes the external B+-tree index to `path`
    pub fn write_bpt_index_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = File::create(path).map(BufWriter::new)?;
        self.write_bpt_index(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
