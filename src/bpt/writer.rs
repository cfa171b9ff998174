//! B+-tree writer
//!
//! The tree is bulk-loaded from the complete item list. Nodes are written root
//! first, one level at a time, and every node is padded to `block_size` slots so
//! that child offsets can be computed before anything is written.

use std::io::{Seek, Write};

use super::header::{
    BptHeader, MAX_BLOCK_SIZE, MAX_KEY_SIZE, MAX_VAL_SIZE, SIZE_BPT_HEADER, SIZE_NODE_HEADER,
};
use crate::endian::Endian;
use crate::error::{FormatError, Result};

/// Default maximum number of children per node
pub const DEFAULT_BLOCK_SIZE: u32 = 256;

/// A single key/value pair to be stored in a B+-tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BptEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}
impl BptEntry {
    #[must_use]
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Builder for creating configured `BptWriter` instances
///
/// # Examples
///
/// ```
/// # use twobit::bpt::BptWriterBuilder;
/// # use twobit::{Endian, Result};
/// # fn main() -> Result<()> {
/// let writer = BptWriterBuilder::default()
///     .block_size(64)
///     .endian(Endian::Big)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct BptWriterBuilder {
    block_size: Option<u32>,
    endian: Option<Endian>,
}
impl BptWriterBuilder {
    #[must_use]
    pub fn block_size(mut self, block_size: u32) -> Self {
        self.block_size = Some(block_size);
        self
    }

    #[must_use]
    pub fn endian(mut self, endian: Endian) -> Self {
        self.endian = Some(endian);
        self
    }

    pub fn build(self) -> Result<BptWriter> {
        let block_size = self.block_size.unwrap_or(DEFAULT_BLOCK_SIZE);
        if !(2..=MAX_BLOCK_SIZE).contains(&block_size) {
            return Err(FormatError::InvalidBlockSize(block_size).into());
        }
        Ok(BptWriter {
            block_size,
            endian: self.endian.unwrap_or_default(),
        })
    }
}

/// Bulk writer for B+-tree sections
#[derive(Debug, Clone, Copy)]
pub struct BptWriter {
    block_size: u32,
    endian: Endian,
}
impl BptWriter {
    #[must_use]
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    #[must_use]
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Writes a complete B+-tree section at the writer's current position
    ///
    /// Entries are sorted by key before writing. Child offsets are absolute, so the
    /// section can be embedded anywhere in a larger file.
    ///
    /// # Errors
    ///
    /// Returns a `FormatError` if two entries share a key, a key is longer than
    /// 255 bytes, or a value is not `val_size` bytes wide.
    pub fn write<W: Write + Seek>(
        &self,
        writer: &mut W,
        mut entries: Vec<BptEntry>,
        val_size: u32,
    ) -> Result<()> {
        if !(1..=MAX_VAL_SIZE).contains(&val_size) {
            return Err(FormatError::InvalidValueSize {
                expected: format!("1..={MAX_VAL_SIZE}"),
                got: val_size,
            }
            .into());
        }
        if let Some(entry) = entries.iter().find(|e| e.key.len() > MAX_KEY_SIZE as usize) {
            return Err(FormatError::KeyTooLong {
                key: String::from_utf8_lossy(&entry.key).to_string(),
                key_size: MAX_KEY_SIZE,
            }
            .into());
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        if let Some(pair) = entries.windows(2).find(|pair| pair[0].key == pair[1].key) {
            return Err(FormatError::DuplicateKey(String::from_utf8_lossy(&pair[0].key).to_string()).into());
        }
        if let Some(entry) = entries.iter().find(|e| e.value.len() != val_size as usize) {
            return Err(FormatError::InvalidValueSize {
                expected: val_size.to_string(),
                got: entry.value.len() as u32,
            }
            .into());
        }

        let key_size = entries.iter().map(|e| e.key.len()).max().unwrap_or(0).max(1);
        let header = BptHeader::new(
            self.endian,
            self.block_size,
            key_size as u32,
            val_size,
            entries.len() as u64,
        );
        let block_size = self.block_size as usize;

        // node counts per level, leaves first
        let mut level_nodes = vec![entries.len().div_ceil(block_size).max(1)];
        while let Some(&count) = level_nodes.last().filter(|&&count| count > 1) {
            level_nodes.push(count.div_ceil(block_size));
        }
        let node_size = |level: usize| {
            if level == 0 {
                header.leaf_node_size()
            } else {
                header.inner_node_size()
            }
        };

        // absolute offset of the first node of every level, root level first on disk
        let mut level_offsets = vec![0u64; level_nodes.len()];
        let mut offset = writer.stream_position()? + SIZE_BPT_HEADER as u64;
        for level in (0..level_nodes.len()).rev() {
            level_offsets[level] = offset;
            offset += (level_nodes[level] * node_size(level)) as u64;
        }
        log::trace!(
            "writing B+ tree: {} items, {} levels, key size {}",
            entries.len(),
            level_nodes.len(),
            key_size
        );

        header.write_bytes(writer)?;
        for level in (0..level_nodes.len()).rev() {
            for node in 0..level_nodes[level] {
                let mut buffer = vec![0u8; node_size(level)];
                if level == 0 {
                    let lbound = node * block_size;
                    let rbound = (lbound + block_size).min(entries.len());
                    buffer[0] = 1;
                    self.endian
                        .write_u16(&mut buffer[2..4], (rbound - lbound) as u16);
                    let slot = key_size + val_size as usize;
                    for (i, entry) in entries[lbound..rbound].iter().enumerate() {
                        let pos = SIZE_NODE_HEADER + i * slot;
                        buffer[pos..pos + entry.key.len()].copy_from_slice(&entry.key);
                        buffer[pos + key_size..pos + slot].copy_from_slice(&entry.value);
                    }
                } else {
                    let child_level = level - 1;
                    let lbound = node * block_size;
                    let rbound = (lbound + block_size).min(level_nodes[child_level]);
                    // number of items below a single child node
                    let items_per_child = block_size.pow(child_level as u32 + 1);
                    self.endian
                        .write_u16(&mut buffer[2..4], (rbound - lbound) as u16);
                    let slot = key_size + 8;
                    for (i, child) in (lbound..rbound).enumerate() {
                        let pos = SIZE_NODE_HEADER + i * slot;
                        let key = &entries[child * items_per_child].key;
                        buffer[pos..pos + key.len()].copy_from_slice(key);
                        let child_offset =
                            level_offsets[child_level] + (child * node_size(child_level)) as u64;
                        self.endian
                            .write_u64(&mut buffer[pos + key_size..pos + slot], child_offset);
                    }
                }
                writer.write_all(&buffer)?;
            }
        }
        Ok(())
    }
}
