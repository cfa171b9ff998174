//! Bulk construction of crTree files
//!
//! Items must arrive sorted by `(chrom name, start, end)`. The input is validated,
//! never sorted: the first violation is reported and nothing is written.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use indexmap::IndexMap;

use super::cirtree::{self, KeyedItem};
use super::header::{CirTreeHeader, CrTreeHeader, CRTREE_VERSION, SIZE_CRTREE_HEADER};
use super::item::{ChromNameTable, Item};
use crate::bpt::{BptEntry, BptWriterBuilder};
use crate::endian::Endian;
use crate::error::{FormatError, OrderingError, Result};

/// Default maximum number of children per R-tree node
pub const DEFAULT_BLOCK_SIZE: u32 = 256;

/// Default maximum number of items summarized by one leaf entry
pub const DEFAULT_ITEMS_PER_SLOT: u32 = 512;

/// Builder for creating configured `CrTreeWriter` instances
///
/// # Examples
///
/// ```
/// # use twobit::crtree::CrTreeWriterBuilder;
/// # fn main() -> twobit::Result<()> {
/// let writer = CrTreeWriterBuilder::default()
///     .block_size(64)
///     .items_per_slot(16)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct CrTreeWriterBuilder {
    block_size: Option<u32>,
    items_per_slot: Option<u32>,
    endian: Option<Endian>,
}
impl CrTreeWriterBuilder {
    #[must_use]
    pub fn block_size(mut self, block_size: u32) -> Self {
        self.block_size = Some(block_size);
        self
    }

    #[must_use]
    pub fn items_per_slot(mut self, items_per_slot: u32) -> Self {
        self.items_per_slot = Some(items_per_slot);
        self
    }

    #[must_use]
    pub fn endian(mut self, endian: Endian) -> Self {
        self.endian = Some(endian);
        self
    }

    pub fn build(self) -> Result<CrTreeWriter> {
        let block_size = self.block_size.unwrap_or(DEFAULT_BLOCK_SIZE);
        if !(2..=u32::from(u16::MAX)).contains(&block_size) {
            return Err(FormatError::InvalidBlockSize(block_size).into());
        }
        let items_per_slot = self.items_per_slot.unwrap_or(DEFAULT_ITEMS_PER_SLOT);
        if items_per_slot == 0 {
            return Err(FormatError::InvalidItemsPerSlot(items_per_slot).into());
        }
        Ok(CrTreeWriter {
            block_size,
            items_per_slot,
            endian: self.endian.unwrap_or_default(),
        })
    }
}

/// Writes crTree indexes over sorted items
#[derive(Debug, Clone, Copy)]
pub struct CrTreeWriter {
    block_size: u32,
    items_per_slot: u32,
    endian: Endian,
}
impl CrTreeWriter {
    /// Checks the build preconditions and assigns chromosome IDs
    ///
    /// IDs follow the order of first appearance, which for sorted input is the
    /// name order. Returns the keyed items and, per chromosome, its ID and the
    /// largest item end.
    fn prepare(
        items: &[Item],
        table: &ChromNameTable,
        data_end: u64,
    ) -> Result<(Vec<KeyedItem>, IndexMap<String, (u32, u32)>)> {
        let mut chroms: IndexMap<String, (u32, u32)> = IndexMap::new();
        let mut keyed = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            if !table.contains(&item.chrom) {
                return Err(OrderingError::UnknownChrom {
                    index,
                    chrom: item.chrom.to_string(),
                }
                .into());
            }
            if item.start > item.end {
                return Err(FormatError::InvalidInterval {
                    index,
                    chrom: item.chrom.to_string(),
                    start: item.start,
                    end: item.end,
                }
                .into());
            }
            if let Some(prev) = index.checked_sub(1).map(|i| &items[i]) {
                if prev.sort_key() > item.sort_key() {
                    return Err(OrderingError::UnsortedItems {
                        index,
                        prev_chrom: prev.chrom.to_string(),
                        prev_start: prev.start,
                        prev_end: prev.end,
                        chrom: item.chrom.to_string(),
                        start: item.start,
                        end: item.end,
                    }
                    .into());
                }
                if prev.file_offset > item.file_offset {
                    return Err(OrderingError::DecreasingOffset {
                        index,
                        previous: prev.file_offset,
                        offset: item.file_offset,
                    }
                    .into());
                }
            }

            let next_id = chroms.len() as u32;
            let entry = chroms.entry(item.chrom.to_string()).or_insert((next_id, 0));
            entry.1 = entry.1.max(item.end);
            keyed.push(KeyedItem {
                chrom_id: entry.0,
                start: item.start,
                end: item.end,
                offset: item.file_offset,
            });
        }
        if let Some(last) = items.last() {
            if data_end < last.file_offset {
                return Err(OrderingError::DataEndBeforeLastItem {
                    data_end,
                    last: last.file_offset,
                }
                .into());
            }
        }
        Ok((keyed, chroms))
    }

    /// Writes a complete crTree index at the writer's current position
    ///
    /// # Arguments
    ///
    /// * `items` - Items sorted by `(chrom name, start, end)`
    /// * `table` - Name table every item's chromosome must belong to
    /// * `data_end` - End offset of the indexed data in the data file
    ///
    /// # Errors
    ///
    /// Returns an `OrderingError` naming the first item that is out of order, has a
    /// chromosome missing from the table or a decreasing file offset.
    pub fn write<W: Write + Seek>(
        &self,
        writer: &mut W,
        items: &[Item],
        table: &ChromNameTable,
        data_end: u64,
    ) -> Result<()> {
        let (keyed, chroms) = Self::prepare(items, table, data_end)?;

        let start = writer.stream_position()?;
        let mut header = CrTreeHeader {
            endian: self.endian,
            version: CRTREE_VERSION,
            chrom_count: chroms.len() as u64,
            item_count: items.len() as u64,
            chrom_tree_offset: start + SIZE_CRTREE_HEADER as u64,
            cir_tree_offset: 0,
        };
        header.write_bytes(writer)?;

        let entries = chroms
            .iter()
            .map(|(name, &(id, size))| {
                let mut value = vec![0u8; 8];
                self.endian.write_u32(&mut value[0..4], id);
                self.endian.write_u32(&mut value[4..8], size);
                BptEntry::new(name.as_bytes(), value)
            })
            .collect();
        BptWriterBuilder::default()
            .block_size(self.block_size)
            .endian(self.endian)
            .build()?
            .write(writer, entries, 8)?;

        header.cir_tree_offset = writer.stream_position()?;
        let slots = cirtree::build_slots(&keyed, self.items_per_slot as usize, data_end);
        let first = keyed.first();
        let (end_chrom, end_base) = keyed
            .iter()
            .map(|item| (item.chrom_id, item.end))
            .max()
            .unwrap_or((0, 0));
        CirTreeHeader {
            endian: self.endian,
            block_size: self.block_size,
            item_count: items.len() as u64,
            start_chrom: first.map_or(0, |item| item.chrom_id),
            start_base: first.map_or(0, |item| item.start),
            end_chrom,
            end_base,
            end_file_offset: data_end,
            items_per_slot: self.items_per_slot,
        }
        .write_bytes(writer)?;
        cirtree::write_nodes(writer, self.endian, self.block_size, &slots)?;

        // patch the section offsets into the file header
        let end = writer.stream_position()?;
        writer.seek(SeekFrom::Start(start))?;
        header.write_bytes(writer)?;
        writer.seek(SeekFrom::Start(end))?;

        log::debug!(
            "built crTree: {} items on {} chroms in {} slots",
            items.len(),
            chroms.len(),
            slots.len()
        );
        Ok(())
    }

    /// Writes a crTree index to `path`
    pub fn write_to_path<P: AsRef<Path>>(
        &self,
        path: P,
        items: &[Item],
        table: &ChromNameTable,
        data_end: u64,
    ) -> Result<()> {
        let mut writer = File::create(path).map(BufWriter::new)?;
        self.write(&mut writer, items, table, data_end)?;
        writer.flush()?;
        Ok(())
    }
}
