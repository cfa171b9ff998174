//! R-tree over `(chromId, base)` ranges
//!
//! Sorted items are grouped into slots of `items_per_slot`; each slot becomes one
//! leaf entry holding its bounding range and the span of the data file its items
//! occupy. Leaf entries are grouped `block_size` to a node, and nodes are grouped
//! the same way level by level until a single root remains.
//!
//! Node layout: `isLeaf: u8, reserved: u8, count: u16`, then `count` entries of
//! `startChrom, startBase, endChrom, endBase: u32` followed by
//! `offset: u64, size: u64` in leaves or `childOffset: u64` in internal nodes.
//! Every node is padded to `block_size` entries and the root is written first.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::endian::Endian;
use crate::error::{FormatError, Result};

const SIZE_NODE_HEADER: usize = 4;
const SIZE_LEAF_ENTRY: usize = 32;
const SIZE_INNER_ENTRY: usize = 24;

/// A byte range of the indexed data file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileBlock {
    pub offset: u64,
    pub size: u64,
}
impl FileBlock {
    #[must_use]
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    /// Whether the data file offset lies inside this block
    #[must_use]
    pub fn contains(&self, offset: u64) -> bool {
        self.offset <= offset && offset < self.end()
    }
}

/// The range from `(start_chrom, start_base)` to `(end_chrom, end_base)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Bounds {
    pub start_chrom: u32,
    pub start_base: u32,
    pub end_chrom: u32,
    pub end_base: u32,
}
impl Bounds {
    fn start(&self) -> (u32, u32) {
        (self.start_chrom, self.start_base)
    }

    fn end(&self) -> (u32, u32) {
        (self.end_chrom, self.end_base)
    }

    fn union(self, other: Self) -> Self {
        let (start_chrom, start_base) = self.start().min(other.start());
        let (end_chrom, end_base) = self.end().max(other.end());
        Self {
            start_chrom,
            start_base,
            end_chrom,
            end_base,
        }
    }

    /// Half-open overlap with `[start, end)` on `chrom`
    pub fn overlaps(&self, chrom: u32, start: u32, end: u32) -> bool {
        (chrom, start) < self.end() && (chrom, end) > self.start()
    }

    fn read(endian: Endian, buf: &[u8]) -> Self {
        Self {
            start_chrom: endian.read_u32(&buf[0..4]),
            start_base: endian.read_u32(&buf[4..8]),
            end_chrom: endian.read_u32(&buf[8..12]),
            end_base: endian.read_u32(&buf[12..16]),
        }
    }

    fn write(&self, endian: Endian, buf: &mut [u8]) {
        endian.write_u32(&mut buf[0..4], self.start_chrom);
        endian.write_u32(&mut buf[4..8], self.start_base);
        endian.write_u32(&mut buf[8..12], self.end_chrom);
        endian.write_u32(&mut buf[12..16], self.end_base);
    }
}

/// An item reduced to integer coordinates
#[derive(Debug, Clone, Copy)]
pub(crate) struct KeyedItem {
    pub chrom_id: u32,
    pub start: u32,
    pub end: u32,
    pub offset: u64,
}

/// One leaf entry: a run of consecutive items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Slot {
    pub bounds: Bounds,
    pub block: FileBlock,
}

/// Groups sorted items into leaf slots
///
/// A slot's data span runs from its first item's offset to the next slot's first
/// offset, or to `data_end` for the last slot.
pub(crate) fn build_slots(items: &[KeyedItem], items_per_slot: usize, data_end: u64) -> Vec<Slot> {
    let mut slots: Vec<Slot> = items
        .chunks(items_per_slot)
        .map(|chunk| {
            let first = chunk[0];
            let (end_chrom, end_base) = chunk
                .iter()
                .map(|item| (item.chrom_id, item.end))
                .max()
                .unwrap_or((first.chrom_id, first.end));
            Slot {
                bounds: Bounds {
                    start_chrom: first.chrom_id,
                    start_base: first.start,
                    end_chrom,
                    end_base,
                },
                block: FileBlock {
                    offset: first.offset,
                    size: 0,
                },
            }
        })
        .collect();
    let next_offsets: Vec<u64> = slots
        .iter()
        .skip(1)
        .map(|slot| slot.block.offset)
        .chain(std::iter::once(data_end))
        .collect();
    for (slot, next) in slots.iter_mut().zip(next_offsets) {
        slot.block.size = next - slot.block.offset;
    }
    slots
}

/// Writes the R-tree nodes at the writer's current position
///
/// Returns the number of levels written.
pub(crate) fn write_nodes<W: Write + Seek>(
    writer: &mut W,
    endian: Endian,
    block_size: u32,
    slots: &[Slot],
) -> Result<usize> {
    let bs = block_size as usize;

    // bounds of every node, leaves first
    let mut levels: Vec<Vec<Bounds>> = vec![slots
        .chunks(bs)
        .map(|chunk| {
            chunk
                .iter()
                .map(|slot| slot.bounds)
                .reduce(Bounds::union)
                .unwrap_or(chunk[0].bounds)
        })
        .collect()];
    if levels[0].is_empty() {
        levels[0].push(Bounds {
            start_chrom: 0,
            start_base: 0,
            end_chrom: 0,
            end_base: 0,
        });
    }
    while let Some(level) = levels.last().filter(|level| level.len() > 1) {
        let parents = level
            .chunks(bs)
            .map(|chunk| chunk.iter().copied().reduce(Bounds::union).unwrap_or(chunk[0]))
            .collect();
        levels.push(parents);
    }

    let node_size = |level: usize| {
        SIZE_NODE_HEADER
            + bs * if level == 0 {
                SIZE_LEAF_ENTRY
            } else {
                SIZE_INNER_ENTRY
            }
    };
    let mut level_offsets = vec![0u64; levels.len()];
    let mut offset = writer.stream_position()?;
    for level in (0..levels.len()).rev() {
        level_offsets[level] = offset;
        offset += (levels[level].len() * node_size(level)) as u64;
    }
    log::debug!(
        "writing R tree: {} slots, {} levels, block size {block_size}",
        slots.len(),
        levels.len()
    );

    for level in (0..levels.len()).rev() {
        for node in 0..levels[level].len() {
            let mut buffer = vec![0u8; node_size(level)];
            let lbound = node * bs;
            if level == 0 {
                let rbound = (lbound + bs).min(slots.len());
                buffer[0] = 1;
                endian.write_u16(&mut buffer[2..4], (rbound.saturating_sub(lbound)) as u16);
                for (i, slot) in slots.get(lbound..rbound).unwrap_or(&[]).iter().enumerate() {
                    let pos = SIZE_NODE_HEADER + i * SIZE_LEAF_ENTRY;
                    slot.bounds.write(endian, &mut buffer[pos..pos + 16]);
                    endian.write_u64(&mut buffer[pos + 16..pos + 24], slot.block.offset);
                    endian.write_u64(&mut buffer[pos + 24..pos + 32], slot.block.size);
                }
            } else {
                let children = &levels[level - 1];
                let rbound = (lbound + bs).min(children.len());
                endian.write_u16(&mut buffer[2..4], (rbound - lbound) as u16);
                for (i, child) in (lbound..rbound).enumerate() {
                    let pos = SIZE_NODE_HEADER + i * SIZE_INNER_ENTRY;
                    children[child].write(endian, &mut buffer[pos..pos + 16]);
                    let child_offset =
                        level_offsets[level - 1] + (child * node_size(level - 1)) as u64;
                    endian.write_u64(&mut buffer[pos + 16..pos + 24], child_offset);
                }
            }
            writer.write_all(&buffer)?;
        }
    }
    Ok(levels.len())
}

/// Collects the data file blocks of every leaf entry overlapping
/// `[start, end)` on `chrom_id`, merging blocks that touch
pub(crate) fn find_overlapping<R: Read + Seek>(
    reader: &mut R,
    endian: Endian,
    root_offset: u64,
    chrom_id: u32,
    start: u32,
    end: u32,
) -> Result<Vec<FileBlock>> {
    let mut blocks: Vec<FileBlock> = Vec::new();
    let mut stack = vec![root_offset];
    while let Some(offset) = stack.pop() {
        reader.seek(SeekFrom::Start(offset))?;
        let mut node_header = [0u8; SIZE_NODE_HEADER];
        reader.read_exact(&mut node_header)?;
        let count = endian.read_u16(&node_header[2..4]) as usize;
        log::trace!("visiting R tree node at {offset} ({count} entries)");

        match node_header[0] {
            1 => {
                let mut bytes = vec![0u8; count * SIZE_LEAF_ENTRY];
                reader.read_exact(&mut bytes)?;
                for entry in bytes.chunks_exact(SIZE_LEAF_ENTRY) {
                    if !Bounds::read(endian, entry).overlaps(chrom_id, start, end) {
                        continue;
                    }
                    let block = FileBlock {
                        offset: endian.read_u64(&entry[16..24]),
                        size: endian.read_u64(&entry[24..32]),
                    };
                    match blocks.last_mut() {
                        Some(last) if last.end() == block.offset => last.size += block.size,
                        _ => blocks.push(block),
                    }
                }
            }
            0 => {
                let mut bytes = vec![0u8; count * SIZE_INNER_ENTRY];
                reader.read_exact(&mut bytes)?;
                let mut children = Vec::new();
                for entry in bytes.chunks_exact(SIZE_INNER_ENTRY) {
                    if !Bounds::read(endian, entry).overlaps(chrom_id, start, end) {
                        continue;
                    }
                    let child = endian.read_u64(&entry[16..24]);
                    if child <= offset {
                        return Err(FormatError::InvalidChildOffset { offset, child }.into());
                    }
                    children.push(child);
                }
                // visit children left to right
                stack.extend(children.into_iter().rev());
            }
            flag => return Err(FormatError::InvalidNode { offset, flag }.into()),
        }
    }
    Ok(blocks)
}
