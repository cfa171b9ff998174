//! Queries against crTree files

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use super::cirtree::{self, FileBlock};
use super::header::{CirTreeHeader, CrTreeHeader, SIZE_CIRTREE_HEADER};
use crate::bpt::BptIndex;
use crate::error::{FormatError, InvalidStateError, Result};

const IN_MEMORY: &str = "<memory>";

/// A chromosome known to the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromInfo {
    pub name: String,
    pub id: u32,

    /// Largest end coordinate of any item on the chromosome
    pub size: u32,
}

struct OpenTree<R> {
    reader: R,
    header: CrTreeHeader,
    chrom_index: BptIndex,
    cir_header: CirTreeHeader,
}

/// An open crTree index
///
/// Queries return byte ranges of the indexed data file that may hold overlapping
/// items. Every item read from those ranges still has to be checked with
/// [`Item::overlaps`](super::Item::overlaps).
pub struct ChromRangeTree<R: Read + Seek = BufReader<File>> {
    inner: Option<OpenTree<R>>,
    source: String,
}

impl ChromRangeTree<BufReader<File>> {
    /// Opens a crTree index file
    ///
    /// # Errors
    ///
    /// Returns a `FormatError` carrying the path if either section header has a
    /// bad magic number or version.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = path.as_ref().display().to_string();
        let reader = File::open(path).map(BufReader::new)?;
        Self::with_source(reader, source)
    }
}

impl<R: Read + Seek> ChromRangeTree<R> {
    /// Reads a crTree index from any seekable reader, starting at position zero
    pub fn new(reader: R) -> Result<Self> {
        Self::with_source(reader, IN_MEMORY.to_string())
    }

    fn with_source(mut reader: R, source: String) -> Result<Self> {
        let open = Self::read_headers(&mut reader).map_err(|e| e.in_file(&source))?;
        log::debug!(
            "opened crTree {source}: {} chroms, {} items",
            open.header.chrom_count,
            open.header.item_count
        );
        Ok(Self {
            inner: Some(OpenTree {
                reader,
                header: open.header,
                chrom_index: open.chrom_index,
                cir_header: open.cir_header,
            }),
            source,
        })
    }

    fn read_headers(reader: &mut R) -> Result<OpenTree<()>> {
        reader.seek(SeekFrom::Start(0))?;
        let header = CrTreeHeader::from_reader(reader)?;
        reader.seek(SeekFrom::Start(header.chrom_tree_offset))?;
        let chrom_index = BptIndex::from_reader(reader)?;
        if chrom_index.header().val_size != 8 {
            return Err(FormatError::InvalidValueSize {
                expected: "8".to_string(),
                got: chrom_index.header().val_size,
            }
            .into());
        }
        reader.seek(SeekFrom::Start(header.cir_tree_offset))?;
        let cir_header = CirTreeHeader::from_reader(reader)?;
        Ok(OpenTree {
            reader: (),
            header,
            chrom_index,
            cir_header,
        })
    }

    fn open_tree(&mut self) -> Result<&mut OpenTree<R>> {
        let source = &self.source;
        self.inner.as_mut().ok_or_else(|| {
            InvalidStateError::Closed {
                file: source.clone(),
            }
            .into()
        })
    }

    /// Resolves a chromosome name to its ID and size
    pub fn chrom(&mut self, chrom: &str) -> Result<Option<ChromInfo>> {
        let tree = self.open_tree()?;
        let endian = tree.chrom_index.header().endian;
        Ok(tree
            .chrom_index
            .find(&mut tree.reader, chrom.as_bytes())?
            .map(|value| ChromInfo {
                name: chrom.to_string(),
                id: endian.read_u32(&value[0..4]),
                size: endian.read_u32(&value[4..8]),
            }))
    }

    /// Every chromosome in the index, in ID order
    pub fn chroms(&mut self) -> Result<Vec<ChromInfo>> {
        let tree = self.open_tree()?;
        let endian = tree.chrom_index.header().endian;
        let mut chroms = tree
            .chrom_index
            .traverse(&mut tree.reader)?
            .into_iter()
            .map(|(key, value)| {
                Ok(ChromInfo {
                    name: std::str::from_utf8(&key)?.to_string(),
                    id: endian.read_u32(&value[0..4]),
                    size: endian.read_u32(&value[4..8]),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        chroms.sort_by_key(|chrom| chrom.id);
        Ok(chroms)
    }

    /// Finds the data file blocks that may hold items overlapping
    /// `[start, end)` on `chrom`
    ///
    /// A chromosome missing from the index, or no overlap at all, yields an empty
    /// list. Adjacent blocks are merged.
    pub fn find_overlapping_blocks(
        &mut self,
        chrom: &str,
        start: u32,
        end: u32,
    ) -> Result<Vec<FileBlock>> {
        let Some(info) = self.chrom(chrom)? else {
            log::trace!("{}: no chromosome {chrom}", self.source);
            return Ok(Vec::new());
        };
        if start > end {
            return Ok(Vec::new());
        }
        let tree = self.open_tree()?;
        let root_offset = tree.header.cir_tree_offset + SIZE_CIRTREE_HEADER as u64;
        cirtree::find_overlapping(
            &mut tree.reader,
            tree.cir_header.endian,
            root_offset,
            info.id,
            start,
            end,
        )
    }

    /// The file header
    pub fn header(&self) -> Result<CrTreeHeader> {
        self.inner.as_ref().map(|tree| tree.header).ok_or_else(|| {
            InvalidStateError::Closed {
                file: self.source.clone(),
            }
            .into()
        })
    }

    /// The R-tree section header
    pub fn cir_header(&self) -> Result<CirTreeHeader> {
        self.inner.as_ref().map(|tree| tree.cir_header).ok_or_else(|| {
            InvalidStateError::Closed {
                file: self.source.clone(),
            }
            .into()
        })
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// Releases the reader; idempotent
    pub fn close(&mut self) {
        self.inner = None;
    }
}
