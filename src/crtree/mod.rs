//! # crTree
//!
//! A disk-resident spatial index over a file of chromosome-range records.
//!
//! Given items `(chrom, start, end, fileOffset)` sorted by chromosome name and
//! position, the index answers "which byte ranges of the data file may hold items
//! overlapping `chrom:start-end`" without scanning the data file.
//!
//! ## Layout
//!
//! 1. A 64-byte [`CrTreeHeader`]
//! 2. A B+-tree mapping every chromosome name to `(chromId: u32, chromSize: u32)`
//! 3. A 48-byte [`CirTreeHeader`] followed by an R-tree over `(chromId, base)`
//!    ranges whose leaves point into the data file
//!
//! Results are a superset of the true answer: leaves summarize up to
//! `items_per_slot` consecutive items, so callers re-check every item they read.
//!
//! ```
//! use std::io::Cursor;
//! use twobit::crtree::{ChromNameTable, ChromRangeTree, CrTreeWriterBuilder, Item};
//!
//! # fn main() -> twobit::Result<()> {
//! let mut table = ChromNameTable::new();
//! let chr1 = table.intern("chr1");
//! let items = vec![
//!     Item::new(chr1.clone(), 0, 100, 0),
//!     Item::new(chr1.clone(), 100, 250, 40),
//!     Item::new(chr1, 500, 600, 80),
//! ];
//!
//! let mut cursor = Cursor::new(Vec::new());
//! CrTreeWriterBuilder::default()
//!     .items_per_slot(1)
//!     .build()?
//!     .write(&mut cursor, &items, &table, 120)?;
//!
//! let mut tree = ChromRangeTree::new(cursor)?;
//! let blocks = tree.find_overlapping_blocks("chr1", 150, 500)?;
//! assert!(blocks.iter().any(|block| block.contains(40)));
//! assert!(tree.find_overlapping_blocks("chr2", 300, 400)?.is_empty());
//! # Ok(())
//! # }
//! ```

mod cirtree;
mod header;
mod item;
mod reader;
mod writer;

pub use cirtree::FileBlock;
pub use header::{
    CirTreeHeader, CrTreeHeader, CIRTREE_MAGIC, CRTREE_MAGIC, CRTREE_VERSION,
    SIZE_CIRTREE_HEADER, SIZE_CRTREE_HEADER,
};
pub use item::{AgpEntry, AgpKind, ChromNameTable, Item, Strand};
pub use reader::{ChromInfo, ChromRangeTree};
pub use writer::{CrTreeWriter, CrTreeWriterBuilder, DEFAULT_BLOCK_SIZE, DEFAULT_ITEMS_PER_SLOT};
