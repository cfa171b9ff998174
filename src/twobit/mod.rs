//! # twoBit
//!
//! Packed DNA sequence collections with random access to any fragment.
//!
//! ## Format
//!
//! A twoBit file consists of:
//! 1. A 16-byte [`TwoBitHeader`] whose magic number fixes the byte order
//! 2. A directory of `(nameLen: u8, name, offset: u32)` entries
//! 3. One record per sequence: a [`SequenceRecord`] header listing the N-blocks and
//!    mask-blocks, followed by the bases packed four per byte
//!
//! Bases are stored as `T=0, C=1, A=2, G=3` with the first base of every byte in
//! the most significant bits. Bases outside of `ACGT` are recorded as N-blocks and
//! read back as `N`; lower case runs are recorded as mask-blocks and read back in
//! lower case when masking is requested.
//!
//! ## Usage
//!
//! ```
//! use std::io::Cursor;
//! use twobit::{TwoBitFile, TwoBitWriterBuilder};
//!
//! # fn main() -> twobit::Result<()> {
//! let mut writer = TwoBitWriterBuilder::default().build();
//! writer.add_sequence("chr1", b"ACGTacgtNNNNacgtACGT")?;
//!
//! let mut bytes = Vec::new();
//! writer.write(&mut bytes)?;
//!
//! let mut file = TwoBitFile::new(Cursor::new(bytes))?;
//! assert_eq!(file.read_fragment("chr1", 8, 12, true)?, b"NNNN");
//! assert_eq!(file.read_fragment("chr1", 0, 0, false)?, b"ACGTACGTNNNNACGTACGT");
//! # Ok(())
//! # }
//! ```

mod block;
mod cache;
mod codec;
mod fasta;
mod header;
mod index;
mod reader;
mod record;
mod writer;

pub use block::Block;
pub use cache::{SequenceCache, TwoBitHandleCache};
pub use codec::{base_code, pack, unpack, PackedSequence, NUC};
pub use fasta::{write_fasta_record, DEFAULT_LINE_WIDTH};
pub use header::{TwoBitHeader, MAGIC, MAX_NAME_LEN, SIZE_HEADER, VERSION};
pub use reader::TwoBitFile;
pub use record::SequenceRecord;
pub use writer::{TwoBitWriter, TwoBitWriterBuilder};
