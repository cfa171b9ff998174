//! # twobit
//!
//! Packed DNA sequence files with random access, and the disk indexes built
//! around them.
//!
//! ## Modules
//!
//! * [`twobit`] - the twoBit format: two bits per base with side tables for
//!   unknown bases and soft-masked regions, a name directory, and fragment reads
//!   that only touch the bytes covering the requested bases
//! * [`bpt`] - a disk B+-tree of fixed-width keys, used for chromosome IDs and as
//!   an external name index for very large twoBit collections
//! * [`crtree`] - a chromosome range index (B+-tree of names plus R-tree of
//!   intervals) over any file of records sorted by chromosome and position
//!
//! All formats detect their byte order from a magic number, so files written on a
//! host of either endianness read back identically.
//!
//! Handles are single-threaded. Concurrent readers open one handle each, see
//! [`ParallelReader`] for whole-file processing across threads.

pub mod bpt;
pub mod crtree;
pub mod twobit;

mod endian;
mod error;
mod parallel;

pub use endian::Endian;
pub use error::{
    Error, FormatError, InvalidStateError, NotFoundError, OrderingError, RangeError, Result,
    UnsupportedError,
};
pub use parallel::{ParallelProcessor, ParallelReader};
pub use twobit::{
    PackedSequence, SequenceCache, SequenceRecord, TwoBitFile, TwoBitHandleCache, TwoBitHeader,
    TwoBitWriter, TwoBitWriterBuilder,
};
