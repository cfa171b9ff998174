/// Custom Result type for twobit operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the twobit library, encompassing all possible error cases
/// that can occur while encoding, indexing, or reading packed sequence files.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Malformed headers, records, or indexes that violate the fixed layout
    FormatError(#[from] FormatError),
    /// Build-time precondition on sorted crTree input was violated
    OrderingError(#[from] OrderingError),
    /// Fragment bounds outside of the sequence
    RangeError(#[from] RangeError),
    /// A named sequence is absent from the file
    NotFoundError(#[from] NotFoundError),
    /// Operation is not valid in the current open mode
    UnsupportedError(#[from] UnsupportedError),
    /// Operation on a handle that has been closed
    InvalidStateError(#[from] InvalidStateError),
    /// Standard I/O errors from the Rust standard library
    IoError(#[from] std::io::Error),
    /// UTF-8 encoding/decoding errors
    Utf8Error(#[from] std::str::Utf8Error),
    /// Errors from the FASTA parser
    FastaError(#[from] seq_io::fasta::Error),
    /// Errors from transparent decompression of input files
    NifflerError(#[from] niffler::Error),
    /// Generic errors that can occur in any part of the system
    AnyhowError(#[from] anyhow::Error),
}
impl Error {
    /// Attaches the path of the offending file to format errors.
    ///
    /// Other error categories already carry the file they refer to (or have no
    /// file to speak of) and are returned unchanged.
    #[must_use]
    pub fn in_file(self, path: &str) -> Self {
        match self {
            Self::FormatError(FormatError::InFile { .. }) => self,
            Self::FormatError(err) => FormatError::InFile {
                path: path.to_string(),
                source: Box::new(err),
            }
            .into(),
            other => other,
        }
    }

    /// Returns true for errors of the [`FormatError`] category
    #[must_use]
    pub fn is_format(&self) -> bool {
        matches!(self, Self::FormatError(_))
    }
}

/// Errors raised when a file or an in-memory value violates the binary layout
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    /// The magic number matched neither byte order
    #[error("Invalid magic number: {0:#010x}")]
    InvalidMagicNumber(u32),

    /// The format version in the header is not supported
    #[error("Invalid format version: {0} (expected 0)")]
    InvalidFormatVersion(u32),

    /// The reserved header field was not zero
    #[error("Invalid reserved field: {0} (expected 0)")]
    InvalidReservedField(u32),

    /// A directory entry does not lie after its predecessor
    #[error("Directory offset for {name} ({offset}) does not increase past the previous offset ({previous})")]
    NonIncreasingOffset {
        name: String,
        offset: u64,
        previous: u64,
    },

    /// A directory entry points outside of the file
    #[error("Directory offset for {name} ({offset}) lies outside of the file ({file_len} bytes)")]
    OffsetOutOfRange {
        name: String,
        offset: u64,
        file_len: u64,
    },

    /// The same sequence name appears more than once
    #[error("Duplicate sequence name: {0}")]
    DuplicateName(String),

    /// Sequence names must be 1 to 255 bytes long
    #[error("Invalid sequence name {name:?}: length {len} is outside of 1..=255")]
    InvalidName { name: String, len: usize },

    /// Empty sequences cannot be represented
    #[error("Sequence {0} is empty")]
    EmptySequence(String),

    /// Base counts are stored as 32-bit integers
    #[error("Sequence {name} has {len} bases, more than a 32-bit base count can hold")]
    SequenceTooLong { name: String, len: usize },

    /// An N-block or mask-block list is unsorted, overlapping, or out of range
    #[error("Sequence {name}: {kind} block {index} ({start}+{size}) is {problem} (sequence size {base_count})")]
    InvalidBlock {
        name: String,
        kind: &'static str,
        index: usize,
        start: u32,
        size: u32,
        base_count: u32,
        problem: &'static str,
    },

    /// Packed data does not hold exactly ceil(baseCount / 4) bytes
    #[error("Sequence {name}: packed data holds {got} bytes, expected {expected}")]
    InvalidPackedSize {
        name: String,
        expected: usize,
        got: usize,
    },

    /// Offsets are stored as 32-bit integers in version 0 files
    #[error("Record offset {0} does not fit the 32-bit offset field")]
    FileTooLarge(u64),

    /// A B+-tree header magic number matched neither byte order
    #[error("Invalid B+ tree magic number: {0:#010x}")]
    InvalidBptMagic(u32),

    /// A crTree header magic number matched neither byte order
    #[error("Invalid crTree magic number: {0:#010x}")]
    InvalidCrTreeMagic(u32),

    /// An R-tree header magic number matched neither byte order
    #[error("Invalid R tree magic number: {0:#010x}")]
    InvalidCirTreeMagic(u32),

    /// A B+-tree stores values of an unexpected width
    #[error("Invalid B+ tree value size: {got} (expected {expected})")]
    InvalidValueSize { expected: String, got: u32 },

    /// A key is wider than any B+-tree may store
    #[error("Key {key:?} is longer than the maximum key size ({key_size})")]
    KeyTooLong { key: String, key_size: u32 },

    /// The fixed key width of a B+-tree is zero or too large
    #[error("Invalid B+-tree key size: {0}")]
    InvalidKeySize(u32),

    /// Duplicate keys cannot be stored in a B+-tree
    #[error("Duplicate B+ tree key: {0:?}")]
    DuplicateKey(String),

    /// Block sizes must allow a fan-out of at least two
    #[error("Invalid block size: {0} (expected 2..=65535)")]
    InvalidBlockSize(u32),

    /// Leaf slots must hold at least one item
    #[error("Invalid items per slot: {0} (expected at least 1)")]
    InvalidItemsPerSlot(u32),

    /// An index node carried an unknown leaf flag
    #[error("Invalid index node at offset {offset}: leaf flag {flag}")]
    InvalidNode { offset: u64, flag: u8 },

    /// A child node does not lie after its parent
    #[error("Index node at offset {offset} points back to offset {child}")]
    InvalidChildOffset { offset: u64, child: u64 },

    /// An item ends before it starts
    #[error("Item {index} on {chrom} has start {start} past end {end}")]
    InvalidInterval {
        index: usize,
        chrom: String,
        start: u32,
        end: u32,
    },

    /// Wraps another format error with the path of the file that caused it
    #[error("{path}: {source}")]
    InFile {
        path: String,
        source: Box<FormatError>,
    },
}

/// Errors raised when crTree input violates its sorted-input precondition
#[derive(thiserror::Error, Debug)]
pub enum OrderingError {
    /// Two adjacent items are out of (chrom, start, end) order
    #[error("Items out of order at index {index}: {prev_chrom}:{prev_start}-{prev_end} precedes {chrom}:{start}-{end}")]
    UnsortedItems {
        index: usize,
        prev_chrom: String,
        prev_start: u32,
        prev_end: u32,
        chrom: String,
        start: u32,
        end: u32,
    },

    /// An item names a chromosome missing from the name table
    #[error("Item {index} refers to chromosome {chrom}, which is not in the name table")]
    UnknownChrom { index: usize, chrom: String },

    /// Item file offsets must not decrease
    #[error("Item {index} has file offset {offset}, before the previous item's offset {previous}")]
    DecreasingOffset {
        index: usize,
        previous: u64,
        offset: u64,
    },

    /// The data end offset must not lie before the last item
    #[error("Data file end offset {data_end} lies before the last item's offset {last}")]
    DataEndBeforeLastItem { data_end: u64, last: u64 },
}

/// Errors raised when a requested fragment lies outside of its sequence
#[derive(thiserror::Error, Debug)]
pub enum RangeError {
    /// Fragment bounds outside of [0, size] or start > end
    #[error("{file}: fragment {start}-{end} of {name} is out of range (sequence size {size})")]
    InvalidFragment {
        file: String,
        name: String,
        start: usize,
        end: usize,
        size: u32,
    },
}

/// Errors raised when a named entity is absent
#[derive(thiserror::Error, Debug)]
pub enum NotFoundError {
    /// The named sequence is not present in the index
    #[error("{file}: sequence {name} not found")]
    Sequence { file: String, name: String },
}

/// Errors raised by operations that the current open mode cannot serve
#[derive(thiserror::Error, Debug)]
pub enum UnsupportedError {
    /// Names cannot be enumerated through an external B+-tree index
    #[error("{file}: sequence names cannot be listed when opened with an external index")]
    NameEnumeration { file: String },

    /// Parallel processing reopens the file and needs to know its path
    #[error("{file}: parallel processing requires a handle opened from a path")]
    MissingPath { file: String },
}

/// Errors raised by operations on a handle in the wrong lifecycle state
#[derive(thiserror::Error, Debug)]
pub enum InvalidStateError {
    /// The handle has been closed
    #[error("{file}: handle is closed")]
    Closed { file: String },
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_in_file_keeps_category() {
        let err: Error = FormatError::InvalidFormatVersion(3).into();
        let err = err.in_file("reads.2bit");
        assert!(err.is_format());
        assert_eq!(
            err.to_string(),
            "reads.2bit: Invalid format version: 3 (expected 0)"
        );

        // wrapping twice keeps the innermost path
        let err = err.in_file("other.2bit");
        assert!(err.to_string().starts_with("reads.2bit"));
    }

    #[test]
    fn test_in_file_ignores_other_categories() {
        let err: Error = NotFoundError::Sequence {
            file: "a.2bit".to_string(),
            name: "chrZ".to_string(),
        }
        .into();
        let err = err.in_file("b.2bit");
        assert!(matches!(err, Error::NotFoundError(_)));
        assert_eq!(err.to_string(), "a.2bit: sequence chrZ not found");
    }
}
