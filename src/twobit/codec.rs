//! Two-bit packing and unpacking of nucleotide sequences
//!
//! Four bases are packed into every byte, first base in the most significant bits.
//! The two-bit codes are fixed by the format: `T=0, C=1, A=2, G=3`.
//! Bases outside of `ACGT` are stored as `T` (code 0) and recorded as N-blocks,
//! lower-case bases are optionally recorded as mask-blocks.

use std::io::Write;

use super::block::{self, Block};
use super::header::MAX_NAME_LEN;
use super::record::SequenceRecord;
use crate::endian::Endian;
use crate::error::{FormatError, RangeError, Result};

/// Bases indexed by their two-bit code
pub const NUC: &[u8; 4] = b"TCAG";

/// Placeholder file name used in errors raised on in-memory sequences
pub(crate) const IN_MEMORY: &str = "<memory>";

/// Four decoded bases for every possible packed byte
static UNPACK: [[u8; 4]; 256] = build_unpack_table();

const fn build_unpack_table() -> [[u8; 4]; 256] {
    let mut table = [[0u8; 4]; 256];
    let mut byte = 0;
    while byte < 256 {
        let mut i = 0;
        while i < 4 {
            table[byte][i] = NUC[(byte >> (6 - 2 * i)) & 3];
            i += 1;
        }
        byte += 1;
    }
    table
}

/// Returns the two-bit code of a base, or `None` for anything outside of `ACGTacgt`
#[inline]
#[must_use]
pub fn base_code(base: u8) -> Option<u8> {
    match base {
        b'T' | b't' => Some(0),
        b'C' | b'c' => Some(1),
        b'A' | b'a' => Some(2),
        b'G' | b'g' => Some(3),
        _ => None,
    }
}

/// Packs a sequence four bases per byte and appends the bytes to `packed`
///
/// Unused low bits of a trailing partial byte are zero.
pub fn pack(sequence: &[u8], packed: &mut Vec<u8>) {
    packed.reserve(sequence.len().div_ceil(4));
    for chunk in sequence.chunks(4) {
        let byte = chunk.iter().enumerate().fold(0u8, |acc, (i, &base)| {
            acc | (base_code(base).unwrap_or(0) << (6 - 2 * i))
        });
        packed.push(byte);
    }
}

/// Appends `len` bases, starting at base `skip` of `packed`, to `out`
///
/// # Panics
///
/// Panics if `packed` holds fewer than `skip + len` bases.
pub fn unpack(packed: &[u8], skip: usize, len: usize, out: &mut Vec<u8>) {
    let end = skip + len;
    let mut pos = skip;
    out.reserve(len);

    // leading partial byte
    while pos < end && pos % 4 != 0 {
        out.push(UNPACK[packed[pos / 4] as usize][pos % 4]);
        pos += 1;
    }
    while pos + 4 <= end {
        out.extend_from_slice(&UNPACK[packed[pos / 4] as usize]);
        pos += 4;
    }
    // trailing partial byte
    while pos < end {
        out.push(UNPACK[packed[pos / 4] as usize][pos % 4]);
        pos += 1;
    }
}

/// Checks a sequence name against the one-byte length prefix of the directory
pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(FormatError::InvalidName {
            name: name.to_string(),
            len: name.len(),
        }
        .into());
    }
    Ok(())
}

/// Resolves `[start, end)` against a sequence of `size` bases
///
/// `start == end == 0` selects the whole sequence.
pub(crate) fn resolve_fragment(
    file: &str,
    name: &str,
    start: usize,
    end: usize,
    size: u32,
) -> Result<(usize, usize)> {
    if start == 0 && end == 0 {
        return Ok((0, size as usize));
    }
    if start > end || end > size as usize {
        return Err(RangeError::InvalidFragment {
            file: file.to_string(),
            name: name.to_string(),
            start,
            end,
            size,
        }
        .into());
    }
    Ok((start, end))
}

/// Decodes `[start, end)` from a window of packed bytes
///
/// `window` begins at base `window_start` of the sequence, which must be a multiple
/// of four and no greater than `start`. N-blocks are always applied, mask-blocks
/// only when `do_mask` is set.
pub(crate) fn decode_window(
    record: &SequenceRecord,
    window: &[u8],
    window_start: usize,
    start: usize,
    end: usize,
    do_mask: bool,
) -> Vec<u8> {
    debug_assert_eq!(window_start % 4, 0);
    let mut out = Vec::with_capacity(end - start);
    unpack(window, start - window_start, end - start, &mut out);
    block::apply_hard_mask(&record.n_blocks, &mut out, start);
    if do_mask {
        block::apply_soft_mask(&record.mask_blocks, &mut out, start);
    }
    out
}

/// One named DNA sequence in two-bit form
///
/// Holds the full packed data of the sequence together with its record header.
/// Sequences read from a file through fragment reads never materialize this type;
/// it is produced by [`PackedSequence::encode`] or by reading a whole record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedSequence {
    name: String,
    record: SequenceRecord,
    packed: Vec<u8>,
}
impl PackedSequence {
    /// Packs a nucleotide sequence
    ///
    /// Every maximal run of bases outside of `ACGT` (either case) becomes one
    /// N-block. When `apply_masking` is set, every maximal run of lower-case bases
    /// becomes one mask-block; otherwise case is ignored.
    ///
    /// # Errors
    ///
    /// Returns a `FormatError` if:
    /// * The sequence is empty
    /// * The name is empty or longer than 255 bytes
    /// * The sequence has more bases than a 32-bit count can hold
    pub fn encode(name: &str, sequence: &[u8], apply_masking: bool) -> Result<Self> {
        validate_name(name)?;
        if sequence.is_empty() {
            return Err(FormatError::EmptySequence(name.to_string()).into());
        }
        let Ok(base_count) = u32::try_from(sequence.len()) else {
            return Err(FormatError::SequenceTooLong {
                name: name.to_string(),
                len: sequence.len(),
            }
            .into());
        };

        let n_blocks = block::find_runs(sequence, |base| base_code(base).is_none());
        let mask_blocks = if apply_masking {
            block::find_runs(sequence, |base| base.is_ascii_lowercase())
        } else {
            Vec::new()
        };

        let mut packed = Vec::new();
        pack(sequence, &mut packed);

        Ok(Self {
            name: name.to_string(),
            record: SequenceRecord::new(base_count, n_blocks, mask_blocks),
            packed,
        })
    }

    /// Assembles a sequence from a record header and its packed bytes
    pub fn from_parts(name: &str, record: SequenceRecord, packed: Vec<u8>) -> Result<Self> {
        validate_name(name)?;
        if record.base_count == 0 {
            return Err(FormatError::EmptySequence(name.to_string()).into());
        }
        if packed.len() != record.packed_size() {
            return Err(FormatError::InvalidPackedSize {
                name: name.to_string(),
                expected: record.packed_size(),
                got: packed.len(),
            }
            .into());
        }
        record.validate(name)?;
        Ok(Self {
            name: name.to_string(),
            record,
            packed,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn record(&self) -> &SequenceRecord {
        &self.record
    }

    #[must_use]
    pub fn base_count(&self) -> u32 {
        self.record.base_count
    }

    /// Number of bases, without touching the packed data
    #[must_use]
    pub fn sequence_size(&self) -> u32 {
        self.record.base_count
    }

    #[must_use]
    pub fn n_blocks(&self) -> &[Block] {
        &self.record.n_blocks
    }

    #[must_use]
    pub fn mask_blocks(&self) -> &[Block] {
        &self.record.mask_blocks
    }

    #[must_use]
    pub fn packed_data(&self) -> &[u8] {
        &self.packed
    }

    /// Decodes the bases in `[frag_start, frag_end)`
    ///
    /// `0, 0` decodes the whole sequence. Only the bytes covering the fragment are
    /// unpacked.
    ///
    /// # Errors
    ///
    /// Returns a `RangeError` if `frag_start > frag_end` or `frag_end` exceeds the
    /// number of bases.
    pub fn decode_fragment(&self, frag_start: usize, frag_end: usize, do_mask: bool) -> Result<Vec<u8>> {
        let (start, end) =
            resolve_fragment(IN_MEMORY, &self.name, frag_start, frag_end, self.base_count())?;
        let lbound = start / 4;
        let rbound = end.div_ceil(4);
        Ok(decode_window(
            &self.record,
            &self.packed[lbound..rbound],
            lbound * 4,
            start,
            end,
            do_mask,
        ))
    }

    /// Decodes the whole sequence
    #[must_use]
    pub fn decode(&self, do_mask: bool) -> Vec<u8> {
        decode_window(
            &self.record,
            &self.packed,
            0,
            0,
            self.base_count() as usize,
            do_mask,
        )
    }

    /// Writes the record header followed by the packed bases
    pub fn write_bytes<W: Write>(&self, writer: &mut W, endian: Endian) -> Result<()> {
        self.record.write_bytes(writer, endian)?;
        writer.write_all(&self.packed)?;
        Ok(())
    }
}
