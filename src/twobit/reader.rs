//! Random access reader for twoBit files
//!
//! A [`TwoBitFile`] reads the header and the name index when it is opened and
//! nothing else. Every fragment read seeks to the sequence's record, parses its
//! header (unless the caller supplies a [`SequenceCache`] holding it), and reads
//! only the packed bytes covering the requested bases.
//!
//! ## Example
//!
//! ```no_run
//! use twobit::TwoBitFile;
//!
//! # fn main() -> twobit::Result<()> {
//! let mut genome = TwoBitFile::open("hg38.2bit")?;
//! let exon = genome.read_fragment("chr1", 11_873, 12_227, true)?;
//! println!("{}", String::from_utf8_lossy(&exon));
//! genome.close();
//! # Ok(())
//! # }
//! ```

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use memmap2::Mmap;

use super::cache::SequenceCache;
use super::codec::{decode_window, resolve_fragment, PackedSequence, IN_MEMORY};
use super::header::TwoBitHeader;
use super::index::SequenceIndex;
use super::record::SequenceRecord;
use crate::bpt::BptFile;
use crate::error::{InvalidStateError, NotFoundError, Result, UnsupportedError};

/// Source of handle identities, one per opened file
static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(0);

fn next_handle_id() -> u64 {
    NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed)
}

/// State that only exists while the handle is open
struct OpenFile<R> {
    reader: R,
    header: TwoBitHeader,
    index: SequenceIndex,
}

/// An open handle over a twoBit file
///
/// The handle owns its reader and is not shared between threads; open one handle
/// per thread instead, which only costs a header and directory read.
pub struct TwoBitFile<R: Read + Seek = BufReader<File>> {
    inner: Option<OpenFile<R>>,

    /// Identity of this handle, distinct across every handle opened by the process
    id: u64,

    /// File name used in error messages
    source: String,

    /// Path of the file on disk, if it was opened from one
    path: Option<PathBuf>,

    /// Path of the external B+-tree index, if one is attached
    index_path: Option<PathBuf>,
}

impl TwoBitFile<BufReader<File>> {
    /// Opens a twoBit file and reads its directory
    ///
    /// # Errors
    ///
    /// Returns a `FormatError` carrying the path if the header or directory is
    /// malformed, or an `IoError` if the file cannot be read.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = path.display().to_string();
        let reader = File::open(path).map(BufReader::new)?;
        let mut file = Self::with_directory(reader, &source)?;
        file.path = Some(path.to_path_buf());
        Ok(file)
    }

    /// Opens a twoBit file using a separate B+-tree index for name lookups
    ///
    /// The in-file directory is skipped entirely. Names cannot be enumerated
    /// through the resulting handle.
    pub fn open_with_external_index<P: AsRef<Path>, Q: AsRef<Path>>(
        path: P,
        index_path: Q,
    ) -> Result<Self> {
        let path = path.as_ref();
        let index_path = index_path.as_ref();
        let source = path.display().to_string();

        let mut reader = File::open(path).map(BufReader::new)?;
        let header = TwoBitHeader::from_reader(&mut reader).map_err(|e| e.in_file(&source))?;
        let bpt = BptFile::open(index_path)
            .and_then(SequenceIndex::external)
            .map_err(|e| e.in_file(&index_path.display().to_string()))?;
        log::debug!(
            "opened {source} with external index {}: {} sequences",
            index_path.display(),
            bpt.len()
        );
        Ok(Self {
            inner: Some(OpenFile {
                reader,
                header,
                index: bpt,
            }),
            id: next_handle_id(),
            source,
            path: Some(path.to_path_buf()),
            index_path: Some(index_path.to_path_buf()),
        })
    }
}

impl TwoBitFile<Cursor<Mmap>> {
    /// Opens a twoBit file through a read-only memory map
    pub fn open_mmap<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = path.display().to_string();
        let file = File::open(path)?;

        // Safety: the file is open and twoBit files are never modified once written
        let mmap = unsafe { Mmap::map(&file)? };

        let mut handle = Self::with_directory(Cursor::new(mmap), &source)?;
        handle.path = Some(path.to_path_buf());
        Ok(handle)
    }
}

impl<R: Read + Seek> TwoBitFile<R> {
    /// Reads a twoBit file from any seekable reader, starting at position zero
    pub fn new(reader: R) -> Result<Self> {
        Self::with_directory(reader, IN_MEMORY)
    }

    fn with_directory(mut reader: R, source: &str) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;
        let header = TwoBitHeader::from_reader(&mut reader).map_err(|e| e.in_file(source))?;
        let index =
            SequenceIndex::read_directory(&mut reader, &header).map_err(|e| e.in_file(source))?;
        log::debug!(
            "opened {source}: {} sequences, {} byte order{}",
            header.sequence_count,
            if header.endian == crate::Endian::Big { "big" } else { "little" },
            if header.is_byte_swapped() { " (swapped)" } else { "" }
        );
        Ok(Self {
            inner: Some(OpenFile {
                reader,
                header,
                index,
            }),
            id: next_handle_id(),
            source: source.to_string(),
            path: None,
            index_path: None,
        })
    }

    fn open_file(&mut self) -> Result<&mut OpenFile<R>> {
        let source = &self.source;
        self.inner.as_mut().ok_or_else(|| {
            InvalidStateError::Closed {
                file: source.clone(),
            }
            .into()
        })
    }

    fn open_ref(&self) -> Result<&OpenFile<R>> {
        self.inner.as_ref().ok_or_else(|| {
            InvalidStateError::Closed {
                file: self.source.clone(),
            }
            .into()
        })
    }

    /// Resolves `name` to the offset of its record
    fn locate(&mut self, name: &str) -> Result<u64> {
        let source = self.source.clone();
        let file = self.open_file()?;
        file.index.lookup(name)?.ok_or_else(|| {
            NotFoundError::Sequence {
                file: source,
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Parses the record header at `offset`
    ///
    /// Returns the record and the offset of its first packed byte.
    fn read_record(&mut self, name: &str, offset: u64) -> Result<(SequenceRecord, u64)> {
        let source = self.source.clone();
        let file = self.open_file()?;
        file.reader.seek(SeekFrom::Start(offset))?;
        let record = SequenceRecord::from_reader(&mut file.reader, file.header.endian, name)
            .map_err(|e| e.in_file(&source))?;
        let dna_offset = offset + record.header_size() as u64;
        Ok((record, dna_offset))
    }

    /// Reads and decodes `[start, end)` given an already parsed record header
    fn read_window(
        &mut self,
        name: &str,
        record: &SequenceRecord,
        dna_offset: u64,
        frag_start: usize,
        frag_end: usize,
        do_mask: bool,
    ) -> Result<Vec<u8>> {
        self.open_ref()?;
        let (start, end) =
            resolve_fragment(&self.source, name, frag_start, frag_end, record.base_count)?;
        let lbound = start / 4;
        let rbound = end.div_ceil(4);
        log::trace!(
            "{}: reading {name}:{start}-{end} from packed bytes {lbound}..{rbound}",
            self.source
        );

        let file = self.open_file()?;
        let mut window = vec![0u8; rbound - lbound];
        file.reader
            .seek(SeekFrom::Start(dna_offset + lbound as u64))?;
        file.reader.read_exact(&mut window)?;
        Ok(decode_window(
            record,
            &window,
            lbound * 4,
            start,
            end,
            do_mask,
        ))
    }

    /// Reads the bases in `[frag_start, frag_end)` of sequence `name`
    ///
    /// `0, 0` reads the whole sequence. Unknown bases read back as `N`; when
    /// `do_mask` is set, soft-masked bases read back in lower case.
    ///
    /// # Errors
    ///
    /// * `NotFoundError` if the sequence is not in the index
    /// * `RangeError` if the fragment lies outside of the sequence
    /// * `InvalidStateError` if the handle is closed
    pub fn read_fragment(
        &mut self,
        name: &str,
        frag_start: usize,
        frag_end: usize,
        do_mask: bool,
    ) -> Result<Vec<u8>> {
        let offset = self.locate(name)?;
        let (record, dna_offset) = self.read_record(name, offset)?;
        self.read_window(name, &record, dna_offset, frag_start, frag_end, do_mask)
    }

    /// Like [`read_fragment`](Self::read_fragment), but parses each record header
    /// at most once per cache
    ///
    /// The cache belongs to the caller and is tied to the handle it was last used
    /// with. Using it with another handle, even one over the same path, clears it
    /// first.
    pub fn read_fragment_cached(
        &mut self,
        cache: &mut SequenceCache,
        name: &str,
        frag_start: usize,
        frag_end: usize,
        do_mask: bool,
    ) -> Result<Vec<u8>> {
        self.open_ref()?;
        cache.bind(self.id);
        if let Some((record, dna_offset)) = cache.get(name) {
            return self.read_window(name, record, dna_offset, frag_start, frag_end, do_mask);
        }
        let offset = self.locate(name)?;
        let (record, dna_offset) = self.read_record(name, offset)?;
        let bases = self.read_window(name, &record, dna_offset, frag_start, frag_end, do_mask)?;
        cache.insert(name, record, dna_offset);
        Ok(bases)
    }

    /// Returns the record header (base count and block lists) of `name`
    pub fn sequence_record(&mut self, name: &str) -> Result<SequenceRecord> {
        let offset = self.locate(name)?;
        self.read_record(name, offset).map(|(record, _)| record)
    }

    /// Reads a whole record, packed bases included, without decoding it
    pub fn read_packed(&mut self, name: &str) -> Result<PackedSequence> {
        let offset = self.locate(name)?;
        let (record, dna_offset) = self.read_record(name, offset)?;
        let file = self.open_file()?;
        let mut packed = vec![0u8; record.packed_size()];
        file.reader.seek(SeekFrom::Start(dna_offset))?;
        file.reader.read_exact(&mut packed)?;
        PackedSequence::from_parts(name, record, packed)
    }

    /// Number of bases in `name`
    ///
    /// Only the base count field of the record is read.
    pub fn sequence_size(&mut self, name: &str) -> Result<u32> {
        let offset = self.locate(name)?;
        self.base_count_at(offset)
    }

    fn base_count_at(&mut self, offset: u64) -> Result<u32> {
        let file = self.open_file()?;
        file.reader.seek(SeekFrom::Start(offset))?;
        Ok(file.header.endian.read_u32_from(&mut file.reader)?)
    }

    /// Number of `N` bases in `name`
    pub fn n_base_count(&mut self, name: &str) -> Result<u64> {
        Ok(self.sequence_record(name)?.n_base_count())
    }

    /// Number of soft-masked bases in `name`
    pub fn masked_base_count(&mut self, name: &str) -> Result<u64> {
        Ok(self.sequence_record(name)?.masked_base_count())
    }

    /// Sum of the base counts of every sequence
    ///
    /// Reads one integer per sequence.
    pub fn total_base_count(&mut self) -> Result<u64> {
        let offsets = self.open_file()?.index.offsets()?;
        let mut total = 0;
        for offset in offsets {
            total += u64::from(self.base_count_at(offset)?);
        }
        Ok(total)
    }

    /// Names of all sequences in file order
    ///
    /// # Errors
    ///
    /// Returns an `UnsupportedError` if the file was opened with an external index.
    pub fn sequence_names(&self) -> Result<Vec<String>> {
        let file = self.open_ref()?;
        match file.index.names() {
            Some(names) => Ok(names.map(str::to_string).collect()),
            None => Err(UnsupportedError::NameEnumeration {
                file: self.source.clone(),
            }
            .into()),
        }
    }

    /// Whether `name` is present in the index
    pub fn contains(&mut self, name: &str) -> Result<bool> {
        Ok(self.open_file()?.index.lookup(name)?.is_some())
    }

    /// Number of sequences reachable through the index
    pub fn sequence_count(&self) -> Result<u64> {
        Ok(self.open_ref()?.index.len())
    }

    /// The file header
    pub fn header(&self) -> Result<TwoBitHeader> {
        Ok(self.open_ref()?.header)
    }

    /// Whether the file's integers are stored in the opposite order to the host
    pub fn is_byte_swapped(&self) -> Result<bool> {
        Ok(self.open_ref()?.header.is_byte_swapped())
    }

    /// Whether names are resolved through an external B+-tree index
    #[must_use]
    pub fn has_external_index(&self) -> bool {
        self.index_path.is_some()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// Path of the file, if it was opened from one
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Path of the external index, if one is attached
    #[must_use]
    pub fn index_path(&self) -> Option<&Path> {
        self.index_path.as_deref()
    }

    /// Name of the file used in error messages
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Releases the reader and the index
    ///
    /// Closing an already closed handle does nothing. Every other operation on a
    /// closed handle fails with an `InvalidStateError`.
    pub fn close(&mut self) {
        if self.inner.take().is_some() {
            log::debug!("closed {}", self.source);
        }
    }
}

#[cfg(test)]
mod testing {
    use std::io::Cursor;

    use super::*;
    use crate::twobit::TwoBitWriterBuilder;
    use crate::{Endian, Error, FormatError, RangeError};

    fn build(endian: Endian, sequences: &[(&str, &[u8])]) -> Result<Vec<u8>> {
        let mut writer = TwoBitWriterBuilder::default().endian(endian).build();
        for (name, seq) in sequences {
            writer.add_sequence(name, seq)?;
        }
        let mut bytes = Vec::new();
        writer.write(&mut bytes)?;
        Ok(bytes)
    }

    fn sample() -> Result<TwoBitFile<Cursor<Vec<u8>>>> {
        let bytes = build(
            Endian::Little,
            &[
                ("chr1", b"ACGTacgtNNNNacgtACGT"),
                ("chrM", b"GATTACA"),
            ],
        )?;
        TwoBitFile::new(Cursor::new(bytes))
    }

    #[test]
    fn test_fragments() -> Result<()> {
        let mut file = sample()?;
        assert_eq!(file.read_fragment("chr1", 0, 0, true)?, b"ACGTacgtNNNNacgtACGT");
        assert_eq!(file.read_fragment("chr1", 8, 12, true)?, b"NNNN");
        assert_eq!(file.read_fragment("chr1", 0, 20, false)?, b"ACGTACGTNNNNACGTACGT");
        assert_eq!(file.read_fragment("chr1", 3, 9, true)?, b"TacgtN");
        assert_eq!(file.read_fragment("chrM", 2, 7, false)?, b"TTACA");
        assert_eq!(file.read_fragment("chrM", 7, 7, true)?, b"");
        Ok(())
    }

    #[test]
    fn test_lookups_and_counts() -> Result<()> {
        let mut file = sample()?;
        assert_eq!(file.sequence_names()?, vec!["chr1", "chrM"]);
        assert_eq!(file.sequence_count()?, 2);
        assert_eq!(file.sequence_size("chr1")?, 20);
        assert_eq!(file.sequence_size("chrM")?, 7);
        assert_eq!(file.total_base_count()?, 27);
        assert_eq!(file.n_base_count("chr1")?, 4);
        assert_eq!(file.masked_base_count("chr1")?, 8);
        assert!(file.contains("chrM")?);
        assert!(!file.contains("chrY")?);
        assert!(!file.is_byte_swapped()? || Endian::native() == Endian::Big);
        Ok(())
    }

    #[test]
    fn test_read_packed_matches_encode() -> Result<()> {
        let mut file = sample()?;
        let packed = file.read_packed("chr1")?;
        let expected = PackedSequence::encode("chr1", b"ACGTacgtNNNNacgtACGT", true)?;
        assert_eq!(packed, expected);
        assert_eq!(file.sequence_record("chr1")?, *expected.record());
        Ok(())
    }

    #[test]
    fn test_errors_leave_handle_usable() -> Result<()> {
        let mut file = sample()?;
        assert!(matches!(
            file.read_fragment("chrZ", 0, 0, true),
            Err(Error::NotFoundError(_))
        ));
        assert!(matches!(
            file.read_fragment("chrM", 5, 3, true),
            Err(Error::RangeError(RangeError::InvalidFragment { start: 5, end: 3, .. }))
        ));
        assert!(matches!(
            file.read_fragment("chrM", 0, 8, true),
            Err(Error::RangeError(_))
        ));
        assert_eq!(file.read_fragment("chrM", 0, 0, true)?, b"GATTACA");
        Ok(())
    }

    #[test]
    fn test_cached_reads() -> Result<()> {
        let mut file = sample()?;
        let mut cache = SequenceCache::default();
        assert_eq!(file.read_fragment_cached(&mut cache, "chr1", 4, 8, true)?, b"acgt");
        assert_eq!(cache.len(), 1);
        assert_eq!(file.read_fragment_cached(&mut cache, "chr1", 10, 14, true)?, b"NNac");
        assert_eq!(cache.len(), 1);
        assert_eq!(file.read_fragment_cached(&mut cache, "chrM", 0, 0, true)?, b"GATTACA");
        assert_eq!(cache.len(), 2);
        Ok(())
    }

    #[test]
    fn test_closed_handle() -> Result<()> {
        let mut file = sample()?;
        file.close();
        file.close();
        assert!(!file.is_open());
        assert!(matches!(
            file.read_fragment("chr1", 0, 0, true),
            Err(Error::InvalidStateError(_))
        ));
        assert!(matches!(file.sequence_names(), Err(Error::InvalidStateError(_))));
        assert!(matches!(file.total_base_count(), Err(Error::InvalidStateError(_))));
        Ok(())
    }

    #[test]
    fn test_corrupt_record_names_file() -> Result<()> {
        let mut bytes = build(Endian::Big, &[("chrM", b"GATTACA")])?;
        // reserved word sits right before the two packed bytes
        let reserved = bytes.len() - 2 - 4;
        bytes[reserved + 3] = 1;
        let mut file = TwoBitFile::new(Cursor::new(bytes))?;
        let err = file.read_fragment("chrM", 0, 0, true).unwrap_err();
        assert!(matches!(
            err,
            Error::FormatError(FormatError::InFile { .. })
        ));
        assert!(err.to_string().starts_with(IN_MEMORY));
        Ok(())
    }

    #[test]
    fn test_truncated_packed_data() -> Result<()> {
        let mut bytes = build(Endian::Little, &[("chr1", b"ACGTACGTACGT")])?;
        bytes.truncate(bytes.len() - 1);
        let mut file = TwoBitFile::new(Cursor::new(bytes))?;
        assert!(matches!(
            file.read_fragment("chr1", 0, 0, true),
            Err(Error::IoError(_))
        ));
        // the leading bytes are still readable
        assert_eq!(file.read_fragment("chr1", 0, 8, true)?, b"ACGTACGT");
        Ok(())
    }

    #[test]
    fn test_cache_does_not_leak_between_handles() -> Result<()> {
        let mut cache = SequenceCache::new();
        let mut first =
            TwoBitFile::new(Cursor::new(build(Endian::Little, &[("chr1", b"ACGTACGT")])?))?;
        let mut second =
            TwoBitFile::new(Cursor::new(build(Endian::Little, &[("chr1", &[b'N'; 16])])?))?;
        assert_eq!(first.read_fragment_cached(&mut cache, "chr1", 0, 0, true)?, b"ACGTACGT");
        assert_eq!(
            second.read_fragment_cached(&mut cache, "chr1", 0, 0, true)?,
            second.read_fragment("chr1", 0, 0, true)?
        );
        assert_eq!(second.read_fragment_cached(&mut cache, "chr1", 0, 0, true)?, [b'N'; 16]);
        assert_eq!(first.read_fragment_cached(&mut cache, "chr1", 2, 6, false)?, b"GTAC");
        Ok(())
    }

    #[test]
    fn test_cached_read_on_closed_handle() -> Result<()> {
        let mut file = sample()?;
        let mut cache = SequenceCache::new();
        file.read_fragment_cached(&mut cache, "chrM", 0, 0, true)?;
        file.close();
        assert!(matches!(
            file.read_fragment_cached(&mut cache, "chrM", 0, 99, true),
            Err(Error::InvalidStateError(_))
        ));
        assert!(matches!(
            file.read_fragment_cached(&mut cache, "chrM", 0, 3, true),
            Err(Error::InvalidStateError(_))
        ));
        Ok(())
    }
}
