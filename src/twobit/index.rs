//! Name to record offset lookup
//!
//! A twoBit file carries its own directory right after the header. Collections too
//! large to scan at every open can instead be paired with a standalone B+-tree file
//! mapping names to offsets, in which case the directory is never read.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use indexmap::IndexMap;

use super::header::TwoBitHeader;
use crate::bpt::BptFile;
use crate::error::{FormatError, Result};

/// Where the record offsets of an open file come from
pub(crate) enum SequenceIndex {
    /// The in-file directory, in on-disk order
    Directory(IndexMap<String, u64>),

    /// A separate B+-tree file; names cannot be enumerated
    External(BptFile<BufReader<File>>),
}
impl SequenceIndex {
    /// Reads the directory that follows the header
    ///
    /// The reader must be positioned right after the header. Offsets must strictly
    /// increase and lie inside the file, and names must be unique.
    pub fn read_directory<R: Read + Seek>(reader: &mut R, header: &TwoBitHeader) -> Result<Self> {
        let start = reader.stream_position()?;
        let file_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(start))?;

        let mut offsets = IndexMap::with_capacity(header.sequence_count.min(1 << 20) as usize);
        let mut previous = None;
        let mut name_buf = Vec::with_capacity(256);
        for _ in 0..header.sequence_count {
            let mut len = [0u8; 1];
            reader.read_exact(&mut len)?;
            name_buf.resize(len[0] as usize, 0);
            reader.read_exact(&mut name_buf)?;
            let name = std::str::from_utf8(&name_buf)?.to_string();
            let offset = u64::from(header.endian.read_u32_from(reader)?);

            if name.is_empty() {
                return Err(FormatError::InvalidName { name, len: 0 }.into());
            }
            if let Some(previous) = previous.filter(|&previous| offset <= previous) {
                return Err(FormatError::NonIncreasingOffset {
                    name,
                    offset,
                    previous,
                }
                .into());
            }
            if offset >= file_len {
                return Err(FormatError::OffsetOutOfRange {
                    name,
                    offset,
                    file_len,
                }
                .into());
            }
            if offsets.contains_key(&name) {
                return Err(FormatError::DuplicateName(name).into());
            }
            previous = Some(offset);
            offsets.insert(name, offset);
        }
        Ok(Self::Directory(offsets))
    }

    /// Attaches a standalone B+-tree index
    ///
    /// Values are record offsets, stored as 32- or 64-bit integers.
    pub fn external(bpt: BptFile<BufReader<File>>) -> Result<Self> {
        match bpt.header().val_size {
            4 | 8 => Ok(Self::External(bpt)),
            got => Err(FormatError::InvalidValueSize {
                expected: "4 or 8".to_string(),
                got,
            }
            .into()),
        }
    }

    /// Returns the record offset of `name`, if present
    pub fn lookup(&mut self, name: &str) -> Result<Option<u64>> {
        match self {
            Self::Directory(offsets) => Ok(offsets.get(name).copied()),
            Self::External(bpt) => {
                let endian = bpt.header().endian;
                Ok(bpt.find(name.as_bytes())?.map(|value| decode_offset(endian, &value)))
            }
        }
    }

    /// Names in directory order, or `None` for an external index
    pub fn names(&self) -> Option<impl Iterator<Item = &str>> {
        match self {
            Self::Directory(offsets) => Some(offsets.keys().map(String::as_str)),
            Self::External(_) => None,
        }
    }

    /// Every record offset, in directory order for the in-file directory and in
    /// name order for an external index
    pub fn offsets(&mut self) -> Result<Vec<u64>> {
        match self {
            Self::Directory(offsets) => Ok(offsets.values().copied().collect()),
            Self::External(bpt) => {
                let endian = bpt.header().endian;
                Ok(bpt
                    .traverse()?
                    .iter()
                    .map(|(_, value)| decode_offset(endian, value))
                    .collect())
            }
        }
    }

    /// Number of sequences reachable through this index
    pub fn len(&self) -> u64 {
        match self {
            Self::Directory(offsets) => offsets.len() as u64,
            Self::External(bpt) => bpt.header().item_count,
        }
    }
}

fn decode_offset(endian: crate::Endian, value: &[u8]) -> u64 {
    if value.len() == 4 {
        u64::from(endian.read_u32(value))
    } else {
        endian.read_u64(value)
    }
}

#[cfg(test)]
mod testing {
    use std::io::Cursor;

    use super::*;
    use crate::{Endian, Error};

    fn directory_bytes(endian: Endian, entries: &[(&str, u32)], pad_to: usize) -> Vec<u8> {
        let mut bytes = Vec::new();
        TwoBitHeader::new(entries.len() as u32, endian)
            .write_bytes(&mut bytes)
            .unwrap();
        for (name, offset) in entries {
            bytes.push(name.len() as u8);
            bytes.extend_from_slice(name.as_bytes());
            endian.write_u32_to(&mut bytes, *offset).unwrap();
        }
        bytes.resize(pad_to.max(bytes.len()), 0);
        bytes
    }

    fn read(bytes: Vec<u8>) -> Result<SequenceIndex> {
        let mut cursor = Cursor::new(bytes);
        let header = TwoBitHeader::from_reader(&mut cursor)?;
        SequenceIndex::read_directory(&mut cursor, &header)
    }

    #[test]
    fn test_directory_order_and_lookup() -> Result<()> {
        for endian in [Endian::Little, Endian::Big] {
            let bytes = directory_bytes(endian, &[("chrB", 40), ("chrA", 60)], 100);
            let mut index = read(bytes)?;
            assert_eq!(index.len(), 2);
            assert_eq!(index.lookup("chrA")?, Some(60));
            assert_eq!(index.lookup("chrB")?, Some(40));
            assert_eq!(index.lookup("chrC")?, None);
            let names: Vec<&str> = index.names().into_iter().flatten().collect();
            assert_eq!(names, vec!["chrB", "chrA"]);
        }
        Ok(())
    }

    #[test]
    fn test_non_increasing_offset() {
        let bytes = directory_bytes(Endian::Little, &[("a", 60), ("b", 60)], 100);
        assert!(matches!(
            read(bytes),
            Err(Error::FormatError(FormatError::NonIncreasingOffset {
                offset: 60,
                previous: 60,
                ..
            }))
        ));
    }

    #[test]
    fn test_offset_out_of_range() {
        let bytes = directory_bytes(Endian::Big, &[("a", 30), ("b", 500)], 100);
        assert!(matches!(
            read(bytes),
            Err(Error::FormatError(FormatError::OffsetOutOfRange {
                offset: 500,
                file_len: 100,
                ..
            }))
        ));
    }

    #[test]
    fn test_truncated_directory() {
        let mut bytes = directory_bytes(Endian::Little, &[("chr1", 40)], 0);
        bytes.truncate(bytes.len() - 2);
        assert!(matches!(read(bytes), Err(Error::IoError(_))));
    }
}
