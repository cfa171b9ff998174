//! # bpt
//!
//! A disk-resident B+-tree mapping fixed-width keys to fixed-width values.
//!
//! It is the name index of both other formats in this crate: crTree files use it
//! to map chromosome names to dense integer IDs, and twoBit collections too large
//! for an in-file directory scan use a standalone B+-tree file mapping sequence
//! names to record offsets.
//!
//! ## Layout
//!
//! A 32-byte [`BptHeader`] followed by the root node. Every node starts with
//! `isLeaf: u8, reserved: u8, count: u16` followed by `count` slots: `(key, value)`
//! in leaves, `(key, childOffset: u64)` in internal nodes. Keys are zero-padded to
//! the key size and every node is padded to `blockSize` slots.

mod header;
mod reader;
mod writer;

pub use header::{BptHeader, BPT_MAGIC, SIZE_BPT_HEADER};
pub use reader::{BptFile, BptIndex, BptItem};
pub use writer::{BptEntry, BptWriter, BptWriterBuilder, DEFAULT_BLOCK_SIZE};

#[cfg(test)]
mod testing {
    use std::io::{Cursor, Seek, SeekFrom, Write};

    use super::*;
    use crate::{Endian, Error, FormatError, Result};

    fn numbered_entries(n: usize) -> Vec<BptEntry> {
        (0..n)
            .map(|i| BptEntry::new(format!("seq{i:05}"), (i as u32).to_le_bytes().to_vec()))
            .collect()
    }

    fn write_tree(entries: Vec<BptEntry>, block_size: u32, endian: Endian) -> Result<Vec<u8>> {
        let writer = BptWriterBuilder::default()
            .block_size(block_size)
            .endian(endian)
            .build()?;
        let mut cursor = Cursor::new(Vec::new());
        writer.write(&mut cursor, entries, 4)?;
        Ok(cursor.into_inner())
    }

    #[test]
    fn test_single_leaf() -> Result<()> {
        let bytes = write_tree(numbered_entries(3), 256, Endian::Little)?;
        let mut file = BptFile::new(Cursor::new(bytes))?;
        assert_eq!(file.header().item_count, 3);
        assert_eq!(file.find(b"seq00001")?, Some(1u32.to_le_bytes().to_vec()));
        assert_eq!(file.find(b"seq00009")?, None);
        Ok(())
    }

    #[test]
    fn test_multi_level_lookup_both_orders() -> Result<()> {
        for endian in [Endian::Little, Endian::Big] {
            // 100 items with fan-out 3 needs five levels
            let bytes = write_tree(numbered_entries(100), 3, endian)?;
            let mut file = BptFile::new(Cursor::new(bytes))?;
            for i in 0..100u32 {
                let key = format!("seq{i:05}");
                assert_eq!(file.find(key.as_bytes())?, Some(i.to_le_bytes().to_vec()), "{key}");
            }
            assert_eq!(file.find(b"seq")?, None);
            assert_eq!(file.find(b"a")?, None);
            assert_eq!(file.find(b"zzz")?, None);
            assert_eq!(file.find(b"seq000000000")?, None);
        }
        Ok(())
    }

    #[test]
    fn test_traverse_in_key_order() -> Result<()> {
        let mut entries = numbered_entries(20);
        entries.reverse();
        let bytes = write_tree(entries, 4, Endian::Big)?;
        let mut file = BptFile::new(Cursor::new(bytes))?;
        let items = file.traverse()?;
        assert_eq!(items.len(), 20);
        for (i, (key, value)) in items.iter().enumerate() {
            assert_eq!(key, format!("seq{i:05}").as_bytes());
            assert_eq!(value, &(i as u32).to_le_bytes().to_vec());
        }
        Ok(())
    }

    #[test]
    fn test_varying_key_lengths() -> Result<()> {
        let entries = vec![
            BptEntry::new("chr1", vec![1, 0, 0, 0]),
            BptEntry::new("chr10", vec![2, 0, 0, 0]),
            BptEntry::new("chr2", vec![3, 0, 0, 0]),
            BptEntry::new("chrUn_random", vec![4, 0, 0, 0]),
        ];
        let bytes = write_tree(entries, 2, Endian::Little)?;
        let mut file = BptFile::new(Cursor::new(bytes))?;
        assert_eq!(file.find(b"chr1")?, Some(vec![1, 0, 0, 0]));
        assert_eq!(file.find(b"chr10")?, Some(vec![2, 0, 0, 0]));
        assert_eq!(file.find(b"chr2")?, Some(vec![3, 0, 0, 0]));
        assert_eq!(file.find(b"chrUn_random")?, Some(vec![4, 0, 0, 0]));
        assert_eq!(file.find(b"chr")?, None);
        Ok(())
    }

    #[test]
    fn test_empty_tree() -> Result<()> {
        let bytes = write_tree(Vec::new(), 8, Endian::Little)?;
        let mut file = BptFile::new(Cursor::new(bytes))?;
        assert_eq!(file.find(b"anything")?, None);
        assert!(file.traverse()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_embedded_section() -> Result<()> {
        let writer = BptWriterBuilder::default().block_size(2).build()?;
        let mut cursor = Cursor::new(Vec::new());
        cursor.write_all(&[0xAB; 100])?;
        writer.write(&mut cursor, numbered_entries(9), 4)?;

        cursor.seek(SeekFrom::Start(100))?;
        let index = BptIndex::from_reader(&mut cursor)?;
        assert_eq!(index.find(&mut cursor, b"seq00008")?, Some(8u32.to_le_bytes().to_vec()));
        Ok(())
    }

    #[test]
    fn test_writer_rejects_bad_input() -> Result<()> {
        let writer = BptWriterBuilder::default().build()?;
        let duplicate = vec![BptEntry::new("a", vec![0; 4]), BptEntry::new("a", vec![1; 4])];
        assert!(matches!(
            writer.write(&mut Cursor::new(Vec::new()), duplicate, 4),
            Err(Error::FormatError(FormatError::DuplicateKey(_)))
        ));

        let narrow = vec![BptEntry::new("a", vec![0; 2])];
        assert!(matches!(
            writer.write(&mut Cursor::new(Vec::new()), narrow, 4),
            Err(Error::FormatError(FormatError::InvalidValueSize { got: 2, .. }))
        ));

        let long = vec![BptEntry::new(vec![b'k'; 256], vec![0; 4])];
        assert!(matches!(
            writer.write(&mut Cursor::new(Vec::new()), long, 4),
            Err(Error::FormatError(FormatError::KeyTooLong { key_size: 255, .. }))
        ));
        assert!(matches!(
            writer.write(&mut Cursor::new(Vec::new()), Vec::new(), 0),
            Err(Error::FormatError(FormatError::InvalidValueSize { got: 0, .. }))
        ));

        assert!(matches!(
            BptWriterBuilder::default().block_size(1).build(),
            Err(Error::FormatError(FormatError::InvalidBlockSize(1)))
        ));
        Ok(())
    }

    #[test]
    fn test_corrupt_node_flag() -> Result<()> {
        let mut bytes = write_tree(numbered_entries(2), 4, Endian::Little)?;
        bytes[SIZE_BPT_HEADER] = 7;
        let mut file = BptFile::new(Cursor::new(bytes))?;
        assert!(matches!(
            file.find(b"seq00000"),
            Err(Error::FormatError(FormatError::InvalidNode { flag: 7, .. }))
        ));
        Ok(())
    }
}
