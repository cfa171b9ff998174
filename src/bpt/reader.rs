//! B+-tree reader
//!
//! Lookups descend from the root node, reading one node per level. Nodes are read
//! with an explicit seek so the reader may be shared with other sections of a file.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use super::header::{BptHeader, SIZE_BPT_HEADER, SIZE_NODE_HEADER};
use crate::error::{FormatError, Result};

/// A key/value pair read from a leaf, with the key padding removed
pub type BptItem = (Vec<u8>, Vec<u8>);

enum Node {
    Leaf(Vec<(Vec<u8>, Vec<u8>)>),
    Inner(Vec<(Vec<u8>, u64)>),
}

/// Location and shape of a B+-tree section inside some reader
///
/// The index holds no reader of its own, so the same file handle can serve a
/// B+-tree section and whatever follows it.
#[derive(Debug, Clone, Copy)]
pub struct BptIndex {
    header: BptHeader,
    root_offset: u64,
}
impl BptIndex {
    /// Reads the B+-tree header at the reader's current position
    pub fn from_reader<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let header = BptHeader::from_reader(reader)?;
        let root_offset = reader.stream_position()?;
        log::trace!(
            "B+ tree at {}: {} items, block size {}, key size {}",
            root_offset - SIZE_BPT_HEADER as u64,
            header.item_count,
            header.block_size,
            header.key_size
        );
        Ok(Self {
            header,
            root_offset,
        })
    }

    #[must_use]
    pub fn header(&self) -> &BptHeader {
        &self.header
    }

    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.header.item_count
    }

    /// Pads a key with zeros to the fixed key size
    ///
    /// Returns `None` if the key cannot be stored in this tree.
    fn padded_key(&self, key: &[u8]) -> Option<Vec<u8>> {
        let key_size = self.header.key_size as usize;
        if key.len() > key_size {
            return None;
        }
        let mut padded = vec![0u8; key_size];
        padded[..key.len()].copy_from_slice(key);
        Some(padded)
    }

    /// Looks up the value stored under `key`
    ///
    /// Returns `Ok(None)` if the key is not in the tree.
    pub fn find<R: Read + Seek>(&self, reader: &mut R, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let Some(key) = self.padded_key(key) else {
            return Ok(None);
        };
        let mut offset = self.root_offset;
        loop {
            match self.read_node(reader, offset)? {
                Node::Leaf(items) => {
                    return Ok(items
                        .into_iter()
                        .find(|(k, _)| *k == key)
                        .map(|(_, value)| value));
                }
                Node::Inner(children) => {
                    // last child whose first key is not greater than the search key
                    let idx = children.partition_point(|(k, _)| k.as_slice() <= key.as_slice());
                    if idx == 0 {
                        return Ok(None);
                    }
                    offset = children[idx - 1].1;
                }
            }
        }
    }

    /// Collects every item in key order
    pub fn traverse<R: Read + Seek>(&self, reader: &mut R) -> Result<Vec<BptItem>> {
        let mut items = Vec::with_capacity(self.header.item_count.min(1 << 20) as usize);
        let mut stack = vec![self.root_offset];
        while let Some(offset) = stack.pop() {
            match self.read_node(reader, offset)? {
                Node::Leaf(leaf_items) => {
                    items.extend(
                        leaf_items
                            .into_iter()
                            .map(|(key, value)| (strip_padding(key), value)),
                    );
                }
                Node::Inner(children) => {
                    stack.extend(children.into_iter().rev().map(|(_, child)| child));
                }
            }
        }
        Ok(items)
    }

    fn read_node<R: Read + Seek>(&self, reader: &mut R, offset: u64) -> Result<Node> {
        reader.seek(SeekFrom::Start(offset))?;
        let mut node_header = [0u8; SIZE_NODE_HEADER];
        reader.read_exact(&mut node_header)?;
        let is_leaf = node_header[0];
        let count = self.header.endian.read_u16(&node_header[2..4]) as usize;

        let key_size = self.header.key_size as usize;
        match is_leaf {
            1 => {
                let val_size = self.header.val_size as usize;
                let mut bytes = vec![0u8; count * (key_size + val_size)];
                reader.read_exact(&mut bytes)?;
                Ok(Node::Leaf(
                    bytes
                        .chunks_exact(key_size + val_size)
                        .map(|slot| (slot[..key_size].to_vec(), slot[key_size..].to_vec()))
                        .collect(),
                ))
            }
            0 => {
                let mut bytes = vec![0u8; count * (key_size + 8)];
                reader.read_exact(&mut bytes)?;
                let mut children = Vec::with_capacity(count);
                for slot in bytes.chunks_exact(key_size + 8) {
                    let child = self.header.endian.read_u64(&slot[key_size..]);
                    if child <= offset {
                        return Err(FormatError::InvalidChildOffset { offset, child }.into());
                    }
                    children.push((slot[..key_size].to_vec(), child));
                }
                Ok(Node::Inner(children))
            }
            flag => Err(FormatError::InvalidNode { offset, flag }.into()),
        }
    }
}

fn strip_padding(mut key: Vec<u8>) -> Vec<u8> {
    let len = key.iter().rposition(|&b| b != 0).map_or(0, |pos| pos + 1);
    key.truncate(len);
    key
}

/// A standalone B+-tree file with its own reader
pub struct BptFile<R: Read + Seek> {
    reader: R,
    index: BptIndex,
}
impl BptFile<BufReader<File>> {
    /// Opens a B+-tree file from a path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = File::open(path).map(BufReader::new)?;
        Self::new(reader)
    }
}
impl<R: Read + Seek> BptFile<R> {
    /// Reads the B+-tree header at the start of the reader
    pub fn new(mut reader: R) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;
        let index = BptIndex::from_reader(&mut reader)?;
        Ok(Self { reader, index })
    }

    #[must_use]
    pub fn header(&self) -> &BptHeader {
        self.index.header()
    }

    pub fn find(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.index.find(&mut self.reader, key)
    }

    pub fn traverse(&mut self) -> Result<Vec<BptItem>> {
        self.index.traverse(&mut self.reader)
    }
}
