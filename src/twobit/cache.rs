//! Caller-owned caches
//!
//! Nothing in this crate keeps hidden state between calls. Callers that read many
//! fragments of the same sequences keep a [`SequenceCache`] next to their handle,
//! and callers that juggle many files keep a bounded [`TwoBitHandleCache`].

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use super::reader::TwoBitFile;
use super::record::SequenceRecord;
use crate::error::Result;

/// Parsed record headers of one file, keyed by sequence name
///
/// Pass it to [`TwoBitFile::read_fragment_cached`] to skip re-parsing the block
/// lists of a sequence on every read.
#[derive(Debug, Default, Clone)]
pub struct SequenceCache {
    /// Handle the cached records belong to
    handle: Option<u64>,
    records: HashMap<String, (SequenceRecord, u64)>,
}
impl SequenceCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ties the cache to a handle, dropping entries that belong to another one
    pub(crate) fn bind(&mut self, handle: u64) {
        if self.handle != Some(handle) {
            self.records.clear();
            self.handle = Some(handle);
        }
    }

    /// The cached record of `name` and the offset of its packed bases
    pub(crate) fn get(&self, name: &str) -> Option<(&SequenceRecord, u64)> {
        self.records
            .get(name)
            .map(|(record, dna_offset)| (record, *dna_offset))
    }

    pub(crate) fn insert(&mut self, name: &str, record: SequenceRecord, dna_offset: u64) {
        self.records.insert(name.to_string(), (record, dna_offset));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.handle = None;
    }
}

/// A bounded, least recently used set of open twoBit handles keyed by path
///
/// When the cache is full, opening another file closes the handle that was used
/// longest ago.
pub struct TwoBitHandleCache {
    capacity: usize,
    handles: IndexMap<PathBuf, TwoBitFile<BufReader<File>>>,
}
impl TwoBitHandleCache {
    /// Creates a cache holding at most `capacity` handles (at least one)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            handles: IndexMap::with_capacity(capacity),
        }
    }

    /// Returns the handle for `path`, opening it if needed
    ///
    /// The returned handle becomes the most recently used one.
    pub fn get_or_open<P: AsRef<Path>>(&mut self, path: P) -> Result<&mut TwoBitFile> {
        let path = path.as_ref();
        let file = match self.handles.shift_remove(path) {
            Some(file) => file,
            None => {
                let file = TwoBitFile::open(path)?;
                if self.handles.len() == self.capacity {
                    if let Some((evicted, mut handle)) = self.handles.shift_remove_index(0) {
                        log::debug!("evicting {} from handle cache", evicted.display());
                        handle.close();
                    }
                }
                file
            }
        };
        // re-inserting moves the entry to the most recently used end
        let (idx, _) = self.handles.insert_full(path.to_path_buf(), file);
        Ok(&mut self.handles[idx])
    }

    /// Closes and removes the handle for `path`
    ///
    /// Returns whether a handle was cached.
    pub fn evict<P: AsRef<Path>>(&mut self, path: P) -> bool {
        match self.handles.shift_remove(path.as_ref()) {
            Some(mut handle) => {
                handle.close();
                true
            }
            None => false,
        }
    }

    /// Whether a handle for `path` is cached
    #[must_use]
    pub fn contains<P: AsRef<Path>>(&self, path: P) -> bool {
        self.handles.contains_key(path.as_ref())
    }

    /// Closes every cached handle
    pub fn clear(&mut self) {
        for (_, mut handle) in self.handles.drain(..) {
            handle.close();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::twobit::TwoBitWriterBuilder;

    fn write_file(dir: &Path, name: &str, seq: &[u8]) -> Result<PathBuf> {
        let path = dir.join(format!("{name}.2bit"));
        let mut writer = TwoBitWriterBuilder::default().build();
        writer.add_sequence(name, seq)?;
        writer.write_to_path(&path)?;
        Ok(path)
    }

    #[test]
    fn test_lru_eviction() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let a = write_file(dir.path(), "a", b"AAAA")?;
        let b = write_file(dir.path(), "b", b"CCCC")?;
        let c = write_file(dir.path(), "c", b"GGGG")?;

        let mut cache = TwoBitHandleCache::new(2);
        assert_eq!(cache.get_or_open(&a)?.read_fragment("a", 0, 0, true)?, b"AAAA");
        assert_eq!(cache.get_or_open(&b)?.read_fragment("b", 0, 0, true)?, b"CCCC");

        // touching `a` makes `b` the least recently used
        cache.get_or_open(&a)?;
        assert_eq!(cache.get_or_open(&c)?.read_fragment("c", 0, 0, true)?, b"GGGG");
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&a));
        assert!(!cache.contains(&b));
        assert!(cache.contains(&c));

        assert!(cache.evict(&a));
        assert!(!cache.evict(&a));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        Ok(())
    }

    #[test]
    fn test_open_failure_keeps_cache() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let a = write_file(dir.path(), "a", b"ACGT")?;
        let mut cache = TwoBitHandleCache::new(1);
        cache.get_or_open(&a)?;
        assert!(cache.get_or_open(dir.path().join("missing.2bit")).is_err());
        assert!(cache.contains(&a));
        Ok(())
    }

    #[test]
    fn test_sequence_cache_rebinds() {
        let mut cache = SequenceCache::new();
        cache.bind(1);
        cache.insert("chr1", SequenceRecord::new(4, Vec::new(), Vec::new()), 20);
        assert_eq!(cache.get("chr1").map(|(_, off)| off), Some(20));
        cache.bind(1);
        assert_eq!(cache.len(), 1);
        cache.bind(2);
        assert!(cache.is_empty());
    }
}
