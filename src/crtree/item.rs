//! Items indexed by a crTree
//!
//! Chromosome names are interned once in a [`ChromNameTable`]; every [`Item`]
//! holds a shared reference to its name instead of its own copy.

use std::sync::Arc;

use indexmap::IndexSet;

/// Interned chromosome names
#[derive(Debug, Default, Clone)]
pub struct ChromNameTable {
    names: IndexSet<Arc<str>>,
}
impl ChromNameTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the shared copy of `name`, adding it if needed
    pub fn intern(&mut self, name: &str) -> Arc<str> {
        if let Some(existing) = self.names.get(name) {
            return existing.clone();
        }
        let name: Arc<str> = Arc::from(name);
        self.names.insert(name.clone());
        name
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<str>> {
        self.names.get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Names in the order they were first interned
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|name| &**name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A half-open interval `[start, end)` on a chromosome, located at `file_offset`
/// in the data file being indexed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub chrom: Arc<str>,
    pub start: u32,
    pub end: u32,
    pub file_offset: u64,
}
impl Item {
    #[must_use]
    pub fn new(chrom: Arc<str>, start: u32, end: u32, file_offset: u64) -> Self {
        Self {
            chrom,
            start,
            end,
            file_offset,
        }
    }

    /// Whether the item truly overlaps `[start, end)` on `chrom`
    ///
    /// Index queries return every item of a matching block; callers re-check each
    /// item with this test.
    #[must_use]
    pub fn overlaps(&self, chrom: &str, start: u32, end: u32) -> bool {
        &*self.chrom == chrom && self.start < end && self.end > start
    }

    /// Sort key used when building an index
    pub(crate) fn sort_key(&self) -> (&str, u32, u32) {
        (&*self.chrom, self.start, self.end)
    }
}

/// Strand of an assembly component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    Forward,
    Reverse,
    Unknown,
}

/// What a line of an assembly (AGP) file places at a position
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgpKind {
    /// A run of unknown bases
    Gap { size: u32, gap_type: String },

    /// A range of a component sequence
    Fragment {
        frag: String,
        frag_start: u32,
        frag_end: u32,
        strand: Strand,
    },
}

/// One assembly line, indexable by its chromosome coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgpEntry {
    pub chrom: Arc<str>,
    pub start: u32,
    pub end: u32,
    pub file_offset: u64,
    pub kind: AgpKind,
}
impl AgpEntry {
    #[must_use]
    pub fn is_gap(&self) -> bool {
        matches!(self.kind, AgpKind::Gap { .. })
    }

    /// The coordinates of this entry as an index item
    #[must_use]
    pub fn item(&self) -> Item {
        Item::new(self.chrom.clone(), self.start, self.end, self.file_offset)
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_interning_shares_names() {
        let mut table = ChromNameTable::new();
        let a = table.intern("chr1");
        let b = table.intern("chr1");
        table.intern("chr2");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(table.len(), 2);
        assert!(table.contains("chr2"));
        assert!(!table.contains("chr3"));
        assert_eq!(table.iter().collect::<Vec<_>>(), vec!["chr1", "chr2"]);
    }

    #[test]
    fn test_overlaps_half_open() {
        let mut table = ChromNameTable::new();
        let item = Item::new(table.intern("chr1"), 100, 250, 0);
        assert!(item.overlaps("chr1", 150, 500));
        assert!(item.overlaps("chr1", 249, 250));
        assert!(!item.overlaps("chr1", 250, 300));
        assert!(!item.overlaps("chr1", 0, 100));
        assert!(!item.overlaps("chr2", 150, 200));
    }

    #[test]
    fn test_agp_variants_share_coordinates() {
        let mut table = ChromNameTable::new();
        let chrom = table.intern("chrX");
        let gap = AgpEntry {
            chrom: chrom.clone(),
            start: 0,
            end: 10_000,
            file_offset: 0,
            kind: AgpKind::Gap {
                size: 10_000,
                gap_type: "telomere".to_string(),
            },
        };
        let frag = AgpEntry {
            chrom,
            start: 10_000,
            end: 60_000,
            file_offset: 42,
            kind: AgpKind::Fragment {
                frag: "AC123.1".to_string(),
                frag_start: 0,
                frag_end: 50_000,
                strand: Strand::Forward,
            },
        };
        assert!(gap.is_gap());
        assert!(!frag.is_gap());
        assert_eq!(frag.item().start, 10_000);
        assert_eq!(&*frag.item().chrom, "chrX");
    }
}
