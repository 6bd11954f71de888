use ahash::AHashMap;
use itertools::Itertools;

use crate::DocId;
use crate::error::{Error, Result};
use crate::utils::{
    check_remaining, read_u32_ref, read_u32_vec, read_u64_ref, write_u32, write_u32_vec, write_u64,
};

/// Posting entry for one feature key: the documents annotated with the key
/// and, per document, a handle into the interval store.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Dense per-index ordinal, assigned in ascending key order at build time.
    /// Stable across serialization round trips.
    pub id: u32,
    /// Matching document ids, ascending and duplicate-free.
    pub doc_ids: Vec<DocId>,
    /// Interval store handle per document, parallel to `doc_ids`.
    pub interval_refs: Vec<u32>,
}

/// Immutable map from 64-bit feature hashes to posting entries.
///
/// Built once through [`SimpleIndexBuilder`]; afterwards only looked up, so
/// posting lists can borrow the entry slices directly.
#[derive(Debug, Clone, Default)]
pub struct SimpleIndex {
    map: AHashMap<u64, Entry>,
}

impl SimpleIndex {
    /// Returns the posting entry for `key`, if any document carries it.
    #[inline(always)]
    pub fn lookup(&self, key: u64) -> Option<&Entry> {
        self.map.get(&key)
    }

    /// Number of distinct feature keys.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True if the index holds no keys.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates over all posting entries in arbitrary order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.map.values()
    }

    /// Appends the index to `vec8` in ascending key order, so identical
    /// indexes serialize to identical bytes.
    pub fn serialize(&self, vec8: &mut Vec<u8>) {
        write_u32(self.map.len() as u32, vec8);
        for (key, entry) in self.map.iter().sorted_by_key(|(key, _)| **key) {
            write_u64(*key, vec8);
            write_u32_vec(&entry.doc_ids, vec8);
            write_u32_vec(&entry.interval_refs, vec8);
        }
    }

    /// Reads an index back from `vec8` at `pos`. Entry ids are re-assigned in
    /// read order, which matches the ascending key order written by
    /// [`SimpleIndex::serialize`].
    pub fn deserialize(vec8: &[u8], pos: &mut usize) -> Result<SimpleIndex> {
        check_remaining(vec8, *pos, 4)?;
        let count = read_u32_ref(vec8, pos);
        let mut map = AHashMap::with_capacity(count as usize);
        for id in 0..count {
            check_remaining(vec8, *pos, 8)?;
            let key = read_u64_ref(vec8, pos);
            let doc_ids = read_u32_vec(vec8, pos)?;
            let interval_refs = read_u32_vec(vec8, pos)?;
            if doc_ids.len() != interval_refs.len() {
                return Err(Error::Corruption(format!(
                    "posting entry {key:#x}: {} doc ids but {} interval refs",
                    doc_ids.len(),
                    interval_refs.len()
                )));
            }
            if doc_ids.windows(2).any(|pair| pair[0] >= pair[1]) {
                return Err(Error::Corruption(format!(
                    "posting entry {key:#x}: doc ids not strictly ascending"
                )));
            }
            if map.insert(key, Entry { id, doc_ids, interval_refs }).is_some() {
                return Err(Error::Corruption(format!("duplicate posting entry {key:#x}")));
            }
        }
        Ok(SimpleIndex { map })
    }
}

/// Accumulates `(key, doc_id, interval_ref)` annotations and freezes them
/// into a [`SimpleIndex`].
#[derive(Debug, Default)]
pub struct SimpleIndexBuilder {
    map: AHashMap<u64, (Vec<DocId>, Vec<u32>)>,
}

impl SimpleIndexBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `doc_id` carries feature `key` with the interval sequence
    /// behind `interval_ref`. Insertion order is free; duplicates of the same
    /// `(key, doc_id)` keep the first interval_ref.
    pub fn insert(&mut self, key: u64, doc_id: DocId, interval_ref: u32) {
        let (doc_ids, interval_refs) = self.map.entry(key).or_default();
        doc_ids.push(doc_id);
        interval_refs.push(interval_ref);
    }

    /// Freezes the builder: per key, postings are sorted by document id and
    /// deduplicated; entry ids are assigned in ascending key order so a
    /// rebuilt index always numbers the same keys the same way.
    pub fn build(self) -> SimpleIndex {
        let mut map = AHashMap::with_capacity(self.map.len());
        for (id, (key, (doc_ids, interval_refs))) in self
            .map
            .into_iter()
            .sorted_by_key(|(key, _)| *key)
            .enumerate()
        {
            let mut postings: Vec<(DocId, u32)> =
                doc_ids.into_iter().zip(interval_refs).collect();
            postings.sort_by_key(|&(doc_id, _)| doc_id);
            postings.dedup_by_key(|&mut (doc_id, _)| doc_id);
            let (doc_ids, interval_refs) = postings.into_iter().unzip();
            map.insert(
                key,
                Entry {
                    id: id as u32,
                    doc_ids,
                    interval_refs,
                },
            );
        }
        SimpleIndex { map }
    }
}
