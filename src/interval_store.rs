use ahash::{AHashMap, RandomState};
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::utils::{check_remaining, read_u32_ref, read_u32_vec, write_u32, write_u32_vec};

/// Append-only arena of interval sequences with content deduplication.
///
/// Sequences are stored back to back in one flat buffer; a handle is the
/// ordinal of the sequence, resolved through a fence-offset table. Inserting
/// a sequence that is already present returns the existing handle, so
/// documents sharing annotation shapes share storage.
#[derive(Debug, Clone)]
pub struct IntervalStore {
    data: Vec<u32>,
    /// Fence offsets into `data`: sequence `h` spans `offsets[h]..offsets[h + 1]`.
    offsets: Vec<u32>,
    /// Content hash to candidate handles; collisions verified element-wise.
    buckets: AHashMap<u64, SmallVec<[u32; 2]>>,
    hasher: RandomState,
}

impl Default for IntervalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IntervalStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        IntervalStore {
            data: Vec::new(),
            offsets: vec![0],
            buckets: AHashMap::new(),
            hasher: RandomState::new(),
        }
    }

    /// Number of distinct interval sequences stored.
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    /// True if no sequence has been inserted yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts an interval sequence and returns its handle.
    ///
    /// Returns the existing handle when an identical sequence is already
    /// stored. Empty sequences are a programming error: every posting these
    /// handles back carries at least one interval.
    pub fn insert(&mut self, intervals: &[u32]) -> u32 {
        assert!(!intervals.is_empty(), "empty interval sequence");
        let hash = self.hasher.hash_one(intervals);
        if let Some(handles) = self.buckets.get(&hash) {
            for &handle in handles {
                if self.get(handle) == intervals {
                    return handle;
                }
            }
        }
        let handle = (self.offsets.len() - 1) as u32;
        self.data.extend_from_slice(intervals);
        self.offsets.push(self.data.len() as u32);
        self.buckets.entry(hash).or_default().push(handle);
        handle
    }

    /// Resolves a handle to its interval sequence.
    #[inline(always)]
    pub fn get(&self, handle: u32) -> &[u32] {
        let handle = handle as usize;
        &self.data[self.offsets[handle] as usize..self.offsets[handle + 1] as usize]
    }

    /// Appends the store to `vec8`: sequence count, then each sequence
    /// length-prefixed.
    pub fn serialize(&self, vec8: &mut Vec<u8>) {
        write_u32(self.len() as u32, vec8);
        for handle in 0..self.len() as u32 {
            write_u32_vec(self.get(handle), vec8);
        }
    }

    /// Reads a store back from `vec8` at `pos`, rebuilding the deduplication
    /// table. Handles are preserved: sequence `h` on disk becomes handle `h`.
    pub fn deserialize(vec8: &[u8], pos: &mut usize) -> Result<IntervalStore> {
        check_remaining(vec8, *pos, 4)?;
        let count = read_u32_ref(vec8, pos);
        let mut store = IntervalStore::new();
        for expected in 0..count {
            let intervals = read_u32_vec(vec8, pos)?;
            if intervals.is_empty() {
                return Err(Error::Corruption(format!(
                    "empty interval sequence {expected} in store"
                )));
            }
            if store.insert(&intervals) != expected {
                return Err(Error::Corruption(format!(
                    "duplicate interval sequence {expected} in store"
                )));
            }
        }
        Ok(store)
    }
}
