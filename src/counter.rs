use std::sync::Arc;

use ahash::AHashMap;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use rayon::prelude::*;
use smallvec::SmallVec;

use crate::min_heap::{CacheCandidate, MinHeap};
use crate::posting_list::PostingList;

/// Hard cap on cached posting lists: one bit per list in a `u32` word per
/// document.
pub const MAX_CACHED_POSTING_LISTS: usize = 32;

/// Documents per parallel block when rendering the cache bit vector.
const CACHE_RENDER_BLOCK_SIZE: usize = 65_536;

/// Tuning knobs for [`CachedPostingListCounter`].
#[derive(Debug, Clone, Copy)]
pub struct CounterConfig {
    /// Number of posting lists eligible for the bit-vector cache,
    /// clamped to [`MAX_CACHED_POSTING_LISTS`].
    pub max_cached_posting_lists: usize,
    /// The popcount path is only taken when the cached lists of a query
    /// cover more than `cache_coverage_ratio * n_documents` postings;
    /// below that, walking the lists directly is cheaper.
    pub cache_coverage_ratio: f64,
}

impl Default for CounterConfig {
    fn default() -> Self {
        CounterConfig {
            max_cached_posting_lists: MAX_CACHED_POSTING_LISTS,
            cache_coverage_ratio: 1.0,
        }
    }
}

/// Snapshot swapped in by [`CachedPostingListCounter::rebuild_cache`]:
/// for every cached posting list a bit position, and per document a `u32`
/// word holding the membership bits of all cached lists.
#[derive(Default)]
struct PostingListCache {
    mapping: AHashMap<u64, u32>,
    bit_vector: Vec<u32>,
}

/// Counts, per document, how many of a query's posting lists contain it.
///
/// The count feeds the min-feature gate of the search loop. Frequently used
/// posting lists are folded into a per-document bit vector so their share of
/// the count collapses into one popcount; the remaining lists are walked
/// directly. Queries record posting list usage here, and a later
/// [`rebuild_cache`](Self::rebuild_cache) promotes the highest-payoff lists.
pub struct CachedPostingListCounter {
    n_documents: usize,
    config: CounterConfig,
    usage: Mutex<AHashMap<u64, u32>>,
    cache: ArcSwap<PostingListCache>,
}

impl CachedPostingListCounter {
    /// Creates a counter for `n_documents` documents with an empty cache.
    pub fn new(n_documents: usize, config: CounterConfig) -> Self {
        let mut config = config;
        if config.max_cached_posting_lists > MAX_CACHED_POSTING_LISTS {
            log::warn!(
                "max_cached_posting_lists {} clamped to {}",
                config.max_cached_posting_lists,
                MAX_CACHED_POSTING_LISTS
            );
            config.max_cached_posting_lists = MAX_CACHED_POSTING_LISTS;
        }
        CachedPostingListCounter {
            n_documents,
            config,
            usage: Mutex::new(AHashMap::new()),
            cache: ArcSwap::from_pointee(PostingListCache::default()),
        }
    }

    /// Records one use of each posting list, feeding the scores of the next
    /// cache rebuild.
    pub fn register_usage(&self, posting_lists: &[PostingList<'_>]) {
        let mut usage = self.usage.lock();
        for posting_list in posting_lists {
            *usage.entry(posting_list.id()).or_insert(0) += 1;
        }
    }

    /// Returns, per document id, the number of `posting_lists` containing it.
    ///
    /// Lists present in the cache snapshot are counted with one popcount per
    /// document when their combined coverage clears the configured ratio;
    /// everything else is counted by walking the document ids directly.
    pub fn count_posting_lists_per_document(&self, posting_lists: &[PostingList<'_>]) -> Vec<u32> {
        let cache = self.cache.load();
        let mut counts = vec![0u32; self.n_documents];

        let mut cached_mask = 0u32;
        let mut cached_coverage = 0usize;
        let mut direct: SmallVec<[usize; 16]> = SmallVec::new();
        let mut cached: SmallVec<[usize; 16]> = SmallVec::new();
        for (i, posting_list) in posting_lists.iter().enumerate() {
            match cache.mapping.get(&posting_list.id()) {
                // A query may hold the same posting data twice (two subqueries
                // sharing a feature); the cache bit only counts it once, so
                // the duplicate goes the direct way.
                Some(&bit) if cached_mask & (1 << bit) == 0 => {
                    cached_mask |= 1 << bit;
                    cached_coverage += posting_list.size();
                    cached.push(i);
                }
                _ => direct.push(i),
            }
        }

        let threshold = (self.n_documents as f64 * self.config.cache_coverage_ratio) as usize;
        if cached_mask != 0 && cached_coverage > threshold {
            for (doc_id, &bits) in cache.bit_vector.iter().enumerate() {
                counts[doc_id] = (bits & cached_mask).count_ones();
            }
        } else {
            direct.extend(cached);
        }

        for &i in &direct {
            for &doc_id in posting_lists[i].doc_ids() {
                counts[doc_id as usize] += 1;
            }
        }
        counts
    }

    /// Rebuilds the cache snapshot from the recorded usage statistics.
    ///
    /// `entries` supplies every cacheable posting list as `(id, doc_ids)`.
    /// The lists with the highest usage x length scores win the bit slots;
    /// the per-document bit vector is rendered in parallel blocks and then
    /// swapped in atomically. Searches running concurrently keep their old
    /// snapshot and stay consistent.
    pub fn rebuild_cache<'b>(&self, entries: impl IntoIterator<Item = (u64, &'b [u32])>) {
        let usage = self.usage.lock().clone();
        if usage.is_empty() {
            log::debug!("posting list cache rebuild skipped: no usage recorded");
            return;
        }

        let mut heap = MinHeap::new(self.config.max_cached_posting_lists);
        for (id, doc_ids) in entries {
            if doc_ids.is_empty() {
                continue;
            }
            if let Some(&count) = usage.get(&id) {
                heap.add_topk(CacheCandidate {
                    score: u64::from(count) * doc_ids.len() as u64,
                    id,
                    doc_ids,
                });
            }
        }
        let candidates = heap.into_elements();
        if candidates.is_empty() {
            log::debug!("posting list cache rebuild skipped: no candidates");
            return;
        }

        let mut mapping = AHashMap::with_capacity(candidates.len());
        for (bit, candidate) in candidates.iter().enumerate() {
            mapping.insert(candidate.id, bit as u32);
        }

        let mut bit_vector = vec![0u32; self.n_documents];
        bit_vector
            .par_chunks_mut(CACHE_RENDER_BLOCK_SIZE)
            .enumerate()
            .for_each(|(block, chunk)| {
                let block_start = block * CACHE_RENDER_BLOCK_SIZE;
                for (bit, candidate) in candidates.iter().enumerate() {
                    let doc_ids = candidate.doc_ids;
                    let start = doc_ids
                        .partition_point(|&doc_id| (doc_id as usize) < block_start);
                    for &doc_id in &doc_ids[start..] {
                        let offset = doc_id as usize - block_start;
                        if offset >= chunk.len() {
                            break;
                        }
                        chunk[offset] |= 1 << bit;
                    }
                }
            });

        log::debug!(
            "posting list cache rebuilt: {} lists cached over {} documents",
            candidates.len(),
            self.n_documents
        );
        self.cache
            .store(Arc::new(PostingListCache { mapping, bit_vector }));
    }

    /// Number of documents this counter was sized for.
    pub fn n_documents(&self) -> usize {
        self.n_documents
    }
}
