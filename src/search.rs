use std::cmp::Reverse;
use std::mem;

use serde::{Deserialize, Serialize};

use crate::posting_list::PostingList;
use crate::{ALL_SUBQUERIES, DocId, SubqueryBitmap};

/// A document matched by a predicate search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hit {
    /// Id of the matching document.
    pub doc_id: DocId,
    /// Bit `i` set means batched subquery `i` matched this document.
    pub subquery_bitmap: SubqueryBitmap,
}

/// One predicate search over a set of posting streams, yielding [`Hit`]s in
/// ascending document id order.
///
/// The streams are kept as a permutation sorted by current document id. A
/// document is worth evaluating only when at least `min_feature` of its
/// streams are positioned on it; the sorted permutation makes that a single
/// index probe. Evaluation then merges the document's intervals from all
/// participating streams in ascending order and tracks, per subquery, which
/// interval chains reach the document's final interval position.
pub struct PredicateSearch<'a> {
    posting_lists: Vec<PostingList<'a>>,
    /// Permutation of `posting_lists` indices, ascending by current doc id.
    sorted: Vec<u32>,
    /// Merge buffer for re-sorting the advanced prefix of `sorted`.
    scratch: Vec<u32>,
    /// Interval heap of the document under evaluation: `(interval, index)`.
    candidates: Vec<(u32, u32)>,
    n_posting_lists_for_document: Vec<u32>,
    min_feature: &'a [u8],
    interval_end: &'a [u16],
    /// Per interval position: has any interval chain reached it.
    visited: Vec<bool>,
    /// Per interval position: the subqueries whose chains reached it.
    subquery_markers: Vec<SubqueryBitmap>,
}

impl<'a> PredicateSearch<'a> {
    /// Builds a search over `posting_lists`.
    ///
    /// `n_posting_lists_for_document` holds, per document id, how many of the
    /// streams contain the document (see
    /// [`CachedPostingListCounter`](crate::counter::CachedPostingListCounter));
    /// `min_feature` and `interval_end` are the per-document annotations of
    /// the index, and `highest_interval_end` bounds the interval positions
    /// the working arrays have to cover.
    pub fn new(
        mut posting_lists: Vec<PostingList<'a>>,
        n_posting_lists_for_document: Vec<u32>,
        min_feature: &'a [u8],
        interval_end: &'a [u16],
        highest_interval_end: u16,
    ) -> Self {
        posting_lists.retain(|posting_list| posting_list.size() > 0);
        // Largest lists first, stable: when the min-feature gate probes the
        // k-th stream, the big lists are the ones most likely to hold the
        // document anyway.
        posting_lists.sort_by_key(|posting_list| Reverse(posting_list.size()));

        let mut sorted: Vec<u32> = (0..posting_lists.len() as u32).collect();
        sorted.sort_by_key(|&index| posting_lists[index as usize].current_doc_id());

        let positions = highest_interval_end as usize + 1;
        PredicateSearch {
            scratch: Vec::with_capacity(sorted.len()),
            candidates: Vec::new(),
            n_posting_lists_for_document,
            min_feature,
            interval_end,
            visited: vec![false; positions],
            subquery_markers: vec![0; positions],
            posting_lists,
            sorted,
        }
    }

    /// Merges the intervals of `doc_id` from the first `m` streams of the
    /// sorted permutation and returns the subqueries whose interval chains
    /// cover the document completely; zero means no match.
    fn evaluate_hit(&mut self, doc_id: DocId, m: usize) -> SubqueryBitmap {
        let interval_end = usize::from(self.interval_end[doc_id as usize]);
        // Only positions up to the document's own interval end can be
        // touched; resetting that prefix is enough.
        self.visited[..=interval_end].fill(false);
        self.subquery_markers[..=interval_end].fill(0);
        self.visited[0] = true;
        self.subquery_markers[0] = ALL_SUBQUERIES;
        let mut max_visited = 0;

        self.candidates.clear();
        for &index in &self.sorted[..m] {
            let posting_list = &mut self.posting_lists[index as usize];
            if posting_list.begin_intervals() {
                self.candidates.push((posting_list.current_interval(), index));
            }
        }
        self.candidates.sort_unstable();

        while let Some(&(interval, index)) = self.candidates.first() {
            let high = (interval >> 16) as usize;
            let low = (interval & 0xFFFF) as usize;
            if high > low {
                // z-star word, halves swapped: covers (low, high]. The chain
                // it extends is the complement of everything that reached its
                // begin position.
                debug_assert!(high <= interval_end);
                if self.visited[low] {
                    self.subquery_markers[high] |= !self.subquery_markers[low];
                    self.visited[high] = true;
                    if high > max_visited {
                        max_visited = high;
                    }
                } else if low > max_visited {
                    // Nothing can ever visit `low` anymore: intervals arrive
                    // in ascending order, so every chain is dead.
                    return 0;
                }
            } else {
                debug_assert!(high >= 1);
                debug_assert!(low <= interval_end);
                if self.visited[high - 1] {
                    let subquery_bitmap = self.posting_lists[index as usize].subquery_bitmap();
                    self.subquery_markers[low] |=
                        self.subquery_markers[high - 1] & subquery_bitmap;
                    self.visited[low] = true;
                    if low > max_visited {
                        max_visited = low;
                    }
                } else if high - 1 > max_visited {
                    return 0;
                }
            }

            if self.posting_lists[index as usize].next_interval() {
                self.candidates[0] =
                    (self.posting_lists[index as usize].current_interval(), index);
                // Bubble the refreshed front right to restore order; the next
                // interval of the same stream is rarely far off.
                let mut i = 0;
                while i + 1 < self.candidates.len() && self.candidates[i + 1] < self.candidates[i]
                {
                    self.candidates.swap(i, i + 1);
                    i += 1;
                }
            } else {
                self.candidates.remove(0);
            }
        }
        self.subquery_markers[interval_end]
    }

    /// Moves every stream positioned on `doc_id` past it, drops exhausted
    /// streams and restores the sorted permutation with a single merge pass.
    fn advance_posting_lists(&mut self, doc_id: DocId) {
        let mut advanced = 0;
        while advanced < self.sorted.len()
            && self.posting_lists[self.sorted[advanced] as usize].current_doc_id() == doc_id
        {
            advanced += 1;
        }
        let mut i = advanced;
        while i > 0 {
            i -= 1;
            let index = self.sorted[i];
            if !self.posting_lists[index as usize].advance_to(doc_id) {
                self.sorted.remove(i);
                advanced -= 1;
            }
        }
        if advanced == 0 {
            return;
        }

        self.sorted[..advanced]
            .sort_unstable_by_key(|&index| self.posting_lists[index as usize].current_doc_id());

        self.scratch.clear();
        let (prefix, tail) = self.sorted.split_at(advanced);
        let mut a = 0;
        let mut b = 0;
        while a < prefix.len() && b < tail.len() {
            if self.posting_lists[prefix[a] as usize].current_doc_id()
                <= self.posting_lists[tail[b] as usize].current_doc_id()
            {
                self.scratch.push(prefix[a]);
                a += 1;
            } else {
                self.scratch.push(tail[b]);
                b += 1;
            }
        }
        self.scratch.extend_from_slice(&prefix[a..]);
        self.scratch.extend_from_slice(&tail[b..]);
        mem::swap(&mut self.sorted, &mut self.scratch);
    }
}

impl Iterator for PredicateSearch<'_> {
    type Item = Hit;

    fn next(&mut self) -> Option<Hit> {
        while !self.sorted.is_empty() {
            let doc_id = self.posting_lists[self.sorted[0] as usize].current_doc_id();
            let mut subquery_bitmap = 0;

            let min_feature = u32::from(self.min_feature[doc_id as usize]);
            if min_feature <= self.n_posting_lists_for_document[doc_id as usize] {
                // A document can only match when at least min_feature streams
                // hold it; with the permutation sorted by current doc id it
                // suffices to probe the k-th stream.
                let k = (min_feature.max(1) - 1) as usize;
                if k < self.sorted.len()
                    && self.posting_lists[self.sorted[k] as usize].current_doc_id() == doc_id
                {
                    let mut m = k + 1;
                    while m < self.sorted.len()
                        && self.posting_lists[self.sorted[m] as usize].current_doc_id() == doc_id
                    {
                        m += 1;
                    }
                    subquery_bitmap = self.evaluate_hit(doc_id, m);
                }
            }

            self.advance_posting_lists(doc_id);
            if subquery_bitmap != 0 {
                return Some(Hit {
                    doc_id,
                    subquery_bitmap,
                });
            }
        }
        None
    }
}
