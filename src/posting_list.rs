use crate::interval::{ZERO_CONSTRAINT_INTERVAL, bounds_match, combine_zstar, is_zstar1, is_zstar2};
use crate::interval_store::IntervalStore;
use crate::{ALL_SUBQUERIES, DocId, SubqueryBitmap};

/// Positions `doc_ids` past `doc_id`, starting from `from`: exponential
/// probing to bracket the target, then a binary partition inside the bracket.
/// Returns the index of the first document id strictly greater than `doc_id`,
/// or `doc_ids.len()` when none remains.
#[inline(always)]
fn search_past(doc_ids: &[DocId], from: usize, doc_id: DocId) -> usize {
    let n = doc_ids.len();
    if from >= n || doc_ids[from] > doc_id {
        return from;
    }
    let mut bound = 1;
    while from + bound < n && doc_ids[from + bound] <= doc_id {
        bound <<= 1;
    }
    let lo = from + (bound >> 1);
    let hi = (from + bound).min(n);
    lo + doc_ids[lo..hi].partition_point(|&d| d <= doc_id)
}

enum PostingListKind<'a> {
    /// Ordinary feature postings: one interval sequence per document.
    Interval {
        store: &'a IntervalStore,
        interval_refs: &'a [u32],
        intervals: &'a [u32],
        interval_pos: usize,
    },
    /// Bounds-annotated postings: the stored sequence alternates interval and
    /// bounds words; intervals whose bounds test rejects `value_diff` are
    /// skipped during iteration.
    Bounds {
        store: &'a IntervalStore,
        interval_refs: &'a [u32],
        pairs: &'a [u32],
        pair_pos: usize,
        value_diff: i64,
    },
    /// Z-star (negation) postings: stored words come in start/continuation
    /// form and are expanded on the fly into the intervals the match loop
    /// consumes.
    ZStar {
        store: &'a IntervalStore,
        interval_refs: &'a [u32],
        intervals: &'a [u32],
        interval_pos: usize,
        /// Set after a z-star start was yielded; the next step yields its
        /// extension (stored continuation or the implicit one-unit one).
        extension_pending: bool,
    },
    /// Always-true postings for documents whose predicate needs no feature:
    /// every document carries the single constant interval `[1, 1]`.
    ZeroConstraint,
}

/// One posting stream feeding a predicate search: a cursor over ascending
/// document ids plus, per document, a cursor over that document's intervals.
///
/// Document iteration is shared by all variants; interval iteration differs
/// per variant and is driven through [`begin_intervals`](Self::begin_intervals)
/// and [`next_interval`](Self::next_interval).
pub struct PostingList<'a> {
    id: u64,
    subquery_bitmap: SubqueryBitmap,
    doc_ids: &'a [DocId],
    pos: usize,
    current_interval: u32,
    kind: PostingListKind<'a>,
}

impl<'a> PostingList<'a> {
    /// Posting stream over ordinary interval postings.
    ///
    /// `doc_ids` and `interval_refs` are parallel slices; `subquery_bitmap`
    /// marks which of the up to 64 batched subqueries this stream belongs to.
    pub fn interval(
        store: &'a IntervalStore,
        doc_ids: &'a [DocId],
        interval_refs: &'a [u32],
        subquery_bitmap: SubqueryBitmap,
        id: u64,
    ) -> Self {
        debug_assert_eq!(doc_ids.len(), interval_refs.len());
        PostingList {
            id,
            subquery_bitmap,
            doc_ids,
            pos: 0,
            current_interval: 0,
            kind: PostingListKind::Interval {
                store,
                interval_refs,
                intervals: &[],
                interval_pos: 0,
            },
        }
    }

    /// Posting stream over bounds-annotated postings, filtered against the
    /// query-side `value_diff`.
    pub fn bounds(
        store: &'a IntervalStore,
        doc_ids: &'a [DocId],
        interval_refs: &'a [u32],
        value_diff: i64,
        subquery_bitmap: SubqueryBitmap,
        id: u64,
    ) -> Self {
        debug_assert_eq!(doc_ids.len(), interval_refs.len());
        PostingList {
            id,
            subquery_bitmap,
            doc_ids,
            pos: 0,
            current_interval: 0,
            kind: PostingListKind::Bounds {
                store,
                interval_refs,
                pairs: &[],
                pair_pos: 0,
                value_diff,
            },
        }
    }

    /// Posting stream over z-star negation postings. Negations contribute to
    /// every batched subquery, so the bitmap is fixed to all ones.
    pub fn zstar(
        store: &'a IntervalStore,
        doc_ids: &'a [DocId],
        interval_refs: &'a [u32],
        id: u64,
    ) -> Self {
        debug_assert_eq!(doc_ids.len(), interval_refs.len());
        PostingList {
            id,
            subquery_bitmap: ALL_SUBQUERIES,
            doc_ids,
            pos: 0,
            current_interval: 0,
            kind: PostingListKind::ZStar {
                store,
                interval_refs,
                intervals: &[],
                interval_pos: 0,
                extension_pending: false,
            },
        }
    }

    /// Posting stream over the zero-constraint documents, which match every
    /// subquery with the constant interval `[1, 1]`.
    pub fn zero_constraint(doc_ids: &'a [DocId], id: u64) -> Self {
        PostingList {
            id,
            subquery_bitmap: ALL_SUBQUERIES,
            doc_ids,
            pos: 0,
            current_interval: 0,
            kind: PostingListKind::ZeroConstraint,
        }
    }

    /// Stable identity of the underlying posting data, used by the usage
    /// tracking of the posting list cache.
    #[inline(always)]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Subquery membership mask of this stream.
    #[inline(always)]
    pub fn subquery_bitmap(&self) -> SubqueryBitmap {
        self.subquery_bitmap
    }

    /// Number of documents in the stream.
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.doc_ids.len()
    }

    /// All document ids of the stream, ascending.
    #[inline(always)]
    pub fn doc_ids(&self) -> &[DocId] {
        self.doc_ids
    }

    /// Document id under the cursor. Must not be called on an exhausted
    /// stream.
    #[inline(always)]
    pub fn current_doc_id(&self) -> DocId {
        self.doc_ids[self.pos]
    }

    /// Interval word most recently produced by
    /// [`begin_intervals`](Self::begin_intervals) or
    /// [`next_interval`](Self::next_interval).
    #[inline(always)]
    pub fn current_interval(&self) -> u32 {
        self.current_interval
    }

    /// Moves the document cursor to the first document id strictly greater
    /// than `doc_id`. Returns false once the stream is exhausted.
    #[inline(always)]
    pub fn advance_to(&mut self, doc_id: DocId) -> bool {
        match self.kind {
            // Zero-constraint streams are dense; a linear step beats the
            // galloping search here.
            PostingListKind::ZeroConstraint => {
                while self.pos < self.doc_ids.len() && self.doc_ids[self.pos] <= doc_id {
                    self.pos += 1;
                }
            }
            _ => self.pos = search_past(self.doc_ids, self.pos, doc_id),
        }
        self.pos < self.doc_ids.len()
    }

    /// Starts interval iteration for the document under the cursor and loads
    /// the first interval. Returns false when the document contributes no
    /// interval (a bounds stream whose tests all reject `value_diff`).
    pub fn begin_intervals(&mut self) -> bool {
        match &mut self.kind {
            PostingListKind::Interval {
                store,
                interval_refs,
                intervals,
                interval_pos,
            } => {
                *intervals = store.get(interval_refs[self.pos]);
                *interval_pos = 0;
                self.current_interval = intervals[0];
                true
            }
            PostingListKind::Bounds {
                store,
                interval_refs,
                pairs,
                pair_pos,
                ..
            } => {
                *pairs = store.get(interval_refs[self.pos]);
                debug_assert!(pairs.len() % 2 == 0);
                *pair_pos = 0;
                self.scan_bounds()
            }
            PostingListKind::ZStar {
                store,
                interval_refs,
                intervals,
                interval_pos,
                extension_pending,
            } => {
                *intervals = store.get(interval_refs[self.pos]);
                debug_assert!(is_zstar1(intervals[0]));
                self.current_interval = intervals[0];
                *interval_pos = 1;
                *extension_pending = true;
                true
            }
            PostingListKind::ZeroConstraint => {
                self.current_interval = ZERO_CONSTRAINT_INTERVAL;
                true
            }
        }
    }

    /// Loads the next interval of the current document. Returns false when
    /// the document's intervals are exhausted.
    pub fn next_interval(&mut self) -> bool {
        match &mut self.kind {
            PostingListKind::Interval {
                intervals,
                interval_pos,
                ..
            } => {
                *interval_pos += 1;
                if *interval_pos < intervals.len() {
                    self.current_interval = intervals[*interval_pos];
                    true
                } else {
                    false
                }
            }
            PostingListKind::Bounds { .. } => self.scan_bounds(),
            PostingListKind::ZStar {
                intervals,
                interval_pos,
                extension_pending,
                ..
            } => {
                if *extension_pending {
                    // A z-star word always has an extension: either the
                    // stored continuation word or an implicit one-unit one.
                    // A combined word is itself extendable again, so only
                    // the implicit synthesis clears the flag.
                    if *interval_pos < intervals.len() && is_zstar2(intervals[*interval_pos]) {
                        self.current_interval =
                            combine_zstar(self.current_interval, intervals[*interval_pos]);
                        *interval_pos += 1;
                    } else {
                        *extension_pending = false;
                        let end = self.current_interval >> 16;
                        self.current_interval = ((end + 1) << 16) | end;
                    }
                    true
                } else if *interval_pos < intervals.len() {
                    debug_assert!(is_zstar1(intervals[*interval_pos]));
                    self.current_interval = intervals[*interval_pos];
                    *interval_pos += 1;
                    *extension_pending = true;
                    true
                } else {
                    false
                }
            }
            PostingListKind::ZeroConstraint => false,
        }
    }

    /// Scans the interval/bounds word pairs forward to the next interval
    /// whose bounds test accepts `value_diff`.
    fn scan_bounds(&mut self) -> bool {
        if let PostingListKind::Bounds {
            pairs,
            pair_pos,
            value_diff,
            ..
        } = &mut self.kind
        {
            while *pair_pos + 1 < pairs.len() {
                let interval = pairs[*pair_pos];
                let bounds = pairs[*pair_pos + 1];
                *pair_pos += 2;
                if bounds_match(bounds, *value_diff) {
                    self.current_interval = interval;
                    return true;
                }
            }
        }
        false
    }
}
