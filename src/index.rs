use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::counter::{CachedPostingListCounter, CounterConfig};
use crate::error::{Error, Result};
use crate::interval_store::IntervalStore;
use crate::posting_list::PostingList;
use crate::search::PredicateSearch;
use crate::simple_index::SimpleIndex;
use crate::utils::{
    check_remaining, read_u8_vec, read_u16_ref, read_u16_vec, read_u32_ref, read_u32_vec,
    write_u8_vec, write_u16, write_u16_vec, write_u32, write_u32_vec,
};
use crate::{DocId, SubqueryBitmap};

/// Major revision of the binary index format; a mismatch refuses to load.
pub const INDEX_FORMAT_VERSION_MAJOR: u16 = 1;
/// Minor revision of the binary index format; loaders accept any minor.
pub const INDEX_FORMAT_VERSION_MINOR: u16 = 0;

/// File name of the binary index payload inside the index directory.
pub const INDEX_FILENAME: &str = "index.bin";
/// File name of the JSON meta document inside the index directory.
pub const META_FILENAME: &str = "index.json";

/// Posting list id namespaces: the upper 32 bits of a posting list id name
/// the index component it came from, the lower 32 bits the entry ordinal.
const NAMESPACE_ZERO_CONSTRAINT: u64 = 0;
const NAMESPACE_INTERVAL: u64 = 1;
const NAMESPACE_BOUNDS: u64 = 2;

#[inline(always)]
fn compose_id(namespace: u64, local_id: u32) -> u64 {
    (namespace << 32) | u64::from(local_id)
}

/// Index meta properties, persisted as JSON next to the binary payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMetaObject {
    /// Number of documents the index covers.
    pub n_documents: u32,
    /// Posting list cache slots, see [`CounterConfig`].
    pub max_cached_posting_lists: usize,
    /// Coverage gate of the popcount path, see [`CounterConfig`].
    pub cache_coverage_ratio: f64,
}

/// An immutable boolean-predicate index over a document corpus.
///
/// Holds the per-document annotations (`min_feature`, `interval_end`), the
/// shared interval store, the feature and bounds posting indexes, the
/// zero-constraint document list and the posting-list-per-document counter.
/// Queries look up posting streams through the accessor methods and run them
/// through [`search`](Self::search).
pub struct PredicateIndex {
    /// Meta properties mirrored into the JSON meta file on save.
    pub meta: IndexMetaObject,
    min_feature: Vec<u8>,
    interval_end: Vec<u16>,
    highest_interval_end: u16,
    interval_store: IntervalStore,
    interval_index: SimpleIndex,
    bounds_index: SimpleIndex,
    zero_constraint_docs: Vec<DocId>,
    counter: CachedPostingListCounter,
}

impl PredicateIndex {
    /// Assembles an index from its components.
    ///
    /// # Arguments
    ///
    /// * `config` - counter tuning, persisted in the meta document.
    /// * `min_feature` - per document, the lower bound of posting lists a
    ///   query must hold for the document to possibly match.
    /// * `interval_end` - per document, the final interval position every
    ///   matching interval chain has to reach.
    /// * `interval_store` - interval sequences referenced by both posting
    ///   indexes.
    /// * `interval_index` - feature-keyed interval postings.
    /// * `bounds_index` - feature-keyed bounds-annotated postings.
    /// * `zero_constraint_docs` - ascending ids of documents whose predicate
    ///   is trivially true.
    pub fn new(
        config: CounterConfig,
        min_feature: Vec<u8>,
        interval_end: Vec<u16>,
        interval_store: IntervalStore,
        interval_index: SimpleIndex,
        bounds_index: SimpleIndex,
        zero_constraint_docs: Vec<DocId>,
    ) -> Self {
        assert_eq!(
            min_feature.len(),
            interval_end.len(),
            "min_feature and interval_end must cover the same documents"
        );
        debug_assert!(
            zero_constraint_docs.windows(2).all(|pair| pair[0] < pair[1]),
            "zero-constraint doc ids must be strictly ascending"
        );
        let highest_interval_end = interval_end.iter().copied().max().unwrap_or(0);
        let n_documents = min_feature.len();
        let meta = IndexMetaObject {
            n_documents: n_documents as u32,
            max_cached_posting_lists: config.max_cached_posting_lists,
            cache_coverage_ratio: config.cache_coverage_ratio,
        };
        PredicateIndex {
            meta,
            min_feature,
            interval_end,
            highest_interval_end,
            interval_store,
            interval_index,
            bounds_index,
            zero_constraint_docs,
            counter: CachedPostingListCounter::new(n_documents, config),
        }
    }

    /// Number of documents the index covers.
    pub fn n_documents(&self) -> usize {
        self.min_feature.len()
    }

    /// Posting stream of the ordinary interval postings under `key`, tagged
    /// with the subqueries it belongs to. None when no document carries the
    /// feature.
    pub fn interval_posting_list(
        &self,
        key: u64,
        subquery_bitmap: SubqueryBitmap,
    ) -> Option<PostingList<'_>> {
        let entry = self.interval_index.lookup(key)?;
        Some(PostingList::interval(
            &self.interval_store,
            &entry.doc_ids,
            &entry.interval_refs,
            subquery_bitmap,
            compose_id(NAMESPACE_INTERVAL, entry.id),
        ))
    }

    /// Posting stream of the interval postings under `key`, iterated as
    /// z-star negation intervals.
    pub fn zstar_posting_list(&self, key: u64) -> Option<PostingList<'_>> {
        let entry = self.interval_index.lookup(key)?;
        Some(PostingList::zstar(
            &self.interval_store,
            &entry.doc_ids,
            &entry.interval_refs,
            compose_id(NAMESPACE_INTERVAL, entry.id),
        ))
    }

    /// Posting stream of the bounds-annotated postings under `key`, filtered
    /// against the query-side `value_diff`.
    pub fn bounds_posting_list(
        &self,
        key: u64,
        value_diff: i64,
        subquery_bitmap: SubqueryBitmap,
    ) -> Option<PostingList<'_>> {
        let entry = self.bounds_index.lookup(key)?;
        Some(PostingList::bounds(
            &self.interval_store,
            &entry.doc_ids,
            &entry.interval_refs,
            value_diff,
            subquery_bitmap,
            compose_id(NAMESPACE_BOUNDS, entry.id),
        ))
    }

    /// Posting stream of the documents whose predicate is trivially true.
    /// None when the index has no such documents.
    pub fn zero_constraint_posting_list(&self) -> Option<PostingList<'_>> {
        if self.zero_constraint_docs.is_empty() {
            return None;
        }
        Some(PostingList::zero_constraint(
            &self.zero_constraint_docs,
            compose_id(NAMESPACE_ZERO_CONSTRAINT, 0),
        ))
    }

    /// Runs a predicate search over `posting_lists`, registering their usage
    /// with the posting list cache on the way.
    pub fn search<'a>(&'a self, posting_lists: Vec<PostingList<'a>>) -> PredicateSearch<'a> {
        self.counter.register_usage(&posting_lists);
        let n_posting_lists_for_document =
            self.counter.count_posting_lists_per_document(&posting_lists);
        PredicateSearch::new(
            posting_lists,
            n_posting_lists_for_document,
            &self.min_feature,
            &self.interval_end,
            self.highest_interval_end,
        )
    }

    /// Rebuilds the posting list cache from the usage recorded by previous
    /// searches. Typically invoked periodically or after a query-load shift;
    /// concurrent searches keep the previous cache snapshot.
    pub fn rebuild_cache(&self) {
        let zero_constraint = std::iter::once((
            compose_id(NAMESPACE_ZERO_CONSTRAINT, 0),
            self.zero_constraint_docs.as_slice(),
        ));
        let intervals = self.interval_index.entries().map(|entry| {
            (
                compose_id(NAMESPACE_INTERVAL, entry.id),
                entry.doc_ids.as_slice(),
            )
        });
        let bounds = self.bounds_index.entries().map(|entry| {
            (
                compose_id(NAMESPACE_BOUNDS, entry.id),
                entry.doc_ids.as_slice(),
            )
        });
        self.counter
            .rebuild_cache(zero_constraint.chain(intervals).chain(bounds));
    }

    /// Counter behind [`search`](Self::search), exposed for embedders that
    /// drive counting or cache rebuilds themselves.
    pub fn counter(&self) -> &CachedPostingListCounter {
        &self.counter
    }

    /// Appends the complete index to `vec8` in the versioned binary format.
    pub fn serialize(&self, vec8: &mut Vec<u8>) {
        write_u16(INDEX_FORMAT_VERSION_MAJOR, vec8);
        write_u16(INDEX_FORMAT_VERSION_MINOR, vec8);
        write_u32(self.meta.n_documents, vec8);
        write_u8_vec(&self.min_feature, vec8);
        write_u16_vec(&self.interval_end, vec8);
        write_u16(self.highest_interval_end, vec8);
        write_u32_vec(&self.zero_constraint_docs, vec8);
        self.interval_store.serialize(vec8);
        self.interval_index.serialize(vec8);
        self.bounds_index.serialize(vec8);
    }

    /// Reads an index back from its binary form, re-validating every
    /// cross-component invariant the serialized form cannot express.
    pub fn deserialize(vec8: &[u8], config: CounterConfig) -> Result<PredicateIndex> {
        let mut pos = 0;
        check_remaining(vec8, pos, 8)?;
        let major = read_u16_ref(vec8, &mut pos);
        let minor = read_u16_ref(vec8, &mut pos);
        if major != INDEX_FORMAT_VERSION_MAJOR {
            return Err(Error::IncompatibleFormat { major, minor });
        }
        let n_documents = read_u32_ref(vec8, &mut pos) as usize;
        let min_feature = read_u8_vec(vec8, &mut pos)?;
        let interval_end = read_u16_vec(vec8, &mut pos)?;
        check_remaining(vec8, pos, 2)?;
        let highest_interval_end = read_u16_ref(vec8, &mut pos);
        let zero_constraint_docs = read_u32_vec(vec8, &mut pos)?;
        let interval_store = IntervalStore::deserialize(vec8, &mut pos)?;
        let interval_index = SimpleIndex::deserialize(vec8, &mut pos)?;
        let bounds_index = SimpleIndex::deserialize(vec8, &mut pos)?;
        if pos != vec8.len() {
            return Err(Error::Corruption(format!(
                "trailing bytes after index payload: read {pos} of {}",
                vec8.len()
            )));
        }
        if min_feature.len() != n_documents || interval_end.len() != n_documents {
            return Err(Error::Corruption(format!(
                "document annotation lengths {} / {} do not match document count {n_documents}",
                min_feature.len(),
                interval_end.len()
            )));
        }
        if interval_end.iter().copied().max().unwrap_or(0) != highest_interval_end {
            return Err(Error::Corruption(
                "stored highest interval end does not match annotations".into(),
            ));
        }
        if zero_constraint_docs.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(Error::Corruption(
                "zero-constraint doc ids not strictly ascending".into(),
            ));
        }
        if zero_constraint_docs
            .last()
            .is_some_and(|&doc_id| doc_id as usize >= n_documents)
        {
            return Err(Error::Corruption(format!(
                "zero-constraint doc id exceeds document count {n_documents}"
            )));
        }
        let n_sequences = interval_store.len() as u32;
        for (name, simple_index) in [("interval", &interval_index), ("bounds", &bounds_index)] {
            for entry in simple_index.entries() {
                // doc ids are strictly ascending, the last one bounds them all
                if entry
                    .doc_ids
                    .last()
                    .is_some_and(|&doc_id| doc_id as usize >= n_documents)
                {
                    return Err(Error::Corruption(format!(
                        "{name} posting entry {}: doc id exceeds document count {n_documents}",
                        entry.id
                    )));
                }
                if entry
                    .interval_refs
                    .iter()
                    .any(|&interval_ref| interval_ref >= n_sequences)
                {
                    return Err(Error::Corruption(format!(
                        "{name} posting entry {}: interval ref exceeds store size {n_sequences}",
                        entry.id
                    )));
                }
            }
        }
        Ok(PredicateIndex::new(
            config,
            min_feature,
            interval_end,
            interval_store,
            interval_index,
            bounds_index,
            zero_constraint_docs,
        ))
    }

    /// Writes the index to `index_path`: the binary payload and the JSON meta
    /// document. Creates the directory if needed.
    pub fn save(&self, index_path: &Path) -> Result<()> {
        fs::create_dir_all(index_path)?;
        let mut vec8 = Vec::new();
        self.serialize(&mut vec8);
        fs::write(index_path.join(INDEX_FILENAME), &vec8)?;
        let meta_json = serde_json::to_string_pretty(&self.meta)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        fs::write(index_path.join(META_FILENAME), meta_json)?;
        log::debug!(
            "saved predicate index: {} documents, {} bytes",
            self.meta.n_documents,
            vec8.len()
        );
        Ok(())
    }
}

/// Opens a predicate index directory written by [`PredicateIndex::save`]:
/// reads the meta document, then loads and validates the binary payload.
pub fn open_index(index_path: &Path) -> Result<PredicateIndex> {
    let meta_json = fs::read_to_string(index_path.join(META_FILENAME))?;
    let meta: IndexMetaObject =
        serde_json::from_str(&meta_json).map_err(|e| Error::Serialization(e.to_string()))?;
    let vec8 = fs::read(index_path.join(INDEX_FILENAME))?;
    let index = PredicateIndex::deserialize(
        &vec8,
        CounterConfig {
            max_cached_posting_lists: meta.max_cached_posting_lists,
            cache_coverage_ratio: meta.cache_coverage_ratio,
        },
    )?;
    if index.meta.n_documents != meta.n_documents {
        return Err(Error::Corruption(format!(
            "meta document count {} does not match binary payload {}",
            meta.n_documents, index.meta.n_documents
        )));
    }
    log::debug!("opened predicate index: {} documents", meta.n_documents);
    Ok(index)
}

/// Version of the predicate-index crate.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
