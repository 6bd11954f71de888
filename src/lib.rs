// This crate is a library
#![crate_type = "lib"]
// The library is named "predicate_index"
#![crate_name = "predicate_index"]

//! # `predicate_index`
//!
//! predicate-index is a boolean-predicate matching engine: documents carry
//! boolean predicates (targeting/filter expressions) and a query carries an
//! attribute assignment; the index returns every document whose predicate the
//! assignment satisfies. Predicates are compiled offline into
//! interval-annotated posting lists, so matching never re-evaluates a boolean
//! formula per document. Up to 64 queries are batched into one index pass
//! through a `u64` subquery bitmap.
//!
//! The crate indexes and matches pre-annotated predicates; compiling boolean
//! expressions into interval annotations happens upstream.
//!
//! ### Add required crates to your project
//! ```text
//! cargo add predicate-index
//! ```
//!
//! ### build and search an index
//! ```rust
//! use predicate_index::counter::CounterConfig;
//! use predicate_index::index::PredicateIndex;
//! use predicate_index::interval::from_boundaries;
//! use predicate_index::interval_store::IntervalStore;
//! use predicate_index::simple_index::SimpleIndexBuilder;
//!
//! // Interval sequences are stored once and shared between documents.
//! let mut store = IntervalStore::new();
//! let whole = store.insert(&[from_boundaries(1, 5)]);
//!
//! // Documents 1 and 2 carry the feature with interval [1, 5].
//! let feature = 0xA1; // 64-bit feature hash, e.g. of "gender=male"
//! let mut intervals = SimpleIndexBuilder::new();
//! intervals.insert(feature, 1, whole);
//! intervals.insert(feature, 2, whole);
//!
//! let index = PredicateIndex::new(
//!     CounterConfig::default(),
//!     vec![0, 1, 1], // min_feature per document
//!     vec![0, 5, 5], // interval_end per document
//!     store,
//!     intervals.build(),
//!     SimpleIndexBuilder::new().build(),
//!     Vec::new(),
//! );
//!
//! // One subquery (bit 0) asks for the feature.
//! let posting_list = index.interval_posting_list(feature, 0b1).unwrap();
//! let hits: Vec<_> = index.search(vec![posting_list]).collect();
//! assert_eq!(hits.len(), 2);
//! assert_eq!(hits[0].doc_id, 1);
//! assert_eq!(hits[0].subquery_bitmap, 0b1);
//! ```
//!
//! ### persist and reopen
//! ```text
//! index.save(index_path)?;
//! let index = open_index(index_path)?;
//! ```
//!
//! ### predicate-index library version string
//! ```rust
//! let version = predicate_index::index::version();
//! println!("version {}", version);
//! ```

/// Counts, per document, how many of a query's posting lists contain it,
/// with a bit-vector cache over the most used lists.
pub mod counter;
/// Error and result types of index persistence.
pub mod error;
/// Assemble, persist, open and search predicate indexes.
pub mod index;
/// Packed interval codec: ordinary, z-star and bounds-annotated interval
/// words.
pub mod interval;
/// Deduplicated flat storage of interval sequences.
pub mod interval_store;
pub(crate) mod min_heap;
/// Posting streams over the four posting list variants.
pub mod posting_list;
/// The predicate search loop: min-feature gating plus interval merging.
pub mod search;
/// Feature-keyed posting maps for interval and bounds postings.
pub mod simple_index;
pub(crate) mod utils;

pub use error::{Error, Result};

/// Identifies a document; document ids are dense and start at zero.
pub type DocId = u32;

/// Marks which of the up to 64 batched subqueries a posting stream or a hit
/// belongs to, one bit per subquery.
pub type SubqueryBitmap = u64;

/// Bitmap addressing all batched subqueries at once.
pub const ALL_SUBQUERIES: SubqueryBitmap = SubqueryBitmap::MAX;
