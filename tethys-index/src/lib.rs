//! Structure indexing and query core.
//!
//! Turns raw structure records into compact blobs plus screening
//! fingerprints, and answers substructure, tautomer, exact, similarity,
//! and gross-formula queries against them:
//!
//! - [`dict`]: the shared adaptive compression dictionary;
//! - [`codec`]: the structure/reaction feature codec over it;
//! - [`fingerprint`]: segmented fingerprints, subset screening, and
//!   similarity scoring with candidate bounds;
//! - [`prepare`]: the per-record indexing pipeline;
//! - [`dispatch`]: the parallel batch-indexing worker pool;
//! - [`matcher`] and [`session`]: compiled-query matching.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use tethys_index::dict::{LzwDict, DEFAULT_ALPHABET};
//! use tethys_index::prepare::{PrepareOptions, RecordPreparer};
//! use tethys_index::session::{MatchOptions, MatchResult, MatchSession, SearchMode};
//!
//! let dict = Arc::new(Mutex::new(LzwDict::new(DEFAULT_ALPHABET)));
//! let preparer = RecordPreparer::new(PrepareOptions::default(), dict.clone());
//! let record = preparer.prepare(0, b"Cc1ccccc1").unwrap();
//!
//! let mut session = MatchSession::new();
//! session
//!     .setup_match(SearchMode::Substructure, "c1ccccc1", MatchOptions::default())
//!     .unwrap();
//! assert!(session.screen(record.fingerprint.as_ref().unwrap()));
//! session.load_target_blob(&record.blob, Some(&dict)).unwrap();
//! assert_eq!(session.match_loaded().unwrap(), MatchResult::Matched(true));
//! ```

pub mod codec;
pub mod dict;
pub mod dispatch;
pub mod fingerprint;
pub mod matcher;
pub mod prepare;
pub mod session;

pub use dict::LzwDict;
pub use dispatch::{DispatchHandle, DispatchOptions, DispatchState, Dispatcher, RecordSource};
pub use fingerprint::{
    similarity, similarity_bounds, subset_test, Fingerprint, FingerprintLayout, FingerprintMode,
    Segment, SimilarityMetric,
};
pub use matcher::ConditionMask;
pub use prepare::{PrepareOptions, PreparedRecord, RecordPreparer};
pub use session::{MatchOptions, MatchResult, MatchSession, SearchMode};
