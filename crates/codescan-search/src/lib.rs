//! # codescan-search
//!
//! The search side of the issue index: the [`IndexBackend`] port the
//! synchronization engine writes through, a Tantivy adapter implementing
//! it, and an in-memory fake with failure injection for tests.
//!
//! The port is deliberately narrow: bulk writes and deletes addressed by
//! document id and routing key, plus field-scoped bulk deletes. Query
//! language and ranking live elsewhere.

pub mod backend;
pub mod error;
pub mod index;
pub mod schema;
pub mod testing;
pub mod writer;

pub use backend::{DocOutcome, IndexBackend, ScopeField};
pub use error::SearchError;
pub use index::{IssueIndex, IssueIndexConfig};
pub use schema::IssueSchema;
pub use testing::FakeIndex;
pub use writer::TantivyBackend;
