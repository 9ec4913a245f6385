//! # codescan-sync
//!
//! The index synchronization engine: keeps the issue search index
//! eventually consistent with the relational store despite partial
//! failures, partial rebuilds and concurrent mutation.
//!
//! There is no transactional coupling between the two stores. Safety comes
//! from idempotent point writes and deletes keyed by document id,
//! idempotent scoped deletes, and a durable recovery queue that tolerates
//! duplicate and stale resolutions.
//!
//! - [`router`]: classifies domain change events into recovery items
//! - [`reader`]: lazily materializes documents from relational truth
//! - [`bulk`]: applies documents and deletions in bounded batches
//! - [`listener`]: reconciles the recovery queue from per-item outcomes
//! - [`cascade`]: synchronous, queue-bypassing deletes
//! - [`engine`]: the facade tying the pieces together
//! - [`sweeper`]: background retry pass over the recovery queue

pub mod bulk;
pub mod cascade;
pub mod engine;
pub mod error;
pub mod listener;
pub mod reader;
pub mod result;
pub mod router;
pub mod sweeper;

pub use bulk::{BulkSynchronizer, Deletion};
pub use cascade::DeletionCascade;
pub use engine::SyncEngine;
pub use error::SyncError;
pub use listener::{IndexingListener, NoopListener, QueueListener, Resolution};
pub use reader::{read_all, read_for_branch, read_for_keys, DocCursor, MAX_KEY_PARTITION};
pub use result::IndexingResult;
pub use router::route;
pub use sweeper::RecoverySweeper;
