//! # codescan-store
//!
//! Relational side of the issue index: SQLite-backed issue and branch rows,
//! scoped read sessions for scanning, and the durable recovery queue.
//!
//! The recovery queue is the only crash-durable state owned by the
//! synchronization core; everything else here is the adapter to the
//! relational source of truth.

pub mod db;
pub mod error;
pub mod issues;
pub mod queue;
pub mod schema;

pub use db::{ReadSession, Store};
pub use error::StoreError;
pub use issues::{branch_exists, select_issue_page, BranchRow, IssueRow, ScanScope, ScannedRow};
