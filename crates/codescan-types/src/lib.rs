//! # codescan-types
//!
//! Shared domain types for the codescan issue search index:
//! - Index documents: denormalized issue projections written to the index
//! - Change events: relational mutations that may require re-indexing
//! - Recovery items: durable markers of pending synchronization work
//! - Security taxonomy: CWE/OWASP/SANS classification of rules
//! - Settings: configuration for the synchronization engine

pub mod config;
pub mod error;
pub mod event;
pub mod issue;
pub mod recovery;
pub mod security;

pub use config::{SweepSettings, SyncSettings};
pub use error::ConfigError;
pub use event::{BranchEvent, BranchRef, ChangeEvent, EntityEvent};
pub use issue::{DocRef, Impact, ImpactSeverity, IssueDoc, SoftwareQuality};
pub use recovery::{DocIdType, RecoveryItem};
pub use security::{
    split_security_standards, SecurityCategory, SecurityStandards, VulnerabilityProbability,
    UNKNOWN_STANDARD,
};
