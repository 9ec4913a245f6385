//! Tantivy index lifecycle for the issue index.

use std::path::{Path, PathBuf};

use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy};
use tracing::{debug, info};

use crate::error::SearchError;
use crate::schema::{build_issue_schema, IssueSchema};

/// Default memory budget for IndexWriter (50MB)
const DEFAULT_WRITER_MEMORY_MB: usize = 50;

/// Issue index configuration.
#[derive(Debug, Clone)]
pub struct IssueIndexConfig {
    /// Path to index directory
    pub index_path: PathBuf,
    /// Memory budget for writer in MB
    pub writer_memory_mb: usize,
}

impl IssueIndexConfig {
    pub fn new(index_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            writer_memory_mb: DEFAULT_WRITER_MEMORY_MB,
        }
    }

    pub fn with_memory_mb(mut self, mb: usize) -> Self {
        self.writer_memory_mb = mb;
        self
    }
}

/// Wrapper for the Tantivy index with schema access.
pub struct IssueIndex {
    index: Index,
    schema: IssueSchema,
    config: IssueIndexConfig,
}

impl IssueIndex {
    /// Open existing index or create a new one.
    pub fn open_or_create(config: IssueIndexConfig) -> Result<Self, SearchError> {
        let index = open_or_create_index(&config.index_path)?;
        let schema = IssueSchema::from_schema(index.schema())?;

        info!(path = ?config.index_path, "Opened issue index");

        Ok(Self {
            index,
            schema,
            config,
        })
    }

    /// Get the issue schema.
    pub fn schema(&self) -> &IssueSchema {
        &self.schema
    }

    /// Get the underlying Tantivy index.
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Create an IndexWriter with the configured memory budget.
    pub fn writer(&self) -> Result<IndexWriter, SearchError> {
        let memory_budget = self.config.writer_memory_mb * 1024 * 1024;
        let writer = self.index.writer(memory_budget)?;
        debug!(
            memory_mb = self.config.writer_memory_mb,
            "Created index writer"
        );
        Ok(writer)
    }

    /// Create an IndexReader with OnCommit reload policy.
    pub fn reader(&self) -> Result<IndexReader, SearchError> {
        let reader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()?;
        Ok(reader)
    }

    /// Get the index path.
    pub fn path(&self) -> &Path {
        &self.config.index_path
    }
}

/// Open an existing index or create a new one on disk.
pub fn open_or_create_index(path: &Path) -> Result<Index, SearchError> {
    if path.join("meta.json").exists() {
        debug!(path = ?path, "Opening existing index");
        Ok(Index::open_in_dir(path)?)
    } else {
        info!(path = ?path, "Creating new index");
        std::fs::create_dir_all(path)?;
        let schema = build_issue_schema();
        Ok(Index::create_in_dir(path, schema.schema().clone())?)
    }
}
