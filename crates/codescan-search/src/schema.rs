//! Tantivy schema for issue documents.
//!
//! Addressing fields (key, scopes) are raw STRING fields so point deletes
//! and scoped deletes are exact term deletes. The full document travels in
//! a stored JSON payload, the way an opaque document store would keep the
//! source.

use tantivy::schema::{Field, Schema, STORED, STRING};

use crate::error::SearchError;

/// Schema field handles for efficient access.
#[derive(Debug, Clone)]
pub struct IssueSchema {
    schema: Schema,
    /// Issue key, the document id (STRING | STORED)
    pub key: Field,
    /// Routing key: owning project uuid (STRING | STORED)
    pub project_uuid: Field,
    /// Branch uuid (STRING | STORED)
    pub branch_uuid: Field,
    /// "true" / "false" (STRING)
    pub is_main_branch: Field,
    /// Rule key (STRING)
    pub rule_key: Field,
    /// Severity (STRING)
    pub severity: Field,
    /// Workflow status (STRING)
    pub status: Field,
    /// Full document as stored JSON (STORED)
    pub payload: Field,
}

impl IssueSchema {
    /// Get the underlying Tantivy schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Create an IssueSchema from an existing Tantivy schema.
    pub fn from_schema(schema: Schema) -> Result<Self, SearchError> {
        let field = |name: &str| {
            schema
                .get_field(name)
                .map_err(|_| SearchError::SchemaMismatch(format!("missing {} field", name)))
        };

        Ok(Self {
            key: field("key")?,
            project_uuid: field("project_uuid")?,
            branch_uuid: field("branch_uuid")?,
            is_main_branch: field("is_main_branch")?,
            rule_key: field("rule_key")?,
            severity: field("severity")?,
            status: field("status")?,
            payload: field("payload")?,
            schema,
        })
    }
}

/// Build the issue index schema.
pub fn build_issue_schema() -> IssueSchema {
    let mut schema_builder = Schema::builder();

    let key = schema_builder.add_text_field("key", STRING | STORED);
    let project_uuid = schema_builder.add_text_field("project_uuid", STRING | STORED);
    let branch_uuid = schema_builder.add_text_field("branch_uuid", STRING | STORED);
    let is_main_branch = schema_builder.add_text_field("is_main_branch", STRING);
    let rule_key = schema_builder.add_text_field("rule_key", STRING);
    let severity = schema_builder.add_text_field("severity", STRING);
    let status = schema_builder.add_text_field("status", STRING);
    let payload = schema_builder.add_text_field("payload", STORED);

    let schema = schema_builder.build();

    IssueSchema {
        schema,
        key,
        project_uuid,
        branch_uuid,
        is_main_branch,
        rule_key,
        severity,
        status,
        payload,
    }
}
