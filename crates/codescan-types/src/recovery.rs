//! Recovery items: durable markers of pending index synchronization work.
//!
//! A recovery item survives crashes and backend outages; it is deleted only
//! once the work it describes has been applied to the index. Identity is
//! `(doc_id, doc_id_type)` and duplicate identities are coalesced by the
//! queue, so consumers must tolerate at-least-once processing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the `doc_id` of a recovery item refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocIdType {
    /// One issue key, resolved one-to-one against the index.
    IssueKey,
    /// A branch uuid, resolved against every document of the branch.
    BranchUuid,
    /// A deleted project uuid, resolved by a routing-scoped delete.
    DeleteProjectUuid,
}

impl DocIdType {
    /// Stable string tag used in the durable queue layout.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocIdType::IssueKey => "issueKey",
            DocIdType::BranchUuid => "branchUuid",
            DocIdType::DeleteProjectUuid => "deleteProjectUuid",
        }
    }

    /// Parse a stored tag, returning None for unknown tags.
    ///
    /// Unknown tags can appear when a newer or older version wrote the row;
    /// callers report them and leave the row in place.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "issueKey" => Some(DocIdType::IssueKey),
            "branchUuid" => Some(DocIdType::BranchUuid),
            "deleteProjectUuid" => Some(DocIdType::DeleteProjectUuid),
            _ => None,
        }
    }
}

impl std::str::FromStr for DocIdType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown doc id type: {}", s))
    }
}

impl std::fmt::Display for DocIdType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pending unit of synchronization work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryItem {
    pub doc_id: String,
    pub doc_id_type: DocIdType,
    /// Routing key of the owning project.
    pub routing: String,
    pub inserted_at: DateTime<Utc>,
}

impl RecoveryItem {
    pub fn new(
        doc_id: impl Into<String>,
        doc_id_type: DocIdType,
        routing: impl Into<String>,
    ) -> Self {
        Self {
            doc_id: doc_id.into(),
            doc_id_type,
            routing: routing.into(),
            inserted_at: Utc::now(),
        }
    }

    /// Item for re-reading and re-writing one issue.
    pub fn for_issue(issue_key: impl Into<String>, project_uuid: impl Into<String>) -> Self {
        Self::new(issue_key, DocIdType::IssueKey, project_uuid)
    }

    /// Item for re-reading a whole branch (or deleting it when gone).
    pub fn for_branch(branch_uuid: impl Into<String>, project_uuid: impl Into<String>) -> Self {
        Self::new(branch_uuid, DocIdType::BranchUuid, project_uuid)
    }

    /// Item for deleting every document of a removed project.
    pub fn for_project_deletion(project_uuid: impl Into<String>) -> Self {
        let uuid = project_uuid.into();
        Self::new(uuid.clone(), DocIdType::DeleteProjectUuid, uuid)
    }

    /// Queue identity: duplicate identities coalesce, last write wins.
    pub fn identity(&self) -> (&str, DocIdType) {
        (&self.doc_id, self.doc_id_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_id_type_tags_roundtrip() {
        for ty in [
            DocIdType::IssueKey,
            DocIdType::BranchUuid,
            DocIdType::DeleteProjectUuid,
        ] {
            assert_eq!(DocIdType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(DocIdType::parse("unknown"), None);
        assert!("bogus".parse::<DocIdType>().is_err());
    }

    #[test]
    fn test_constructors_set_routing() {
        let item = RecoveryItem::for_issue("I1", "P1");
        assert_eq!(item.identity(), ("I1", DocIdType::IssueKey));
        assert_eq!(item.routing, "P1");

        let item = RecoveryItem::for_branch("B1", "P1");
        assert_eq!(item.identity(), ("B1", DocIdType::BranchUuid));
        assert_eq!(item.routing, "P1");

        let item = RecoveryItem::for_project_deletion("P1");
        assert_eq!(item.identity(), ("P1", DocIdType::DeleteProjectUuid));
        assert_eq!(item.routing, "P1");
    }
}
