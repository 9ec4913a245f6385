//! Change events produced by the relational side.
//!
//! Every mutation of an entity (project) or branch is reported as one of
//! these events. The change router decides which events require recovery
//! items; most do not touch this index at all.

use serde::{Deserialize, Serialize};

/// Mutation of an entity (project, application, portfolio).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityEvent {
    Creation,
    KeyUpdate,
    TagsUpdate,
    PermissionChange,
    Deletion,
}

/// Mutation of a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchEvent {
    MeasureChange,
    Deletion,
    SwitchOfMainBranch,
}

/// A branch together with its owning project.
///
/// Branch-scoped recovery items keep the project uuid as routing key so
/// scoped deletes stay addressed to the right partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    pub branch_uuid: String,
    pub project_uuid: String,
}

impl BranchRef {
    pub fn new(branch_uuid: impl Into<String>, project_uuid: impl Into<String>) -> Self {
        Self {
            branch_uuid: branch_uuid.into(),
            project_uuid: project_uuid.into(),
        }
    }
}

/// A domain change event, consumed within the request that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeEvent {
    Entity {
        event: EntityEvent,
        entity_uuids: Vec<String>,
    },
    Branch {
        event: BranchEvent,
        branches: Vec<BranchRef>,
    },
}

impl ChangeEvent {
    pub fn entity(event: EntityEvent, entity_uuids: Vec<String>) -> Self {
        ChangeEvent::Entity {
            event,
            entity_uuids,
        }
    }

    pub fn branch(event: BranchEvent, branches: Vec<BranchRef>) -> Self {
        ChangeEvent::Branch { event, branches }
    }
}
