//! Routing of domain change events to recovery items.
//!
//! Pure and total: routing never fails and never touches a store. Most
//! events route to nothing because the fields they change are not
//! projected into issue documents.

use codescan_types::{BranchEvent, ChangeEvent, EntityEvent, RecoveryItem};

/// Classify a change event into the recovery items to persist.
///
/// | Event | Recovery items |
/// |---|---|
/// | entity creation / key update / tags update / permission change | none |
/// | entity deletion | one `DeleteProjectUuid` item per entity |
/// | branch measure change | none |
/// | branch deletion / switch of main branch | one `BranchUuid` item per branch |
pub fn route(event: &ChangeEvent) -> Vec<RecoveryItem> {
    match event {
        ChangeEvent::Entity {
            event,
            entity_uuids,
        } => match event {
            EntityEvent::Creation
            | EntityEvent::KeyUpdate
            | EntityEvent::TagsUpdate
            | EntityEvent::PermissionChange => Vec::new(),
            EntityEvent::Deletion => entity_uuids
                .iter()
                .map(|uuid| RecoveryItem::for_project_deletion(uuid.clone()))
                .collect(),
        },
        ChangeEvent::Branch { event, branches } => match event {
            BranchEvent::MeasureChange => Vec::new(),
            // a main-branch switch changes the is_main_branch flag on every
            // document of the branch
            BranchEvent::Deletion | BranchEvent::SwitchOfMainBranch => branches
                .iter()
                .map(|b| RecoveryItem::for_branch(b.branch_uuid.clone(), b.project_uuid.clone()))
                .collect(),
        },
    }
}
