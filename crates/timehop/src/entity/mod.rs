//! Normalized records shared by both services.

mod group;
mod record;
mod store;

pub use group::{EntityGroup, Operation, OperationStatus};
pub use record::{
    ClientDetails, EntityDetails, EntityRecord, ProjectDetails, TagDetails, TaskDetails,
    TimeEntryDetails, UserDetails, UserGroupDetails,
};
pub use store::{EntityCollection, EntityStore, IdMaps, Mapping, Side, WorkspaceLinks};
