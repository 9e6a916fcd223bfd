use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use super::group::EntityGroup;

/// A normalized record from either service.
///
/// `id` and `workspace_id` are native to the service the record was read
/// from. `linked_id` is the id of the equivalent record on the other side,
/// set by linking or by a successful create.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub linked_id: Option<String>,
    pub is_included: bool,
    /// Source time entries referencing this record.
    pub entry_count: u32,
    pub member_of: EntityGroup,
    pub details: EntityDetails,
}

/// Group-specific payload carried alongside the common fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EntityDetails {
    Workspace,
    User(UserDetails),
    UserGroup(UserGroupDetails),
    Client(ClientDetails),
    Tag(TagDetails),
    Project(ProjectDetails),
    Task(TaskDetails),
    TimeEntry(TimeEntryDetails),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetails {
    pub email: String,
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserGroupDetails {
    pub member_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDetails {
    pub archived: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDetails {
    pub archived: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetails {
    pub client_id: Option<String>,
    pub billable: bool,
    pub is_public: bool,
    pub color: Option<String>,
    pub archived: bool,
    pub member_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetails {
    pub project_id: String,
    pub assignee_ids: Vec<String>,
    pub estimate_secs: Option<i64>,
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntryDetails {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub billable: bool,
    pub project_id: Option<String>,
    pub task_id: Option<String>,
    pub client_id: Option<String>,
    pub tag_ids: Vec<String>,
    pub user_id: Option<String>,
}

impl TimeEntryDetails {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            start,
            end: None,
            billable: false,
            project_id: None,
            task_id: None,
            client_id: None,
            tag_ids: Vec::new(),
            user_id: None,
        }
    }

    /// Length of the entry in whole seconds; running entries report `None`.
    #[must_use]
    pub fn duration_secs(&self) -> Option<i64> {
        self.end.map(|end| (end - self.start).num_seconds())
    }
}

impl EntityDetails {
    #[must_use]
    pub fn group(&self) -> EntityGroup {
        match self {
            EntityDetails::Workspace => EntityGroup::Workspaces,
            EntityDetails::User(_) => EntityGroup::Users,
            EntityDetails::UserGroup(_) => EntityGroup::UserGroups,
            EntityDetails::Client(_) => EntityGroup::Clients,
            EntityDetails::Tag(_) => EntityGroup::Tags,
            EntityDetails::Project(_) => EntityGroup::Projects,
            EntityDetails::Task(_) => EntityGroup::Tasks,
            EntityDetails::TimeEntry(_) => EntityGroup::TimeEntries,
        }
    }
}

impl EntityRecord {
    /// A fresh record: unlinked, included, no entries counted.
    pub fn new(
        id: impl Into<String>,
        workspace_id: impl Into<String>,
        name: impl Into<String>,
        details: EntityDetails,
    ) -> Self {
        Self {
            id: id.into(),
            workspace_id: workspace_id.into(),
            name: name.into(),
            linked_id: None,
            is_included: true,
            entry_count: 0,
            member_of: details.group(),
            details,
        }
    }

    /// Workspaces are their own scope, so `workspace_id == id`.
    pub fn workspace(id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(id.clone(), id, name, EntityDetails::Workspace)
    }

    #[must_use]
    pub fn with_linked_id(mut self, linked_id: impl Into<String>) -> Self {
        self.linked_id = Some(linked_id.into());
        self
    }

    #[must_use]
    pub fn with_included(mut self, included: bool) -> Self {
        self.is_included = included;
        self
    }

    /// Key used to match equivalent records across services.
    ///
    /// Names for everything except time entries, which have no unique name
    /// and match on description plus start instant.
    #[must_use]
    pub fn natural_key(&self) -> String {
        match self.details {
            EntityDetails::TimeEntry(ref entry) => format!(
                "{}|{}",
                self.name,
                entry.start.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
            _ => self.name.clone(),
        }
    }

    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.linked_id.is_some()
    }

    /// Ids of other records this one points at, with their groups.
    #[must_use]
    pub fn references(&self) -> Vec<(EntityGroup, &str)> {
        let mut refs = Vec::new();
        match self.details {
            EntityDetails::Workspace
            | EntityDetails::User(_)
            | EntityDetails::Client(_)
            | EntityDetails::Tag(_) => {}
            EntityDetails::UserGroup(ref group) => {
                refs.extend(group.member_ids.iter().map(|id| (EntityGroup::Users, id.as_str())));
            }
            EntityDetails::Project(ref project) => {
                if let Some(ref client_id) = project.client_id {
                    refs.push((EntityGroup::Clients, client_id.as_str()));
                }
                refs.extend(project.member_ids.iter().map(|id| (EntityGroup::Users, id.as_str())));
            }
            EntityDetails::Task(ref task) => {
                refs.push((EntityGroup::Projects, task.project_id.as_str()));
                refs.extend(task.assignee_ids.iter().map(|id| (EntityGroup::Users, id.as_str())));
            }
            EntityDetails::TimeEntry(ref entry) => {
                let singles = [
                    (EntityGroup::Projects, &entry.project_id),
                    (EntityGroup::Tasks, &entry.task_id),
                    (EntityGroup::Clients, &entry.client_id),
                    (EntityGroup::Users, &entry.user_id),
                ];
                for (group, id) in singles {
                    if let Some(id) = id {
                        refs.push((group, id.as_str()));
                    }
                }
                refs.extend(entry.tag_ids.iter().map(|id| (EntityGroup::Tags, id.as_str())));
            }
        }
        refs
    }
}
