//! Conversions between Toggl wire types and [`EntityRecord`]s.
//!
//! Toggl ids are integers; records carry them as strings so both services
//! share one id type. [`numeric_id`] goes the other way for request bodies.

use crate::entity::{
    ClientDetails, EntityDetails, EntityGroup, EntityRecord, ProjectDetails, TagDetails,
    TaskDetails, TimeEntryDetails, UserDetails, UserGroupDetails,
};
use crate::service::{Result, ServiceError, ServiceKind};

use super::types::{
    TogglClient, TogglGroup, TogglProject, TogglReportEntry, TogglTag, TogglTask, TogglTimeEntry,
    TogglWorkspace, TogglWorkspaceUser,
};

/// Parse a record id back into Toggl's integer form.
pub fn numeric_id(group: EntityGroup, id: &str) -> Result<i64> {
    id.parse().map_err(|_| ServiceError::InvalidId {
        service: ServiceKind::Toggl,
        group,
        id: id.to_string(),
    })
}

fn id_string(id: Option<i64>) -> Option<String> {
    id.filter(|&id| id > 0).map(|id| id.to_string())
}

pub fn workspace_to_record(ws: TogglWorkspace) -> EntityRecord {
    EntityRecord::workspace(ws.id.to_string(), ws.name)
}

pub fn user_to_record(workspace_id: &str, user: TogglWorkspaceUser) -> EntityRecord {
    let name = user
        .name
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| user.email.clone());
    EntityRecord::new(
        user.uid.to_string(),
        workspace_id,
        name,
        EntityDetails::User(UserDetails {
            email: user.email,
            active: user.active,
        }),
    )
}

pub fn group_to_record(workspace_id: &str, group: TogglGroup) -> EntityRecord {
    let member_ids = group
        .users
        .unwrap_or_default()
        .into_iter()
        .map(|u| u.user_id.to_string())
        .collect();
    EntityRecord::new(
        group.group_id.to_string(),
        workspace_id,
        group.name,
        EntityDetails::UserGroup(UserGroupDetails { member_ids }),
    )
}

pub fn client_to_record(workspace_id: &str, client: TogglClient) -> EntityRecord {
    EntityRecord::new(
        client.id.to_string(),
        workspace_id,
        client.name,
        EntityDetails::Client(ClientDetails {
            archived: client.archived,
        }),
    )
}

pub fn tag_to_record(workspace_id: &str, tag: TogglTag) -> EntityRecord {
    EntityRecord::new(
        tag.id.to_string(),
        workspace_id,
        tag.name,
        EntityDetails::Tag(TagDetails::default()),
    )
}

pub fn project_to_record(
    workspace_id: &str,
    project: TogglProject,
    member_ids: Vec<String>,
) -> EntityRecord {
    EntityRecord::new(
        project.id.to_string(),
        workspace_id,
        project.name,
        EntityDetails::Project(ProjectDetails {
            client_id: id_string(project.client_id),
            billable: project.billable.unwrap_or(false),
            is_public: !project.is_private,
            color: project.color.filter(|c| !c.is_empty()),
            archived: !project.active,
            member_ids,
        }),
    )
}

pub fn task_to_record(workspace_id: &str, task: TogglTask) -> EntityRecord {
    EntityRecord::new(
        task.id.to_string(),
        workspace_id,
        task.name,
        EntityDetails::Task(TaskDetails {
            project_id: task.project_id.to_string(),
            assignee_ids: id_string(task.user_id).into_iter().collect(),
            estimate_secs: task.estimated_seconds.filter(|&s| s > 0),
            done: !task.active,
        }),
    )
}

pub fn time_entry_to_record(workspace_id: &str, entry: TogglTimeEntry) -> EntityRecord {
    let details = TimeEntryDetails {
        start: entry.start,
        end: entry.stop,
        billable: entry.billable,
        project_id: id_string(entry.project_id),
        task_id: id_string(entry.task_id),
        client_id: None,
        tag_ids: entry
            .tag_ids
            .unwrap_or_default()
            .into_iter()
            .map(|id| id.to_string())
            .collect(),
        user_id: id_string(entry.user_id),
    };
    EntityRecord::new(
        entry.id.to_string(),
        workspace_id,
        entry.description.unwrap_or_default(),
        EntityDetails::TimeEntry(details),
    )
}

/// Convert a detailed-report row. The report names tags and the client, so
/// the caller resolves those names to ids first.
pub fn report_entry_to_record(
    workspace_id: &str,
    entry: TogglReportEntry,
    tag_ids: Vec<String>,
    client_id: Option<String>,
) -> EntityRecord {
    let details = TimeEntryDetails {
        start: entry.start,
        end: entry.end,
        billable: entry.is_billable,
        project_id: id_string(entry.pid),
        task_id: id_string(entry.tid),
        client_id,
        tag_ids,
        user_id: id_string(entry.uid),
    };
    EntityRecord::new(
        entry.id.to_string(),
        workspace_id,
        entry.description.unwrap_or_default(),
        EntityDetails::TimeEntry(details),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_id() {
        assert_eq!(numeric_id(EntityGroup::Tags, "42").ok(), Some(42));
        let err = numeric_id(EntityGroup::Tags, "abc").expect_err("not numeric");
        assert!(matches!(err, ServiceError::InvalidId { .. }));
    }

    #[test]
    fn test_project_flags_are_inverted() {
        let project: TogglProject = serde_json::from_value(serde_json::json!({
            "id": 7,
            "name": "Website",
            "client_id": null,
            "is_private": true,
            "active": false,
            "color": "#06aaf5"
        }))
        .expect("valid project");

        let record = project_to_record("100", project, vec!["9".to_string()]);
        assert_eq!(record.id, "7");
        let EntityDetails::Project(details) = record.details else {
            panic!("expected project details");
        };
        assert!(!details.is_public);
        assert!(details.archived);
        assert!(!details.billable);
        assert_eq!(details.client_id, None);
        assert_eq!(details.member_ids, vec!["9".to_string()]);
    }

    #[test]
    fn test_task_assignee_and_estimate() {
        let task = TogglTask {
            id: 3,
            name: "Design".to_string(),
            project_id: 7,
            user_id: Some(9),
            estimated_seconds: Some(0),
            active: true,
        };
        let record = task_to_record("100", task);
        assert_eq!(
            record.details,
            EntityDetails::Task(TaskDetails {
                project_id: "7".to_string(),
                assignee_ids: vec!["9".to_string()],
                estimate_secs: None,
                done: false,
            })
        );
    }

    #[test]
    fn test_report_entry_uses_resolved_names() {
        let entry: TogglReportEntry = serde_json::from_value(serde_json::json!({
            "id": 55,
            "pid": 7,
            "tid": null,
            "uid": 9,
            "description": "Standup",
            "start": "2024-03-01T10:00:00+01:00",
            "end": "2024-03-01T10:15:00+01:00",
            "client": "Acme",
            "tags": ["ops"],
            "is_billable": true
        }))
        .expect("valid report row");

        let record = report_entry_to_record(
            "100",
            entry,
            vec!["12".to_string()],
            Some("4".to_string()),
        );
        assert_eq!(record.natural_key(), "Standup|2024-03-01T09:00:00Z");
        let EntityDetails::TimeEntry(details) = record.details else {
            panic!("expected time entry details");
        };
        assert_eq!(details.project_id.as_deref(), Some("7"));
        assert_eq!(details.task_id, None);
        assert_eq!(details.client_id.as_deref(), Some("4"));
        assert_eq!(details.user_id.as_deref(), Some("9"));
        assert!(details.billable);
    }
}
