//! Conversions from Clockify wire types to [`EntityRecord`]s.

use crate::entity::{
    ClientDetails, EntityDetails, EntityRecord, ProjectDetails, TagDetails, TaskDetails,
    TimeEntryDetails, UserDetails, UserGroupDetails,
};

use super::types::{
    ClockifyClient, ClockifyProject, ClockifyTag, ClockifyTask, ClockifyTimeEntry, ClockifyUser,
    ClockifyUserGroup, ClockifyWorkspace,
};

const STATUS_ACTIVE: &str = "ACTIVE";
const STATUS_DONE: &str = "DONE";

/// Clockify sends `""` for absent references.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

pub fn workspace_to_record(ws: ClockifyWorkspace) -> EntityRecord {
    EntityRecord::workspace(ws.id, ws.name)
}

pub fn user_to_record(workspace_id: &str, user: ClockifyUser) -> EntityRecord {
    let active = user
        .status
        .as_deref()
        .is_none_or(|s| s.eq_ignore_ascii_case(STATUS_ACTIVE));
    let name = user
        .name
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| user.email.clone());
    EntityRecord::new(
        user.id,
        workspace_id,
        name,
        EntityDetails::User(UserDetails {
            email: user.email,
            active,
        }),
    )
}

pub fn user_group_to_record(workspace_id: &str, group: ClockifyUserGroup) -> EntityRecord {
    EntityRecord::new(
        group.id,
        workspace_id,
        group.name,
        EntityDetails::UserGroup(UserGroupDetails {
            member_ids: group.user_ids,
        }),
    )
}

pub fn client_to_record(workspace_id: &str, client: ClockifyClient) -> EntityRecord {
    EntityRecord::new(
        client.id,
        workspace_id,
        client.name,
        EntityDetails::Client(ClientDetails {
            archived: client.archived,
        }),
    )
}

pub fn tag_to_record(workspace_id: &str, tag: ClockifyTag) -> EntityRecord {
    EntityRecord::new(
        tag.id,
        workspace_id,
        tag.name,
        EntityDetails::Tag(TagDetails {
            archived: tag.archived,
        }),
    )
}

pub fn project_to_record(workspace_id: &str, project: ClockifyProject) -> EntityRecord {
    let member_ids = project
        .memberships
        .into_iter()
        .filter(|m| {
            m.membership_type
                .as_deref()
                .is_none_or(|t| t.eq_ignore_ascii_case("PROJECT"))
        })
        .map(|m| m.user_id)
        .collect();

    EntityRecord::new(
        project.id,
        workspace_id,
        project.name,
        EntityDetails::Project(ProjectDetails {
            client_id: non_empty(project.client_id),
            billable: project.billable,
            is_public: project.public,
            color: non_empty(project.color),
            archived: project.archived,
            member_ids,
        }),
    )
}

pub fn task_to_record(workspace_id: &str, task: ClockifyTask) -> EntityRecord {
    let done = task
        .status
        .as_deref()
        .is_some_and(|s| s.eq_ignore_ascii_case(STATUS_DONE));
    EntityRecord::new(
        task.id,
        workspace_id,
        task.name,
        EntityDetails::Task(TaskDetails {
            project_id: task.project_id,
            assignee_ids: task.assignee_ids,
            estimate_secs: task.estimate.as_deref().and_then(parse_duration),
            done,
        }),
    )
}

pub fn time_entry_to_record(workspace_id: &str, entry: ClockifyTimeEntry) -> EntityRecord {
    let details = TimeEntryDetails {
        start: entry.time_interval.start,
        end: entry.time_interval.end,
        billable: entry.billable,
        project_id: non_empty(entry.project_id),
        task_id: non_empty(entry.task_id),
        client_id: None,
        tag_ids: entry.tag_ids.unwrap_or_default(),
        user_id: non_empty(entry.user_id),
    };
    EntityRecord::new(
        entry.id,
        workspace_id,
        entry.description.unwrap_or_default(),
        EntityDetails::TimeEntry(details),
    )
}

/// Parse an ISO 8601 duration (`PT1H30M`, `P1DT2H`) into seconds.
/// Zero and malformed durations yield `None`.
pub fn parse_duration(value: &str) -> Option<i64> {
    let rest = value.trim().strip_prefix('P')?;
    let mut total: i64 = 0;
    let mut number = String::new();

    for c in rest.chars() {
        match c {
            'T' => {}
            '0'..='9' => number.push(c),
            'D' | 'H' | 'M' | 'S' => {
                let n: i64 = number.parse().ok()?;
                number.clear();
                total += match c {
                    'D' => n * 86_400,
                    'H' => n * 3_600,
                    'M' => n * 60,
                    _ => n,
                };
            }
            _ => return None,
        }
    }

    (number.is_empty() && total > 0).then_some(total)
}

/// Format seconds as an ISO 8601 duration, e.g. `PT1H30M`.
pub fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    let (hours, minutes, seconds) = (secs / 3_600, (secs % 3_600) / 60, secs % 60);
    if secs == 0 {
        return "PT0S".to_string();
    }

    let mut out = String::from("PT");
    if hours > 0 {
        out.push_str(&format!("{hours}H"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}M"));
    }
    if seconds > 0 {
        out.push_str(&format!("{seconds}S"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clockify::types::ClockifyMembership;
    use crate::entity::EntityGroup;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("PT1H30M"), Some(5_400));
        assert_eq!(parse_duration("PT45S"), Some(45));
        assert_eq!(parse_duration("P1DT2H"), Some(93_600));
        assert_eq!(parse_duration("PT0S"), None);
        assert_eq!(parse_duration("1H"), None);
        assert_eq!(parse_duration("PT1X"), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(5_400), "PT1H30M");
        assert_eq!(format_duration(61), "PT1M1S");
        assert_eq!(format_duration(0), "PT0S");
        assert_eq!(parse_duration(&format_duration(7_265)), Some(7_265));
    }

    #[test]
    fn test_project_drops_empty_client() {
        let project = ClockifyProject {
            id: "p1".to_string(),
            name: "Website".to_string(),
            client_id: Some(String::new()),
            memberships: vec![ClockifyMembership {
                user_id: "u1".to_string(),
                membership_type: Some("PROJECT".to_string()),
            }],
            ..ClockifyProject::default()
        };
        let record = project_to_record("w1", project);
        assert_eq!(record.member_of, EntityGroup::Projects);
        let EntityDetails::Project(details) = record.details else {
            panic!("expected project details");
        };
        assert_eq!(details.client_id, None);
        assert_eq!(details.member_ids, vec!["u1".to_string()]);
    }

    #[test]
    fn test_time_entry_from_json() {
        let entry: ClockifyTimeEntry = serde_json::from_value(serde_json::json!({
            "id": "e1",
            "description": "Standup",
            "userId": "u1",
            "billable": true,
            "projectId": "p1",
            "taskId": null,
            "tagIds": null,
            "timeInterval": {"start": "2024-03-01T09:00:00Z", "end": "2024-03-01T09:15:00Z"}
        }))
        .expect("valid entry");

        let record = time_entry_to_record("w1", entry);
        assert_eq!(record.natural_key(), "Standup|2024-03-01T09:00:00Z");
        let EntityDetails::TimeEntry(details) = record.details else {
            panic!("expected time entry details");
        };
        assert_eq!(details.duration_secs(), Some(900));
        assert_eq!(details.task_id, None);
        assert!(details.tag_ids.is_empty());
    }

    #[test]
    fn test_user_without_name_uses_email() {
        let user = ClockifyUser {
            id: "u1".to_string(),
            name: Some(String::new()),
            email: "ana@example.com".to_string(),
            status: Some("INACTIVE".to_string()),
        };
        let record = user_to_record("w1", user);
        assert_eq!(record.name, "ana@example.com");
        assert_eq!(
            record.details,
            EntityDetails::User(UserDetails {
                email: "ana@example.com".to_string(),
                active: false,
            })
        );
    }
}
