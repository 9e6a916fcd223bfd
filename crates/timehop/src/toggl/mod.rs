//! Toggl Track (API v9) handlers.
//!
//! # Module Structure
//!
//! - `types`: wire structs for API v9 and the v2 detailed report
//! - `convert`: wire structs to [`EntityRecord`](crate::entity::EntityRecord)s
//! - `handlers`: one [`EntityHandlers`](crate::handlers::EntityHandlers) per group
//!
//! Toggl ids are integers and are carried as strings inside records. Time
//! entries are read from the detailed report (50 rows per page), which
//! names tags and clients instead of referencing them by id.

mod convert;
mod handlers;
pub mod types;

pub use convert::numeric_id;
pub use handlers::{
    TogglClients, TogglProjects, TogglTags, TogglTasks, TogglTimeEntries, TogglUserGroups,
    TogglUsers, TogglWorkspaces, register,
};

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::entity::{
        EntityDetails, EntityGroup, EntityRecord, EntityStore, IdMaps, Side, TagDetails,
        TaskDetails, TimeEntryDetails, UserDetails,
    };
    use crate::handlers::{EntityHandlers, FetchContext};
    use crate::http::{HttpMethod, MockTransport};
    use crate::retry::RetryConfig;
    use crate::service::{ServiceClient, ServiceError, ServiceKind, ServiceSettings};
    use crate::sync::DateRange;

    const BASE: &str = "https://toggl.test/api/v9";
    const REPORTS: &str = "https://toggl.test/reports/api/v2";

    fn client(transport: &MockTransport) -> ServiceClient {
        let settings = ServiceSettings::new(ServiceKind::Toggl, "token")
            .with_base_url(BASE)
            .with_reports_url(REPORTS)
            .with_request_delay(Duration::ZERO)
            .with_retry(RetryConfig::new(Duration::ZERO, 5));
        ServiceClient::with_transport(&settings, Arc::new(transport.clone()))
    }

    fn range() -> DateRange {
        DateRange::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_report_fetch_pages_and_resolves_names() {
        let transport = MockTransport::new();
        let url = |page: u32| {
            format!(
                "{REPORTS}/details?workspace_id=100&since=2024-01-01&until=2024-12-31&user_agent=timehop&page={page}"
            )
        };
        let row = |id: i64| {
            json!({
                "id": id,
                "pid": 7,
                "uid": 9,
                "description": format!("Entry {id}"),
                "start": "2024-03-01T09:00:00Z",
                "end": "2024-03-01T10:00:00Z",
                "client": "Acme",
                "tags": ["ops", "unknown"]
            })
        };
        let full: Vec<_> = (1..=50).map(row).collect();
        transport.push_json(HttpMethod::Get, url(1), 200, json!({ "data": full }));
        transport.push_json(HttpMethod::Get, url(2), 200, json!({ "data": [row(51)] }));

        let mut store = EntityStore::new();
        store.mapping_mut(EntityGroup::Tags).source.insert(EntityRecord::new(
            "12",
            "100",
            "ops",
            EntityDetails::Tag(TagDetails::default()),
        ));
        store
            .mapping_mut(EntityGroup::Clients)
            .source
            .insert(EntityRecord::new(
                "4",
                "100",
                "Acme",
                EntityDetails::Client(Default::default()),
            ));

        let client = client(&transport);
        let range = range();
        let ctx = FetchContext {
            client: &client,
            store: &store,
            side: Side::Source,
            range: &range,
        };
        let entries = TogglTimeEntries
            .fetch(&ctx, "100")
            .await
            .expect("report fetch succeeds");
        assert_eq!(entries.len(), 51);
        assert_eq!(transport.requests().len(), 2);

        let EntityDetails::TimeEntry(ref details) = entries[0].details else {
            panic!("expected time entry details");
        };
        assert_eq!(details.tag_ids, vec!["12".to_string()]);
        assert_eq!(details.client_id.as_deref(), Some("4"));
    }

    #[tokio::test]
    async fn test_time_entry_create_sends_numeric_ids() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            format!("{BASE}/workspaces/200/time_entries"),
            200,
            json!({
                "id": 900,
                "description": "Standup",
                "start": "2024-03-01T09:00:00Z",
                "stop": "2024-03-01T09:15:00Z",
                "project_id": 70,
                "tag_ids": [120]
            }),
        );

        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let entry = EntityRecord::new(
            "abc",
            "w1",
            "Standup",
            EntityDetails::TimeEntry(TimeEntryDetails {
                end: Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 15, 0).unwrap()),
                project_id: Some("p1".to_string()),
                tag_ids: vec!["t1".to_string()],
                ..TimeEntryDetails::new(start)
            }),
        );
        let mut maps = IdMaps::new();
        maps.insert(EntityGroup::Projects, "p1", "70");
        maps.insert(EntityGroup::Tags, "t1", "120");

        let client = client(&transport);
        let created = TogglTimeEntries
            .create(&client, &entry, "200", &maps)
            .await
            .expect("create succeeds");
        assert_eq!(created.id, "900");

        let body: serde_json::Value =
            serde_json::from_slice(&transport.requests()[0].body).expect("json body");
        assert_eq!(body["project_id"], json!(70));
        assert_eq!(body["tag_ids"], json!([120]));
        assert_eq!(body["duration"], json!(900));
        assert_eq!(body["workspace_id"], json!(200));
        assert_eq!(body["created_with"], json!("timehop"));
    }

    #[tokio::test]
    async fn test_task_create_requires_project() {
        let transport = MockTransport::new();
        let task = EntityRecord::new(
            "t1",
            "w1",
            "Design",
            EntityDetails::Task(TaskDetails {
                project_id: "p1".to_string(),
                ..TaskDetails::default()
            }),
        );

        let client = client(&transport);
        let err = TogglTasks
            .create(&client, &task, "200", &IdMaps::new())
            .await
            .expect_err("project is unmapped");
        assert!(matches!(
            err,
            ServiceError::UnresolvedDependency {
                reference: EntityGroup::Projects,
                ..
            }
        ));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_user_delete_removes_membership() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{BASE}/workspaces/100/workspace_users"),
            200,
            json!([
                {"id": 501, "uid": 9, "email": "ana@example.com"},
                {"id": 502, "uid": 10, "email": "bo@example.com"}
            ]),
        );
        transport.push_status(
            HttpMethod::Delete,
            format!("{BASE}/workspaces/100/workspace_users/501"),
            200,
        );

        let user = EntityRecord::new(
            "9",
            "100",
            "Ana",
            EntityDetails::User(UserDetails {
                email: "ana@example.com".to_string(),
                active: true,
            }),
        );
        let client = client(&transport);
        TogglUsers
            .delete(&client, &user)
            .await
            .expect("delete succeeds");
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_user_delete_is_soft_failure() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{BASE}/workspaces/100/workspace_users"),
            200,
            json!([]),
        );

        let user = EntityRecord::new(
            "9",
            "100",
            "Ana",
            EntityDetails::User(UserDetails::default()),
        );
        let client = client(&transport);
        let err = TogglUsers
            .delete(&client, &user)
            .await
            .expect_err("user is gone");
        assert!(err.is_soft_failure());
    }

    #[tokio::test]
    async fn test_projects_carry_members() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{BASE}/workspaces/100/projects?active=both&page=1&per_page=100"),
            200,
            json!([{"id": 7, "name": "Website", "client_id": 4, "active": true}]),
        );
        transport.push_json(
            HttpMethod::Get,
            format!("{BASE}/workspaces/100/project_users"),
            200,
            json!([{"project_id": 7, "user_id": 9}, {"project_id": 8, "user_id": 10}]),
        );

        let client = client(&transport);
        let store = EntityStore::new();
        let range = range();
        let ctx = FetchContext {
            client: &client,
            store: &store,
            side: Side::Target,
            range: &range,
        };
        let projects = TogglProjects
            .fetch(&ctx, "100")
            .await
            .expect("fetch succeeds");
        assert_eq!(projects.len(), 1);
        assert_eq!(
            projects[0].references(),
            vec![(EntityGroup::Clients, "4"), (EntityGroup::Users, "9")]
        );
    }

    #[tokio::test]
    async fn test_non_numeric_workspace_is_rejected() {
        let transport = MockTransport::new();
        let client = client(&transport);
        let err = TogglTimeEntries
            .create(
                &client,
                &EntityRecord::new(
                    "e",
                    "w",
                    "x",
                    EntityDetails::TimeEntry(TimeEntryDetails::new(Utc::now())),
                ),
                "not-a-number",
                &IdMaps::new(),
            )
            .await
            .expect_err("workspace id is not numeric");
        assert!(matches!(err, ServiceError::InvalidId { .. }));
    }
}
