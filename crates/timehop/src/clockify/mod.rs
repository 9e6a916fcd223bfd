//! Clockify (REST API v1) handlers.
//!
//! # Module Structure
//!
//! - `types`: wire structs as Clockify serializes them
//! - `convert`: wire structs to [`EntityRecord`](crate::entity::EntityRecord)s
//! - `handlers`: one [`EntityHandlers`](crate::handlers::EntityHandlers) per group
//!
//! Most listings are paginated with `page`/`page-size`. Tasks are listed per
//! project and time entries per user, so both rely on records fetched
//! earlier in the same run.

mod convert;
mod handlers;
pub mod types;

pub use convert::{format_duration, parse_duration};
pub use handlers::{
    ClockifyClients, ClockifyProjects, ClockifyTags, ClockifyTasks, ClockifyTimeEntries,
    ClockifyUserGroups, ClockifyUsers, ClockifyWorkspaces, register,
};

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::entity::{
        EntityDetails, EntityGroup, EntityRecord, EntityStore, IdMaps, ProjectDetails, Side,
        TaskDetails, TimeEntryDetails,
    };
    use crate::handlers::{EntityHandlers, FetchContext};
    use crate::http::{HttpMethod, MockTransport};
    use crate::retry::RetryConfig;
    use crate::service::{ServiceClient, ServiceError, ServiceKind, ServiceSettings};
    use crate::sync::DateRange;

    const BASE: &str = "https://clockify.test/api/v1";

    fn client(transport: &MockTransport) -> ServiceClient {
        let settings = ServiceSettings::new(ServiceKind::Clockify, "key")
            .with_base_url(BASE)
            .with_request_delay(Duration::ZERO)
            .with_retry(RetryConfig::new(Duration::ZERO, 5));
        ServiceClient::with_transport(&settings, Arc::new(transport.clone()))
    }

    fn project(id: &str, client_id: Option<&str>) -> EntityRecord {
        EntityRecord::new(
            id,
            "w1",
            "Website",
            EntityDetails::Project(ProjectDetails {
                client_id: client_id.map(str::to_string),
                billable: true,
                ..ProjectDetails::default()
            }),
        )
    }

    #[tokio::test]
    async fn test_project_delete_archives_first() {
        let transport = MockTransport::new();
        let url = format!("{BASE}/workspaces/w1/projects/p1");
        transport.push_json(HttpMethod::Put, url.clone(), 200, json!({}));
        transport.push_status(HttpMethod::Delete, url.clone(), 204);

        let client = client(&transport);
        ClockifyProjects
            .delete(&client, &project("p1", None))
            .await
            .expect("delete succeeds");

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, HttpMethod::Put);
        let body: serde_json::Value =
            serde_json::from_slice(&requests[0].body).expect("json body");
        assert_eq!(body["archived"], json!(true));
        assert_eq!(requests[1].method, HttpMethod::Delete);
        assert_eq!(requests[1].url, url);
    }

    #[tokio::test]
    async fn test_project_create_requires_client_mapping() {
        let transport = MockTransport::new();
        let client = client(&transport);

        let err = ClockifyProjects
            .create(&client, &project("p1", Some("c1")), "w2", &IdMaps::new())
            .await
            .expect_err("client is unmapped");
        assert!(matches!(
            err,
            ServiceError::UnresolvedDependency {
                reference: EntityGroup::Clients,
                ..
            }
        ));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_project_create_translates_client() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            format!("{BASE}/workspaces/w2/projects"),
            201,
            json!({"id": "p9", "name": "Website", "clientId": "c9", "billable": true}),
        );

        let mut maps = IdMaps::new();
        maps.insert(EntityGroup::Clients, "c1", "c9");

        let client = client(&transport);
        let created = ClockifyProjects
            .create(&client, &project("p1", Some("c1")), "w2", &maps)
            .await
            .expect("create succeeds");
        assert_eq!(created.id, "p9");
        assert_eq!(created.workspace_id, "w2");

        let body: serde_json::Value =
            serde_json::from_slice(&transport.requests()[0].body).expect("json body");
        assert_eq!(body["clientId"], json!("c9"));
        assert_eq!(body["billable"], json!(true));
    }

    #[tokio::test]
    async fn test_task_fetch_walks_projects() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{BASE}/workspaces/w1/projects/p1/tasks?page=1&page-size=100"),
            200,
            json!([{"id": "t1", "name": "Design", "projectId": "p1", "estimate": "PT2H"}]),
        );

        let mut store = EntityStore::new();
        store
            .mapping_mut(EntityGroup::Projects)
            .source
            .insert(project("p1", None));

        let client = client(&transport);
        let range = DateRange::default();
        let ctx = FetchContext {
            client: &client,
            store: &store,
            side: Side::Source,
            range: &range,
        };
        let tasks = ClockifyTasks.fetch(&ctx, "w1").await.expect("fetch succeeds");
        assert_eq!(tasks.len(), 1);
        let EntityDetails::Task(ref details) = tasks[0].details else {
            panic!("expected task details");
        };
        assert_eq!(details.estimate_secs, Some(7_200));
    }

    #[tokio::test]
    async fn test_time_entry_create_uses_mapped_user() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            format!("{BASE}/workspaces/w2/user/u9/time-entries"),
            201,
            json!({
                "id": "e9",
                "description": "Standup",
                "userId": "u9",
                "projectId": "p9",
                "timeInterval": {"start": "2024-03-01T09:00:00Z", "end": "2024-03-01T09:15:00Z"}
            }),
        );

        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let entry = EntityRecord::new(
            "e1",
            "w1",
            "Standup",
            EntityDetails::TimeEntry(TimeEntryDetails {
                end: Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 15, 0).unwrap()),
                project_id: Some("p1".to_string()),
                tag_ids: vec!["unmapped".to_string()],
                user_id: Some("u1".to_string()),
                ..TimeEntryDetails::new(start)
            }),
        );

        let mut maps = IdMaps::new();
        maps.insert(EntityGroup::Projects, "p1", "p9");
        maps.insert(EntityGroup::Users, "u1", "u9");

        let client = client(&transport);
        let created = ClockifyTimeEntries
            .create(&client, &entry, "w2", &maps)
            .await
            .expect("create succeeds");
        assert_eq!(created.natural_key(), entry.natural_key());

        let body: serde_json::Value =
            serde_json::from_slice(&transport.requests()[0].body).expect("json body");
        assert_eq!(body["projectId"], json!("p9"));
        assert_eq!(body["tagIds"], json!([]));
        assert_eq!(body["start"], json!("2024-03-01T09:00:00Z"));
    }

    #[tokio::test]
    async fn test_task_delete_uses_project_path() {
        let transport = MockTransport::new();
        transport.push_status(
            HttpMethod::Delete,
            format!("{BASE}/workspaces/w1/projects/p1/tasks/t1"),
            204,
        );

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
        ClockifyTasks
            .delete(&client, &task)
            .await
            .expect("delete succeeds");
    }

    #[tokio::test]
    async fn test_workspace_delete_is_unsupported() {
        let transport = MockTransport::new();
        let client = client(&transport);
        let err = ClockifyWorkspaces
            .delete(&client, &EntityRecord::workspace("w1", "Acme"))
            .await
            .expect_err("workspaces cannot be deleted");
        assert!(matches!(err, ServiceError::Unsupported { .. }));
    }
}
