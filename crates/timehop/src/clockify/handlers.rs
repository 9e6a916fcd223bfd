//! Clockify handlers, one per entity group.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};

use crate::entity::{EntityDetails, EntityGroup, EntityRecord, IdMaps};
use crate::handlers::{EntityHandlers, FetchContext, HandlerRegistry, mismatched};
use crate::http::HttpMethod;
use crate::service::{FetchOptions, Result, ServiceClient, ServiceError, ServiceKind};

use super::convert::{
    client_to_record, format_duration, project_to_record, tag_to_record, task_to_record,
    time_entry_to_record, user_group_to_record, user_to_record, workspace_to_record,
};
use super::types::{
    ClockifyClient, ClockifyProject, ClockifyTag, ClockifyTask, ClockifyTimeEntry, ClockifyUser,
    ClockifyUserGroup, ClockifyWorkspace,
};

/// Register every Clockify handler.
pub fn register(registry: &mut HandlerRegistry) {
    registry.register(ServiceKind::Clockify, ClockifyWorkspaces);
    registry.register(ServiceKind::Clockify, ClockifyUsers);
    registry.register(ServiceKind::Clockify, ClockifyUserGroups);
    registry.register(ServiceKind::Clockify, ClockifyClients);
    registry.register(ServiceKind::Clockify, ClockifyTags);
    registry.register(ServiceKind::Clockify, ClockifyProjects);
    registry.register(ServiceKind::Clockify, ClockifyTasks);
    registry.register(ServiceKind::Clockify, ClockifyTimeEntries);
}

fn timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub struct ClockifyWorkspaces;

#[async_trait]
impl EntityHandlers for ClockifyWorkspaces {
    fn group(&self) -> EntityGroup {
        EntityGroup::Workspaces
    }

    async fn fetch(&self, ctx: &FetchContext<'_>, _workspace_id: &str) -> Result<Vec<EntityRecord>> {
        let workspaces: Vec<ClockifyWorkspace> = ctx
            .client
            .fetch_list("/workspaces", FetchOptions::get())
            .await?;
        Ok(workspaces.into_iter().map(workspace_to_record).collect())
    }

    async fn create(
        &self,
        client: &ServiceClient,
        record: &EntityRecord,
        _target_workspace_id: &str,
        _maps: &IdMaps,
    ) -> Result<EntityRecord> {
        let created: ClockifyWorkspace = client
            .fetch_json("/workspaces", FetchOptions::post(json!({ "name": record.name })))
            .await?;
        Ok(workspace_to_record(created))
    }

    async fn delete(&self, _client: &ServiceClient, _record: &EntityRecord) -> Result<()> {
        Err(ServiceError::Unsupported {
            service: ServiceKind::Clockify,
            group: EntityGroup::Workspaces,
            operation: "delete",
        })
    }
}

pub struct ClockifyUsers;

#[async_trait]
impl EntityHandlers for ClockifyUsers {
    fn group(&self) -> EntityGroup {
        EntityGroup::Users
    }

    async fn fetch(&self, ctx: &FetchContext<'_>, workspace_id: &str) -> Result<Vec<EntityRecord>> {
        let users: Vec<ClockifyUser> = ctx
            .client
            .collect_paginated(&format!("/workspaces/{workspace_id}/users"), &[])
            .await?;
        Ok(users
            .into_iter()
            .map(|u| user_to_record(workspace_id, u))
            .collect())
    }

    /// Adds the user to the workspace by email, then looks the new member up.
    async fn create(
        &self,
        client: &ServiceClient,
        record: &EntityRecord,
        target_workspace_id: &str,
        _maps: &IdMaps,
    ) -> Result<EntityRecord> {
        let EntityDetails::User(ref user) = record.details else {
            return Err(mismatched(EntityGroup::Users, record));
        };

        let endpoint = format!("/workspaces/{target_workspace_id}/users");
        client
            .fetch_empty(&endpoint, FetchOptions::post(json!({ "email": user.email })))
            .await?;

        let members: Vec<ClockifyUser> = client
            .fetch_list(&endpoint, FetchOptions::get().with_query("email", &user.email))
            .await?;
        members
            .into_iter()
            .find(|m| m.email.eq_ignore_ascii_case(&user.email))
            .map(|m| user_to_record(target_workspace_id, m))
            .ok_or_else(|| ServiceError::Api {
                service: ServiceKind::Clockify,
                method: HttpMethod::Get,
                endpoint,
                status: 404,
                body: format!("{} is not listed as a workspace member", user.email),
            })
    }

    /// Deactivates the membership before removing it.
    async fn delete(&self, client: &ServiceClient, record: &EntityRecord) -> Result<()> {
        let endpoint = format!("/workspaces/{}/users/{}", record.workspace_id, record.id);
        client
            .fetch_empty(&endpoint, FetchOptions::put(json!({ "status": "INACTIVE" })))
            .await?;
        client.fetch_empty(&endpoint, FetchOptions::delete()).await
    }
}

pub struct ClockifyUserGroups;

#[async_trait]
impl EntityHandlers for ClockifyUserGroups {
    fn group(&self) -> EntityGroup {
        EntityGroup::UserGroups
    }

    async fn fetch(&self, ctx: &FetchContext<'_>, workspace_id: &str) -> Result<Vec<EntityRecord>> {
        let groups: Vec<ClockifyUserGroup> = ctx
            .client
            .collect_paginated(&format!("/workspaces/{workspace_id}/user-groups"), &[])
            .await?;
        Ok(groups
            .into_iter()
            .map(|g| user_group_to_record(workspace_id, g))
            .collect())
    }

    async fn create(
        &self,
        client: &ServiceClient,
        record: &EntityRecord,
        target_workspace_id: &str,
        maps: &IdMaps,
    ) -> Result<EntityRecord> {
        let EntityDetails::UserGroup(ref group) = record.details else {
            return Err(mismatched(EntityGroup::UserGroups, record));
        };
        let members = maps.optional_many(EntityGroup::Users, &group.member_ids);

        let mut created: ClockifyUserGroup = client
            .fetch_json(
                &format!("/workspaces/{target_workspace_id}/user-groups"),
                FetchOptions::post(json!({ "name": record.name })),
            )
            .await?;

        let members_endpoint = format!(
            "/workspaces/{target_workspace_id}/user-groups/{}/users",
            created.id
        );
        for user_id in &members {
            client
                .fetch_empty(&members_endpoint, FetchOptions::post(json!({ "userId": user_id })))
                .await?;
        }
        created.user_ids = members;

        Ok(user_group_to_record(target_workspace_id, created))
    }

    async fn delete(&self, client: &ServiceClient, record: &EntityRecord) -> Result<()> {
        client
            .fetch_empty(
                &format!("/workspaces/{}/user-groups/{}", record.workspace_id, record.id),
                FetchOptions::delete(),
            )
            .await
    }
}

pub struct ClockifyClients;

#[async_trait]
impl EntityHandlers for ClockifyClients {
    fn group(&self) -> EntityGroup {
        EntityGroup::Clients
    }

    async fn fetch(&self, ctx: &FetchContext<'_>, workspace_id: &str) -> Result<Vec<EntityRecord>> {
        let clients: Vec<ClockifyClient> = ctx
            .client
            .collect_paginated(&format!("/workspaces/{workspace_id}/clients"), &[])
            .await?;
        Ok(clients
            .into_iter()
            .map(|c| client_to_record(workspace_id, c))
            .collect())
    }

    async fn create(
        &self,
        client: &ServiceClient,
        record: &EntityRecord,
        target_workspace_id: &str,
        _maps: &IdMaps,
    ) -> Result<EntityRecord> {
        let created: ClockifyClient = client
            .fetch_json(
                &format!("/workspaces/{target_workspace_id}/clients"),
                FetchOptions::post(json!({ "name": record.name })),
            )
            .await?;
        Ok(client_to_record(target_workspace_id, created))
    }

    /// Clockify only deletes archived clients.
    async fn delete(&self, client: &ServiceClient, record: &EntityRecord) -> Result<()> {
        let endpoint = format!("/workspaces/{}/clients/{}", record.workspace_id, record.id);
        client
            .fetch_empty(
                &endpoint,
                FetchOptions::put(json!({ "name": record.name, "archived": true })),
            )
            .await?;
        client.fetch_empty(&endpoint, FetchOptions::delete()).await
    }
}

pub struct ClockifyTags;

#[async_trait]
impl EntityHandlers for ClockifyTags {
    fn group(&self) -> EntityGroup {
        EntityGroup::Tags
    }

    async fn fetch(&self, ctx: &FetchContext<'_>, workspace_id: &str) -> Result<Vec<EntityRecord>> {
        let tags: Vec<ClockifyTag> = ctx
            .client
            .collect_paginated(&format!("/workspaces/{workspace_id}/tags"), &[])
            .await?;
        Ok(tags
            .into_iter()
            .map(|t| tag_to_record(workspace_id, t))
            .collect())
    }

    async fn create(
        &self,
        client: &ServiceClient,
        record: &EntityRecord,
        target_workspace_id: &str,
        _maps: &IdMaps,
    ) -> Result<EntityRecord> {
        let created: ClockifyTag = client
            .fetch_json(
                &format!("/workspaces/{target_workspace_id}/tags"),
                FetchOptions::post(json!({ "name": record.name })),
            )
            .await?;
        Ok(tag_to_record(target_workspace_id, created))
    }

    async fn delete(&self, client: &ServiceClient, record: &EntityRecord) -> Result<()> {
        client
            .fetch_empty(
                &format!("/workspaces/{}/tags/{}", record.workspace_id, record.id),
                FetchOptions::delete(),
            )
            .await
    }
}

pub struct ClockifyProjects;

#[async_trait]
impl EntityHandlers for ClockifyProjects {
    fn group(&self) -> EntityGroup {
        EntityGroup::Projects
    }

    async fn fetch(&self, ctx: &FetchContext<'_>, workspace_id: &str) -> Result<Vec<EntityRecord>> {
        let projects: Vec<ClockifyProject> = ctx
            .client
            .collect_paginated(&format!("/workspaces/{workspace_id}/projects"), &[])
            .await?;
        Ok(projects
            .into_iter()
            .map(|p| project_to_record(workspace_id, p))
            .collect())
    }

    async fn create(
        &self,
        client: &ServiceClient,
        record: &EntityRecord,
        target_workspace_id: &str,
        maps: &IdMaps,
    ) -> Result<EntityRecord> {
        let EntityDetails::Project(ref project) = record.details else {
            return Err(mismatched(EntityGroup::Projects, record));
        };

        let client_id = project
            .client_id
            .as_deref()
            .map(|id| maps.require(record, EntityGroup::Clients, id))
            .transpose()?;
        let members = maps.optional_many(EntityGroup::Users, &project.member_ids);

        let mut body = json!({
            "name": record.name,
            "isPublic": project.is_public,
            "billable": project.billable,
        });
        if let Some(client_id) = client_id {
            body["clientId"] = Value::String(client_id);
        }
        if let Some(ref color) = project.color {
            body["color"] = Value::String(color.clone());
        }
        if !members.is_empty() {
            body["memberships"] = members
                .iter()
                .map(|user_id| json!({ "userId": user_id }))
                .collect();
        }

        let endpoint = format!("/workspaces/{target_workspace_id}/projects");
        let mut created: ClockifyProject = client
            .fetch_json(&endpoint, FetchOptions::post(body))
            .await?;

        if project.archived {
            client
                .fetch_empty(
                    &format!("{endpoint}/{}", created.id),
                    FetchOptions::put(json!({ "name": created.name, "archived": true })),
                )
                .await?;
            created.archived = true;
        }

        Ok(project_to_record(target_workspace_id, created))
    }

    /// Clockify refuses to delete active projects, so archive first.
    async fn delete(&self, client: &ServiceClient, record: &EntityRecord) -> Result<()> {
        let endpoint = format!("/workspaces/{}/projects/{}", record.workspace_id, record.id);
        client
            .fetch_empty(
                &endpoint,
                FetchOptions::put(json!({ "name": record.name, "archived": true })),
            )
            .await?;
        client.fetch_empty(&endpoint, FetchOptions::delete()).await
    }
}

pub struct ClockifyTasks;

#[async_trait]
impl EntityHandlers for ClockifyTasks {
    fn group(&self) -> EntityGroup {
        EntityGroup::Tasks
    }

    /// Tasks are listed per project, using the projects already fetched.
    async fn fetch(&self, ctx: &FetchContext<'_>, workspace_id: &str) -> Result<Vec<EntityRecord>> {
        let project_ids: Vec<String> = ctx
            .collection(EntityGroup::Projects)
            .in_workspace(workspace_id)
            .map(|p| p.id.clone())
            .collect();

        let mut records = Vec::new();
        for project_id in project_ids {
            let tasks: Vec<ClockifyTask> = ctx
                .client
                .collect_paginated(
                    &format!("/workspaces/{workspace_id}/projects/{project_id}/tasks"),
                    &[],
                )
                .await?;
            records.extend(tasks.into_iter().map(|t| task_to_record(workspace_id, t)));
        }
        Ok(records)
    }

    async fn create(
        &self,
        client: &ServiceClient,
        record: &EntityRecord,
        target_workspace_id: &str,
        maps: &IdMaps,
    ) -> Result<EntityRecord> {
        let EntityDetails::Task(ref task) = record.details else {
            return Err(mismatched(EntityGroup::Tasks, record));
        };

        let project_id = maps.require(record, EntityGroup::Projects, &task.project_id)?;
        let assignees = maps.optional_many(EntityGroup::Users, &task.assignee_ids);

        let mut body = json!({
            "name": record.name,
            "assigneeIds": assignees,
            "status": if task.done { "DONE" } else { "ACTIVE" },
        });
        if let Some(secs) = task.estimate_secs {
            body["estimate"] = Value::String(format_duration(secs));
        }

        let created: ClockifyTask = client
            .fetch_json(
                &format!("/workspaces/{target_workspace_id}/projects/{project_id}/tasks"),
                FetchOptions::post(body),
            )
            .await?;
        Ok(task_to_record(target_workspace_id, created))
    }

    async fn delete(&self, client: &ServiceClient, record: &EntityRecord) -> Result<()> {
        let EntityDetails::Task(ref task) = record.details else {
            return Err(mismatched(EntityGroup::Tasks, record));
        };
        client
            .fetch_empty(
                &format!(
                    "/workspaces/{}/projects/{}/tasks/{}",
                    record.workspace_id, task.project_id, record.id
                ),
                FetchOptions::delete(),
            )
            .await
    }
}

pub struct ClockifyTimeEntries;

#[async_trait]
impl EntityHandlers for ClockifyTimeEntries {
    fn group(&self) -> EntityGroup {
        EntityGroup::TimeEntries
    }

    /// Entries are listed per user within the run's date range.
    async fn fetch(&self, ctx: &FetchContext<'_>, workspace_id: &str) -> Result<Vec<EntityRecord>> {
        let user_ids: Vec<String> = ctx
            .collection(EntityGroup::Users)
            .in_workspace(workspace_id)
            .map(|u| u.id.clone())
            .collect();
        let window = [
            ("start", timestamp(ctx.range.start)),
            ("end", timestamp(ctx.range.end)),
        ];

        let mut records = Vec::new();
        for user_id in user_ids {
            let entries: Vec<ClockifyTimeEntry> = ctx
                .client
                .collect_paginated(
                    &format!("/workspaces/{workspace_id}/user/{user_id}/time-entries"),
                    &window,
                )
                .await?;
            records.extend(
                entries
                    .into_iter()
                    .map(|e| time_entry_to_record(workspace_id, e)),
            );
        }
        Ok(records)
    }

    async fn create(
        &self,
        client: &ServiceClient,
        record: &EntityRecord,
        target_workspace_id: &str,
        maps: &IdMaps,
    ) -> Result<EntityRecord> {
        let EntityDetails::TimeEntry(ref entry) = record.details else {
            return Err(mismatched(EntityGroup::TimeEntries, record));
        };

        let project_id = entry
            .project_id
            .as_deref()
            .map(|id| maps.require(record, EntityGroup::Projects, id))
            .transpose()?;
        let task_id = entry
            .task_id
            .as_deref()
            .map(|id| maps.require(record, EntityGroup::Tasks, id))
            .transpose()?;
        // Clockify derives the client from the project; resolving it still
        // guarantees the client exists before the entry does.
        if let Some(ref client_id) = entry.client_id {
            maps.require(record, EntityGroup::Clients, client_id)?;
        }
        let tag_ids = maps.optional_many(EntityGroup::Tags, &entry.tag_ids);
        let user_id = maps.optional(EntityGroup::Users, entry.user_id.as_deref());

        let mut body = json!({
            "start": timestamp(entry.start),
            "billable": entry.billable,
            "description": record.name,
            "tagIds": tag_ids,
        });
        if let Some(end) = entry.end {
            body["end"] = Value::String(timestamp(end));
        }
        if let Some(project_id) = project_id {
            body["projectId"] = Value::String(project_id);
        }
        if let Some(task_id) = task_id {
            body["taskId"] = Value::String(task_id);
        }

        let endpoint = match user_id {
            Some(user_id) => format!("/workspaces/{target_workspace_id}/user/{user_id}/time-entries"),
            None => format!("/workspaces/{target_workspace_id}/time-entries"),
        };
        let created: ClockifyTimeEntry = client
            .fetch_json(&endpoint, FetchOptions::post(body))
            .await?;
        Ok(time_entry_to_record(target_workspace_id, created))
    }

    async fn delete(&self, client: &ServiceClient, record: &EntityRecord) -> Result<()> {
        client
            .fetch_empty(
                &format!("/workspaces/{}/time-entries/{}", record.workspace_id, record.id),
                FetchOptions::delete(),
            )
            .await
    }
}
