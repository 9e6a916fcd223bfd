//! Toggl Track handlers, one per entity group.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};

use crate::entity::{EntityDetails, EntityGroup, EntityRecord, IdMaps, UserGroupDetails};
use crate::handlers::{EntityHandlers, FetchContext, HandlerRegistry, mismatched};
use crate::http::HttpMethod;
use crate::service::{
    FetchOptions, Result, ServiceClient, ServiceError, ServiceKind, TOGGL_REPORTS_URL, paginate,
};
use crate::sync::{SyncProgress, TOGGL_REPORT_PAGE_SIZE};

use super::convert::{
    client_to_record, group_to_record, numeric_id, project_to_record, report_entry_to_record,
    tag_to_record, task_to_record, time_entry_to_record, user_to_record, workspace_to_record,
};
use super::types::{
    TogglClient, TogglGroup, TogglOrganization, TogglProject, TogglProjectUser, TogglReportPage,
    TogglTag, TogglTask, TogglTimeEntry, TogglWorkspace, TogglWorkspaceUser,
};

/// Identifies this tool to the reports API and on created entries.
const USER_AGENT: &str = "timehop";

/// Register every Toggl handler.
pub fn register(registry: &mut HandlerRegistry) {
    registry.register(ServiceKind::Toggl, TogglWorkspaces);
    registry.register(ServiceKind::Toggl, TogglUsers);
    registry.register(ServiceKind::Toggl, TogglUserGroups);
    registry.register(ServiceKind::Toggl, TogglClients);
    registry.register(ServiceKind::Toggl, TogglTags);
    registry.register(ServiceKind::Toggl, TogglProjects);
    registry.register(ServiceKind::Toggl, TogglTasks);
    registry.register(ServiceKind::Toggl, TogglTimeEntries);
}

fn not_found(method: HttpMethod, endpoint: String, body: String) -> ServiceError {
    ServiceError::Api {
        service: ServiceKind::Toggl,
        method,
        endpoint,
        status: 404,
        body,
    }
}

fn numeric_ids(group: EntityGroup, ids: &[String]) -> Result<Vec<i64>> {
    ids.iter().map(|id| numeric_id(group, id)).collect()
}

fn timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Organization owning a workspace. Groups and invitations live there.
async fn organization_id(client: &ServiceClient, workspace_id: &str) -> Result<i64> {
    let endpoint = format!("/workspaces/{workspace_id}");
    let workspace: TogglWorkspace = client.fetch_json(&endpoint, FetchOptions::get()).await?;
    workspace.organization_id.ok_or_else(|| {
        not_found(
            HttpMethod::Get,
            endpoint,
            format!("workspace {workspace_id} has no organization"),
        )
    })
}

async fn workspace_users(
    client: &ServiceClient,
    workspace_id: &str,
) -> Result<Vec<TogglWorkspaceUser>> {
    client
        .fetch_list(
            &format!("/workspaces/{workspace_id}/workspace_users"),
            FetchOptions::get(),
        )
        .await
}

pub struct TogglWorkspaces;

#[async_trait]
impl EntityHandlers for TogglWorkspaces {
    fn group(&self) -> EntityGroup {
        EntityGroup::Workspaces
    }

    async fn fetch(&self, ctx: &FetchContext<'_>, _workspace_id: &str) -> Result<Vec<EntityRecord>> {
        let workspaces: Vec<TogglWorkspace> = ctx
            .client
            .fetch_list("/me/workspaces", FetchOptions::get())
            .await?;
        Ok(workspaces.into_iter().map(workspace_to_record).collect())
    }

    /// New workspaces go into the account's first organization.
    async fn create(
        &self,
        client: &ServiceClient,
        record: &EntityRecord,
        _target_workspace_id: &str,
        _maps: &IdMaps,
    ) -> Result<EntityRecord> {
        let endpoint = "/me/organizations";
        let organizations: Vec<TogglOrganization> =
            client.fetch_list(endpoint, FetchOptions::get()).await?;
        let Some(organization) = organizations.first() else {
            return Err(not_found(
                HttpMethod::Get,
                endpoint.to_string(),
                "account has no organization".to_string(),
            ));
        };

        let created: TogglWorkspace = client
            .fetch_json(
                &format!("/organizations/{}/workspaces", organization.id),
                FetchOptions::post(json!({ "name": record.name })),
            )
            .await?;
        Ok(workspace_to_record(created))
    }

    async fn delete(&self, _client: &ServiceClient, _record: &EntityRecord) -> Result<()> {
        Err(ServiceError::Unsupported {
            service: ServiceKind::Toggl,
            group: EntityGroup::Workspaces,
            operation: "delete",
        })
    }
}

pub struct TogglUsers;

#[async_trait]
impl EntityHandlers for TogglUsers {
    fn group(&self) -> EntityGroup {
        EntityGroup::Users
    }

    async fn fetch(&self, ctx: &FetchContext<'_>, workspace_id: &str) -> Result<Vec<EntityRecord>> {
        let users = workspace_users(ctx.client, workspace_id).await?;
        Ok(users
            .into_iter()
            .map(|u| user_to_record(workspace_id, u))
            .collect())
    }

    /// Invites the email into the workspace, then looks the membership up.
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
        let workspace = numeric_id(EntityGroup::Workspaces, target_workspace_id)?;
        let organization = organization_id(client, target_workspace_id).await?;

        client
            .fetch_empty(
                &format!("/organizations/{organization}/invitations"),
                FetchOptions::post(json!({
                    "emails": [user.email],
                    "workspaces": [{ "workspace_id": workspace, "admin": false }],
                })),
            )
            .await?;

        workspace_users(client, target_workspace_id)
            .await?
            .into_iter()
            .find(|m| m.email.eq_ignore_ascii_case(&user.email))
            .map(|m| user_to_record(target_workspace_id, m))
            .ok_or_else(|| {
                not_found(
                    HttpMethod::Get,
                    format!("/workspaces/{target_workspace_id}/workspace_users"),
                    format!("{} is not listed as a workspace member", user.email),
                )
            })
    }

    /// Removes the workspace membership; the Toggl account itself stays.
    async fn delete(&self, client: &ServiceClient, record: &EntityRecord) -> Result<()> {
        let uid = numeric_id(EntityGroup::Users, &record.id)?;
        let endpoint = format!("/workspaces/{}/workspace_users", record.workspace_id);
        let membership = workspace_users(client, &record.workspace_id)
            .await?
            .into_iter()
            .find(|m| m.uid == uid)
            .ok_or_else(|| {
                not_found(
                    HttpMethod::Get,
                    endpoint.clone(),
                    format!("user {uid} is not a workspace member"),
                )
            })?;

        client
            .fetch_empty(
                &format!("{endpoint}/{}", membership.id),
                FetchOptions::delete(),
            )
            .await
    }
}

pub struct TogglUserGroups;

#[async_trait]
impl EntityHandlers for TogglUserGroups {
    fn group(&self) -> EntityGroup {
        EntityGroup::UserGroups
    }

    /// Groups belong to the organization; keep those attached to this workspace.
    async fn fetch(&self, ctx: &FetchContext<'_>, workspace_id: &str) -> Result<Vec<EntityRecord>> {
        let workspace = numeric_id(EntityGroup::Workspaces, workspace_id)?;
        let organization = organization_id(ctx.client, workspace_id).await?;
        let groups: Vec<TogglGroup> = ctx
            .client
            .fetch_list(
                &format!("/organizations/{organization}/groups"),
                FetchOptions::get(),
            )
            .await?;

        Ok(groups
            .into_iter()
            .filter(|g| {
                g.workspaces
                    .as_deref()
                    .is_none_or(|ids| ids.contains(&workspace))
            })
            .map(|g| group_to_record(workspace_id, g))
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
        let workspace = numeric_id(EntityGroup::Workspaces, target_workspace_id)?;
        let members = maps.optional_many(EntityGroup::Users, &group.member_ids);
        let organization = organization_id(client, target_workspace_id).await?;

        let created: TogglGroup = client
            .fetch_json(
                &format!("/organizations/{organization}/groups"),
                FetchOptions::post(json!({
                    "name": record.name,
                    "users": numeric_ids(EntityGroup::Users, &members)?,
                    "workspaces": [workspace],
                })),
            )
            .await?;

        Ok(EntityRecord::new(
            created.group_id.to_string(),
            target_workspace_id,
            created.name,
            EntityDetails::UserGroup(UserGroupDetails {
                member_ids: members,
            }),
        ))
    }

    async fn delete(&self, client: &ServiceClient, record: &EntityRecord) -> Result<()> {
        let organization = organization_id(client, &record.workspace_id).await?;
        client
            .fetch_empty(
                &format!("/organizations/{organization}/groups/{}", record.id),
                FetchOptions::delete(),
            )
            .await
    }
}

pub struct TogglClients;

#[async_trait]
impl EntityHandlers for TogglClients {
    fn group(&self) -> EntityGroup {
        EntityGroup::Clients
    }

    async fn fetch(&self, ctx: &FetchContext<'_>, workspace_id: &str) -> Result<Vec<EntityRecord>> {
        let clients: Vec<TogglClient> = ctx
            .client
            .fetch_list(
                &format!("/workspaces/{workspace_id}/clients"),
                FetchOptions::get().with_query("status", "both"),
            )
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
        let endpoint = format!("/workspaces/{target_workspace_id}/clients");
        let mut created: TogglClient = client
            .fetch_json(&endpoint, FetchOptions::post(json!({ "name": record.name })))
            .await?;

        if let EntityDetails::Client(ref details) = record.details
            && details.archived
        {
            client
                .fetch_empty(
                    &format!("{endpoint}/{}/archive", created.id),
                    FetchOptions::post(json!({})),
                )
                .await?;
            created.archived = true;
        }

        Ok(client_to_record(target_workspace_id, created))
    }

    async fn delete(&self, client: &ServiceClient, record: &EntityRecord) -> Result<()> {
        client
            .fetch_empty(
                &format!("/workspaces/{}/clients/{}", record.workspace_id, record.id),
                FetchOptions::delete(),
            )
            .await
    }
}

pub struct TogglTags;

#[async_trait]
impl EntityHandlers for TogglTags {
    fn group(&self) -> EntityGroup {
        EntityGroup::Tags
    }

    async fn fetch(&self, ctx: &FetchContext<'_>, workspace_id: &str) -> Result<Vec<EntityRecord>> {
        let tags: Vec<TogglTag> = ctx
            .client
            .fetch_list(&format!("/workspaces/{workspace_id}/tags"), FetchOptions::get())
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
        let created: TogglTag = client
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

pub struct TogglProjects;

#[async_trait]
impl EntityHandlers for TogglProjects {
    fn group(&self) -> EntityGroup {
        EntityGroup::Projects
    }

    /// Active and archived projects, plus their members.
    async fn fetch(&self, ctx: &FetchContext<'_>, workspace_id: &str) -> Result<Vec<EntityRecord>> {
        let client = ctx.client;
        let page_size = client.page_size();
        let endpoint = format!("/workspaces/{workspace_id}/projects");
        let endpoint = endpoint.as_str();

        let projects: Vec<TogglProject> = paginate(page_size, |page| {
            let options = FetchOptions::get()
                .with_query("active", "both")
                .with_query("page", page)
                .with_query("per_page", page_size);
            async move { client.fetch_list(endpoint, options).await }
        })
        .await?;

        let memberships: Vec<TogglProjectUser> = client
            .fetch_list(
                &format!("/workspaces/{workspace_id}/project_users"),
                FetchOptions::get(),
            )
            .await?;
        let mut members: HashMap<i64, Vec<String>> = HashMap::new();
        for m in memberships {
            members
                .entry(m.project_id)
                .or_default()
                .push(m.user_id.to_string());
        }

        Ok(projects
            .into_iter()
            .map(|p| {
                let member_ids = members.remove(&p.id).unwrap_or_default();
                project_to_record(workspace_id, p, member_ids)
            })
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
            .transpose()?
            .map(|id| numeric_id(EntityGroup::Clients, &id))
            .transpose()?;
        let members = maps.optional_many(EntityGroup::Users, &project.member_ids);
        let member_numbers = numeric_ids(EntityGroup::Users, &members)?;

        let mut body = json!({
            "name": record.name,
            "is_private": !project.is_public,
            "billable": project.billable,
            "active": !project.archived,
        });
        if let Some(client_id) = client_id {
            body["client_id"] = json!(client_id);
        }
        if let Some(ref color) = project.color {
            body["color"] = Value::String(color.clone());
        }

        let created: TogglProject = client
            .fetch_json(
                &format!("/workspaces/{target_workspace_id}/projects"),
                FetchOptions::post(body),
            )
            .await?;

        let members_endpoint = format!("/workspaces/{target_workspace_id}/project_users");
        for user_id in member_numbers {
            client
                .fetch_empty(
                    &members_endpoint,
                    FetchOptions::post(json!({ "project_id": created.id, "user_id": user_id })),
                )
                .await?;
        }

        Ok(project_to_record(target_workspace_id, created, members))
    }

    async fn delete(&self, client: &ServiceClient, record: &EntityRecord) -> Result<()> {
        client
            .fetch_empty(
                &format!("/workspaces/{}/projects/{}", record.workspace_id, record.id),
                FetchOptions::delete(),
            )
            .await
    }
}

pub struct TogglTasks;

#[async_trait]
impl EntityHandlers for TogglTasks {
    fn group(&self) -> EntityGroup {
        EntityGroup::Tasks
    }

    async fn fetch(&self, ctx: &FetchContext<'_>, workspace_id: &str) -> Result<Vec<EntityRecord>> {
        let project_ids: Vec<String> = ctx
            .collection(EntityGroup::Projects)
            .in_workspace(workspace_id)
            .map(|p| p.id.clone())
            .collect();

        let mut records = Vec::new();
        for project_id in project_ids {
            let tasks: Vec<TogglTask> = ctx
                .client
                .fetch_list(
                    &format!("/workspaces/{workspace_id}/projects/{project_id}/tasks"),
                    FetchOptions::get(),
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
        // Toggl tasks take a single assignee.
        let assignee = maps
            .optional_many(EntityGroup::Users, &task.assignee_ids)
            .into_iter()
            .next()
            .map(|id| numeric_id(EntityGroup::Users, &id))
            .transpose()?;

        let mut body = json!({
            "name": record.name,
            "active": !task.done,
        });
        if let Some(secs) = task.estimate_secs {
            body["estimated_seconds"] = json!(secs);
        }
        if let Some(user_id) = assignee {
            body["user_id"] = json!(user_id);
        }

        let created: TogglTask = client
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

pub struct TogglTimeEntries;

#[async_trait]
impl EntityHandlers for TogglTimeEntries {
    fn group(&self) -> EntityGroup {
        EntityGroup::TimeEntries
    }

    /// Entries come from the detailed report, which names tags and clients;
    /// those names are resolved against the workspace's fetched records.
    async fn fetch(&self, ctx: &FetchContext<'_>, workspace_id: &str) -> Result<Vec<EntityRecord>> {
        let client = ctx.client;
        let endpoint = format!(
            "{}/details",
            client.reports_url().unwrap_or(TOGGL_REPORTS_URL)
        );
        let endpoint = endpoint.as_str();
        let since = ctx.range.start.format("%Y-%m-%d").to_string();
        let until = ctx.range.end.format("%Y-%m-%d").to_string();

        let rows = paginate(TOGGL_REPORT_PAGE_SIZE, |page| {
            let options = FetchOptions::get()
                .with_query("workspace_id", workspace_id)
                .with_query("since", &since)
                .with_query("until", &until)
                .with_query("user_agent", USER_AGENT)
                .with_query("page", page);
            async move {
                let report: TogglReportPage = client.fetch_object(endpoint, options).await?;
                client.emit(SyncProgress::PageFetched {
                    service: ServiceKind::Toggl,
                    endpoint: endpoint.to_string(),
                    page,
                    count: report.data.len(),
                });
                Ok(report.data)
            }
        })
        .await?;

        let tags = ctx.collection(EntityGroup::Tags);
        let clients = ctx.collection(EntityGroup::Clients);

        Ok(rows
            .into_iter()
            .filter(|row| ctx.range.contains(row.start))
            .map(|row| {
                let tag_ids = row
                    .tags
                    .iter()
                    .filter_map(|name| tags.find_by_name(workspace_id, name))
                    .map(|t| t.id.clone())
                    .collect();
                let client_id = row
                    .client
                    .as_deref()
                    .and_then(|name| clients.find_by_name(workspace_id, name))
                    .map(|c| c.id.clone());
                report_entry_to_record(workspace_id, row, tag_ids, client_id)
            })
            .collect())
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
        let workspace = numeric_id(EntityGroup::Workspaces, target_workspace_id)?;

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
        if let Some(ref client_id) = entry.client_id {
            maps.require(record, EntityGroup::Clients, client_id)?;
        }
        let tag_ids = maps.optional_many(EntityGroup::Tags, &entry.tag_ids);
        let user_id = maps.optional(EntityGroup::Users, entry.user_id.as_deref());

        let mut body = json!({
            "created_with": USER_AGENT,
            "description": record.name,
            "start": timestamp(entry.start),
            "duration": entry.duration_secs().unwrap_or(-1),
            "billable": entry.billable,
            "workspace_id": workspace,
            "tag_ids": numeric_ids(EntityGroup::Tags, &tag_ids)?,
        });
        if let Some(end) = entry.end {
            body["stop"] = Value::String(timestamp(end));
        }
        if let Some(id) = project_id {
            body["project_id"] = json!(numeric_id(EntityGroup::Projects, &id)?);
        }
        if let Some(id) = task_id {
            body["task_id"] = json!(numeric_id(EntityGroup::Tasks, &id)?);
        }
        if let Some(id) = user_id {
            body["user_id"] = json!(numeric_id(EntityGroup::Users, &id)?);
        }

        let created: TogglTimeEntry = client
            .fetch_json(
                &format!("/workspaces/{target_workspace_id}/time_entries"),
                FetchOptions::post(body),
            )
            .await?;
        Ok(time_entry_to_record(target_workspace_id, created))
    }

    async fn delete(&self, client: &ServiceClient, record: &EntityRecord) -> Result<()> {
        client
            .fetch_empty(
                &format!("/workspaces/{}/time_entries/{}", record.workspace_id, record.id),
                FetchOptions::delete(),
            )
            .await
    }
}
