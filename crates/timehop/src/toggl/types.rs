//! Toggl Track wire types (API v9 and reports v2, snake_case JSON).

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TogglWorkspace {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub organization_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TogglOrganization {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

/// Membership row from `/workspaces/{id}/workspace_users`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TogglWorkspaceUser {
    /// Membership id, used to remove the user.
    pub id: i64,
    /// The user's own id, as referenced by time entries.
    pub uid: i64,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TogglGroupUser {
    pub user_id: i64,
}

/// Organization-level user group.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TogglGroup {
    pub group_id: i64,
    pub name: String,
    #[serde(default)]
    pub users: Option<Vec<TogglGroupUser>>,
    /// Workspaces the group is attached to.
    #[serde(default)]
    pub workspaces: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TogglClient {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub archived: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TogglTag {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TogglProject {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub client_id: Option<i64>,
    #[serde(default)]
    pub billable: Option<bool>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Project membership row from `/workspaces/{id}/project_users`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TogglProjectUser {
    pub project_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TogglTask {
    pub id: i64,
    pub name: String,
    pub project_id: i64,
    /// Single assignee.
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub estimated_seconds: Option<i64>,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Time entry as returned by the v9 create endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TogglTimeEntry {
    pub id: i64,
    #[serde(default)]
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub stop: Option<DateTime<Utc>>,
    #[serde(default)]
    pub billable: bool,
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub task_id: Option<i64>,
    #[serde(default)]
    pub tag_ids: Option<Vec<i64>>,
    #[serde(default)]
    pub user_id: Option<i64>,
}

/// One page of the detailed report.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TogglReportPage {
    #[serde(default)]
    pub total_count: usize,
    #[serde(default)]
    pub per_page: usize,
    #[serde(default)]
    pub data: Vec<TogglReportEntry>,
}

/// Detailed report row. Tags and client come back as names, not ids.
#[derive(Debug, Clone, Deserialize)]
pub struct TogglReportEntry {
    pub id: i64,
    #[serde(default)]
    pub pid: Option<i64>,
    #[serde(default)]
    pub tid: Option<i64>,
    #[serde(default)]
    pub uid: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_billable: bool,
}

fn default_true() -> bool {
    true
}
