//! Clockify API wire types (camelCase JSON).

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockifyWorkspace {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockifyUser {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: String,
    /// `ACTIVE`, `PENDING_EMAIL_VERIFICATION`, `DELETED`, ...
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockifyUserGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub user_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockifyClient {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub archived: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockifyTag {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub archived: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockifyMembership {
    pub user_id: String,
    #[serde(default)]
    pub membership_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockifyProject {
    pub id: String,
    pub name: String,
    /// Empty string when the project has no client.
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub billable: bool,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub memberships: Vec<ClockifyMembership>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockifyTask {
    pub id: String,
    pub name: String,
    pub project_id: String,
    #[serde(default)]
    pub assignee_ids: Vec<String>,
    /// ISO 8601 duration, e.g. `PT1H30M`.
    #[serde(default)]
    pub estimate: Option<String>,
    /// `ACTIVE` or `DONE`.
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockifyTimeInterval {
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockifyTimeEntry {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub billable: bool,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    /// Sent as `null` rather than `[]` when untagged.
    #[serde(default)]
    pub tag_ids: Option<Vec<String>>,
    pub time_interval: ClockifyTimeInterval,
}
