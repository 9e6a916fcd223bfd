use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The eight kinds of records the engine moves between services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityGroup {
    Workspaces,
    Users,
    UserGroups,
    Clients,
    Tags,
    Projects,
    Tasks,
    TimeEntries,
}

impl EntityGroup {
    /// Fetch order. Workspaces come first since every other listing is
    /// scoped by workspace; tasks and time entries come after the
    /// projects and users whose ids their listings need.
    pub const FETCH_ORDER: [EntityGroup; 8] = [
        EntityGroup::Workspaces,
        EntityGroup::Users,
        EntityGroup::UserGroups,
        EntityGroup::Clients,
        EntityGroup::Tags,
        EntityGroup::Projects,
        EntityGroup::Tasks,
        EntityGroup::TimeEntries,
    ];

    const CORE_CREATE_ORDER: [EntityGroup; 5] = [
        EntityGroup::Clients,
        EntityGroup::Tags,
        EntityGroup::Projects,
        EntityGroup::Tasks,
        EntityGroup::TimeEntries,
    ];

    const USER_CREATE_ORDER: [EntityGroup; 2] = [EntityGroup::Users, EntityGroup::UserGroups];

    /// Groups created on the target after workspaces are resolved.
    #[must_use]
    pub fn create_order(include_users: bool) -> Vec<EntityGroup> {
        let mut order = Self::CORE_CREATE_ORDER.to_vec();
        if include_users {
            order.extend(Self::USER_CREATE_ORDER);
        }
        order
    }

    /// Groups deleted from the source: the core create order reversed, with
    /// user groups and users last. Workspaces are never deleted.
    #[must_use]
    pub fn delete_order(include_users: bool) -> Vec<EntityGroup> {
        let mut order = Self::CORE_CREATE_ORDER.to_vec();
        order.reverse();
        if include_users {
            order.extend([EntityGroup::UserGroups, EntityGroup::Users]);
        }
        order
    }

    /// Groups a record of this group must resolve on the target before it
    /// can be created. Optional references (tags on a time entry, task
    /// assignees, group members) are not listed.
    #[must_use]
    pub fn dependencies(self) -> &'static [EntityGroup] {
        match self {
            EntityGroup::Workspaces => &[],
            EntityGroup::Users | EntityGroup::Clients | EntityGroup::Tags => {
                &[EntityGroup::Workspaces]
            }
            EntityGroup::UserGroups => &[EntityGroup::Workspaces, EntityGroup::Users],
            EntityGroup::Projects => &[EntityGroup::Workspaces, EntityGroup::Clients],
            EntityGroup::Tasks => &[EntityGroup::Workspaces, EntityGroup::Projects],
            EntityGroup::TimeEntries => &[
                EntityGroup::Workspaces,
                EntityGroup::Clients,
                EntityGroup::Projects,
                EntityGroup::Tasks,
            ],
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EntityGroup::Workspaces => "workspaces",
            EntityGroup::Users => "users",
            EntityGroup::UserGroups => "user-groups",
            EntityGroup::Clients => "clients",
            EntityGroup::Tags => "tags",
            EntityGroup::Projects => "projects",
            EntityGroup::Tasks => "tasks",
            EntityGroup::TimeEntries => "time-entries",
        }
    }

    /// Human-readable plural, e.g. "time entries".
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            EntityGroup::Workspaces => "workspaces",
            EntityGroup::Users => "users",
            EntityGroup::UserGroups => "user groups",
            EntityGroup::Clients => "clients",
            EntityGroup::Tags => "tags",
            EntityGroup::Projects => "projects",
            EntityGroup::Tasks => "tasks",
            EntityGroup::TimeEntries => "time entries",
        }
    }

    /// Whether records in this group are users or user groups.
    #[must_use]
    pub fn is_user_group(self) -> bool {
        matches!(self, EntityGroup::Users | EntityGroup::UserGroups)
    }
}

impl fmt::Display for EntityGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EntityGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        EntityGroup::FETCH_ORDER
            .into_iter()
            .find(|g| g.as_str() == normalized)
            .ok_or_else(|| format!("unknown entity group '{s}'"))
    }
}

/// The three bulk operations the engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Fetch,
    Create,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 3] = [Operation::Fetch, Operation::Create, Operation::Delete];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Fetch => "fetch",
            Operation::Create => "create",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "group", rename_all = "camelCase")]
pub enum OperationStatus {
    #[default]
    Idle,
    InProcess(EntityGroup),
    Success,
    Failed,
}

impl OperationStatus {
    #[must_use]
    pub fn is_running(self) -> bool {
        matches!(self, OperationStatus::InProcess(_))
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, OperationStatus::Success | OperationStatus::Failed)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Idle => f.write_str("idle"),
            OperationStatus::InProcess(group) => write!(f, "in process ({group})"),
            OperationStatus::Success => f.write_str("success"),
            OperationStatus::Failed => f.write_str("failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(order: &[EntityGroup], group: EntityGroup) -> Option<usize> {
        order.iter().position(|g| *g == group)
    }

    #[test]
    fn test_create_order_without_users() {
        assert_eq!(
            EntityGroup::create_order(false),
            vec![
                EntityGroup::Clients,
                EntityGroup::Tags,
                EntityGroup::Projects,
                EntityGroup::Tasks,
                EntityGroup::TimeEntries,
            ]
        );
    }

    #[test]
    fn test_delete_order_reverses_core_groups() {
        let mut create = EntityGroup::create_order(false);
        create.reverse();
        assert_eq!(EntityGroup::delete_order(false), create);

        let with_users = EntityGroup::delete_order(true);
        assert_eq!(with_users[..5], create[..]);
        assert_eq!(
            with_users[5..],
            [EntityGroup::UserGroups, EntityGroup::Users]
        );
    }

    #[test]
    fn test_dependencies_precede_dependents() {
        let create = EntityGroup::create_order(true);
        for group in &create {
            for dep in group.dependencies() {
                if *dep == EntityGroup::Workspaces {
                    continue;
                }
                assert!(
                    position(&create, *dep) < position(&create, *group),
                    "{dep} must be created before {group}"
                );
            }
        }

        let delete = EntityGroup::delete_order(true);
        for group in &delete {
            for dep in group.dependencies() {
                if *dep == EntityGroup::Workspaces {
                    continue;
                }
                assert!(
                    position(&delete, *dep) > position(&delete, *group),
                    "{group} must be deleted before {dep}"
                );
            }
        }
    }

    #[test]
    fn test_workspaces_never_deleted() {
        assert!(!EntityGroup::delete_order(true).contains(&EntityGroup::Workspaces));
    }

    #[test]
    fn test_fetch_order_covers_every_group_once() {
        let mut sorted = EntityGroup::FETCH_ORDER.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 8);
        assert_eq!(EntityGroup::FETCH_ORDER[0], EntityGroup::Workspaces);
    }

    #[test]
    fn test_group_parsing() {
        assert_eq!("time_entries".parse(), Ok(EntityGroup::TimeEntries));
        assert_eq!("User Groups".parse(), Ok(EntityGroup::UserGroups));
        assert_eq!("tags".parse(), Ok(EntityGroup::Tags));
        assert!("invoices".parse::<EntityGroup>().is_err());
    }

    #[test]
    fn test_operation_status_display() {
        assert_eq!(OperationStatus::default(), OperationStatus::Idle);
        assert_eq!(
            OperationStatus::InProcess(EntityGroup::Tasks).to_string(),
            "in process (tasks)"
        );
        assert!(OperationStatus::Failed.is_terminal());
        assert!(OperationStatus::InProcess(EntityGroup::Tags).is_running());
    }
}
