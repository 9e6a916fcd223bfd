//! Run options, reports and errors for the transfer engine.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::entity::{EntityGroup, Operation};
use crate::service::ServiceError;

/// Default look-back window for time entries.
pub const DEFAULT_SINCE_DAYS: i64 = 365;

/// Page size of Toggl's detailed report.
pub const TOGGL_REPORT_PAGE_SIZE: usize = 50;

/// What the engine was configured to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferMode {
    /// Source and target configured: link, then create on the target.
    Transfer,
    /// Source only: records are deleted from the source.
    DeleteOnly,
}

/// Half-open window `[start, end)` for time entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The last `days` days up to now.
    pub fn last_days(days: i64) -> Self {
        let end = Utc::now();
        Self {
            start: end - Duration::days(days),
            end,
        }
    }

    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self::last_days(DEFAULT_SINCE_DAYS)
    }
}

/// Options for engine runs.
#[derive(Debug, Clone, Default)]
pub struct TransferOptions {
    /// Window for fetching time entries.
    pub range: DateRange,
    /// Whether users and user groups take part in create/delete.
    pub include_users: bool,
    /// Groups left out of create/delete entirely.
    pub skip: Vec<EntityGroup>,
    /// Plan only: report what would be created or deleted without writing.
    pub dry_run: bool,
}

impl TransferOptions {
    /// Whether `group` is written during create/delete.
    #[must_use]
    pub fn writes(&self, group: EntityGroup) -> bool {
        !self.skip.contains(&group)
    }
}

/// Terminal outcome of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    Success,
    Failed,
}

/// Per-group counts from one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupReport {
    pub group: EntityGroup,
    /// Records handled (successes plus skips).
    pub processed: usize,
    /// Records skipped after a not-found response.
    pub skipped: usize,
    /// Records a dry run would have written.
    pub planned: usize,
}

impl GroupReport {
    pub fn new(group: EntityGroup) -> Self {
        Self {
            group,
            processed: 0,
            skipped: 0,
            planned: 0,
        }
    }
}

/// Summary of a successful operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub operation: Operation,
    pub groups: Vec<GroupReport>,
}

impl RunReport {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            groups: Vec::new(),
        }
    }

    #[must_use]
    pub fn group(&self, group: EntityGroup) -> Option<&GroupReport> {
        self.groups.iter().find(|g| g.group == group)
    }

    #[must_use]
    pub fn total_processed(&self) -> usize {
        self.groups.iter().map(|g| g.processed).sum()
    }

    #[must_use]
    pub fn total_skipped(&self) -> usize {
        self.groups.iter().map(|g| g.skipped).sum()
    }
}

/// Why an engine operation did not complete.
#[derive(Debug, Error)]
pub enum RunError {
    /// Create and delete work on fetched data.
    #[error("nothing fetched yet: run a fetch before {operation}")]
    NotFetched { operation: Operation },

    #[error("{operation} needs a target service, but none is configured")]
    NoTarget { operation: Operation },

    /// A handler failed; the operation stopped at this group.
    #[error("{operation} failed in {group}{}: {source}", record_suffix(.record))]
    Handler {
        operation: Operation,
        group: EntityGroup,
        record: Option<String>,
        #[source]
        source: ServiceError,
    },

    /// Missing required field in builder.
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
}

fn record_suffix(record: &Option<String>) -> String {
    record
        .as_deref()
        .map(|name| format!(" ('{name}')"))
        .unwrap_or_default()
}

impl RunError {
    /// The underlying service error, if any.
    #[must_use]
    pub fn service_error(&self) -> Option<&ServiceError> {
        match self {
            RunError::Handler { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, RunError>;
