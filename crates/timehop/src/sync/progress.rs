//! Progress reporting for engine runs.
//!
//! Every operation reports through a single callback so front ends can
//! render bars, log lines or nothing at all without the engine knowing.

use crate::entity::{EntityGroup, Operation};
use crate::service::ServiceKind;

use super::types::Outcome;

/// Progress events emitted while fetching, creating or deleting.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// An operation started.
    OperationStarted {
        /// Which operation.
        operation: Operation,
        /// Groups it will walk, in order.
        groups: Vec<EntityGroup>,
    },

    /// Source workspaces missing on the target are being created.
    ResolvingWorkspaces {
        /// Included source workspaces without a target counterpart.
        pending: usize,
    },

    /// Started processing one group.
    GroupStarted {
        /// The operation in progress.
        operation: Operation,
        /// The group being processed.
        group: EntityGroup,
        /// Records to process (unknown while fetching).
        total: Option<usize>,
    },

    /// Fetched one page of a paginated listing.
    PageFetched {
        /// Service the page came from.
        service: ServiceKind,
        /// Endpoint path or URL.
        endpoint: String,
        /// Page number (1-indexed).
        page: u32,
        /// Items on this page.
        count: usize,
    },

    /// Finished fetching and linking one group.
    GroupFetched {
        /// The group that was fetched.
        group: EntityGroup,
        /// Source records.
        source: usize,
        /// Target records (`None` without a target).
        target: Option<usize>,
    },

    /// Source and target records of one group were matched.
    Linked {
        /// The group that was linked.
        group: EntityGroup,
        /// Source records with a target counterpart.
        linked: usize,
        /// Source records without one.
        unmatched_source: usize,
        /// Target records without a source counterpart.
        unmatched_target: usize,
    },

    /// Processed one record during create or delete.
    RecordProcessed {
        /// Create or delete.
        operation: Operation,
        /// Group of the record.
        group: EntityGroup,
        /// Records handled so far in this group.
        completed: usize,
        /// Records to handle in this group.
        total: usize,
    },

    /// A record was skipped because the service no longer had it.
    RecordSkipped {
        /// Create or delete.
        operation: Operation,
        /// Group of the record.
        group: EntityGroup,
        /// Record name.
        name: String,
        /// Short error message.
        error: String,
    },

    /// Finished one group.
    GroupComplete {
        /// The operation in progress.
        operation: Operation,
        /// The group that finished.
        group: EntityGroup,
        /// Records handled in this group.
        completed: usize,
    },

    /// Rate limited, sleeping before the next attempt.
    RateLimitBackoff {
        /// Throttling service.
        service: ServiceKind,
        /// Endpoint being retried.
        endpoint: String,
        /// Time to wait before retry (ms).
        retry_after_ms: u64,
        /// Attempt that was throttled.
        attempt: u32,
    },

    /// An operation reached a terminal state.
    OperationFinished {
        /// Which operation.
        operation: Operation,
        /// How it ended.
        outcome: Outcome,
    },

    /// Warning message (non-fatal).
    Warning {
        /// Warning message.
        message: String,
    },
}

/// Callback for progress updates during engine runs.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_emit_with_callback() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        let callback: ProgressCallback = Box::new(move |_event| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        emit(
            Some(&callback),
            SyncProgress::GroupStarted {
                operation: Operation::Create,
                group: EntityGroup::Tags,
                total: Some(3),
            },
        );
        emit(
            Some(&callback),
            SyncProgress::GroupComplete {
                operation: Operation::Create,
                group: EntityGroup::Tags,
                completed: 3,
            },
        );

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_emit_without_callback() {
        emit(
            None,
            SyncProgress::Warning {
                message: "ignored".to_string(),
            },
        );
    }

    #[test]
    fn test_record_skipped_debug() {
        let event = SyncProgress::RecordSkipped {
            operation: Operation::Delete,
            group: EntityGroup::Projects,
            name: "Website".to_string(),
            error: "not found".to_string(),
        };

        let debug_str = format!("{:?}", event);
        assert!(debug_str.contains("RecordSkipped"));
        assert!(debug_str.contains("Website"));
    }
}
