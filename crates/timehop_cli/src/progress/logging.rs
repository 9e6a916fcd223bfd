use timehop::sync::SyncProgress;

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::OperationStarted { operation, groups } => {
                tracing::info!(%operation, groups = groups.len(), "Operation started");
            }

            SyncProgress::ResolvingWorkspaces { pending } => {
                tracing::info!(pending, "Resolving workspaces");
            }

            SyncProgress::GroupStarted {
                operation,
                group,
                total,
            } => {
                tracing::info!(%operation, %group, total = ?total, "Group started");
            }

            SyncProgress::PageFetched {
                service,
                endpoint,
                page,
                count,
            } => {
                tracing::debug!(%service, endpoint = %endpoint, page, count, "Fetched page");
            }

            SyncProgress::GroupFetched {
                group,
                source,
                target,
            } => {
                tracing::info!(%group, source_records = source, target_records = ?target, "Group fetched");
            }

            SyncProgress::Linked {
                group,
                linked,
                unmatched_source,
                unmatched_target,
            } => {
                tracing::info!(
                    %group,
                    linked,
                    unmatched_source,
                    unmatched_target,
                    "Linked records"
                );
            }

            SyncProgress::RecordProcessed {
                operation,
                group,
                completed,
                total,
            } => {
                tracing::debug!(%operation, %group, completed, total, "Record processed");
            }

            SyncProgress::RecordSkipped {
                operation,
                group,
                name,
                error,
            } => {
                tracing::warn!(%operation, %group, record = %name, error = %error, "Skipped record");
            }

            SyncProgress::GroupComplete {
                operation,
                group,
                completed,
            } => {
                tracing::info!(%operation, %group, completed, "Group complete");
            }

            SyncProgress::RateLimitBackoff {
                service,
                endpoint,
                retry_after_ms,
                attempt,
            } => {
                tracing::warn!(
                    %service,
                    endpoint = %endpoint,
                    retry_after_ms,
                    attempt,
                    "Rate limited, backing off"
                );
            }

            SyncProgress::OperationFinished { operation, outcome } => {
                tracing::info!(%operation, outcome = ?outcome, "Operation finished");
            }

            SyncProgress::Warning { message } => {
                tracing::warn!(message = %message, "Warning");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
