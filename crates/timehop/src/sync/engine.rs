//! Dependency-ordered transfer engine.
//!
//! [`TransferEngine`] owns the service clients, the handler registry and
//! the [`EntityStore`] for one session. It runs three operations:
//!
//! - [`run_fetch`](TransferEngine::run_fetch) reads every group from the
//!   source (and target, when configured) and links the two sides.
//! - [`run_create`](TransferEngine::run_create) creates unlinked, included
//!   source records on the target, dependencies first.
//! - [`run_delete`](TransferEngine::run_delete) removes included source
//!   records, dependents first.
//!
//! Operations run sequentially; every method that touches the store takes
//! `&mut self`.
//!
//! # Example
//!
//! ```ignore
//! use timehop::service::{ServiceClient, ServiceKind, ServiceSettings};
//! use timehop::sync::{TransferEngine, TransferOptions};
//!
//! let source = ServiceClient::new(&ServiceSettings::new(ServiceKind::Clockify, key))?;
//! let target = ServiceClient::new(&ServiceSettings::new(ServiceKind::Toggl, token))?;
//! let mut engine = TransferEngine::builder()
//!     .source(source)
//!     .target(target)
//!     .options(TransferOptions::default())
//!     .build()?;
//!
//! engine.run_fetch().await?;
//! engine.set_group_included(EntityGroup::Tags, false);
//! let report = engine.run_create().await?;
//! ```

mod create;
mod delete;
mod fetch;

use std::collections::HashMap;
use std::sync::Arc;

use crate::entity::{
    EntityGroup, EntityRecord, EntityStore, IdMaps, Operation, OperationStatus, Side,
};
use crate::handlers::HandlerRegistry;
use crate::service::{ServiceClient, ServiceError, ServiceKind, short_error_message};

use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{Outcome, Result, RunError, RunReport, TransferMode, TransferOptions};

/// Builder for [`TransferEngine`].
#[derive(Default)]
pub struct TransferEngineBuilder {
    source: Option<ServiceClient>,
    target: Option<ServiceClient>,
    registry: Option<HandlerRegistry>,
    options: Option<TransferOptions>,
    progress: Option<Arc<ProgressCallback>>,
}

impl TransferEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Service records are read from (and deleted from).
    pub fn source(mut self, client: ServiceClient) -> Self {
        self.source = Some(client);
        self
    }

    /// Service records are created on. Without one the engine runs in
    /// delete-only mode.
    pub fn target(mut self, client: ServiceClient) -> Self {
        self.target = Some(client);
        self
    }

    /// Handler set; defaults to [`HandlerRegistry::standard`].
    pub fn registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn options(mut self, options: TransferOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Progress callback, shared with both clients so page and backoff
    /// events reach it too.
    pub fn progress(mut self, callback: Arc<ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    /// # Errors
    ///
    /// Returns `RunError::MissingField` when no source client is set.
    pub fn build(self) -> Result<TransferEngine> {
        let mut source = self
            .source
            .ok_or(RunError::MissingField { field: "source" })?;
        let mut target = self.target;

        if let Some(ref progress) = self.progress {
            source = source.with_progress(Arc::clone(progress));
            target = target.map(|t| t.with_progress(Arc::clone(progress)));
        }

        Ok(TransferEngine {
            source,
            target,
            registry: self.registry.unwrap_or_else(HandlerRegistry::standard),
            options: self.options.unwrap_or_default(),
            store: EntityStore::new(),
            maps: IdMaps::new(),
            statuses: HashMap::new(),
            completed: HashMap::new(),
            fetched: false,
            on_progress: self.progress,
        })
    }
}

/// Fetch, create and delete over one source and an optional target.
pub struct TransferEngine {
    source: ServiceClient,
    target: Option<ServiceClient>,
    registry: HandlerRegistry,
    options: TransferOptions,
    store: EntityStore,
    maps: IdMaps,
    statuses: HashMap<Operation, OperationStatus>,
    completed: HashMap<EntityGroup, usize>,
    fetched: bool,
    on_progress: Option<Arc<ProgressCallback>>,
}

impl TransferEngine {
    pub fn builder() -> TransferEngineBuilder {
        TransferEngineBuilder::new()
    }

    #[must_use]
    pub fn mode(&self) -> TransferMode {
        if self.target.is_some() {
            TransferMode::Transfer
        } else {
            TransferMode::DeleteOnly
        }
    }

    #[must_use]
    pub fn source_kind(&self) -> ServiceKind {
        self.source.kind()
    }

    #[must_use]
    pub fn target_kind(&self) -> Option<ServiceKind> {
        self.target.as_ref().map(ServiceClient::kind)
    }

    #[must_use]
    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut TransferOptions {
        &mut self.options
    }

    #[must_use]
    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    #[must_use]
    pub fn id_maps(&self) -> &IdMaps {
        &self.maps
    }

    /// Whether the most recent fetch completed. A failed or running fetch
    /// clears this until the next successful one.
    #[must_use]
    pub fn is_fetched(&self) -> bool {
        self.fetched
    }

    #[must_use]
    pub fn status(&self, operation: Operation) -> OperationStatus {
        self.statuses.get(&operation).copied().unwrap_or_default()
    }

    /// Records handled in `group` by the running or most recent operation.
    #[must_use]
    pub fn completed(&self, group: EntityGroup) -> usize {
        self.completed.get(&group).copied().unwrap_or(0)
    }

    /// Forget everything fetched: records, id maps, counters and statuses.
    pub fn flush(&mut self) {
        self.store.flush();
        self.maps.clear();
        self.completed.clear();
        self.statuses.clear();
        self.fetched = false;
        tracing::debug!("Flushed engine state");
    }

    /// Toggle one source record. Returns `false` if no such record exists.
    pub fn set_included(&mut self, group: EntityGroup, id: &str, included: bool) -> bool {
        match self.store.mapping_mut(group).source.get_mut(id) {
            Some(record) => {
                record.is_included = included;
                true
            }
            None => false,
        }
    }

    /// Toggle every source record of a group.
    pub fn set_group_included(&mut self, group: EntityGroup, included: bool) {
        for record in self.store.mapping_mut(group).source.iter_mut() {
            record.is_included = included;
        }
    }

    /// Toggle a source workspace. Records of excluded workspaces are left
    /// out of create and delete.
    pub fn set_workspace_included(&mut self, workspace_id: &str, included: bool) -> bool {
        self.set_included(EntityGroup::Workspaces, workspace_id, included)
    }

    fn emit(&self, event: SyncProgress) {
        emit(self.on_progress.as_deref(), event);
    }

    fn set_status(&mut self, operation: Operation, status: OperationStatus) {
        self.statuses.insert(operation, status);
    }

    fn begin(&mut self, operation: Operation, groups: &[EntityGroup]) {
        tracing::info!(%operation, groups = groups.len(), "Starting operation");
        self.completed.clear();
        if let Some(&first) = groups.first() {
            self.set_status(operation, OperationStatus::InProcess(first));
        }
        self.emit(SyncProgress::OperationStarted {
            operation,
            groups: groups.to_vec(),
        });
    }

    /// Settle the operation's status and report its outcome exactly once.
    fn finish(&mut self, operation: Operation, result: Result<RunReport>) -> Result<RunReport> {
        let outcome = match result {
            Ok(ref report) => {
                tracing::info!(
                    %operation,
                    processed = report.total_processed(),
                    skipped = report.total_skipped(),
                    "Operation finished"
                );
                Outcome::Success
            }
            Err(ref e) => {
                tracing::error!(%operation, error = %e, "Operation failed");
                Outcome::Failed
            }
        };

        self.set_status(
            operation,
            match outcome {
                Outcome::Success => OperationStatus::Success,
                Outcome::Failed => OperationStatus::Failed,
            },
        );
        self.emit(SyncProgress::OperationFinished { operation, outcome });
        result
    }

    /// Bump the per-group counter and report the record as processed.
    fn record_processed(&mut self, operation: Operation, group: EntityGroup, total: usize) {
        let completed = {
            let counter = self.completed.entry(group).or_insert(0);
            *counter += 1;
            *counter
        };
        self.emit(SyncProgress::RecordProcessed {
            operation,
            group,
            completed,
            total,
        });
    }

    fn record_skipped(
        &self,
        operation: Operation,
        group: EntityGroup,
        record: &EntityRecord,
        error: &ServiceError,
    ) {
        tracing::warn!(
            %operation,
            %group,
            record = %record.name,
            id = %record.id,
            error = %error,
            "Record no longer exists, skipping"
        );
        self.emit(SyncProgress::RecordSkipped {
            operation,
            group,
            name: record.name.clone(),
            error: short_error_message(error),
        });
    }

    /// Source records of `group` eligible for create or delete.
    fn eligible(&self, group: EntityGroup, unlinked_only: bool) -> Vec<EntityRecord> {
        self.store
            .collection(group, Side::Source)
            .iter()
            .filter(|r| r.is_included)
            .filter(|r| !unlinked_only || r.linked_id.is_none())
            .filter(|r| {
                group == EntityGroup::Workspaces || self.store.is_workspace_included(&r.workspace_id)
            })
            .cloned()
            .collect()
    }

    /// Groups an operation walks after applying the skip list.
    fn walk_order(&self, operation: Operation) -> Vec<EntityGroup> {
        let include_users = self.options.include_users;
        let order = match operation {
            Operation::Fetch => EntityGroup::FETCH_ORDER.to_vec(),
            Operation::Create => EntityGroup::create_order(include_users),
            Operation::Delete => EntityGroup::delete_order(include_users),
        };
        order
            .into_iter()
            .filter(|g| operation == Operation::Fetch || self.options.writes(*g))
            .collect()
    }
}

fn handler_error(
    operation: Operation,
    group: EntityGroup,
    record: Option<&EntityRecord>,
    source: ServiceError,
) -> RunError {
    RunError::Handler {
        operation,
        group,
        record: record.map(|r| r.name.clone()),
        source,
    }
}
