use crate::entity::{EntityGroup, EntityRecord, Operation, OperationStatus};
use crate::sync::SyncProgress;
use crate::sync::types::{GroupReport, Result, RunError, RunReport};

use super::{TransferEngine, handler_error};

impl TransferEngine {
    /// Create unlinked, included source records on the target.
    ///
    /// Source workspaces without a counterpart are created first. Groups
    /// then follow [`EntityGroup::create_order`], so every required
    /// reference already exists on the target when a record is sent. The
    /// first hard error stops the run; records created before it stay
    /// created and linked.
    pub async fn run_create(&mut self) -> Result<RunReport> {
        if self.target.is_none() {
            return Err(RunError::NoTarget {
                operation: Operation::Create,
            });
        }
        if !self.fetched {
            return Err(RunError::NotFetched {
                operation: Operation::Create,
            });
        }

        let groups = self.walk_order(Operation::Create);
        self.begin(Operation::Create, &groups);
        let result = self.create_groups(&groups).await;
        self.finish(Operation::Create, result)
    }

    async fn create_groups(&mut self, groups: &[EntityGroup]) -> Result<RunReport> {
        let mut report = RunReport::new(Operation::Create);
        report.groups.push(self.resolve_workspaces().await?);

        for &group in groups {
            report.groups.push(self.create_group(group).await?);
        }
        Ok(report)
    }

    /// Create included source workspaces that have no target counterpart.
    async fn resolve_workspaces(&mut self) -> Result<GroupReport> {
        let group = EntityGroup::Workspaces;
        self.set_status(Operation::Create, OperationStatus::InProcess(group));

        let pending = self.eligible(group, true);
        self.emit(SyncProgress::ResolvingWorkspaces {
            pending: pending.len(),
        });
        self.create_records(group, pending).await
    }

    async fn create_group(&mut self, group: EntityGroup) -> Result<GroupReport> {
        self.set_status(Operation::Create, OperationStatus::InProcess(group));

        let pending = self.eligible(group, true);
        self.emit(SyncProgress::GroupStarted {
            operation: Operation::Create,
            group,
            total: Some(pending.len()),
        });

        let report = self.create_records(group, pending).await?;
        tracing::info!(
            %group,
            created = report.processed - report.skipped - report.planned,
            skipped = report.skipped,
            "Created group"
        );
        self.emit(SyncProgress::GroupComplete {
            operation: Operation::Create,
            group,
            completed: report.processed,
        });
        Ok(report)
    }

    async fn create_records(
        &mut self,
        group: EntityGroup,
        pending: Vec<EntityRecord>,
    ) -> Result<GroupReport> {
        let mut report = GroupReport::new(group);
        let total = pending.len();
        if total == 0 {
            return Ok(report);
        }

        let Some(target) = self.target.clone() else {
            return Err(RunError::NoTarget {
                operation: Operation::Create,
            });
        };
        let handler = self
            .registry
            .require(target.kind(), group, "create")
            .map_err(|e| handler_error(Operation::Create, group, None, e))?;
        let links = self.store.workspace_links();
        let dry_run = self.options.dry_run;

        for record in pending {
            let target_workspace = if group == EntityGroup::Workspaces {
                Some(String::new())
            } else {
                links.target_for(&record.workspace_id).map(str::to_string)
            };

            let outcome = match target_workspace {
                _ if dry_run => Ok(None),
                // Workspace was neither linked nor created.
                None => {
                    tracing::debug!(
                        %group,
                        record = %record.name,
                        workspace = %record.workspace_id,
                        "No target workspace, leaving record alone"
                    );
                    report.skipped += 1;
                    Ok(None)
                }
                Some(ref workspace) => handler
                    .create(&target, &record, workspace, &self.maps)
                    .await
                    .map(Some),
            };

            report.processed += 1;
            self.record_processed(Operation::Create, group, total);
            if !dry_run {
                target.pace().await;
            }

            match outcome {
                Ok(Some(created)) => self.link_created(group, &record.id, created),
                Ok(None) if dry_run => report.planned += 1,
                Ok(None) => {}
                Err(e) if e.is_soft_failure() => {
                    self.record_skipped(Operation::Create, group, &record, &e);
                    report.skipped += 1;
                }
                Err(e) => return Err(handler_error(Operation::Create, group, Some(&record), e)),
            }
        }
        Ok(report)
    }

    /// Link a freshly created record to its source on both sides.
    fn link_created(&mut self, group: EntityGroup, source_id: &str, created: EntityRecord) {
        let target_id = created.id.clone();
        tracing::debug!(%group, source_id, target_id = %target_id, "Created record");

        let mapping = self.store.mapping_mut(group);
        if let Some(source) = mapping.source.get_mut(source_id) {
            source.linked_id = Some(target_id.clone());
        }
        mapping.target.insert(created.with_linked_id(source_id));
        self.maps.insert(group, source_id, &target_id);
    }
}
