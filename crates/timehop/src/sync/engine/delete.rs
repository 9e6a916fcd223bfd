use crate::entity::{EntityGroup, EntityRecord, Operation, OperationStatus};
use crate::sync::SyncProgress;
use crate::sync::types::{GroupReport, Result, RunError, RunReport};

use super::{TransferEngine, handler_error};

impl TransferEngine {
    /// Delete included source records, dependents first.
    ///
    /// Linked records are deleted too: deletion only looks at inclusion.
    /// Records the service reports as already gone are dropped from the
    /// store and counted as skipped.
    pub async fn run_delete(&mut self) -> Result<RunReport> {
        if !self.fetched {
            return Err(RunError::NotFetched {
                operation: Operation::Delete,
            });
        }

        let groups = self.walk_order(Operation::Delete);
        self.begin(Operation::Delete, &groups);
        let result = self.delete_groups(&groups).await;
        self.finish(Operation::Delete, result)
    }

    async fn delete_groups(&mut self, groups: &[EntityGroup]) -> Result<RunReport> {
        let mut report = RunReport::new(Operation::Delete);
        for &group in groups {
            report.groups.push(self.delete_group(group).await?);
        }
        Ok(report)
    }

    async fn delete_group(&mut self, group: EntityGroup) -> Result<GroupReport> {
        self.set_status(Operation::Delete, OperationStatus::InProcess(group));

        let pending = self.eligible(group, false);
        let total = pending.len();
        self.emit(SyncProgress::GroupStarted {
            operation: Operation::Delete,
            group,
            total: Some(total),
        });

        let mut report = GroupReport::new(group);
        if total > 0 {
            let source = self.source.clone();
            let handler = self
                .registry
                .require(source.kind(), group, "delete")
                .map_err(|e| handler_error(Operation::Delete, group, None, e))?;
            let dry_run = self.options.dry_run;

            for record in pending {
                let outcome = if dry_run {
                    Ok(false)
                } else {
                    handler.delete(&source, &record).await.map(|()| true)
                };

                report.processed += 1;
                self.record_processed(Operation::Delete, group, total);
                if !dry_run {
                    source.pace().await;
                }

                match outcome {
                    Ok(true) => self.forget_deleted(group, &record),
                    Ok(false) => report.planned += 1,
                    Err(e) if e.is_soft_failure() => {
                        self.record_skipped(Operation::Delete, group, &record, &e);
                        self.forget_deleted(group, &record);
                        report.skipped += 1;
                    }
                    Err(e) => {
                        return Err(handler_error(Operation::Delete, group, Some(&record), e));
                    }
                }
            }
        }

        tracing::info!(
            %group,
            deleted = report.processed - report.skipped - report.planned,
            skipped = report.skipped,
            "Deleted group"
        );
        self.emit(SyncProgress::GroupComplete {
            operation: Operation::Delete,
            group,
            completed: report.processed,
        });
        Ok(report)
    }

    /// Drop a deleted source record and any link pointing at it.
    fn forget_deleted(&mut self, group: EntityGroup, record: &EntityRecord) {
        let mapping = self.store.mapping_mut(group);
        mapping.source.remove(&record.id);
        if let Some(ref target_id) = record.linked_id
            && let Some(target) = mapping.target.get_mut(target_id)
        {
            target.linked_id = None;
        }
        self.maps.remove(group, &record.id);
    }
}
