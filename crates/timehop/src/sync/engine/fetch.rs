use crate::entity::{EntityGroup, EntityRecord, IdMaps, Mapping, Operation, OperationStatus, Side};
use crate::handlers::FetchContext;
use crate::link::{link_by_name, source_only};
use crate::sync::SyncProgress;
use crate::sync::types::{GroupReport, Result, RunError, RunReport};

use super::{TransferEngine, handler_error};

impl TransferEngine {
    /// Fetch every group, link source and target, and rebuild the id maps.
    ///
    /// Groups are fetched in [`EntityGroup::FETCH_ORDER`], so listings that
    /// hang off earlier groups (tasks per project, entries per user) see
    /// this run's records. Inclusion toggles survive a re-fetch for records
    /// that stay linked.
    pub async fn run_fetch(&mut self) -> Result<RunReport> {
        let groups = self.walk_order(Operation::Fetch);
        // Groups are replaced as they arrive; until the last one lands the
        // store mixes old and new records.
        self.fetched = false;
        self.maps.clear();
        self.begin(Operation::Fetch, &groups);
        let result = self.fetch_groups(&groups).await;
        self.finish(Operation::Fetch, result)
    }

    async fn fetch_groups(&mut self, groups: &[EntityGroup]) -> Result<RunReport> {
        let mut report = RunReport::new(Operation::Fetch);

        for &group in groups {
            self.set_status(Operation::Fetch, OperationStatus::InProcess(group));
            self.emit(SyncProgress::GroupStarted {
                operation: Operation::Fetch,
                group,
                total: None,
            });

            let source = self.fetch_side(group, Side::Source).await?;
            let mapping = if self.target.is_some() {
                let target = self.fetch_side(group, Side::Target).await?;
                let links = self.store.workspace_links();
                let mapping = link_by_name(
                    group,
                    source,
                    target,
                    &links,
                    Some(self.store.mapping(group)),
                );
                self.emit_linked(group, &mapping);
                mapping
            } else {
                source_only(group, source, Some(self.store.mapping(group)))
            };

            let source_count = mapping.source.len();
            let target_count = self.target.as_ref().map(|_| mapping.target.len());
            self.store.replace(group, mapping);

            tracing::info!(
                %group,
                source_records = source_count,
                target_records = ?target_count,
                "Fetched group"
            );
            self.emit(SyncProgress::GroupFetched {
                group,
                source: source_count,
                target: target_count,
            });

            let mut group_report = GroupReport::new(group);
            group_report.processed = source_count;
            report.groups.push(group_report);
        }

        self.store.enrich_entry_counts();
        self.maps = IdMaps::from_store(&self.store);
        self.fetched = true;
        Ok(report)
    }

    /// Fetch one group from one side, across all of that side's workspaces.
    async fn fetch_side(&self, group: EntityGroup, side: Side) -> Result<Vec<EntityRecord>> {
        let client = match side {
            Side::Source => &self.source,
            Side::Target => self.target.as_ref().ok_or(RunError::NoTarget {
                operation: Operation::Fetch,
            })?,
        };
        let handler = self
            .registry
            .require(client.kind(), group, "fetch")
            .map_err(|e| handler_error(Operation::Fetch, group, None, e))?;

        let ctx = FetchContext {
            client,
            store: &self.store,
            side,
            range: &self.options.range,
        };

        if group == EntityGroup::Workspaces {
            return handler
                .fetch(&ctx, "")
                .await
                .map_err(|e| handler_error(Operation::Fetch, group, None, e));
        }

        let mut records = Vec::new();
        for workspace in self.store.collection(EntityGroup::Workspaces, side) {
            let fetched = handler
                .fetch(&ctx, &workspace.id)
                .await
                .map_err(|e| handler_error(Operation::Fetch, group, Some(workspace), e))?;
            tracing::debug!(
                service = %client.kind(),
                %group,
                workspace = %workspace.id,
                count = fetched.len(),
                "Fetched workspace records"
            );
            records.extend(fetched);
        }
        Ok(records)
    }

    fn emit_linked(&self, group: EntityGroup, mapping: &Mapping) {
        let linked = mapping.source.linked_count();
        self.emit(SyncProgress::Linked {
            group,
            linked,
            unmatched_source: mapping.source.len() - linked,
            unmatched_target: mapping.target.len() - mapping.target.linked_count(),
        });
    }
}
