//! Cross-service identity linking.
//!
//! Records on the two sides are matched by natural key (name, or
//! description plus start for time entries). Matching is scoped: a source
//! record is only compared with target records in the target workspace its
//! own workspace is linked to.

use std::collections::HashMap;

use crate::entity::{EntityCollection, EntityGroup, EntityRecord, Mapping, WorkspaceLinks};

/// Scope key for workspace records, which are matched globally.
const GLOBAL_SCOPE: &str = "";

/// Match `source` against `target` and build the group's mapping.
///
/// Linking is symmetric: a source record's `linked_id` names its target
/// match and vice versa. When several records on one side share a key in
/// the same scope, the last one indexed wins and a warning is logged.
///
/// Inclusion follows three rules. Workspaces are always included.
/// Unmatched records are included. Matched records keep the inclusion they
/// had in `prior` (the group's previous mapping), falling back to what the
/// fetch produced.
pub fn link_by_name(
    group: EntityGroup,
    source: Vec<EntityRecord>,
    target: Vec<EntityRecord>,
    workspaces: &WorkspaceLinks,
    prior: Option<&Mapping>,
) -> Mapping {
    let source_scope = |record: &EntityRecord| -> Option<String> {
        if group == EntityGroup::Workspaces {
            Some(GLOBAL_SCOPE.to_string())
        } else {
            workspaces
                .target_for(&record.workspace_id)
                .map(str::to_string)
        }
    };
    let target_scope = |record: &EntityRecord| -> Option<String> {
        if group == EntityGroup::Workspaces {
            Some(GLOBAL_SCOPE.to_string())
        } else {
            workspaces
                .source_for(&record.workspace_id)
                .map(str::to_string)
        }
    };

    // Each side is indexed under its own workspace, and looked up from the
    // other side through the workspace link. Records in unlinked
    // workspaces are not indexed at all.
    let source_index = index_by_key(group, &source, |r| {
        source_scope(r).map(|_| scope_for_lookup(group, &r.workspace_id))
    });
    let target_index = index_by_key(group, &target, |r| {
        target_scope(r).map(|_| scope_for_lookup(group, &r.workspace_id))
    });

    let source = source
        .into_iter()
        .map(|mut record| {
            record.linked_id = source_scope(&record).and_then(|scope| {
                target_index
                    .get(&(scope, record.natural_key()))
                    .cloned()
            });
            apply_inclusion(group, record, prior.map(|m| &m.source))
        })
        .collect();

    let target = target
        .into_iter()
        .map(|mut record| {
            record.linked_id = target_scope(&record).and_then(|scope| {
                source_index
                    .get(&(scope, record.natural_key()))
                    .cloned()
            });
            apply_inclusion(group, record, prior.map(|m| &m.target))
        })
        .collect();

    let mapping = Mapping { source, target };
    tracing::debug!(
        %group,
        source = mapping.source.len(),
        target = mapping.target.len(),
        linked = mapping.source.linked_count(),
        "Linked group"
    );
    mapping
}

/// Mapping for a run without a target. Nothing is linked; every record
/// keeps the inclusion it had in `prior`, workspaces excepted.
pub fn source_only(
    group: EntityGroup,
    source: Vec<EntityRecord>,
    prior: Option<&Mapping>,
) -> Mapping {
    let source = source
        .into_iter()
        .map(|mut record| {
            record.is_included = group == EntityGroup::Workspaces
                || prior
                    .and_then(|m| m.source.get(&record.id))
                    .map_or(record.is_included, |previous| previous.is_included);
            record
        })
        .collect();
    Mapping {
        source,
        target: EntityCollection::new(),
    }
}

fn scope_for_lookup(group: EntityGroup, workspace_id: &str) -> String {
    if group == EntityGroup::Workspaces {
        GLOBAL_SCOPE.to_string()
    } else {
        workspace_id.to_string()
    }
}

fn index_by_key<F>(
    group: EntityGroup,
    records: &[EntityRecord],
    scope: F,
) -> HashMap<(String, String), String>
where
    F: Fn(&EntityRecord) -> Option<String>,
{
    let mut index: HashMap<(String, String), String> = HashMap::new();
    for record in records {
        let Some(scope) = scope(record) else {
            continue;
        };
        let key = record.natural_key();
        if let Some(previous) = index.insert((scope, key.clone()), record.id.clone()) {
            tracing::warn!(
                %group,
                key = %key,
                replaced = %previous,
                kept = %record.id,
                "Duplicate natural key, linking to the last record"
            );
        }
    }
    index
}

fn apply_inclusion(
    group: EntityGroup,
    mut record: EntityRecord,
    prior: Option<&EntityCollection>,
) -> EntityRecord {
    record.is_included = if group == EntityGroup::Workspaces || record.linked_id.is_none() {
        true
    } else {
        prior
            .and_then(|collection| collection.get(&record.id))
            .map_or(record.is_included, |previous| previous.is_included)
    };
    record
}
