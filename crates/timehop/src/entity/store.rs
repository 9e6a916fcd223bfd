use std::collections::HashMap;

use super::group::EntityGroup;
use super::record::EntityRecord;
use crate::service::ServiceError;

/// Ordered records of one group on one side, indexed by id.
///
/// Insertion order is preserved (it is the order records were fetched in),
/// and re-inserting an existing id replaces the record in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityCollection {
    records: Vec<EntityRecord>,
    index: HashMap<String, usize>,
}

impl EntityCollection {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&EntityRecord> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut EntityRecord> {
        self.index.get(id).map(|&i| &mut self.records[i])
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Insert or replace by id. Returns the replaced record, if any.
    pub fn insert(&mut self, record: EntityRecord) -> Option<EntityRecord> {
        match self.index.get(&record.id) {
            Some(&i) => Some(std::mem::replace(&mut self.records[i], record)),
            None => {
                self.index.insert(record.id.clone(), self.records.len());
                self.records.push(record);
                None
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<EntityRecord> {
        let i = self.index.remove(id)?;
        let removed = self.records.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EntityRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, EntityRecord> {
        self.records.iter_mut()
    }

    /// Records belonging to one workspace.
    pub fn in_workspace<'s, 'w>(
        &'s self,
        workspace_id: &'w str,
    ) -> impl Iterator<Item = &'s EntityRecord> + use<'s, 'w> {
        self.records
            .iter()
            .filter(move |r| r.workspace_id == workspace_id)
    }

    /// First record in `workspace_id` named `name`.
    #[must_use]
    pub fn find_by_name(&self, workspace_id: &str, name: &str) -> Option<&EntityRecord> {
        self.records
            .iter()
            .find(|r| r.workspace_id == workspace_id && r.name == name)
    }

    #[must_use]
    pub fn linked_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_linked()).count()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<EntityRecord> {
        self.records
    }
}

impl FromIterator<EntityRecord> for EntityCollection {
    fn from_iter<I: IntoIterator<Item = EntityRecord>>(iter: I) -> Self {
        let mut collection = Self::new();
        for record in iter {
            collection.insert(record);
        }
        collection
    }
}

impl<'a> IntoIterator for &'a EntityCollection {
    type Item = &'a EntityRecord;
    type IntoIter = std::slice::Iter<'a, EntityRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Which service a collection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Source,
    Target,
}

/// Source and target records of one group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    pub source: EntityCollection,
    pub target: EntityCollection,
}

impl Mapping {
    #[must_use]
    pub fn side(&self, side: Side) -> &EntityCollection {
        match side {
            Side::Source => &self.source,
            Side::Target => &self.target,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut EntityCollection {
        match side {
            Side::Source => &mut self.source,
            Side::Target => &mut self.target,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source.is_empty() && self.target.is_empty()
    }
}

/// Source/target workspace correspondence, derived from the Workspaces mapping.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceLinks {
    forward: HashMap<String, String>,
    backward: HashMap<String, String>,
}

impl WorkspaceLinks {
    pub fn from_mapping(mapping: &Mapping) -> Self {
        let mut links = Self::default();
        for record in &mapping.source {
            if let Some(ref target_id) = record.linked_id {
                links.insert(&record.id, target_id);
            }
        }
        links
    }

    pub fn insert(&mut self, source_id: &str, target_id: &str) {
        self.forward
            .insert(source_id.to_string(), target_id.to_string());
        self.backward
            .insert(target_id.to_string(), source_id.to_string());
    }

    #[must_use]
    pub fn target_for(&self, source_workspace: &str) -> Option<&str> {
        self.forward.get(source_workspace).map(String::as_str)
    }

    #[must_use]
    pub fn source_for(&self, target_workspace: &str) -> Option<&str> {
        self.backward.get(target_workspace).map(String::as_str)
    }
}

/// All mappings for one engine run, keyed by group.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityStore {
    mappings: HashMap<EntityGroup, Mapping>,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    pub fn new() -> Self {
        let mappings = EntityGroup::FETCH_ORDER
            .into_iter()
            .map(|group| (group, Mapping::default()))
            .collect();
        Self { mappings }
    }

    #[must_use]
    pub fn mapping(&self, group: EntityGroup) -> &Mapping {
        &self.mappings[&group]
    }

    pub fn mapping_mut(&mut self, group: EntityGroup) -> &mut Mapping {
        self.mappings.entry(group).or_default()
    }

    #[must_use]
    pub fn collection(&self, group: EntityGroup, side: Side) -> &EntityCollection {
        self.mapping(group).side(side)
    }

    /// Swap in a freshly linked mapping, returning the previous one.
    pub fn replace(&mut self, group: EntityGroup, mapping: Mapping) -> Mapping {
        self.mappings.insert(group, mapping).unwrap_or_default()
    }

    /// Drop every record on both sides.
    pub fn flush(&mut self) {
        for mapping in self.mappings.values_mut() {
            *mapping = Mapping::default();
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.values().all(Mapping::is_empty)
    }

    #[must_use]
    pub fn workspace_links(&self) -> WorkspaceLinks {
        WorkspaceLinks::from_mapping(self.mapping(EntityGroup::Workspaces))
    }

    /// Whether records of a source workspace take part in create/delete.
    /// Workspaces the store has never seen count as included.
    #[must_use]
    pub fn is_workspace_included(&self, source_workspace: &str) -> bool {
        self.mapping(EntityGroup::Workspaces)
            .source
            .get(source_workspace)
            .is_none_or(|ws| ws.is_included)
    }

    /// Recount, on each side, how many time entries reference each record.
    pub fn enrich_entry_counts(&mut self) {
        for side in [Side::Source, Side::Target] {
            let mut counts: HashMap<(EntityGroup, String), u32> = HashMap::new();
            for entry in self.collection(EntityGroup::TimeEntries, side) {
                for (group, id) in entry.references() {
                    *counts.entry((group, id.to_string())).or_default() += 1;
                }
            }

            for group in [
                EntityGroup::Users,
                EntityGroup::Clients,
                EntityGroup::Tags,
                EntityGroup::Projects,
                EntityGroup::Tasks,
            ] {
                for record in self.mapping_mut(group).side_mut(side).iter_mut() {
                    record.entry_count = counts
                        .get(&(group, record.id.clone()))
                        .copied()
                        .unwrap_or(0);
                }
            }
        }
    }

    /// Total records per group on one side.
    #[must_use]
    pub fn counts(&self, side: Side) -> Vec<(EntityGroup, usize)> {
        EntityGroup::FETCH_ORDER
            .into_iter()
            .map(|group| (group, self.collection(group, side).len()))
            .collect()
    }
}

/// Source-id → target-id correspondence per group.
///
/// Built from the store once fetching finishes and extended as creates
/// succeed. Create handlers take it explicitly to translate references.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdMaps {
    maps: HashMap<EntityGroup, HashMap<String, String>>,
}

impl IdMaps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_store(store: &EntityStore) -> Self {
        let mut maps = Self::new();
        for group in EntityGroup::FETCH_ORDER {
            for record in &store.mapping(group).source {
                if let Some(ref target_id) = record.linked_id {
                    maps.insert(group, &record.id, target_id);
                }
            }
        }
        maps
    }

    pub fn insert(&mut self, group: EntityGroup, source_id: &str, target_id: &str) {
        self.maps
            .entry(group)
            .or_default()
            .insert(source_id.to_string(), target_id.to_string());
    }

    pub fn remove(&mut self, group: EntityGroup, source_id: &str) -> Option<String> {
        self.maps.get_mut(&group)?.remove(source_id)
    }

    #[must_use]
    pub fn get(&self, group: EntityGroup, source_id: &str) -> Option<&str> {
        self.maps
            .get(&group)
            .and_then(|m| m.get(source_id))
            .map(String::as_str)
    }

    #[must_use]
    pub fn len(&self, group: EntityGroup) -> usize {
        self.maps.get(&group).map_or(0, HashMap::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.maps.values().all(HashMap::is_empty)
    }

    pub fn clear(&mut self) {
        self.maps.clear();
    }

    /// Translate a reference the record cannot be created without.
    pub fn require(
        &self,
        record: &EntityRecord,
        reference: EntityGroup,
        source_id: &str,
    ) -> Result<String, ServiceError> {
        self.get(reference, source_id)
            .map(str::to_string)
            .ok_or_else(|| ServiceError::UnresolvedDependency {
                group: record.member_of,
                record: record.name.clone(),
                reference,
                id: source_id.to_string(),
            })
    }

    /// Translate an optional reference; unmapped ids are dropped.
    #[must_use]
    pub fn optional(&self, reference: EntityGroup, source_id: Option<&str>) -> Option<String> {
        let source_id = source_id?;
        let mapped = self.get(reference, source_id).map(str::to_string);
        if mapped.is_none() {
            tracing::debug!(%reference, id = source_id, "Dropping unmapped optional reference");
        }
        mapped
    }

    /// Translate a list of optional references, dropping unmapped ids.
    #[must_use]
    pub fn optional_many(&self, reference: EntityGroup, source_ids: &[String]) -> Vec<String> {
        source_ids
            .iter()
            .filter_map(|id| self.optional(reference, Some(id)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::entity::record::{EntityDetails, ProjectDetails, TagDetails, TimeEntryDetails};

    fn tag(id: &str, name: &str) -> EntityRecord {
        EntityRecord::new(id, "w1", name, EntityDetails::Tag(TagDetails::default()))
    }

    #[test]
    fn test_collection_insert_replaces_in_place() {
        let mut collection: EntityCollection = [tag("a", "one"), tag("b", "two")].into_iter().collect();
        let replaced = collection.insert(tag("a", "uno"));

        assert_eq!(replaced.map(|r| r.name), Some("one".to_string()));
        let names: Vec<_> = collection.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["uno", "two"]);
    }

    #[test]
    fn test_collection_remove_keeps_index_consistent() {
        let mut collection: EntityCollection =
            [tag("a", "one"), tag("b", "two"), tag("c", "three")].into_iter().collect();

        assert!(collection.remove("a").is_some());
        assert!(collection.remove("a").is_none());
        assert_eq!(collection.get("c").map(|r| r.name.as_str()), Some("three"));
        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn test_lookups_outlive_the_workspace_key() {
        let collection: EntityCollection = [tag("a", "one"), tag("b", "two")].into_iter().collect();

        let (found, ids) = {
            let workspace = String::from("w1");
            let found = collection.find_by_name(&workspace, "two");
            let ids: Vec<&EntityRecord> = collection.in_workspace(&workspace).collect();
            (found, ids)
        };

        assert_eq!(found.map(|r| r.id.as_str()), Some("b"));
        assert_eq!(ids.len(), 2);
        assert!(collection.find_by_name("w2", "two").is_none());
    }

    #[test]
    fn test_store_flush_empties_everything() {
        let mut store = EntityStore::new();
        store.mapping_mut(EntityGroup::Tags).source.insert(tag("a", "one"));
        assert!(!store.is_empty());

        store.flush();
        assert!(store.is_empty());
        assert!(store.mapping(EntityGroup::TimeEntries).source.is_empty());
    }

    #[test]
    fn test_workspace_inclusion_lookup() {
        let mut store = EntityStore::new();
        store
            .mapping_mut(EntityGroup::Workspaces)
            .source
            .insert(EntityRecord::workspace("w1", "Main").with_included(false));

        assert!(!store.is_workspace_included("w1"));
        assert!(store.is_workspace_included("w-unknown"));
    }

    #[test]
    fn test_entry_counts_follow_references() {
        let mut store = EntityStore::new();
        let project = EntityRecord::new(
            "p1",
            "w1",
            "Website",
            EntityDetails::Project(ProjectDetails::default()),
        );
        store.mapping_mut(EntityGroup::Projects).source.insert(project);
        store.mapping_mut(EntityGroup::Tags).source.insert(tag("t1", "ops"));

        let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        for (i, tags) in [vec!["t1".to_string()], vec![]].into_iter().enumerate() {
            let mut details = TimeEntryDetails::new(start);
            details.project_id = Some("p1".to_string());
            details.tag_ids = tags;
            store.mapping_mut(EntityGroup::TimeEntries).source.insert(EntityRecord::new(
                format!("e{i}"),
                "w1",
                "work",
                EntityDetails::TimeEntry(details),
            ));
        }

        store.enrich_entry_counts();
        assert_eq!(store.mapping(EntityGroup::Projects).source.get("p1").map(|r| r.entry_count), Some(2));
        assert_eq!(store.mapping(EntityGroup::Tags).source.get("t1").map(|r| r.entry_count), Some(1));
    }

    #[test]
    fn test_id_maps_from_store_and_require() {
        let mut store = EntityStore::new();
        store
            .mapping_mut(EntityGroup::Tags)
            .source
            .insert(tag("a", "one").with_linked_id("x"));
        store.mapping_mut(EntityGroup::Tags).source.insert(tag("b", "two"));

        let maps = IdMaps::from_store(&store);
        assert_eq!(maps.get(EntityGroup::Tags, "a"), Some("x"));
        assert_eq!(maps.len(EntityGroup::Tags), 1);

        let record = tag("e", "entry");
        assert_eq!(
            maps.require(&record, EntityGroup::Tags, "a").ok(),
            Some("x".to_string())
        );
        let err = maps
            .require(&record, EntityGroup::Tags, "b")
            .expect_err("b is not linked");
        assert!(matches!(
            err,
            ServiceError::UnresolvedDependency { reference: EntityGroup::Tags, .. }
        ));

        assert_eq!(
            maps.optional_many(EntityGroup::Tags, &["a".to_string(), "b".to_string()]),
            vec!["x".to_string()]
        );
        assert_eq!(maps.optional(EntityGroup::Tags, None), None);
    }
}
