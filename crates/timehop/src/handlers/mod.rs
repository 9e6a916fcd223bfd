//! Per-group, per-service sync handlers.
//!
//! Each (service, group) pair has one [`EntityHandlers`] implementation that
//! knows the vendor's endpoints and payload shapes. The engine looks
//! handlers up through a [`HandlerRegistry`] and never touches wire types.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::entity::{EntityCollection, EntityGroup, EntityRecord, EntityStore, IdMaps, Side};
use crate::service::{Result, ServiceClient, ServiceError, ServiceKind};
use crate::sync::DateRange;

/// What a fetch handler may read besides the service itself.
///
/// Some listings hang off records fetched earlier in the same run
/// (Clockify tasks per project, time entries per user), so handlers get a
/// read-only view of the store for their side.
pub struct FetchContext<'a> {
    pub client: &'a ServiceClient,
    pub store: &'a EntityStore,
    pub side: Side,
    pub range: &'a DateRange,
}

impl FetchContext<'_> {
    /// Already-fetched records of `group` on this context's side.
    #[must_use]
    pub fn collection(&self, group: EntityGroup) -> &EntityCollection {
        self.store.collection(group, self.side)
    }
}

/// Fetch, create and delete for one group on one service.
#[async_trait]
pub trait EntityHandlers: Send + Sync {
    fn group(&self) -> EntityGroup;

    /// List the group's records in one workspace. Workspace handlers are
    /// called once with an empty `workspace_id`.
    async fn fetch(&self, ctx: &FetchContext<'_>, workspace_id: &str) -> Result<Vec<EntityRecord>>;

    /// Create `record` (read from the other service) in `target_workspace_id`,
    /// translating its references through `maps`. Returns the created
    /// record as this service reports it.
    async fn create(
        &self,
        client: &ServiceClient,
        record: &EntityRecord,
        target_workspace_id: &str,
        maps: &IdMaps,
    ) -> Result<EntityRecord>;

    /// Remove `record` (read from this service).
    async fn delete(&self, client: &ServiceClient, record: &EntityRecord) -> Result<()>;
}

/// Handler lookup keyed by (service, group).
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<(ServiceKind, EntityGroup), Arc<dyn EntityHandlers>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every Clockify and Toggl handler.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        crate::clockify::register(&mut registry);
        crate::toggl::register(&mut registry);
        registry
    }

    /// Register `handler` for its group, replacing any previous one.
    pub fn register<H>(&mut self, service: ServiceKind, handler: H)
    where
        H: EntityHandlers + 'static,
    {
        let group = handler.group();
        self.handlers.insert((service, group), Arc::new(handler));
    }

    #[must_use]
    pub fn get(&self, service: ServiceKind, group: EntityGroup) -> Option<Arc<dyn EntityHandlers>> {
        self.handlers.get(&(service, group)).cloned()
    }

    /// Like [`get`](Self::get), but a missing handler is an error.
    pub fn require(
        &self,
        service: ServiceKind,
        group: EntityGroup,
        operation: &'static str,
    ) -> Result<Arc<dyn EntityHandlers>> {
        self.get(service, group).ok_or(ServiceError::Unsupported {
            service,
            group,
            operation,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.handlers.keys().collect();
        keys.sort_by_key(|(service, group)| (service.as_str(), *group));
        f.debug_struct("HandlerRegistry")
            .field("handlers", &keys)
            .finish()
    }
}

/// Error for a record handed to the wrong group's handler.
pub(crate) fn mismatched(expected: EntityGroup, record: &EntityRecord) -> ServiceError {
    ServiceError::MismatchedRecord {
        expected,
        found: record.member_of,
        id: record.id.clone(),
    }
}
