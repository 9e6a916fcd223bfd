//! Shared fakes for integration tests: a scripted HTTP transport and an
//! in-memory service backend with handlers over it.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use timehop::entity::{EntityGroup, EntityRecord, IdMaps, Operation};
use timehop::handlers::{EntityHandlers, FetchContext, HandlerRegistry};
use timehop::http::{HttpError, HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use timehop::retry::RetryConfig;
use timehop::service::{ServiceClient, ServiceError, ServiceKind, ServiceSettings};
use timehop::sync::{ProgressCallback, SyncProgress};

type Responder = Box<dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync>;

/// Transport answering every request through a closure and recording it.
pub struct FakeTransport {
    responder: Responder,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub fn new(responder: impl Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Transport that fails every request; for clients no handler calls.
    pub fn unreachable() -> Arc<Self> {
        Self::new(|_| empty(503))
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let response = (self.responder)(&request);
        self.requests.lock().expect("requests lock").push(request);
        Ok(response)
    }
}

pub fn json(status: u16, body: serde_json::Value) -> HttpResponse {
    HttpResponse {
        status,
        headers: vec![("Content-Type".to_string(), "application/json".to_string())],
        body: body.to_string().into_bytes(),
    }
}

pub fn empty(status: u16) -> HttpResponse {
    HttpResponse {
        status,
        headers: Vec::new(),
        body: Vec::new(),
    }
}

/// Settings with pacing off and an instant retry cooldown.
pub fn settings(kind: ServiceKind, base_url: &str) -> ServiceSettings {
    ServiceSettings::new(kind, "test-token")
        .with_base_url(base_url)
        .with_request_delay(Duration::ZERO)
        .with_retry(RetryConfig::new(Duration::ZERO, 5))
}

pub fn client(kind: ServiceKind, transport: Arc<FakeTransport>) -> ServiceClient {
    ServiceClient::with_transport(&settings(kind, "https://fake.test"), transport)
}

/// Progress callback collecting every event.
pub fn recorder() -> (Arc<ProgressCallback>, Arc<Mutex<Vec<SyncProgress>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let callback: ProgressCallback = Box::new(move |event: SyncProgress| {
        sink.lock().expect("events lock").push(event);
    });
    (Arc::new(callback), events)
}

/// One write a handler performed against a [`FakeBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: Operation,
    pub group: EntityGroup,
    pub name: String,
}

/// In-memory stand-in for one service account.
pub struct FakeBackend {
    kind: ServiceKind,
    records: Mutex<Vec<EntityRecord>>,
    gone: Mutex<HashSet<String>>,
    broken: Mutex<HashSet<EntityGroup>>,
    calls: Mutex<Vec<Call>>,
    next_id: AtomicU64,
}

impl FakeBackend {
    pub fn new(kind: ServiceKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            records: Mutex::new(Vec::new()),
            gone: Mutex::new(HashSet::new()),
            broken: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn seed(&self, records: impl IntoIterator<Item = EntityRecord>) {
        self.records.lock().expect("records lock").extend(records);
    }

    /// Make deletes of `id` answer 404.
    pub fn mark_gone(&self, id: &str) {
        self.gone.lock().expect("gone lock").insert(id.to_string());
    }

    /// Make listings of `group` answer 500.
    pub fn fail_fetch(&self, group: EntityGroup) {
        self.broken.lock().expect("broken lock").insert(group);
    }

    pub fn records(&self, group: EntityGroup) -> Vec<EntityRecord> {
        self.records
            .lock()
            .expect("records lock")
            .iter()
            .filter(|r| r.member_of == group)
            .cloned()
            .collect()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    /// Groups written to, in first-write order.
    pub fn groups_written(&self, operation: Operation) -> Vec<EntityGroup> {
        let mut groups = Vec::new();
        for call in self.calls() {
            if call.operation == operation && !groups.contains(&call.group) {
                groups.push(call.group);
            }
        }
        groups
    }

    fn log(&self, operation: Operation, record: &EntityRecord) {
        self.calls.lock().expect("calls lock").push(Call {
            operation,
            group: record.member_of,
            name: record.name.clone(),
        });
    }
}

pub struct FakeHandler {
    group: EntityGroup,
    backend: Arc<FakeBackend>,
}

#[async_trait]
impl EntityHandlers for FakeHandler {
    fn group(&self) -> EntityGroup {
        self.group
    }

    async fn fetch(
        &self,
        _ctx: &FetchContext<'_>,
        workspace_id: &str,
    ) -> timehop::service::Result<Vec<EntityRecord>> {
        if self.backend.broken.lock().expect("broken lock").contains(&self.group) {
            return Err(ServiceError::Api {
                service: self.backend.kind,
                method: HttpMethod::Get,
                endpoint: format!("/{}", self.group.as_str()),
                status: 500,
                body: "internal error".to_string(),
            });
        }
        Ok(self
            .backend
            .records(self.group)
            .into_iter()
            .filter(|r| self.group == EntityGroup::Workspaces || r.workspace_id == workspace_id)
            .collect())
    }

    async fn create(
        &self,
        _client: &ServiceClient,
        record: &EntityRecord,
        target_workspace_id: &str,
        maps: &IdMaps,
    ) -> timehop::service::Result<EntityRecord> {
        for (reference, id) in record.references() {
            if self.group.dependencies().contains(&reference) {
                maps.require(record, reference, id)?;
            }
        }
        self.backend.log(Operation::Create, record);

        let n = self.backend.next_id.fetch_add(1, Ordering::SeqCst);
        let id = format!("{}-{n}", self.backend.kind);
        let workspace_id = if self.group == EntityGroup::Workspaces {
            id.clone()
        } else {
            target_workspace_id.to_string()
        };
        let created = EntityRecord::new(
            id,
            workspace_id,
            record.name.clone(),
            record.details.clone(),
        );
        self.backend.seed([created.clone()]);
        Ok(created)
    }

    async fn delete(
        &self,
        _client: &ServiceClient,
        record: &EntityRecord,
    ) -> timehop::service::Result<()> {
        self.backend.log(Operation::Delete, record);
        if self.backend.gone.lock().expect("gone lock").contains(&record.id) {
            return Err(ServiceError::Api {
                service: self.backend.kind,
                method: HttpMethod::Delete,
                endpoint: format!("/{}/{}", record.member_of.as_str(), record.id),
                status: 404,
                body: "not found".to_string(),
            });
        }
        self.backend
            .records
            .lock()
            .expect("records lock")
            .retain(|r| r.id != record.id);
        Ok(())
    }
}

/// Registry with fake handlers for every group on the given backends.
pub fn fake_registry(backends: &[&Arc<FakeBackend>]) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    for backend in backends {
        for group in EntityGroup::FETCH_ORDER {
            registry.register(
                backend.kind,
                FakeHandler {
                    group,
                    backend: Arc::clone(backend),
                },
            );
        }
    }
    registry
}
