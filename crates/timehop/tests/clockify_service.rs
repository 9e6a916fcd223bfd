//! Engine runs against the real Clockify handlers over a scripted transport.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use timehop::entity::{EntityGroup, Operation, Side};
use timehop::http::{HttpMethod, HttpRequest, HttpResponse};
use timehop::retry::RetryConfig;
use timehop::service::{ServiceClient, ServiceError, ServiceKind};
use timehop::sync::{RunError, SyncProgress, TransferEngine};

use common::{FakeTransport, empty, json, recorder, settings};

fn clockify_account(request: &HttpRequest) -> HttpResponse {
    match (request.method, request.url.as_str()) {
        (HttpMethod::Get, "https://fake.test/workspaces") => {
            json(200, json!([{ "id": "w1", "name": "Acme" }]))
        }
        (HttpMethod::Get, "https://fake.test/workspaces/w1/projects?page=1&page-size=100") => json(
            200,
            json!([
                { "id": "p1", "name": "Website", "archived": false },
                { "id": "p2", "name": "Intranet", "archived": true },
            ]),
        ),
        (HttpMethod::Get, _) => json(200, json!([])),
        (HttpMethod::Put, _) => json(200, json!({})),
        _ => empty(204),
    }
}

#[tokio::test]
async fn test_delete_archives_projects_before_removing_them() {
    let transport = FakeTransport::new(clockify_account);
    let source = common::client(ServiceKind::Clockify, Arc::clone(&transport));
    let mut engine = TransferEngine::builder()
        .source(source)
        .build()
        .expect("engine builds");

    engine.run_fetch().await.expect("fetch succeeds");
    assert_eq!(
        engine
            .store()
            .collection(EntityGroup::Projects, Side::Source)
            .len(),
        2
    );

    engine.run_delete().await.expect("delete succeeds");

    let writes: Vec<(HttpMethod, String)> = transport
        .requests()
        .into_iter()
        .filter(|r| r.method != HttpMethod::Get)
        .map(|r| (r.method, r.path().to_string()))
        .collect();

    for id in ["p1", "p2"] {
        let path = format!("/workspaces/w1/projects/{id}");
        let archive = writes
            .iter()
            .position(|w| *w == (HttpMethod::Put, path.clone()))
            .expect("project archived");
        let delete = writes
            .iter()
            .position(|w| *w == (HttpMethod::Delete, path.clone()))
            .expect("project deleted");
        assert!(archive < delete, "{id} archived before delete");
    }
    assert!(
        engine
            .store()
            .collection(EntityGroup::Projects, Side::Source)
            .is_empty()
    );
}

#[tokio::test(start_paused = true)]
async fn test_sustained_throttling_stops_the_run() {
    let transport = FakeTransport::new(|_| empty(429));
    let settings = settings(ServiceKind::Clockify, "https://fake.test")
        .with_request_delay(Duration::ZERO)
        .with_retry(RetryConfig::default());
    let (progress, events) = recorder();

    let mut engine = TransferEngine::builder()
        .source(ServiceClient::with_transport(&settings, Arc::<FakeTransport>::clone(&transport)))
        .progress(progress)
        .build()
        .expect("engine builds");

    let err = engine.run_fetch().await.expect_err("throttled fetch fails");
    match err {
        RunError::Handler {
            operation: Operation::Fetch,
            group: EntityGroup::Workspaces,
            source: ServiceError::MaxAttemptsReached { attempts, .. },
            ..
        } => assert_eq!(attempts, 5),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(transport.requests().len(), 5);

    let backoffs = events
        .lock()
        .expect("events lock")
        .iter()
        .filter(|e| matches!(e, SyncProgress::RateLimitBackoff { .. }))
        .count();
    assert_eq!(backoffs, 4);
    assert!(!engine.is_fetched());
}
