//! Request pacing through the full dispatch path.

#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::json;
use tokio::time::Instant;
use tokio_test::assert_ok;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{PACED, PACED_OTHER, RecordingObserver, client_with_config, fast_config};
use ibkr_web_client::GatewayClient;
use ibkr_web_client::config::PacingScope;
use ibkr_web_client::gateway::{ApiRequest, NoopObserver};

/// 20 req/s on both paced endpoints.
const INTERVAL: Duration = Duration::from_millis(50);

async fn server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    server
}

async fn connected(
    server: &MockServer,
    scope: PacingScope,
    observer: Arc<RecordingObserver>,
) -> GatewayClient {
    let client = client_with_config(fast_config(&server.uri()).with_pacing(scope), observer);
    client.connect().await.unwrap();
    client
}

#[tokio::test]
async fn sequential_dispatches_are_spaced_by_rate_limit() {
    let server = server().await;
    let client = connected(&server, PacingScope::PerEndpoint, Arc::default()).await;

    let started = Instant::now();
    for _ in 0..5 {
        assert_ok!(client.dispatch(ApiRequest::get(PACED)).await);
    }

    assert!(started.elapsed() >= INTERVAL * 4);
}

#[tokio::test]
async fn concurrent_dispatches_share_one_schedule() {
    let server = server().await;
    let client = connected(&server, PacingScope::PerEndpoint, Arc::default()).await;

    let started = Instant::now();
    let results = join_all((0..5).map(|_| client.dispatch(ApiRequest::get(PACED)))).await;

    assert!(results.iter().all(Result::is_ok));
    assert!(started.elapsed() >= INTERVAL * 4);
}

#[tokio::test]
async fn global_scope_paces_across_endpoints() {
    let server = server().await;
    let observer = Arc::new(RecordingObserver::default());
    let client = connected(&server, PacingScope::Global, observer.clone()).await;

    client.dispatch(ApiRequest::get(PACED)).await.unwrap();
    client.dispatch(ApiRequest::get(PACED_OTHER)).await.unwrap();

    assert!(
        observer
            .pacing_delays()
            .iter()
            .any(|(endpoint, _)| endpoint == PACED_OTHER)
    );
}

#[tokio::test]
async fn per_endpoint_scope_keeps_endpoints_independent() {
    let server = server().await;
    let observer = Arc::new(RecordingObserver::default());
    let client = connected(&server, PacingScope::PerEndpoint, observer.clone()).await;

    client.dispatch(ApiRequest::get(PACED)).await.unwrap();
    client.dispatch(ApiRequest::get(PACED_OTHER)).await.unwrap();

    assert!(observer.pacing_delays().is_empty());
}

#[tokio::test]
async fn unlimited_endpoint_is_never_delayed() {
    let server = server().await;
    let client = client_with_config(
        fast_config(&server.uri()).with_pacing(PacingScope::PerEndpoint),
        Arc::new(NoopObserver),
    );
    client.connect().await.unwrap();

    let started = Instant::now();
    for _ in 0..10 {
        assert_ok!(client.tickle().await);
    }

    // Ten unpaced round trips to a local server stay well below one interval each.
    assert!(started.elapsed() < INTERVAL * 9);
}
