//! Session lifecycle: connect loop, keep-alive task and teardown.

#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use common::{RecordingObserver, client_with, client_with_config, fast_config};
use ibkr_web_client::config::ConnectionSettings;
use ibkr_web_client::{GatewayClient, GatewayError};
use ibkr_web_client::gateway::{ConnectionState, NoopObserver};

fn tickle_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"session": "abc", "iserver": {}}))
}

/// Slower than the 200ms request timeout of the test config.
fn tickle_hang() -> ResponseTemplate {
    tickle_ok().set_delay(Duration::from_millis(500))
}

async fn tickle_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|req| req.url.path() == "/tickle")
        .count()
}

#[tokio::test]
async fn connect_validates_session_with_tickle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tickle"))
        .respond_with(tickle_ok())
        .expect(1)
        .mount(&server)
        .await;
    let observer = Arc::new(RecordingObserver::default());
    let client = client_with(&server.uri(), observer.clone());

    assert_ok!(client.connect().await);

    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(
        observer.transitions(),
        vec![
            (ConnectionState::Disconnected, ConnectionState::Connecting),
            (ConnectionState::Connecting, ConnectionState::Connected),
        ]
    );
}

#[tokio::test]
async fn connect_backs_off_through_transport_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tickle"))
        .respond_with(tickle_hang())
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tickle"))
        .respond_with(tickle_ok())
        .mount(&server)
        .await;
    let observer = Arc::new(RecordingObserver::default());
    let client = client_with(&server.uri(), observer.clone());

    client.connect().await.unwrap();

    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(observer.reconnects(), vec![1, 2]);
    assert_eq!(tickle_count(&server).await, 3);
}

#[tokio::test]
async fn connect_gives_up_on_non_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tickle"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    let client = client_with(&server.uri(), Arc::new(NoopObserver));

    let err = assert_err!(client.connect().await);

    assert!(matches!(err, GatewayError::Fatal { status: 500, .. }));
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn scoped_session_disconnects_on_drop() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tickle"))
        .respond_with(tickle_ok())
        .mount(&server)
        .await;
    let client = client_with(&server.uri(), Arc::new(NoopObserver));

    let session = client.connect_scoped().await.unwrap();
    assert_eq!(session.state(), ConnectionState::Connected);

    drop(session);
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn keep_alive_tickles_until_cancelled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tickle"))
        .respond_with(tickle_ok())
        .mount(&server)
        .await;
    let client = client_with(&server.uri(), Arc::new(NoopObserver));
    let cancel = CancellationToken::new();

    let task = {
        let client = client.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { client.run_keep_alive(&cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(client.state(), ConnectionState::Connected);

    cancel.cancel();
    assert_ok!(task.await.unwrap());

    assert_eq!(client.state(), ConnectionState::Disconnected);
    // One validating tickle plus several keep-alive cycles.
    assert!(tickle_count(&server).await >= 3);
}

fn spawn_keep_alive(
    client: &GatewayClient,
    cancel: &CancellationToken,
) -> tokio::task::JoinHandle<Result<(), GatewayError>> {
    let client = client.clone();
    let cancel = cancel.clone();
    tokio::spawn(async move { client.run_keep_alive(&cancel).await })
}

#[tokio::test]
async fn cancel_interrupts_connect_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tickle"))
        .respond_with(tickle_hang())
        .mount(&server)
        .await;
    let uri = server.uri();
    let config = fast_config(&uri).with_connection(
        ConnectionSettings::new(&uri)
            .with_request_timeout(Duration::from_millis(100))
            .with_reconnect_backoff(Duration::from_secs(30), Duration::from_secs(60)),
    );
    let observer = Arc::new(RecordingObserver::default());
    let client = client_with_config(config, observer.clone());
    let cancel = CancellationToken::new();

    let task = spawn_keep_alive(&client, &cancel);

    // The first tickle times out and the loop parks in a 30s backoff.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(observer.reconnects(), vec![1]);

    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .unwrap()
        .unwrap();

    assert_ok!(result);
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(observer.entered(ConnectionState::Connected), 0);
}

#[tokio::test]
async fn cancel_interrupts_hanging_tickle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tickle"))
        .respond_with(tickle_ok())
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tickle"))
        .respond_with(tickle_ok().set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;
    let uri = server.uri();
    let config = fast_config(&uri).with_connection(
        ConnectionSettings::new(&uri)
            .with_keep_alive_interval(Duration::from_millis(30))
            .with_request_timeout(Duration::from_secs(60)),
    );
    let observer = Arc::new(RecordingObserver::default());
    let client = client_with_config(config, observer.clone());
    let cancel = CancellationToken::new();

    let task = spawn_keep_alive(&client, &cancel);

    // Connected, then stuck in the second tickle.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(client.state(), ConnectionState::Connected);

    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .unwrap()
        .unwrap();

    assert_ok!(result);
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(observer.entered(ConnectionState::Connected), 1);
    assert!(observer.reconnects().is_empty());
}

#[tokio::test]
async fn keep_alive_reconnects_after_transport_failure() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    Mock::given(method("GET"))
        .and(path("/tickle"))
        .respond_with(move |_: &Request| {
            if counter.fetch_add(1, Ordering::SeqCst) == 1 {
                tickle_hang()
            } else {
                tickle_ok()
            }
        })
        .mount(&server)
        .await;
    let observer = Arc::new(RecordingObserver::default());
    let client = client_with(&server.uri(), observer.clone());
    let cancel = CancellationToken::new();

    let task = {
        let client = client.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { client.run_keep_alive(&cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(600)).await;
    cancel.cancel();
    task.await.unwrap().unwrap();

    let transitions = observer.transitions();
    assert!(
        transitions.contains(&(ConnectionState::Connected, ConnectionState::Disconnected)),
        "transport failure should drop the session: {transitions:?}"
    );
    assert!(observer.entered(ConnectionState::Connected) >= 2);
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn keep_alive_stops_on_fatal_tickle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tickle"))
        .respond_with(tickle_ok())
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tickle"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    let client = client_with(&server.uri(), Arc::new(NoopObserver));

    let err = client
        .run_keep_alive(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Fatal { status: 403, .. }));
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn aborted_keep_alive_task_closes_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tickle"))
        .respond_with(tickle_ok())
        .mount(&server)
        .await;
    let client = client_with(&server.uri(), Arc::new(NoopObserver));

    let task = {
        let client = client.clone();
        tokio::spawn(async move { client.run_keep_alive(&CancellationToken::new()).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.state(), ConnectionState::Connected);

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());
    assert_eq!(client.state(), ConnectionState::Disconnected);
}
