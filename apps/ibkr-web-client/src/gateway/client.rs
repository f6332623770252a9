//! Gateway client: request dispatcher, connect loop and keep-alive task.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::connection::{Admission, ConnectionManager, ConnectionState, SessionHandle};
use super::endpoints::{EndpointRegistry, names};
use super::observer::{GatewayObserver, TracingObserver};
use super::pacer::RatePacer;
use super::request::ApiRequest;
use super::retry::{RetryClass, RetryPolicy};
use crate::config::GatewayConfig;
use crate::error::GatewayError;

/// Client for one Client Portal gateway session.
///
/// Cheap to clone; clones share the session, pacer and configuration.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    config: GatewayConfig,
    registry: EndpointRegistry,
    retry: RetryPolicy,
    pacer: RatePacer,
    connection: ConnectionManager,
    observer: Arc<dyn GatewayObserver>,
}

/// Builder for [`GatewayClient`].
#[derive(Debug)]
pub struct GatewayClientBuilder {
    config: GatewayConfig,
    registry: EndpointRegistry,
    observer: Arc<dyn GatewayObserver>,
}

impl GatewayClientBuilder {
    /// Replace the endpoint registry.
    #[must_use]
    pub fn registry(mut self, registry: EndpointRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the observer.
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn GatewayObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Build a disconnected client.
    #[must_use]
    pub fn build(self) -> GatewayClient {
        let connection =
            ConnectionManager::new(self.config.connection.clone(), Arc::clone(&self.observer));
        GatewayClient {
            inner: Arc::new(ClientInner {
                retry: RetryPolicy::new(self.config.retry.clone()),
                pacer: RatePacer::new(self.config.pacing),
                connection,
                registry: self.registry,
                observer: self.observer,
                config: self.config,
            }),
        }
    }
}

impl GatewayClient {
    /// Client with the default endpoint table and a [`TracingObserver`].
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self::builder(config).build()
    }

    /// Start building a client.
    #[must_use]
    pub fn builder(config: GatewayConfig) -> GatewayClientBuilder {
        GatewayClientBuilder {
            config,
            registry: EndpointRegistry::ibkr_default(),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Configuration the client was built with.
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    /// Endpoint table.
    #[must_use]
    pub fn registry(&self) -> &EndpointRegistry {
        &self.inner.registry
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    /// Send a request through the active session.
    ///
    /// Pacing and retries happen inside; the caller sees either the decoded
    /// JSON body (`Value::Null` for an empty body) or the final error.
    pub async fn dispatch(&self, request: ApiRequest) -> Result<Value, GatewayError> {
        self.dispatch_observed(&request, Admission::Connected).await
    }

    /// Call the keep-alive endpoint.
    ///
    /// Allowed while connecting, since it is what validates a new session.
    pub async fn tickle(&self) -> Result<Value, GatewayError> {
        self.dispatch_observed(&ApiRequest::get(names::TICKLE), Admission::KeepAlive)
            .await
    }

    /// Establish a validated session.
    ///
    /// Opens a session and tickles it until the gateway answers. Transport
    /// failures back off (doubling up to the configured ceiling) and retry
    /// forever; any other error disconnects and is returned.
    pub async fn connect(&self) -> Result<(), GatewayError> {
        let connection = &self.inner.connection;
        while !connection.is_connected() {
            connection.open_session()?;
            match self.tickle().await {
                Ok(_) => connection.mark_connected(),
                Err(err) if err.is_session_lost() => {
                    let (attempt, delay) = connection.next_backoff();
                    self.inner
                        .observer
                        .reconnect_scheduled(attempt, delay, &err);
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    connection.disconnect();
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Connect and return a guard that disconnects when dropped.
    pub async fn connect_scoped(&self) -> Result<ConnectedSession, GatewayError> {
        // Created first so that an aborted connect still tears down.
        let session = ConnectedSession {
            client: self.clone(),
        };
        self.connect().await?;
        Ok(session)
    }

    /// Close the session. Idempotent.
    pub fn disconnect(&self) {
        self.inner.connection.disconnect();
    }

    /// Keep the session alive until `cancel` fires.
    ///
    /// Each cycle connects if needed, waits the keep-alive interval and
    /// tickles. A lost session is re-established on the next cycle; any other
    /// failure ends the loop with that error. The session is closed on every
    /// exit, including when this future is dropped.
    pub async fn run_keep_alive(&self, cancel: &CancellationToken) -> Result<(), GatewayError> {
        let _session = ConnectedSession {
            client: self.clone(),
        };
        let interval = self.inner.config.connection.keep_alive_interval;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(()),
                result = self.connect() => result?,
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(()),
                () = tokio::time::sleep(interval) => {}
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(()),
                result = self.tickle() => match result {
                    Ok(_) => {}
                    Err(err) if err.is_session_lost() => {}
                    Err(err) => return Err(err),
                },
            }
        }
    }

    async fn dispatch_observed(
        &self,
        request: &ApiRequest,
        admission: Admission,
    ) -> Result<Value, GatewayError> {
        let result = self.dispatch_inner(request, admission).await;
        if let Err(err) = &result {
            self.inner.observer.request_failed(request.endpoint(), err);
        }
        result
    }

    async fn dispatch_inner(
        &self,
        request: &ApiRequest,
        admission: Admission,
    ) -> Result<Value, GatewayError> {
        let inner = &*self.inner;
        let endpoint = request.endpoint();
        let descriptor = inner.registry.resolve(endpoint)?;
        let url = request.build_url(inner.config.connection.normalized_base_url(), descriptor)?;
        let min_interval = descriptor.min_interval();

        let mut auth_retries = 0_u32;
        let mut transient_retries = 0_u32;
        let mut sends = 0_u32;

        loop {
            inner.connection.session(admission)?;

            let waited = inner.pacer.await_slot(endpoint, min_interval).await;
            if !waited.is_zero() {
                inner.observer.pacing_delay(endpoint, waited);
            }

            let session = inner.connection.session(admission)?;
            sends += 1;
            let (status, body) = self.send(&session, request, &url).await?;

            let class = inner.retry.classify(status);
            let retries = match class {
                RetryClass::Success => return decode_body(endpoint, &body),
                RetryClass::Fatal => {
                    return Err(GatewayError::Fatal {
                        endpoint: endpoint.to_string(),
                        status,
                        body,
                        attempts: sends,
                    });
                }
                RetryClass::AuthExpired => &mut auth_retries,
                RetryClass::Transient => &mut transient_retries,
            };

            let params = inner.retry.params_for(class, *retries);
            if !params.allows(*retries) {
                return Err(exhausted(class, endpoint, status, body, sends));
            }

            inner
                .observer
                .retry_scheduled(endpoint, class, status, *retries, params.delay);
            sleep_unless_zero(params.delay).await;
            *retries += 1;
        }
    }

    /// One HTTP round trip. Returns the status and the raw body text.
    async fn send(
        &self,
        session: &SessionHandle,
        request: &ApiRequest,
        url: &str,
    ) -> Result<(u16, String), GatewayError> {
        let inner = &*self.inner;
        let endpoint = request.endpoint();
        let started = Instant::now();

        let mut builder = session.client().request(request.method().clone(), url);
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let transport_failure = |source: reqwest::Error| {
            inner
                .observer
                .request_sent(endpoint, request.method(), None, started.elapsed());
            inner.connection.mark_transport_failure(session.generation());
            GatewayError::TransportFailure {
                endpoint: endpoint.to_string(),
                source,
            }
        };

        let response = builder.send().await.map_err(transport_failure)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_failure)?;

        inner
            .observer
            .request_sent(endpoint, request.method(), Some(status), started.elapsed());
        Ok((status, body))
    }
}

async fn sleep_unless_zero(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

fn decode_body(endpoint: &str, body: &str) -> Result<Value, GatewayError> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|source| GatewayError::InvalidResponse {
        endpoint: endpoint.to_string(),
        source,
    })
}

fn exhausted(
    class: RetryClass,
    endpoint: &str,
    status: u16,
    body: String,
    attempts: u32,
) -> GatewayError {
    let endpoint = endpoint.to_string();
    match class {
        RetryClass::AuthExpired => GatewayError::AuthExpired {
            endpoint,
            status,
            body,
            attempts,
        },
        RetryClass::Transient => GatewayError::TransientUpstream {
            endpoint,
            status,
            body,
            attempts,
        },
        RetryClass::Success | RetryClass::Fatal => GatewayError::Fatal {
            endpoint,
            status,
            body,
            attempts,
        },
    }
}

/// Connected client that disconnects when dropped.
///
/// Dereferences to [`GatewayClient`].
#[derive(Debug)]
pub struct ConnectedSession {
    client: GatewayClient,
}

impl ConnectedSession {
    /// The underlying client.
    #[must_use]
    pub const fn client(&self) -> &GatewayClient {
        &self.client
    }
}

impl Deref for ConnectedSession {
    type Target = GatewayClient;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

impl Drop for ConnectedSession {
    fn drop(&mut self) {
        self.client.disconnect();
    }
}
