//! Session ownership and the connection state machine.
//!
//! ```text
//! Disconnected ──open_session──▶ Connecting ──mark_connected──▶ Connected
//!      ▲                             │                              │
//!      └──── disconnect / transport failure ◀───────────────────────┘
//! ```
//!
//! A session is a fresh `reqwest::Client` (its own connection pool and cookie
//! jar). Every session gets a generation number so a late transport failure
//! from an old session cannot tear down a newer one.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::backoff::ReconnectBackoff;
use super::observer::GatewayObserver;
use crate::config::ConnectionSettings;
use crate::error::GatewayError;
use crate::observability::connection_state;

/// Lifecycle state of the gateway session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No session.
    #[default]
    Disconnected,
    /// Session opened, waiting for the keep-alive call to validate it.
    Connecting,
    /// Session validated.
    Connected,
}

impl ConnectionState {
    /// Get the state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }

    /// Value reported on the connection state gauge.
    #[must_use]
    pub const fn gauge_value(&self) -> f64 {
        match self {
            Self::Disconnected => connection_state::DISCONNECTED,
            Self::Connecting => connection_state::CONNECTING,
            Self::Connected => connection_state::CONNECTED,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a request needs from the connection to be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Ordinary dispatch: requires `Connected`.
    Connected,
    /// Keep-alive call: also allowed while `Connecting`.
    KeepAlive,
}

/// Handle to the active session, valid for one request.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    client: reqwest::Client,
    generation: u64,
}

impl SessionHandle {
    /// HTTP client of the session.
    #[must_use]
    pub const fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Session generation the handle belongs to.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: ConnectionState,
    session: Option<reqwest::Client>,
    generation: u64,
}

/// Owns the transport session and its state.
///
/// State is guarded by a `parking_lot` lock that is never held across an
/// await; observer callbacks run after the lock is released.
#[derive(Debug)]
pub struct ConnectionManager {
    settings: ConnectionSettings,
    inner: RwLock<Inner>,
    backoff: Mutex<ReconnectBackoff>,
    observer: Arc<dyn GatewayObserver>,
}

impl ConnectionManager {
    /// Create a disconnected manager.
    #[must_use]
    pub fn new(settings: ConnectionSettings, observer: Arc<dyn GatewayObserver>) -> Self {
        let backoff = ReconnectBackoff::new(&settings);
        Self {
            settings,
            inner: RwLock::new(Inner::default()),
            backoff: Mutex::new(backoff),
            observer,
        }
    }

    /// Connection settings in use.
    #[must_use]
    pub const fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.read().state
    }

    /// Whether the session is validated.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Open a new transport session, replacing any previous one.
    ///
    /// Moves to `Connecting`; only the keep-alive call may use the session
    /// until [`mark_connected`](Self::mark_connected).
    pub fn open_session(&self) -> Result<SessionHandle, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(self.settings.request_timeout)
            .danger_accept_invalid_certs(self.settings.tls.accepts_invalid_certs())
            .cookie_store(true)
            .user_agent(concat!("ibkr-web-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(GatewayError::SessionSetup)?;

        let (from, handle) = {
            let mut inner = self.inner.write();
            inner.generation = inner.generation.wrapping_add(1);
            inner.session = Some(client.clone());
            let from = std::mem::replace(&mut inner.state, ConnectionState::Connecting);
            (
                from,
                SessionHandle {
                    client,
                    generation: inner.generation,
                },
            )
        };

        self.notify(from, ConnectionState::Connecting);
        Ok(handle)
    }

    /// Mark the session validated and reset the connect backoff.
    pub fn mark_connected(&self) {
        let from = {
            let mut inner = self.inner.write();
            if inner.session.is_none() {
                return;
            }
            std::mem::replace(&mut inner.state, ConnectionState::Connected)
        };
        self.backoff.lock().reset();
        self.notify(from, ConnectionState::Connected);
    }

    /// Drop the session after a transport failure on `generation`.
    ///
    /// Ignored when a newer session has already been opened.
    pub fn mark_transport_failure(&self, generation: u64) {
        let from = {
            let mut inner = self.inner.write();
            if inner.generation != generation || inner.session.is_none() {
                return;
            }
            inner.session = None;
            std::mem::replace(&mut inner.state, ConnectionState::Disconnected)
        };
        self.notify(from, ConnectionState::Disconnected);
    }

    /// Close and clear the session. Idempotent.
    pub fn disconnect(&self) {
        let from = {
            let mut inner = self.inner.write();
            inner.session = None;
            std::mem::replace(&mut inner.state, ConnectionState::Disconnected)
        };
        self.notify(from, ConnectionState::Disconnected);
    }

    /// Handle to the session, if the state admits this kind of request.
    pub fn session(&self, admission: Admission) -> Result<SessionHandle, GatewayError> {
        let inner = self.inner.read();
        let admitted = match admission {
            Admission::Connected => inner.state == ConnectionState::Connected,
            Admission::KeepAlive => inner.state != ConnectionState::Disconnected,
        };
        match (&inner.session, admitted) {
            (Some(client), true) => Ok(SessionHandle {
                client: client.clone(),
                generation: inner.generation,
            }),
            _ => Err(GatewayError::NotConnected),
        }
    }

    /// Next connect backoff delay and its attempt number (1-based).
    pub fn next_backoff(&self) -> (u32, std::time::Duration) {
        let mut backoff = self.backoff.lock();
        let delay = backoff.next_backoff();
        (backoff.current_attempt(), delay)
    }

    fn notify(&self, from: ConnectionState, to: ConnectionState) {
        if from != to {
            self.observer.state_changed(from, to);
        }
    }
}
