//! Ownership and lifecycle of the single daemon session.
use crate::config::NutConfig;
use crate::nut::{NutClient, NutError, UpsDaemon};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{info, warn};

/// Opens new daemon sessions.
#[allow(async_fn_in_trait)]
pub trait Connector {
    type Session: UpsDaemon;

    async fn open(&self) -> Result<Self::Session, NutError>;

    fn describe(&self) -> String;
}

pub struct TcpConnector {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpConnector {
    pub fn new(cfg: &NutConfig) -> Self {
        Self {
            host: cfg.host.clone(),
            port: cfg.port,
            timeout: cfg.connect_timeout(),
        }
    }
}

impl Connector for TcpConnector {
    type Session = NutClient<TcpStream>;

    async fn open(&self) -> Result<Self::Session, NutError> {
        NutClient::connect(&self.host, self.port, self.timeout).await
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug)]
pub enum ConnectionState<S> {
    Disconnected,
    Connecting,
    Ready(S),
    Failed(String),
}

impl<S> ConnectionState<S> {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Ready(_) => "ready",
            ConnectionState::Failed(_) => "failed",
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            ConnectionState::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

pub struct ConnectionManager<C: Connector> {
    connector: C,
    state: ConnectionState<C::Session>,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> &ConnectionState<C::Session> {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ConnectionState::Ready(_))
    }

    /// Bring the session to `Ready`. A no-op when it already is.
    pub async fn connect(&mut self) -> Result<(), NutError> {
        if self.is_ready() {
            return Ok(());
        }
        let target = self.connector.describe();
        self.state = ConnectionState::Connecting;
        match self.connector.open().await {
            Ok(session) => {
                info!(%target, "connected to NUT daemon");
                self.state = ConnectionState::Ready(session);
                Ok(())
            }
            Err(e) => {
                warn!(%target, error = %e, "could not connect to NUT daemon");
                self.state = ConnectionState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    pub fn session(&mut self) -> Option<&mut C::Session> {
        match &mut self.state {
            ConnectionState::Ready(session) => Some(session),
            _ => None,
        }
    }

    /// Record a query failure; transport failures drop the session so the
    /// next `connect` opens a fresh one.
    pub fn note_error(&mut self, err: &NutError) {
        if !err.breaks_session() {
            return;
        }
        match err {
            NutError::Closed => warn!("connection closed"),
            other => warn!(error = %other, "connection error"),
        }
        self.state = ConnectionState::Failed(err.to_string());
    }

    /// Log out of a ready session and return to `Disconnected`.
    pub async fn close(&mut self) {
        let state = std::mem::replace(&mut self.state, ConnectionState::Disconnected);
        if let ConnectionState::Ready(mut session) = state {
            if let Err(e) = session.logout().await {
                warn!(error = %e, "logout failed");
            }
            info!("connection closed");
        }
    }
}
