//! Transport port.
//!
//! The engine never touches a socket directly. It asks a [`Transport`] to
//! open a connection to an [`Endpoint`] and gets back a [`TransportLink`]:
//! a sink for outbound frame text and a channel of inbound
//! [`TransportEvent`]s. A successful `connect` is the "open" signal.
//!
//! # Implementations
//!
//! - **`WebSocketTransport`**: STOMP over WebSocket via tokio-tungstenite.
//! - **`TcpTransport`**: plain STOMP over TCP, framed with `StompCodec`.
//!
//! Tests plug in an in-memory transport.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::Endpoint;

mod tcp;
mod ws;

pub use tcp::TcpTransport;
pub use ws::WebSocketTransport;

/// Capacity of the inbound event channel created by the bundled adapters.
pub(crate) const EVENT_BUFFER: usize = 256;

/// Transport failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection could not be opened.
    #[error("connect failed: {0}")]
    Connect(String),
    /// A write failed.
    #[error("send failed: {0}")]
    Send(String),
    /// The connection is gone.
    #[error("connection closed")]
    Closed,
    /// Read-side I/O or protocol failure.
    #[error("io: {0}")]
    Io(String),
}

/// Inbound traffic from an open transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Text(String),
    /// Decoded as UTF-8 by the engine before parsing.
    Binary(Vec<u8>),
    /// Terminal; `None` for a clean close.
    Closed(Option<TransportError>),
}

/// Outbound half of an open connection.
#[async_trait]
pub trait TransportSink: Send {
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the connection. Calling it twice is harmless.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// An open connection.
///
/// Dropping the `events` receiver tells the adapter nobody is listening any
/// more; adapters stop their reader when that happens.
pub struct TransportLink {
    pub sink: Box<dyn TransportSink>,
    pub events: mpsc::Receiver<TransportEvent>,
}

impl TransportLink {
    pub fn new(sink: Box<dyn TransportSink>, events: mpsc::Receiver<TransportEvent>) -> Self {
        Self { sink, events }
    }
}

impl std::fmt::Debug for TransportLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportLink").finish_non_exhaustive()
    }
}

/// Opens connections. Called once per connect or reconnect attempt.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn connect(&self, endpoint: &Endpoint) -> Result<TransportLink, TransportError>;
}
