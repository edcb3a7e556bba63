//! Async STOMP client engine.
//!
//! A [`StompClient`] speaks STOMP 1.1/1.2 over any [`Transport`]: a
//! WebSocket ([`WebSocketTransport`]) or plain TCP ([`TcpTransport`]) out of
//! the box. One background task owns the session, the subscriptions and the
//! reconnect logic; handles are cheap clones that queue commands to it.
//!
//! ```no_run
//! use stomp_socket::{AckMode, ClientConfig, ConnectOptions, StompClient, StompEvent, WebSocketTransport};
//!
//! # async fn run() -> Result<(), stomp_socket::StompError> {
//! let config = ClientConfig::new("ws://localhost:15674/ws")
//!     .connect_options(ConnectOptions::new().login("guest").passcode("guest"));
//! let (client, mut events) = StompClient::new(WebSocketTransport::new(), config);
//! client.connect().await?;
//!
//! while let Some(event) = events.next().await {
//!     if let StompEvent::Connected { .. } = event {
//!         client
//!             .subscribe("/topic/news", AckMode::Auto, |body, _headers| println!("{}", body))
//!             .await?;
//!         client.send("/topic/news", "hello").await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod config;
mod connection;
mod dispatch;
pub mod error;
pub mod event;
pub mod frame;
pub mod parser;
pub mod reconnect;
pub mod session;
pub mod subscription;
pub mod transport;

pub use client::{Events, JSON_CONTENT_TYPE, StompClient};
pub use codec::{StompCodec, decode_frame, encode_frame};
pub use config::{ClientConfig, ConnectOptions, Endpoint};
pub use error::StompError;
pub use event::StompEvent;
pub use frame::{Frame, Headers};
pub use reconnect::{ExponentialBackoff, FixedInterval, NeverReconnect, ReconnectPolicy};
pub use session::{SessionStatus, negotiate_heartbeats, parse_heartbeat_header};
pub use subscription::{AckMode, DecodeError, SubscriptionOptions, subscription_id_for};
pub use transport::{
    TcpTransport, Transport, TransportError, TransportEvent, TransportLink, TransportSink,
    WebSocketTransport,
};
