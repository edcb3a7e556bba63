use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::frame::{Frame, Headers, command};

/// Lifecycle of the STOMP session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    /// No transport; initial and terminal state.
    Disconnected,
    /// Transport open, `CONNECT` sent, waiting for `CONNECTED`.
    SocketOpen,
    /// Broker accepted the session.
    Connected,
    /// Connected with at least one live subscription.
    Subscribed,
}

impl SessionStatus {
    /// True once the broker has answered `CONNECTED`.
    pub fn is_connected(&self) -> bool {
        matches!(self, SessionStatus::Connected | SessionStatus::Subscribed)
    }
}

/// What the connection must do in response to an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Connected {
        session_id: Option<String>,
        outgoing_heartbeat: Option<Duration>,
        incoming_heartbeat: Option<Duration>,
    },
    Message(Frame),
    Receipt(String),
    Error {
        message: String,
        detail: Option<String>,
    },
    Ping,
    Ignored,
}

/// Parse the STOMP `heart-beat` header value (format: "cx,cy").
///
/// Parameters
/// - `header`: header string from the server or client (for example
///   "10000,10000"). The values represent milliseconds.
///
/// Returns a tuple `(cx, cy)` where each value is the heartbeat interval in
/// milliseconds. Missing or invalid fields default to `0`.
pub fn parse_heartbeat_header(header: &str) -> (u64, u64) {
    let mut parts = header.split(',');
    let cx = parts
        .next()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(0);
    let cy = parts
        .next()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(0);
    (cx, cy)
}

/// Negotiate heartbeat intervals between client and server.
///
/// Parameters
/// - `client_out`: how often the client can send heartbeats (ms).
/// - `client_in`: how often the client wants to receive heartbeats (ms).
/// - `server_out`: the server's advertised outgoing interval (ms).
/// - `server_in`: the server's advertised incoming interval (ms).
///
/// Returns `(outgoing, incoming)` where each element is `Some(Duration)` if
/// heartbeats are enabled in that direction, or `None` if disabled. A
/// direction is enabled only when both sides ask for it; the negotiated
/// interval is the maximum of the two values.
pub fn negotiate_heartbeats(
    client_out: u64,
    client_in: u64,
    server_out: u64,
    server_in: u64,
) -> (Option<Duration>, Option<Duration>) {
    let negotiate = |ours: u64, theirs: u64| {
        if ours == 0 || theirs == 0 {
            None
        } else {
            Some(Duration::from_millis(ours.max(theirs)))
        }
    };
    (
        negotiate(client_out, server_in),
        negotiate(client_in, server_out),
    )
}

/// Session state machine.
///
/// Holds the status, the broker-assigned session id and the connection
/// headers sent with every `CONNECT`. It performs no I/O: the connection
/// task feeds it transport events and decoded frames and acts on what it
/// returns.
#[derive(Debug, Clone)]
pub struct Session {
    status: SessionStatus,
    session_id: Option<String>,
    connection_headers: Headers,
}

impl Session {
    pub fn new(connection_headers: Headers) -> Self {
        Self {
            status: SessionStatus::Disconnected,
            session_id: None,
            connection_headers,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn connection_headers(&self) -> &Headers {
        &self.connection_headers
    }

    /// True while a transport is open, negotiated or not.
    pub fn is_active(&self) -> bool {
        self.status != SessionStatus::Disconnected
    }

    /// The transport opened: move to `SocketOpen` and return the `CONNECT`
    /// frame to write.
    pub fn on_transport_open(&mut self) -> Frame {
        self.status = SessionStatus::SocketOpen;
        self.session_id = None;
        Frame::new(command::CONNECT).headers(self.connection_headers.iter().cloned())
    }

    /// Classify a decoded frame, updating the status on `CONNECTED`.
    pub fn on_frame(&mut self, frame: Frame) -> Inbound {
        if frame.is_heartbeat() {
            return Inbound::Ping;
        }
        match frame.command.as_str() {
            command::CONNECTED => {
                if let Some(id) = frame.get_header("session") {
                    self.session_id = Some(id.to_string());
                }
                self.status = SessionStatus::Connected;

                let (cx, cy) = self
                    .connection_headers
                    .get("heart-beat")
                    .map(parse_heartbeat_header)
                    .unwrap_or((0, 0));
                let (sx, sy) = frame
                    .get_header("heart-beat")
                    .map(parse_heartbeat_header)
                    .unwrap_or((0, 0));
                let (outgoing, incoming) = negotiate_heartbeats(cx, cy, sx, sy);

                Inbound::Connected {
                    session_id: self.session_id.clone(),
                    outgoing_heartbeat: outgoing,
                    incoming_heartbeat: incoming,
                }
            }
            command::MESSAGE => Inbound::Message(frame),
            command::RECEIPT => match frame.get_header("receipt-id") {
                Some(id) => Inbound::Receipt(id.to_string()),
                None => {
                    debug!("RECEIPT without receipt-id");
                    Inbound::Ignored
                }
            },
            command::ERROR => {
                let message = frame
                    .get_header("message")
                    .unwrap_or("unknown error")
                    .to_string();
                let detail = if frame.body.is_empty() {
                    None
                } else {
                    Some(frame.body)
                };
                Inbound::Error { message, detail }
            }
            other => {
                debug!(command = other, "ignoring unexpected frame");
                Inbound::Ignored
            }
        }
    }

    /// Track whether any subscription is live. Only meaningful once
    /// connected; `SocketOpen` and `Disconnected` are left alone.
    pub fn set_subscribed(&mut self, subscribed: bool) {
        self.status = match (self.status, subscribed) {
            (SessionStatus::Connected, true) => SessionStatus::Subscribed,
            (SessionStatus::Subscribed, false) => SessionStatus::Connected,
            (status, _) => status,
        };
    }

    /// `DISCONNECT` frame to send before closing, if a session is active.
    pub fn disconnect_frame(&self) -> Option<Frame> {
        if !self.is_active() {
            return None;
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Some(Frame::new(command::DISCONNECT).header("disconnected", now.to_string()))
    }

    /// The transport went away or was closed by us.
    pub fn reset(&mut self) {
        self.status = SessionStatus::Disconnected;
        self.session_id = None;
    }
}
