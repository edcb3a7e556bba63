/// Session notifications delivered on the [`Events`](crate::Events) stream.
///
/// Events are emitted in frame-arrival order. `MESSAGE` frames are not
/// surfaced here: they go to the handler registered for their destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StompEvent {
    /// The transport opened and `CONNECT` was written.
    SocketOpened,
    /// The broker answered `CONNECTED`.
    Connected { session_id: Option<String> },
    /// The transport closed, by us or by the peer.
    Disconnected,
    /// A reconnect attempt is starting (1-indexed since the last session).
    Reconnecting { attempt: usize },
    /// The broker acknowledged a frame sent with a `receipt` header.
    Receipt(String),
    /// Broker `ERROR` frame or transport failure.
    Error {
        message: String,
        detail: Option<String>,
    },
    /// Heartbeat received from the broker (already echoed).
    Ping,
    /// A typed subscription dropped a message whose body did not decode.
    DecodeError { destination: String, error: String },
}

impl StompEvent {
    pub(crate) fn error(message: impl Into<String>, detail: Option<String>) -> Self {
        StompEvent::Error {
            message: message.into(),
            detail,
        }
    }
}
