//! Common test utilities for client integration tests.
//!
//! `MockTransport` is an in-memory transport. Every successful `connect`
//! hands a `MockConnection` to the test through `MockBroker`, which plays
//! the broker side: it reads what the client wrote and injects inbound
//! traffic. Connect attempts can be scripted to fail.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stomp_socket::{
    ClientConfig, Endpoint, Events, Frame, StompClient, StompEvent, Transport, TransportError,
    TransportEvent, TransportLink, TransportSink, decode_frame, encode_frame,
};
use tokio::sync::mpsc;
use tokio::time::timeout;

pub const WAIT: Duration = Duration::from_secs(2);

#[derive(Default)]
struct Script {
    failures_remaining: usize,
    attempts: usize,
    urls: Vec<String>,
}

pub struct MockTransport {
    script: Arc<Mutex<Script>>,
    connections: mpsc::UnboundedSender<MockConnection>,
}

/// Test-side view of a `MockTransport`.
pub struct MockBroker {
    script: Arc<Mutex<Script>>,
    connections: mpsc::UnboundedReceiver<MockConnection>,
}

pub fn mock_transport() -> (MockTransport, MockBroker) {
    let script = Arc::new(Mutex::new(Script::default()));
    let (tx, rx) = mpsc::unbounded_channel();
    (
        MockTransport {
            script: script.clone(),
            connections: tx,
        },
        MockBroker {
            script,
            connections: rx,
        },
    )
}

/// Build a client over a fresh mock transport.
pub fn client(config: ClientConfig) -> (StompClient, Events, MockBroker) {
    let (transport, broker) = mock_transport();
    let (client, events) = StompClient::new(transport, config);
    (client, events, broker)
}

/// Config with fast retries and the given CONNECT headers.
pub fn config() -> ClientConfig {
    ClientConfig::new("ws://broker.test/ws")
        .connection_headers(stomp_socket::Headers::from(vec![
            ("accept-version".to_string(), "1.2".to_string()),
            ("login".to_string(), "guest".to_string()),
        ]))
        .reconnect_interval(Duration::from_millis(20))
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, endpoint: &Endpoint) -> Result<TransportLink, TransportError> {
        let fail = {
            let mut script = self.script.lock().unwrap();
            script.attempts += 1;
            script.urls.push(endpoint.url.clone());
            if script.failures_remaining > 0 {
                script.failures_remaining -= 1;
                true
            } else {
                false
            }
        };
        if fail {
            return Err(TransportError::Connect("connection refused".into()));
        }

        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::channel(64);
        let closed = Arc::new(AtomicBool::new(false));
        let _ = self.connections.send(MockConnection {
            sent: sent_rx,
            events: events_tx,
            closed: closed.clone(),
        });
        Ok(TransportLink::new(
            Box::new(MockSink {
                sent: sent_tx,
                closed,
            }),
            events_rx,
        ))
    }
}

struct MockSink {
    sent: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl TransportSink for MockSink {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.sent.send(text).map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl MockBroker {
    /// Make the next `n` connect attempts fail.
    pub fn fail_next(&self, n: usize) {
        self.script.lock().unwrap().failures_remaining = n;
    }

    pub fn attempts(&self) -> usize {
        self.script.lock().unwrap().attempts
    }

    pub fn urls(&self) -> Vec<String> {
        self.script.lock().unwrap().urls.clone()
    }

    /// Wait for the client to open a transport.
    pub async fn next_connection(&mut self) -> MockConnection {
        timeout(WAIT, self.connections.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("transport dropped")
    }

    /// True if no connection is opened within `wait`.
    pub async fn no_connection_within(&mut self, wait: Duration) -> bool {
        timeout(wait, self.connections.recv()).await.is_err()
    }

    /// Open, answer CONNECTED and return the connection and its CONNECT frame.
    pub async fn accept(&mut self) -> (MockConnection, Frame) {
        let mut conn = self.next_connection().await;
        let connect = conn.recv_frame().await;
        assert_eq!(connect.command, "CONNECT");
        conn.send_frame(
            Frame::new("CONNECTED")
                .header("version", "1.2")
                .header("session", "session-1"),
        )
        .await;
        (conn, connect)
    }
}

/// Broker side of one open transport.
pub struct MockConnection {
    sent: mpsc::UnboundedReceiver<String>,
    events: mpsc::Sender<TransportEvent>,
    closed: Arc<AtomicBool>,
}

impl MockConnection {
    /// Next raw text written by the client.
    pub async fn recv_text(&mut self) -> String {
        timeout(WAIT, self.sent.recv())
            .await
            .expect("timed out waiting for client write")
            .expect("client sink dropped")
    }

    /// Next frame written by the client, skipping heartbeats.
    pub async fn recv_frame(&mut self) -> Frame {
        loop {
            let text = self.recv_text().await;
            if text == "\n" {
                continue;
            }
            return decode_frame(&text).expect("client wrote an empty frame");
        }
    }

    /// Whatever the client has written so far, without waiting.
    pub fn drain(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(text) = self.sent.try_recv() {
            out.push(text);
        }
        out
    }

    pub async fn send_text(&self, text: impl Into<String>) {
        let _ = self.events.send(TransportEvent::Text(text.into())).await;
    }

    pub async fn send_binary(&self, data: Vec<u8>) {
        let _ = self.events.send(TransportEvent::Binary(data)).await;
    }

    pub async fn send_frame(&self, frame: Frame) {
        self.send_text(encode_frame(&frame)).await;
    }

    pub async fn send_message(&self, destination: &str, message_id: &str, body: &str) {
        self.send_frame(
            Frame::new("MESSAGE")
                .header("destination", destination)
                .header("message-id", message_id)
                .header("subscription", format!("sub-{}", destination))
                .set_body(body),
        )
        .await;
    }

    /// Drop the connection from the broker side.
    pub async fn close(&self, error: Option<TransportError>) {
        let _ = self.events.send(TransportEvent::Closed(error)).await;
    }

    /// True once the client closed its sink.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Next event, failing the test after `WAIT`.
pub async fn next_event(events: &mut Events) -> StompEvent {
    timeout(WAIT, events.next())
        .await
        .expect("timed out waiting for an event")
        .expect("event stream closed")
}

/// Skip events until one matches.
pub async fn wait_for<F>(events: &mut Events, mut matches: F) -> StompEvent
where
    F: FnMut(&StompEvent) -> bool,
{
    loop {
        let event = next_event(events).await;
        if matches(&event) {
            return event;
        }
    }
}

/// Connect, accept and drain the two handshake events.
pub async fn connected(config: ClientConfig) -> (StompClient, Events, MockBroker, MockConnection) {
    let (client, mut events, mut broker) = client(config);
    client.connect().await.expect("connect");
    let (conn, _) = broker.accept().await;
    assert_eq!(next_event(&mut events).await, StompEvent::SocketOpened);
    assert!(matches!(
        next_event(&mut events).await,
        StompEvent::Connected { .. }
    ));
    (client, events, broker, conn)
}

/// Channel-backed recorder for handler invocations.
pub fn recorder() -> (
    impl Fn(&str, &stomp_socket::Headers) + Send + Sync + 'static,
    mpsc::UnboundedReceiver<String>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler = move |body: &str, _headers: &stomp_socket::Headers| {
        let _ = tx.send(body.to_string());
    };
    (handler, rx)
}

pub async fn recv_delivery(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for delivery")
        .expect("handler dropped")
}
