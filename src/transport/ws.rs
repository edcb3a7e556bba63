use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use super::{EVENT_BUFFER, Transport, TransportError, TransportEvent, TransportLink, TransportSink};
use crate::config::Endpoint;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// STOMP over WebSocket (`ws://` or `wss://`).
///
/// Frames are written as text messages. Inbound text and binary messages
/// are forwarded as-is; ping/pong is handled by tungstenite.
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, endpoint: &Endpoint) -> Result<TransportLink, TransportError> {
        let mut request = endpoint
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        for (key, value) in &endpoint.headers {
            match (
                key.parse::<HeaderName>(),
                value.parse::<HeaderValue>(),
            ) {
                (Ok(name), Ok(value)) => {
                    request.headers_mut().insert(name, value);
                }
                _ => warn!(header = %key, "skipping invalid handshake header"),
            }
        }

        let (stream, _response) = connect_async(request)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        info!(url = %endpoint.url, "websocket connected");

        let (sink, stream) = stream.split();
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(read_loop(stream, tx));

        Ok(TransportLink::new(Box::new(WsSink { sink }), rx))
    }
}

async fn read_loop(mut stream: SplitStream<WsStream>, tx: mpsc::Sender<TransportEvent>) {
    let closed = loop {
        let event = match stream.next().await {
            Some(Ok(Message::Text(text))) => TransportEvent::Text(text),
            Some(Ok(Message::Binary(data))) => TransportEvent::Binary(data),
            Some(Ok(Message::Close(frame))) => {
                debug!(?frame, "websocket close received");
                break None;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => break Some(TransportError::Io(e.to_string())),
            None => break None,
        };
        if tx.send(event).await.is_err() {
            // Receiver dropped: the engine already tore this link down.
            return;
        }
    };
    let _ = tx.send(TransportEvent::Closed(closed)).await;
}

struct WsSink {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl TransportSink for WsSink {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.sink.close().await {
            Ok(()) => Ok(()),
            Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)
            | Err(tokio_tungstenite::tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(TransportError::Io(e.to_string())),
        }
    }
}
