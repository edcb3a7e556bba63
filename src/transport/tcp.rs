use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::info;

use super::{EVENT_BUFFER, Transport, TransportError, TransportEvent, TransportLink, TransportSink};
use crate::codec::StompCodec;
use crate::config::Endpoint;

type FramedStream = Framed<TcpStream, StompCodec>;

/// Plain STOMP over TCP.
///
/// The endpoint URL is `host:port`, optionally prefixed with `tcp://`.
/// Handshake headers do not apply and are ignored.
#[derive(Debug, Clone, Default)]
pub struct TcpTransport;

impl TcpTransport {
    pub fn new() -> Self {
        Self
    }
}

fn socket_addr(url: &str) -> &str {
    url.strip_prefix("tcp://").unwrap_or(url)
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&self, endpoint: &Endpoint) -> Result<TransportLink, TransportError> {
        let addr = socket_addr(&endpoint.url);
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        info!(addr, "tcp connected");

        let (sink, stream) = Framed::new(stream, StompCodec::new()).split();
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(read_loop(stream, tx));

        Ok(TransportLink::new(Box::new(TcpSink { sink }), rx))
    }
}

async fn read_loop(mut stream: SplitStream<FramedStream>, tx: mpsc::Sender<TransportEvent>) {
    let closed = loop {
        match stream.next().await {
            Some(Ok(text)) => {
                if tx.send(TransportEvent::Text(text)).await.is_err() {
                    return;
                }
            }
            Some(Err(e)) => break Some(TransportError::Io(e.to_string())),
            None => break None,
        }
    };
    let _ = tx.send(TransportEvent::Closed(closed)).await;
}

struct TcpSink {
    sink: SplitSink<FramedStream, String>,
}

#[async_trait]
impl TransportSink for TcpSink {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.sink
            .send(text)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.sink
            .close()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn strips_scheme() {
        assert_eq!(socket_addr("tcp://127.0.0.1:61613"), "127.0.0.1:61613");
        assert_eq!(socket_addr("localhost:61613"), "localhost:61613");
    }

    #[tokio::test]
    async fn frames_round_trip_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 64];
            let n = socket.read(&mut buf).await.unwrap();
            let received = String::from_utf8(buf[..n].to_vec()).unwrap();
            socket
                .write_all(b"\nCONNECTED\nversion:1.2\n\n\0")
                .await
                .unwrap();
            received
        });

        let mut link = TcpTransport::new()
            .connect(&Endpoint::new(format!("tcp://{}", addr)))
            .await
            .expect("connect");
        link.sink.send("CONNECT\n\n\0".to_string()).await.unwrap();

        assert_eq!(
            link.events.recv().await,
            Some(TransportEvent::Text("\n".to_string()))
        );
        assert_eq!(
            link.events.recv().await,
            Some(TransportEvent::Text("CONNECTED\nversion:1.2\n\n\0".to_string()))
        );
        assert_eq!(server.await.unwrap(), "CONNECT\n\n\0");
        assert_eq!(link.events.recv().await, Some(TransportEvent::Closed(None)));
    }
}
