use futures::Stream;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::connection::{Command, Connection};
use crate::dispatch::spawn_dispatcher;
use crate::error::StompError;
use crate::event::StompEvent;
use crate::frame::{Frame, Headers, command};
use crate::session::SessionStatus;
use crate::subscription::{
    AckMode, Subscription, SubscriptionOptions, raw_handler, typed_handler,
};
use crate::transport::Transport;

/// Content type used by [`StompClient::send_json`].
pub const JSON_CONTENT_TYPE: &str = "application/json;charset=UTF-8";

/// Handle to a STOMP session.
///
/// Cheap to clone; every clone talks to the same connection task. All
/// operations are fire-and-forget: they queue a command and return once it
/// is accepted. The only error besides misuse is [`StompError::Closed`].
/// Frames issued while no transport is open are dropped with a warning.
#[derive(Clone)]
pub struct StompClient {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<SessionStatus>,
}

impl fmt::Debug for StompClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StompClient")
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

/// Stream of [`StompEvent`]s for one client.
#[derive(Debug)]
pub struct Events {
    rx: mpsc::UnboundedReceiver<StompEvent>,
}

impl Events {
    /// Next event, or `None` once the client is shut down.
    pub async fn next(&mut self) -> Option<StompEvent> {
        self.rx.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_next(&mut self) -> Option<StompEvent> {
        self.rx.try_recv().ok()
    }
}

impl Stream for Events {
    type Item = StompEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl StompClient {
    /// Create a client and spawn its connection task.
    ///
    /// Nothing is opened until [`connect`](Self::connect) is called. Must be
    /// called from within a Tokio runtime.
    pub fn new<T: Transport>(transport: T, config: ClientConfig) -> (Self, Events) {
        Self::with_transport(Arc::new(transport), config)
    }

    pub fn with_transport(transport: Arc<dyn Transport>, config: ClientConfig) -> (Self, Events) {
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer.max(1));
        let (status_tx, status_rx) = watch::channel(SessionStatus::Disconnected);
        let (delivery_tx, delivery_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        spawn_dispatcher(delivery_rx, events_tx, config.dispatch_handle.clone());
        let connection = Connection::new(transport, config, status_tx, delivery_tx);
        tokio::spawn(connection.run(cmd_rx));

        (
            StompClient {
                commands: cmd_tx,
                status: status_rx,
            },
            Events { rx: events_rx },
        )
    }

    async fn command(&self, cmd: Command) -> Result<(), StompError> {
        self.commands.send(cmd).await.map_err(|_| StompError::Closed)
    }

    /// Open the transport and start the session.
    ///
    /// Progress is reported on the event stream (`SocketOpened`, then
    /// `Connected`). A failed open is retried by the reconnect policy.
    pub async fn connect(&self) -> Result<(), StompError> {
        self.command(Command::Connect).await
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// A receiver that observes every status change.
    pub fn status_watch(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Subscribe with a raw `(body, headers)` handler.
    ///
    /// Subscribing again to the same destination replaces the handler.
    pub async fn subscribe<F>(
        &self,
        destination: &str,
        ack: AckMode,
        handler: F,
    ) -> Result<(), StompError>
    where
        F: Fn(&str, &Headers) + Send + Sync + 'static,
    {
        self.subscribe_with_options(destination, SubscriptionOptions::new().ack(ack), handler)
            .await
    }

    pub async fn subscribe_with_options<F>(
        &self,
        destination: &str,
        options: SubscriptionOptions,
        handler: F,
    ) -> Result<(), StompError>
    where
        F: Fn(&str, &Headers) + Send + Sync + 'static,
    {
        let sub = Subscription::new(destination, options, raw_handler(handler))?;
        self.command(Command::Subscribe(sub)).await
    }

    /// Subscribe with a raw header map: `ack` and `id` are honoured, the
    /// rest is forwarded on `SUBSCRIBE`.
    pub async fn subscribe_with_headers<F>(
        &self,
        destination: &str,
        headers: Headers,
        handler: F,
    ) -> Result<(), StompError>
    where
        F: Fn(&str, &Headers) + Send + Sync + 'static,
    {
        self.subscribe_with_options(destination, SubscriptionOptions::from_headers(headers), handler)
            .await
    }

    /// Subscribe with a decoder. Bodies that fail to decode are dropped and
    /// reported as `StompEvent::DecodeError`.
    pub async fn subscribe_typed<T, E, D, F>(
        &self,
        destination: &str,
        options: SubscriptionOptions,
        decode: D,
        handler: F,
    ) -> Result<(), StompError>
    where
        T: 'static,
        E: fmt::Display + 'static,
        D: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
        F: Fn(T, &Headers) + Send + Sync + 'static,
    {
        let sub = Subscription::new(destination, options, typed_handler(decode, handler))?;
        self.command(Command::Subscribe(sub)).await
    }

    /// [`subscribe_typed`](Self::subscribe_typed) with a JSON body.
    pub async fn subscribe_json<T, F>(
        &self,
        destination: &str,
        ack: AckMode,
        handler: F,
    ) -> Result<(), StompError>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T, &Headers) + Send + Sync + 'static,
    {
        self.subscribe_typed(
            destination,
            SubscriptionOptions::new().ack(ack),
            |body: &str| serde_json::from_str::<T>(body),
            handler,
        )
        .await
    }

    /// Remove the subscription for `destination` and send `UNSUBSCRIBE`.
    /// Unknown destinations are ignored.
    pub async fn unsubscribe(&self, destination: &str) -> Result<(), StompError> {
        self.command(Command::Unsubscribe(destination.to_string()))
            .await
    }

    /// Send a text message.
    pub async fn send(&self, destination: &str, body: &str) -> Result<(), StompError> {
        self.send_with_headers(destination, body, Headers::new(), None)
            .await
    }

    /// Send a message with extra headers and an optional receipt id.
    ///
    /// Header order on the wire: caller headers, `receipt`, `destination`,
    /// `content-length`, then `content-type` (`text/plain` unless the
    /// caller set one).
    pub async fn send_with_headers(
        &self,
        destination: &str,
        body: &str,
        headers: Headers,
        receipt: Option<&str>,
    ) -> Result<(), StompError> {
        let mut frame = Frame::new(command::SEND).headers(headers);
        if let Some(receipt) = receipt {
            frame = frame.receipt(receipt);
        }
        frame = frame
            .header("destination", destination)
            .header("content-length", body.len().to_string());
        frame.headers.insert_if_absent("content-type", "text/plain");
        self.send_frame(frame.set_body(body)).await
    }

    /// Serialize `value` as JSON and send it.
    pub async fn send_json<T: Serialize + ?Sized>(
        &self,
        destination: &str,
        value: &T,
    ) -> Result<(), StompError> {
        let body = serde_json::to_string(value)?;
        let headers: Headers = [("content-type", JSON_CONTENT_TYPE)].into_iter().collect();
        self.send_with_headers(destination, &body, headers, None)
            .await
    }

    /// Write an arbitrary frame.
    pub async fn send_frame(&self, frame: Frame) -> Result<(), StompError> {
        self.command(Command::Send(frame)).await
    }

    /// Helper to send a transaction frame (BEGIN, COMMIT, or ABORT).
    async fn send_transaction_frame(
        &self,
        command: &str,
        transaction_id: &str,
    ) -> Result<(), StompError> {
        self.send_frame(Frame::new(command).header("transaction", transaction_id))
            .await
    }

    /// Begin a transaction.
    ///
    /// Subsequent `SEND` and `ACK` frames carrying a `transaction` header
    /// with the same id are grouped into it until `commit` or `abort`.
    pub async fn begin(&self, transaction_id: &str) -> Result<(), StompError> {
        self.send_transaction_frame(command::BEGIN, transaction_id)
            .await
    }

    pub async fn commit(&self, transaction_id: &str) -> Result<(), StompError> {
        self.send_transaction_frame(command::COMMIT, transaction_id)
            .await
    }

    pub async fn abort(&self, transaction_id: &str) -> Result<(), StompError> {
        self.send_transaction_frame(command::ABORT, transaction_id)
            .await
    }

    /// Acknowledge a message received on a `client` or `client-individual`
    /// subscription.
    pub async fn ack(
        &self,
        message_id: &str,
        subscription: Option<&str>,
    ) -> Result<(), StompError> {
        let mut frame = Frame::new(command::ACK).header("message-id", message_id);
        if let Some(subscription) = subscription {
            frame = frame.header("subscription", subscription);
        }
        self.send_frame(frame).await
    }

    /// Close the session: `DISCONNECT` if a session is active, close the
    /// transport, clear subscriptions and cancel any pending reconnect.
    ///
    /// Returns once the connection task has done all of that. Calling it
    /// again is a no-op.
    pub async fn disconnect(&self) -> Result<(), StompError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.command(Command::Disconnect {
            done: Some(done_tx),
        })
        .await?;
        done_rx.await.map_err(|_| StompError::Closed)
    }

    /// Disconnect after `delay`.
    pub fn disconnect_after(&self, delay: Duration) -> JoinHandle<()> {
        let commands = self.commands.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = commands.send(Command::Disconnect { done: None }).await;
        })
    }
}
