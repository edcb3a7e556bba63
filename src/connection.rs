use futures::future::{self, BoxFuture};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::codec::{HEARTBEAT, decode_frame, encode_frame};
use crate::config::{ClientConfig, Endpoint};
use crate::dispatch::Delivery;
use crate::event::StompEvent;
use crate::frame::Frame;
use crate::reconnect::ReconnectSupervisor;
use crate::session::{Inbound, Session, SessionStatus};
use crate::subscription::{Subscription, SubscriptionRegistry};
use crate::transport::{Transport, TransportError, TransportEvent, TransportLink};

/// Requests from `StompClient` handles to the connection task.
#[derive(Debug)]
pub(crate) enum Command {
    Connect,
    Send(Frame),
    Subscribe(Subscription),
    Unsubscribe(String),
    Disconnect { done: Option<oneshot::Sender<()>> },
}

type ConnectFuture = BoxFuture<'static, Result<TransportLink, TransportError>>;

/// Negotiated heartbeat timers for the current session.
#[derive(Debug)]
struct Heartbeat {
    outgoing: Option<Duration>,
    incoming: Option<Duration>,
    last_sent: Instant,
    last_received: Instant,
}

impl Heartbeat {
    fn disabled() -> Self {
        let now = Instant::now();
        Self {
            outgoing: None,
            incoming: None,
            last_sent: now,
            last_received: now,
        }
    }

    fn start(&mut self, outgoing: Option<Duration>, incoming: Option<Duration>) {
        *self = Self {
            outgoing,
            incoming,
            ..Self::disabled()
        };
    }

    fn stop(&mut self) {
        *self = Self::disabled();
    }

    /// When a keep-alive must be written if nothing else was.
    fn send_deadline(&self) -> Option<Instant> {
        self.outgoing.map(|d| self.last_sent + d)
    }

    /// When the broker is considered gone if it stays silent.
    fn watchdog_deadline(&self) -> Option<Instant> {
        self.incoming.map(|d| self.last_received + d * 2)
    }
}

/// The connection task.
///
/// Sole owner of the session, the subscription registry, the reconnect
/// supervisor, the heartbeat timers and the open transport. Every mutation
/// and every outbound write happens here, one command or event at a time.
pub(crate) struct Connection {
    transport: Arc<dyn Transport>,
    endpoint: Endpoint,
    session: Session,
    registry: SubscriptionRegistry,
    supervisor: ReconnectSupervisor,
    heartbeat: Heartbeat,
    link: Option<TransportLink>,
    connecting: Option<ConnectFuture>,
    handshake_timeout: Duration,
    /// Set while waiting for `CONNECTED` on a freshly opened transport.
    handshake_deadline: Option<Instant>,
    /// Set by `connect()`, cleared by `disconnect()`; reconnects only happen
    /// while it is set.
    wants_connection: bool,
    status: watch::Sender<SessionStatus>,
    deliveries: mpsc::UnboundedSender<Delivery>,
}

impl Connection {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        config: ClientConfig,
        status: watch::Sender<SessionStatus>,
        deliveries: mpsc::UnboundedSender<Delivery>,
    ) -> Self {
        Self {
            transport,
            endpoint: config.endpoint,
            session: Session::new(config.connection_headers),
            registry: SubscriptionRegistry::new(),
            supervisor: ReconnectSupervisor::new(config.reconnect_policy),
            heartbeat: Heartbeat::disabled(),
            link: None,
            connecting: None,
            handshake_timeout: config.handshake_timeout,
            handshake_deadline: None,
            wants_connection: false,
            status,
            deliveries,
        }
    }

    /// Run until every client handle is dropped.
    pub(crate) async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            let reconnect_at = self.supervisor.deadline();
            let heartbeat_at = self.heartbeat.send_deadline();
            let watchdog_at = self.heartbeat.watchdog_deadline();
            let handshake_at = self.handshake_deadline;

            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                result = poll_connect(&mut self.connecting) => {
                    self.connecting = None;
                    self.on_connect_result(result).await;
                }
                event = next_event(&mut self.link) => {
                    self.on_transport_event(event).await;
                }
                _ = sleep_until_opt(reconnect_at) => self.start_reconnect(),
                _ = sleep_until_opt(heartbeat_at) => {
                    self.write_text(HEARTBEAT.to_string()).await;
                }
                _ = sleep_until_opt(watchdog_at) => self.on_watchdog().await,
                _ = sleep_until_opt(handshake_at) => self.on_handshake_timeout().await,
            }
        }

        debug!("all client handles dropped; shutting down");
        self.disconnect().await;
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect => self.connect(),
            Command::Send(frame) => self.write_frame(frame).await,
            Command::Subscribe(sub) => self.subscribe(sub).await,
            Command::Unsubscribe(destination) => self.unsubscribe(&destination).await,
            Command::Disconnect { done } => {
                self.disconnect().await;
                if let Some(done) = done {
                    let _ = done.send(());
                }
            }
        }
    }

    fn connect(&mut self) {
        self.wants_connection = true;
        if self.link.is_some() || self.connecting.is_some() {
            debug!("connect requested while already connected or connecting");
            return;
        }
        info!(url = %self.endpoint.url, "connecting");
        self.supervisor.reset();
        self.start_connect();
    }

    fn start_connect(&mut self) {
        let transport = self.transport.clone();
        let endpoint = self.endpoint.clone();
        self.connecting = Some(Box::pin(async move { transport.connect(&endpoint).await }));
    }

    fn start_reconnect(&mut self) {
        if self.link.is_some() || self.connecting.is_some() {
            debug!("reconnect suppressed: attempt in flight or transport open");
            self.supervisor.opened();
            return;
        }
        if let Some(attempt) = self.supervisor.begin_attempt() {
            info!(attempt, url = %self.endpoint.url, "reconnecting");
            self.emit(StompEvent::Reconnecting { attempt });
            self.start_connect();
        }
    }

    async fn on_connect_result(&mut self, result: Result<TransportLink, TransportError>) {
        match result {
            Ok(mut link) => {
                if !self.wants_connection {
                    let _ = link.sink.close().await;
                    return;
                }
                self.supervisor.opened();
                self.link = Some(link);
                let connect = self.session.on_transport_open();
                self.handshake_deadline = Some(Instant::now() + self.handshake_timeout);
                self.publish_status();
                self.emit(StompEvent::SocketOpened);
                self.write_frame(connect).await;
            }
            Err(e) => {
                warn!(error = %e, url = %self.endpoint.url, "transport failed to open");
                self.emit(StompEvent::error(e.to_string(), None));
                self.schedule_reconnect();
            }
        }
    }

    fn schedule_reconnect(&mut self) {
        if !self.wants_connection {
            return;
        }
        if !self.supervisor.schedule() {
            warn!(
                attempts = self.supervisor.attempt(),
                "reconnect policy exhausted; giving up"
            );
            self.wants_connection = false;
        }
    }

    async fn on_transport_event(&mut self, event: Option<TransportEvent>) {
        self.heartbeat.last_received = Instant::now();
        match event {
            Some(TransportEvent::Text(text)) => self.on_text(&text).await,
            Some(TransportEvent::Binary(data)) => match String::from_utf8(data) {
                Ok(text) => self.on_text(&text).await,
                Err(e) => warn!(error = %e, "dropping non-utf8 binary message"),
            },
            Some(TransportEvent::Closed(error)) => self.on_transport_closed(error),
            None => self.on_transport_closed(None),
        }
    }

    async fn on_text(&mut self, text: &str) {
        let Some(frame) = decode_frame(text) else {
            return;
        };
        debug!(command = %frame.command, "frame received");

        match self.session.on_frame(frame) {
            Inbound::Connected {
                session_id,
                outgoing_heartbeat,
                incoming_heartbeat,
            } => {
                info!(session = ?session_id, "stomp session established");
                debug!(
                    ?outgoing_heartbeat,
                    ?incoming_heartbeat,
                    "heartbeats negotiated"
                );
                self.supervisor.reset();
                self.handshake_deadline = None;
                self.heartbeat.start(outgoing_heartbeat, incoming_heartbeat);
                self.session.set_subscribed(!self.registry.is_empty());
                self.publish_status();
                self.emit(StompEvent::Connected { session_id });

                // Subscriptions made before CONNECTED have not been sent yet.
                let pending: Vec<Frame> = self
                    .registry
                    .iter()
                    .map(|sub| sub.subscribe_frame())
                    .collect();
                for frame in pending {
                    self.write_frame(frame).await;
                }
            }
            Inbound::Message(frame) => match self.registry.route(&frame) {
                Some(sub) => {
                    let delivery = Delivery::Message {
                        destination: sub.destination().to_string(),
                        handler: sub.handler().clone(),
                        frame,
                    };
                    let _ = self.deliveries.send(delivery);
                }
                None => debug!(
                    destination = frame.get_header("destination").unwrap_or_default(),
                    "no subscription for message"
                ),
            },
            Inbound::Receipt(id) => self.emit(StompEvent::Receipt(id)),
            Inbound::Error { message, detail } => {
                warn!(%message, "broker sent ERROR");
                self.emit(StompEvent::Error { message, detail });
            }
            Inbound::Ping => {
                self.write_text(HEARTBEAT.to_string()).await;
                self.emit(StompEvent::Ping);
            }
            Inbound::Ignored => {}
        }
    }

    async fn subscribe(&mut self, sub: Subscription) {
        let frame = sub.subscribe_frame();
        if self.registry.insert(sub).is_some() {
            debug!(id = frame.get_header("id"), "replacing subscription handler");
        }
        if !self.session.status().is_connected() {
            debug!(
                id = frame.get_header("id"),
                "no session yet; SUBSCRIBE deferred until CONNECTED"
            );
            return;
        }
        self.session.set_subscribed(true);
        self.publish_status();
        self.write_frame(frame).await;
    }

    async fn unsubscribe(&mut self, destination: &str) {
        match self.registry.remove(destination) {
            Some(sub) if self.session.status().is_connected() => {
                self.session.set_subscribed(!self.registry.is_empty());
                self.publish_status();
                self.write_frame(sub.unsubscribe_frame()).await;
            }
            // Never sent to the broker; dropping it locally is enough.
            Some(_) => debug!(destination, "dropped deferred subscription"),
            None => debug!(destination, "unsubscribe for unknown destination"),
        }
    }

    async fn write_frame(&mut self, frame: Frame) {
        if self.link.is_none() {
            warn!(command = %frame.command, "no open transport; dropping frame");
            return;
        }
        debug!(command = %frame.command, "sending frame");
        self.write_text(encode_frame(&frame)).await;
    }

    async fn write_text(&mut self, text: String) {
        let Some(link) = self.link.as_mut() else {
            return;
        };
        match link.sink.send(text).await {
            Ok(()) => self.heartbeat.last_sent = Instant::now(),
            Err(e) => {
                warn!(error = %e, "transport write failed");
                self.close_link().await;
                self.on_transport_closed(Some(e));
            }
        }
    }

    async fn on_watchdog(&mut self) {
        warn!(
            interval = ?self.heartbeat.incoming,
            "no traffic from broker within twice the heartbeat interval"
        );
        self.close_link().await;
        self.on_transport_closed(Some(TransportError::Io("heartbeat timeout".into())));
    }

    async fn on_handshake_timeout(&mut self) {
        warn!(
            timeout = ?self.handshake_timeout,
            "broker did not answer CONNECT"
        );
        self.close_link().await;
        self.on_transport_closed(Some(TransportError::Io("handshake timeout".into())));
    }

    async fn close_link(&mut self) {
        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.sink.close().await {
                debug!(error = %e, "error closing transport");
            }
        }
    }

    /// The transport went away without `disconnect()`.
    fn on_transport_closed(&mut self, error: Option<TransportError>) {
        match &error {
            Some(e) => warn!(error = %e, "transport closed with error"),
            None => info!("transport closed"),
        }
        self.link = None;
        self.reset_session();
        if let Some(e) = error {
            self.emit(StompEvent::error(e.to_string(), None));
        }
        self.emit(StompEvent::Disconnected);
        self.schedule_reconnect();
    }

    async fn disconnect(&mut self) {
        self.wants_connection = false;
        self.supervisor.cancel();
        if self.connecting.take().is_some() {
            debug!("cancelled in-flight connect attempt");
        }

        if let Some(frame) = self.session.disconnect_frame() {
            self.write_frame(frame).await;
        }
        // A failed DISCONNECT write has already torn down and reported.
        let torn_down = self.link.is_some();
        self.close_link().await;
        self.reset_session();
        if torn_down {
            info!("disconnected");
            self.emit(StompEvent::Disconnected);
        }
    }

    fn reset_session(&mut self) {
        self.session.reset();
        self.registry.clear();
        self.heartbeat.stop();
        self.handshake_deadline = None;
        self.publish_status();
    }

    fn publish_status(&self) {
        let status = self.session.status();
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    fn emit(&self, event: StompEvent) {
        let _ = self.deliveries.send(Delivery::Event(event));
    }
}

async fn poll_connect(
    connecting: &mut Option<ConnectFuture>,
) -> Result<TransportLink, TransportError> {
    match connecting {
        Some(fut) => fut.await,
        None => future::pending().await,
    }
}

async fn next_event(link: &mut Option<TransportLink>) -> Option<TransportEvent> {
    match link {
        Some(link) => link.events.recv().await,
        None => future::pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}
