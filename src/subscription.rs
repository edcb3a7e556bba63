use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::StompError;
use crate::frame::{Frame, Headers, command};

/// Subscription acknowledgement modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckMode {
    #[default]
    Auto,
    Client,
    ClientIndividual,
}

impl AckMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckMode::Auto => "auto",
            AckMode::Client => "client",
            AckMode::ClientIndividual => "client-individual",
        }
    }

    /// Parse an `ack` header value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "auto" => Some(AckMode::Auto),
            "client" => Some(AckMode::Client),
            "client-individual" => Some(AckMode::ClientIndividual),
            _ => None,
        }
    }
}

/// Subscription id used when the caller does not supply one.
///
/// Derived from the destination alone so that subscribing again after a
/// reconnect produces the same id.
pub fn subscription_id_for(destination: &str) -> String {
    format!("sub-{}", destination)
}

/// A typed handler could not decode a message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError(pub String);

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for DecodeError {}

/// Type-erased message callback: receives the body and the headers of a
/// `MESSAGE` frame. Raw handlers always succeed; typed handlers report a
/// body that failed to decode.
pub type Handler = Arc<dyn Fn(&str, &Headers) -> Result<(), DecodeError> + Send + Sync>;

/// Wrap a raw `(body, headers)` callback.
pub fn raw_handler<F>(handler: F) -> Handler
where
    F: Fn(&str, &Headers) + Send + Sync + 'static,
{
    Arc::new(move |body, headers| {
        handler(body, headers);
        Ok(())
    })
}

/// Wrap a callback that receives the body decoded by `decode`.
///
/// A body that fails to decode is not handed to `handler`.
pub fn typed_handler<T, E, D, F>(decode: D, handler: F) -> Handler
where
    D: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
    E: fmt::Display,
    F: Fn(T, &Headers) + Send + Sync + 'static,
{
    Arc::new(move |body, headers| {
        let value = decode(body).map_err(|e| DecodeError(e.to_string()))?;
        handler(value, headers);
        Ok(())
    })
}

/// Options for `StompClient::subscribe_with_options`.
///
/// `headers` are forwarded to the broker after `destination`, `ack` and `id`.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionOptions {
    pub ack: AckMode,
    pub id: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl SubscriptionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ack(mut self, ack: AckMode) -> Self {
        self.ack = ack;
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Split a raw header map into options: `ack` and `id` are lifted out,
    /// `destination` is dropped and everything else is kept as extra headers.
    /// An unrecognised `ack` value falls back to `auto`.
    pub fn from_headers(headers: Headers) -> Self {
        let mut options = SubscriptionOptions::default();
        for (k, v) in headers {
            match k.as_str() {
                "ack" => options.ack = AckMode::parse(&v).unwrap_or_default(),
                "id" => options.id = Some(v),
                "destination" => {}
                _ => options.headers.push((k, v)),
            }
        }
        options
    }
}

/// A live subscription: destination, id, ack mode and callback.
#[derive(Clone)]
pub struct Subscription {
    destination: String,
    id: String,
    ack: AckMode,
    headers: Vec<(String, String)>,
    handler: Handler,
}

impl Subscription {
    /// Build a subscription, rejecting an empty destination.
    pub fn new(
        destination: impl Into<String>,
        options: SubscriptionOptions,
        handler: Handler,
    ) -> Result<Self, StompError> {
        let destination = destination.into();
        if destination.is_empty() {
            return Err(StompError::EmptyDestination);
        }
        let id = options
            .id
            .unwrap_or_else(|| subscription_id_for(&destination));
        Ok(Self {
            destination,
            id,
            ack: options.ack,
            headers: options.headers,
            handler,
        })
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn ack(&self) -> AckMode {
        self.ack
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// The `SUBSCRIBE` frame announcing this subscription.
    pub fn subscribe_frame(&self) -> Frame {
        Frame::new(command::SUBSCRIBE)
            .header("destination", &self.destination)
            .header("ack", self.ack.as_str())
            .header("id", &self.id)
            .headers(self.headers.iter().cloned())
    }

    /// The `UNSUBSCRIBE` frame cancelling this subscription.
    pub fn unsubscribe_frame(&self) -> Frame {
        Frame::new(command::UNSUBSCRIBE).header("id", &self.id)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("destination", &self.destination)
            .field("id", &self.id)
            .field("ack", &self.ack)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Destination → subscription table.
///
/// Owned by the connection task; every inbound `MESSAGE` is routed through
/// [`SubscriptionRegistry::route`].
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: HashMap<String, Subscription>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription, returning the one it replaced.
    pub fn insert(&mut self, subscription: Subscription) -> Option<Subscription> {
        self.entries
            .insert(subscription.destination.clone(), subscription)
    }

    pub fn remove(&mut self, destination: &str) -> Option<Subscription> {
        self.entries.remove(destination)
    }

    pub fn get(&self, destination: &str) -> Option<&Subscription> {
        self.entries.get(destination)
    }

    pub fn contains(&self, destination: &str) -> bool {
        self.entries.contains_key(destination)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.entries.values()
    }

    /// Handler for a `MESSAGE` frame, looked up by its `destination` header.
    pub fn route(&self, frame: &Frame) -> Option<&Subscription> {
        frame
            .get_header("destination")
            .and_then(|d| self.entries.get(d))
    }
}
