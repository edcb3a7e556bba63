use std::sync::Arc;
use std::time::Duration;

use crate::frame::Headers;
use crate::reconnect::{FixedInterval, NeverReconnect, ReconnectPolicy};

/// Default wait for `CONNECTED` after the transport opens.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the transport connects: URL plus handshake headers (for example an
/// `Authorization` header on the WebSocket upgrade request).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

/// Builder for the headers of the `CONNECT` frame.
///
/// ```
/// use stomp_socket::ConnectOptions;
///
/// let headers = ConnectOptions::new()
///     .host("broker.example")
///     .login("guest")
///     .passcode("guest")
///     .heartbeat(10_000, 10_000)
///     .into_headers();
/// assert_eq!(headers.get("heart-beat"), Some("10000,10000"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    /// `accept-version`; defaults to "1.1,1.2" when unset.
    pub accept_version: Option<String>,
    /// Virtual host header.
    pub host: Option<String>,
    pub login: Option<String>,
    pub passcode: Option<String>,
    /// `(cx, cy)` in milliseconds; omitted from `CONNECT` when unset.
    pub heartbeat: Option<(u64, u64)>,
    /// Extra headers appended after the standard ones.
    pub headers: Vec<(String, String)>,
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept_version(mut self, version: impl Into<String>) -> Self {
        self.accept_version = Some(version.into());
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn login(mut self, login: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self
    }

    pub fn passcode(mut self, passcode: impl Into<String>) -> Self {
        self.passcode = Some(passcode.into());
        self
    }

    /// How often we can send (`cx`) and want to receive (`cy`) heartbeats,
    /// in milliseconds. Zero disables that direction.
    pub fn heartbeat(mut self, cx: u64, cy: u64) -> Self {
        self.heartbeat = Some((cx, cy));
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn into_headers(self) -> Headers {
        let mut headers = Headers::new();
        headers.insert(
            "accept-version",
            self.accept_version.unwrap_or_else(|| "1.1,1.2".to_string()),
        );
        if let Some(host) = self.host {
            headers.insert("host", host);
        }
        if let Some(login) = self.login {
            headers.insert("login", login);
        }
        if let Some(passcode) = self.passcode {
            headers.insert("passcode", passcode);
        }
        if let Some((cx, cy)) = self.heartbeat {
            headers.insert("heart-beat", format!("{},{}", cx, cy));
        }
        for (k, v) in self.headers {
            headers.insert(k, v);
        }
        headers
    }
}

/// Client configuration, built in code.
///
/// The connection headers are sent verbatim with every `CONNECT`, including
/// the ones issued by reconnect attempts.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: Endpoint,
    pub connection_headers: Headers,
    pub reconnect_policy: Arc<dyn ReconnectPolicy>,
    /// Capacity of the facade → connection command queue.
    pub command_buffer: usize,
    /// How long to wait for `CONNECTED` after the transport opens before
    /// treating it as failed.
    pub handshake_timeout: Duration,
    /// Runtime that runs handlers and forwards events; the current runtime
    /// when `None`.
    pub dispatch_handle: Option<tokio::runtime::Handle>,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            endpoint: Endpoint::new(url),
            connection_headers: Headers::new(),
            reconnect_policy: Arc::new(FixedInterval::default()),
            command_buffer: 64,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            dispatch_handle: None,
        }
    }

    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Add a header to the WebSocket handshake request.
    pub fn handshake_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.endpoint.headers.push((key.into(), value.into()));
        self
    }

    /// Raw `CONNECT` headers, replacing any previously configured.
    pub fn connection_headers(mut self, headers: impl Into<Headers>) -> Self {
        self.connection_headers = headers.into();
        self
    }

    pub fn connect_options(mut self, options: ConnectOptions) -> Self {
        self.connection_headers = options.into_headers();
        self
    }

    pub fn reconnect_policy(mut self, policy: impl ReconnectPolicy + 'static) -> Self {
        self.reconnect_policy = Arc::new(policy);
        self
    }

    /// Retry every `interval`, forever.
    pub fn reconnect_interval(self, interval: Duration) -> Self {
        self.reconnect_policy(FixedInterval::new(interval, None))
    }

    pub fn no_reconnect(self) -> Self {
        self.reconnect_policy(NeverReconnect)
    }

    pub fn command_buffer(mut self, capacity: usize) -> Self {
        self.command_buffer = capacity.max(1);
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn dispatch_handle(mut self, handle: tokio::runtime::Handle) -> Self {
        self.dispatch_handle = Some(handle);
        self
    }
}
