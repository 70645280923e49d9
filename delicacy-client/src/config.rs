//! Client configuration

use crate::{ClientError, ClientResult};
use std::time::Duration;

/// Default backend port (REST and event channel share it)
pub const DEFAULT_BACKEND_PORT: u16 = 8000;

/// Where the connection identifier goes in the channel address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathForm {
    /// `/ws/<role>?identifier=<id>`
    #[default]
    Query,
    /// `/ws/<role>/<connection id>`
    Path,
}

/// Event channel configuration
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// First reconnect delay, doubled on every consecutive failure
    pub initial_delay: Duration,
    /// Upper bound for the reconnect delay
    pub max_delay: Duration,
    /// Consecutive failures before the channel gives up
    pub max_failures: u32,
    /// Interval between `ping` messages; zero disables keepalive
    pub keepalive_interval: Duration,
    /// Handshake timeout for one connection attempt
    pub connect_timeout: Duration,
    pub path_form: PathForm,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_failures: 5,
            keepalive_interval: Duration::from_secs(25),
            connect_timeout: Duration::from_secs(10),
            path_form: PathForm::Query,
        }
    }
}

impl ChannelConfig {
    pub fn with_backoff(mut self, initial: Duration, max: Duration, max_failures: u32) -> Self {
        self.initial_delay = initial;
        self.max_delay = max;
        self.max_failures = max_failures;
        self
    }

    pub fn with_keepalive(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_path_form(mut self, form: PathForm) -> Self {
        self.path_form = form;
        self
    }
}

/// Client configuration for one viewer
///
/// The backend is reached on the page's host at a fixed port; `secure`
/// selects `https`/`wss` over `http`/`ws`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Page host (e.g., "192.168.1.20")
    pub host: String,
    /// Page served over TLS
    pub secure: bool,
    /// Backend port
    pub port: u16,
    /// REST request timeout
    pub timeout: Duration,
    /// Snapshot poll interval
    pub poll_interval: Duration,
    /// Minutes after which an open order is urgent
    pub urgent_after_minutes: i64,
    pub channel: ChannelConfig,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            secure: false,
            port: DEFAULT_BACKEND_PORT,
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(3),
            urgent_after_minutes: 15,
            channel: ChannelConfig::default(),
        }
    }

    /// Build from an origin such as `http://127.0.0.1:8000`
    pub fn from_origin(origin: &str) -> ClientResult<Self> {
        let url = reqwest::Url::parse(origin)
            .map_err(|e| ClientError::Config(format!("invalid origin {origin}: {e}")))?;
        let secure = match url.scheme() {
            "https" | "wss" => true,
            "http" | "ws" => false,
            other => return Err(ClientError::Config(format!("unsupported scheme: {other}"))),
        };
        let host = url
            .host_str()
            .ok_or_else(|| ClientError::Config(format!("origin has no host: {origin}")))?;
        let port = url.port().unwrap_or(DEFAULT_BACKEND_PORT);
        Ok(Self::new(host).with_secure(secure).with_port(port))
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_urgent_after(mut self, minutes: i64) -> Self {
        self.urgent_after_minutes = minutes;
        self
    }

    pub fn with_channel(mut self, channel: ChannelConfig) -> Self {
        self.channel = channel;
        self
    }

    /// REST base URL
    pub fn base_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }

    /// Event channel base URL (scheme follows the page: https → wss)
    pub fn channel_base_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }

    /// Create an HTTP client from this configuration
    pub fn build_http_client(&self) -> ClientResult<crate::HttpClient> {
        crate::HttpClient::new(self)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("localhost")
    }
}
