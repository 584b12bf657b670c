use std::{collections::HashMap, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};

/// Prefix for environment variables read by [`ChannelOptions::from_env`].
pub const ENV_PREFIX: &str = "NOTIFICATION_LINK_";

/// Connection-level options for a [`NotificationChannel`](crate::NotificationChannel).
///
/// These options control:
/// - Which endpoint the STOMP session is opened against
/// - The bounded reconnection policy (fixed delay, fixed attempt cap)
/// - STOMP heart-beat intervals used to detect silent connection loss
/// - An optional broadcast topic subscribed next to the per-user queue
///
/// # Example
///
/// ```rust
/// use notification_link::ChannelOptions;
///
/// let options = ChannelOptions::default()
///     .with_endpoint_url("https://shop.example.com/ws")
///     .with_reconnect_delay_ms(2000)
///     .with_max_reconnect_attempts(10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOptions {
    /// HTTP(S) or WS(S) URL of the STOMP endpoint.
    /// Default: `http://localhost:8080/ws`
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: String,

    /// The server registers the endpoint with SockJS, so the raw WebSocket
    /// lives at `{endpoint}/websocket`.
    /// Default: true
    #[serde(default = "default_sockjs_endpoint")]
    pub sockjs_endpoint: bool,

    /// Automatic reconnection attempts after a session is lost before the
    /// channel settles in `Disconnected`. The counter resets on every
    /// successful session. Set to 0 to disable automatic reconnection.
    /// Default: 5
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Fixed delay in milliseconds before each reconnection attempt.
    /// Default: 3000ms
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Interval (ms) at which the client wants to hear from the server.
    /// 0 disables incoming heart-beats.
    /// Default: 4000ms
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_incoming_ms: u64,

    /// Interval (ms) at which the client offers to send heart-beats.
    /// 0 disables outgoing heart-beats.
    /// Default: 4000ms
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_outgoing_ms: u64,

    /// Broadcast topic subscribed in addition to the per-user queue, e.g.
    /// `/topic/admin-notifications` for back-office clients.
    /// Default: None
    #[serde(default)]
    pub broadcast_topic: Option<String>,
}

fn default_endpoint_url() -> String {
    "http://localhost:8080/ws".to_string()
}

fn default_sockjs_endpoint() -> bool {
    true
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_heartbeat_ms() -> u64 {
    4000
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            endpoint_url: default_endpoint_url(),
            sockjs_endpoint: true,
            max_reconnect_attempts: 5,
            reconnect_delay_ms: 3000,
            heartbeat_incoming_ms: 4000,
            heartbeat_outgoing_ms: 4000,
            broadcast_topic: None,
        }
    }
}

impl ChannelOptions {
    /// Create new channel options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the STOMP endpoint URL.
    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = url.into();
        self
    }

    /// Set whether the endpoint is a SockJS endpoint (raw socket at `/websocket`).
    pub fn with_sockjs_endpoint(mut self, enabled: bool) -> Self {
        self.sockjs_endpoint = enabled;
        self
    }

    /// Set the maximum number of automatic reconnection attempts.
    pub fn with_max_reconnect_attempts(mut self, max_attempts: u32) -> Self {
        self.max_reconnect_attempts = max_attempts;
        self
    }

    /// Set the fixed delay between reconnection attempts (in milliseconds).
    pub fn with_reconnect_delay_ms(mut self, delay_ms: u64) -> Self {
        self.reconnect_delay_ms = delay_ms;
        self
    }

    /// Set the incoming heart-beat interval (in milliseconds, 0 disables).
    pub fn with_heartbeat_incoming_ms(mut self, ms: u64) -> Self {
        self.heartbeat_incoming_ms = ms;
        self
    }

    /// Set the outgoing heart-beat interval (in milliseconds, 0 disables).
    pub fn with_heartbeat_outgoing_ms(mut self, ms: u64) -> Self {
        self.heartbeat_outgoing_ms = ms;
        self
    }

    /// Subscribe to a broadcast topic next to the per-user queue.
    pub fn with_broadcast_topic(mut self, topic: Option<String>) -> Self {
        self.broadcast_topic = topic;
        self
    }

    /// The reconnection delay as a [`Duration`].
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Build options from a string map.
    ///
    /// Keys are snake_case field names; dotted aliases
    /// (`endpoint.url`, `reconnect.max.attempts`, `reconnect.delay.ms`,
    /// `heartbeat.incoming.ms`, `heartbeat.outgoing.ms`, `sockjs.endpoint`,
    /// `broadcast.topic`) are accepted too. Missing keys keep their defaults.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let mut options = Self::default();

        if let Some(value) = get_str(map, "endpoint_url", "endpoint.url") {
            if value.trim().is_empty() {
                return Err(LinkError::ConfigurationError("endpoint_url must not be empty".into()));
            }
            options.endpoint_url = value.trim().to_string();
        }
        if let Some(value) = get_str(map, "sockjs_endpoint", "sockjs.endpoint") {
            options.sockjs_endpoint = parse_bool(&value)?;
        }
        if let Some(value) = get_str(map, "max_reconnect_attempts", "reconnect.max.attempts") {
            options.max_reconnect_attempts = parse_u32(&value, "max_reconnect_attempts")?;
        }
        if let Some(value) = get_str(map, "reconnect_delay_ms", "reconnect.delay.ms") {
            options.reconnect_delay_ms = parse_u64(&value, "reconnect_delay_ms")?;
        }
        if let Some(value) = get_str(map, "heartbeat_incoming_ms", "heartbeat.incoming.ms") {
            options.heartbeat_incoming_ms = parse_u64(&value, "heartbeat_incoming_ms")?;
        }
        if let Some(value) = get_str(map, "heartbeat_outgoing_ms", "heartbeat.outgoing.ms") {
            options.heartbeat_outgoing_ms = parse_u64(&value, "heartbeat_outgoing_ms")?;
        }
        if let Some(value) = get_str(map, "broadcast_topic", "broadcast.topic") {
            let topic = value.trim();
            options.broadcast_topic = if topic.is_empty() { None } else { Some(topic.to_string()) };
        }

        Ok(options)
    }

    /// Build options from `NOTIFICATION_LINK_*` environment variables,
    /// e.g. `NOTIFICATION_LINK_RECONNECT_DELAY_MS=5000`.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Build options from `(name, value)` pairs using the
    /// `NOTIFICATION_LINK_` prefix convention of [`from_env`](Self::from_env).
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let map: HashMap<String, String> = vars
            .into_iter()
            .filter_map(|(key, value)| {
                key.as_ref()
                    .strip_prefix(ENV_PREFIX)
                    .map(|name| (name.to_ascii_lowercase(), value.into()))
            })
            .collect();
        Self::from_map(&map)
    }
}

fn get_str(map: &HashMap<String, String>, key: &str, alias: &str) -> Option<String> {
    map.get(key).cloned().or_else(|| map.get(alias).cloned())
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(LinkError::ConfigurationError(format!("Invalid boolean value: {}", value))),
    }
}

fn parse_u32(value: &str, field: &str) -> Result<u32> {
    value.trim().parse::<u32>().map_err(|_| {
        LinkError::ConfigurationError(format!("Invalid {} value: {}", field, value))
    })
}

fn parse_u64(value: &str, field: &str) -> Result<u64> {
    value.trim().parse::<u64>().map_err(|_| {
        LinkError::ConfigurationError(format!("Invalid {} value: {}", field, value))
    })
}
