//! Notification delivery and connection lifecycle hooks.
//!
//! - [`NotificationHandler`]: receives every decoded [`NotificationEvent`]
//! - [`OnConnectCallback`]: fired once per successfully established session
//! - [`EventHandlers`]: optional `on_disconnect`, `on_error` and the
//!   `on_receive` debug hook
//!
//! # Example
//!
//! ```rust
//! use notification_link::{EventHandlers, NotificationEvent};
//!
//! let handlers = EventHandlers::new()
//!     .on_disconnect(|reason| println!("Disconnected: {}", reason))
//!     .on_error(|err| eprintln!("Channel error (recoverable={}): {}", err.recoverable, err));
//!
//! let on_message = |event: NotificationEvent| {
//!     println!("New notification: {:?}", event.title());
//! };
//! # let _ = (handlers, on_message);
//! ```

use std::fmt;
use std::sync::Arc;

use crate::models::NotificationEvent;

/// Something that consumes notification events.
///
/// Implemented for any `Fn(NotificationEvent) + Send + Sync`, so plain
/// closures work; implement it on a struct to plug in a store/reducer or a
/// test fake.
pub trait NotificationHandler: Send + Sync + 'static {
    /// Called synchronously, exactly once per decoded frame, in arrival order.
    fn on_notification(&self, event: NotificationEvent);
}

impl<F> NotificationHandler for F
where
    F: Fn(NotificationEvent) + Send + Sync + 'static,
{
    fn on_notification(&self, event: NotificationEvent) {
        self(event)
    }
}

/// Reason for a disconnect event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectReason {
    /// Human-readable description of why the session ended.
    pub message: String,
    /// WebSocket close code, if available (e.g. 1000 = normal, 1006 = abnormal).
    pub code: Option<u16>,
}

impl DisconnectReason {
    /// Create a new disconnect reason with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Create a new disconnect reason with a message and close code.
    pub fn with_code(message: impl Into<String>, code: u16) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "{} (code: {})", self.message, code)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

/// Error information passed to the `on_error` handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionError {
    /// Human-readable error message.
    pub message: String,
    /// Whether the channel will keep trying (a reconnect is still possible).
    pub recoverable: bool,
}

impl ConnectionError {
    /// Create a new connection error.
    pub fn new(message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            message: message.into(),
            recoverable,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Type alias for the on_connect callback.
pub type OnConnectCallback = Arc<dyn Fn() + Send + Sync>;

/// Type alias for the on_disconnect callback.
pub type OnDisconnectCallback = Arc<dyn Fn(DisconnectReason) + Send + Sync>;

/// Type alias for the on_error callback.
pub type OnErrorCallback = Arc<dyn Fn(ConnectionError) + Send + Sync>;

/// Type alias for the on_receive callback (debug hook for raw frame bodies).
pub type OnReceiveCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Connection lifecycle event handlers.
///
/// All handlers are optional. They run on the channel's background task,
/// so they must be cheap and must not block.
#[derive(Clone, Default)]
pub struct EventHandlers {
    pub(crate) on_disconnect: Option<OnDisconnectCallback>,
    pub(crate) on_error: Option<OnErrorCallback>,
    pub(crate) on_receive: Option<OnReceiveCallback>,
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_disconnect", &self.on_disconnect.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_receive", &self.on_receive.is_some())
            .finish()
    }
}

impl EventHandlers {
    /// Create a new empty `EventHandlers` (no callbacks registered).
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked whenever a session ends, for any reason
    /// other than an explicit `disconnect()`.
    pub fn on_disconnect(mut self, f: impl Fn(DisconnectReason) + Send + Sync + 'static) -> Self {
        self.on_disconnect = Some(Arc::new(f));
        self
    }

    /// Register a callback invoked on connection, protocol or retry-exhaustion errors.
    pub fn on_error(mut self, f: impl Fn(ConnectionError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Register a debug hook receiving every raw inbound frame body before
    /// it is decoded, including bodies that later fail to decode.
    pub fn on_receive(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_receive = Some(Arc::new(f));
        self
    }

    /// Returns `true` if any handler is registered.
    pub fn has_any(&self) -> bool {
        self.on_disconnect.is_some() || self.on_error.is_some() || self.on_receive.is_some()
    }

    pub(crate) fn emit_disconnect(&self, reason: DisconnectReason) {
        if let Some(cb) = &self.on_disconnect {
            cb(reason);
        }
    }

    pub(crate) fn emit_error(&self, error: ConnectionError) {
        if let Some(cb) = &self.on_error {
            cb(error);
        }
    }

    pub(crate) fn emit_receive(&self, raw: &str) {
        if let Some(cb) = &self.on_receive {
            cb(raw);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn test_closure_is_a_notification_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = move |event: NotificationEvent| {
            sink.lock().unwrap().push(event.title().map(str::to_string));
        };

        let event = NotificationEvent::from_json(r#"{"title":"Order shipped"}"#).unwrap();
        handler.on_notification(event);

        assert_eq!(*seen.lock().unwrap(), vec![Some("Order shipped".to_string())]);
    }

    #[test]
    fn test_emit_without_handlers_is_noop() {
        let handlers = EventHandlers::new();
        assert!(!handlers.has_any());
        handlers.emit_disconnect(DisconnectReason::new("gone"));
        handlers.emit_error(ConnectionError::new("boom", true));
        handlers.emit_receive("{}");
    }

    #[test]
    fn test_registered_handlers_fire() {
        let count = Arc::new(AtomicUsize::new(0));
        let (c1, c2, c3) = (count.clone(), count.clone(), count.clone());
        let handlers = EventHandlers::new()
            .on_disconnect(move |_| {
                c1.fetch_add(1, Ordering::SeqCst);
            })
            .on_error(move |_| {
                c2.fetch_add(1, Ordering::SeqCst);
            })
            .on_receive(move |_| {
                c3.fetch_add(1, Ordering::SeqCst);
            });

        assert!(handlers.has_any());
        handlers.emit_disconnect(DisconnectReason::with_code("closed", 1006));
        handlers.emit_error(ConnectionError::new("boom", false));
        handlers.emit_receive("{}");
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_disconnect_reason_display() {
        assert_eq!(DisconnectReason::new("Server closed").to_string(), "Server closed");
        assert_eq!(
            DisconnectReason::with_code("Going away", 1001).to_string(),
            "Going away (code: 1001)"
        );
    }

    #[test]
    fn test_debug_shows_registration_only() {
        let handlers = EventHandlers::new().on_error(|_| {});
        let rendered = format!("{:?}", handlers);
        assert!(rendered.contains("on_error: true"));
        assert!(rendered.contains("on_disconnect: false"));
    }
}
