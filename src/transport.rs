//! Transport seam between the channel state machine and the wire.
//!
//! A [`Transport`] opens [`Session`]s. A session is one connected link that
//! reports [`SessionEvent`]s and lets the channel bind destinations to
//! subscription ids. The production implementation is
//! [`StompTransport`](crate::stomp::StompTransport); tests substitute a
//! scripted fake.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::{auth::AuthProvider, error::Result, event_handlers::DisconnectReason, models::Destination};

/// Identifier the session assigned to a subscription; the capability used
/// to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parameters for opening one session.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    /// Endpoint URL as configured (the transport resolves it to its wire URL).
    pub endpoint_url: String,
    /// Whether the endpoint is a SockJS endpoint.
    pub sockjs_endpoint: bool,
    /// Interval (ms) the client offers to send heart-beats at, 0 disables.
    pub heartbeat_outgoing_ms: u64,
    /// Interval (ms) the client wants to receive heart-beats at, 0 disables.
    pub heartbeat_incoming_ms: u64,
    /// Credentials for the handshake.
    pub auth: AuthProvider,
    /// Timeout applied to individual writes.
    pub send_timeout: Duration,
}

/// Something that happened on a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Handshake completed; subscriptions may now be created.
    Ready,
    /// One inbound message on a subscription.
    Frame {
        subscription: SubscriptionId,
        body: String,
    },
    /// The server reported a protocol-level error. The session usually
    /// closes right after; retry is driven by the following `Closed`.
    ProtocolError(String),
    /// The session is gone (network loss, server close, heart-beat timeout).
    Closed(DisconnectReason),
}

/// Opens sessions against a server endpoint.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open the underlying link. Returning `Ok` does not mean the session is
    /// ready: readiness is reported later through [`SessionEvent::Ready`].
    async fn open_session(&self, request: SessionRequest) -> Result<Box<dyn Session>>;
}

/// One live link to the server.
///
/// `next_event` must be cancel-safe: the channel races it against its
/// command queue and drops the future when a command wins.
#[async_trait]
pub trait Session: Send {
    /// Next event, or `None` once the session is finished.
    async fn next_event(&mut self) -> Option<SessionEvent>;

    /// Bind `destination` and return the id frames for it will carry.
    async fn subscribe(&mut self, destination: &Destination) -> Result<SubscriptionId>;

    /// Release a subscription.
    async fn unsubscribe(&mut self, id: &SubscriptionId) -> Result<()>;

    /// Close the session gracefully.
    async fn close(&mut self) -> Result<()>;
}
