//! # notification-link
//!
//! Client library for per-user real-time notifications over STOMP on
//! WebSocket, with bounded automatic reconnection.
//!
//! - [`NotificationChannel`]: connect a signed-in user, receive decoded
//!   [`NotificationEvent`]s, disconnect deterministically
//! - [`NotificationInbox`]: REST access to stored notifications
//! - [`Transport`] / [`Session`]: the seam the channel drives, implemented
//!   by [`StompTransport`]
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use notification_link::{
//!     AuthProvider, ChannelOptions, EventHandlers, NotificationChannel, NotificationEvent,
//! };
//!
//! # async fn run() {
//! let channel = NotificationChannel::builder()
//!     .options(ChannelOptions::default().with_endpoint_url("https://shop.example.com/ws"))
//!     .auth(AuthProvider::jwt_token("eyJ..."))
//!     .event_handlers(EventHandlers::new().on_disconnect(|r| eprintln!("lost: {}", r)))
//!     .build();
//!
//! channel.connect(
//!     "42",
//!     |event: NotificationEvent| println!("{:?}: {:?}", event.kind(), event.title()),
//!     Some(Arc::new(|| println!("connected"))),
//! );
//! # channel.disconnect().await;
//! # }
//! ```

pub mod auth;
pub mod channel;
pub mod error;
pub mod event_handlers;
pub mod inbox;
pub mod models;
pub mod stomp;
pub mod timeouts;
pub mod transport;

pub use auth::AuthProvider;
pub use channel::{NotificationChannel, NotificationChannelBuilder};
pub use error::{LinkError, Result};
pub use event_handlers::{
    ConnectionError, DisconnectReason, EventHandlers, NotificationHandler, OnConnectCallback,
    OnDisconnectCallback, OnErrorCallback, OnReceiveCallback,
};
pub use inbox::NotificationInbox;
pub use models::{
    ActionResponse, ChannelOptions, ChannelState, Destination, NotificationEvent,
    NotificationKind, NotificationListResponse, SubscriptionInfo, UnreadCountResponse,
};
pub use stomp::StompTransport;
pub use timeouts::{LinkTimeouts, LinkTimeoutsBuilder};
pub use transport::{Session, SessionEvent, SessionRequest, SubscriptionId, Transport};
