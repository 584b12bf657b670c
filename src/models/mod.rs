//! Data models for the notification-link client library.
//!
//! Defines channel configuration, lifecycle state, notification payloads
//! and the REST inbox response envelopes.

pub mod channel_options;
pub mod channel_state;
pub mod destination;
pub mod inbox_response;
pub mod notification_event;
pub mod subscription_info;


pub use channel_options::ChannelOptions;
pub use channel_state::ChannelState;
pub use destination::Destination;
pub(crate) use inbox_response::InboxEnvelope;
pub use inbox_response::{ActionResponse, NotificationListResponse, UnreadCountResponse};
pub use notification_event::{NotificationEvent, NotificationKind};
pub use subscription_info::SubscriptionInfo;
