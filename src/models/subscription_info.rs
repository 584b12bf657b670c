//! Subscription metadata exposed to callers.
//!
//! [`SubscriptionInfo`] is a read-only snapshot of an active subscription.

use serde::{Deserialize, Serialize};

use super::Destination;

/// Read-only snapshot of an active subscription's metadata.
///
/// Returned by [`NotificationChannel::subscriptions()`](crate::NotificationChannel::subscriptions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    /// Subscription ID assigned by the session when subscribing.
    pub id: String,
    /// Destination the subscription is bound to.
    pub destination: Destination,
    /// Timestamp (millis since Unix epoch) when the subscription was created.
    pub created_at_ms: u64,
    /// Timestamp (millis since Unix epoch) of the last delivered event,
    /// or `None` if no events have been delivered yet.
    pub last_event_time_ms: Option<u64>,
    /// Number of events delivered to the handler through this subscription.
    pub delivered: u64,
}
