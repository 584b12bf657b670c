//! Response envelopes of the `/api/notifications` REST endpoints.
//!
//! Every endpoint answers with `{"success": bool, ...}`; failures carry a
//! `message`.

use serde::{Deserialize, Serialize};

use super::NotificationEvent;

/// `GET /api/notifications`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationListResponse {
    pub success: bool,
    #[serde(default)]
    pub notifications: Vec<NotificationEvent>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `GET /api/notifications/unread-count`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    pub success: bool,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub message: Option<String>,
}

/// Mark-read, mark-all-read and delete endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Common view over the envelopes for success checking.
pub(crate) trait InboxEnvelope {
    fn success(&self) -> bool;
    fn message(&self) -> Option<&str>;
}

impl InboxEnvelope for NotificationListResponse {
    fn success(&self) -> bool {
        self.success
    }
    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl InboxEnvelope for UnreadCountResponse {
    fn success(&self) -> bool {
        self.success
    }
    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl InboxEnvelope for ActionResponse {
    fn success(&self) -> bool {
        self.success
    }
    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}
