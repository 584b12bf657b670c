//! Inbound notification payloads.
//!
//! The channel only guarantees that a frame body is a JSON object. Field
//! accessors are lenient: a missing field and a field of an unexpected JSON
//! type both read as `None`, so a server-side schema change never turns a
//! delivered frame into a dropped one.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::{LinkError, Result};

/// Classification of the `type` field the storefront backend emits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Qna,
    Review,
    Notice,
    Order,
    Marketing,
    Advertisement,
    AdminOrder,
    AdminQna,
    AdminReview,
    Other(String),
}

impl NotificationKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "QNA" => Self::Qna,
            "REVIEW" => Self::Review,
            "NOTICE" => Self::Notice,
            "ORDER" => Self::Order,
            "MARKETING" => Self::Marketing,
            "ADVERTISEMENT" => Self::Advertisement,
            "ADMIN_ORDER" => Self::AdminOrder,
            "ADMIN_QNA" => Self::AdminQna,
            "ADMIN_REVIEW" => Self::AdminReview,
            _ => Self::Other(raw.to_string()),
        }
    }

    /// Back-office notifications published on the admin broadcast topic.
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::AdminOrder | Self::AdminQna | Self::AdminReview)
    }

    /// Promotional notifications, which the server only sends to users who
    /// gave marketing consent.
    pub fn is_promotional(&self) -> bool {
        matches!(self, Self::Marketing | Self::Advertisement)
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Qna => "QNA",
            Self::Review => "REVIEW",
            Self::Notice => "NOTICE",
            Self::Order => "ORDER",
            Self::Marketing => "MARKETING",
            Self::Advertisement => "ADVERTISEMENT",
            Self::AdminOrder => "ADMIN_ORDER",
            Self::AdminQna => "ADMIN_QNA",
            Self::AdminReview => "ADMIN_REVIEW",
            Self::Other(raw) => raw.as_str(),
        };
        f.write_str(name)
    }
}

/// One notification decoded from a wire frame.
///
/// # Wire format
///
/// ```json
/// {
///   "id": 42,
///   "title": "Your question was answered",
///   "content": "See the product page for details",
///   "type": "QNA",
///   "referenceId": 7,
///   "productId": 1001,
///   "isRead": false,
///   "createdAt": "2025-11-20T10:15:30"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationEvent {
    payload: Map<String, JsonValue>,
}

impl NotificationEvent {
    /// Decode a frame body. Fails unless the body is a well-formed JSON object.
    pub fn from_json(body: &str) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(body)?;
        Self::from_value(value)
    }

    /// Wrap an already-parsed JSON value. Fails unless it is an object.
    pub fn from_value(value: JsonValue) -> Result<Self> {
        match value {
            JsonValue::Object(payload) => Ok(Self { payload }),
            other => Err(LinkError::SerializationError(format!(
                "Notification payload must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn id(&self) -> Option<i64> {
        self.i64_field("id")
    }

    pub fn title(&self) -> Option<&str> {
        self.str_field("title")
    }

    pub fn content(&self) -> Option<&str> {
        self.str_field("content")
    }

    /// Admin broadcasts carry their text in `message` rather than `content`.
    pub fn message(&self) -> Option<&str> {
        self.str_field("message")
    }

    /// `content`, falling back to `message`.
    pub fn body_text(&self) -> Option<&str> {
        self.content().or_else(|| self.message())
    }

    pub fn kind(&self) -> Option<NotificationKind> {
        self.str_field("type").map(NotificationKind::parse)
    }

    pub fn reference_id(&self) -> Option<i64> {
        self.i64_field("referenceId")
    }

    pub fn product_id(&self) -> Option<i64> {
        self.i64_field("productId")
    }

    pub fn order_id(&self) -> Option<i64> {
        self.i64_field("orderId")
    }

    pub fn qna_id(&self) -> Option<i64> {
        self.i64_field("qnaId")
    }

    pub fn review_id(&self) -> Option<i64> {
        self.i64_field("reviewId")
    }

    pub fn is_read(&self) -> Option<bool> {
        self.payload.get("isRead").and_then(JsonValue::as_bool)
    }

    /// Creation time as sent by the server (ISO-8601 local date-time).
    pub fn created_at(&self) -> Option<&str> {
        self.str_field("createdAt")
    }

    pub fn read_at(&self) -> Option<&str> {
        self.str_field("readAt")
    }

    /// Raw access to any field.
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.payload.get(key)
    }

    pub fn as_map(&self) -> &Map<String, JsonValue> {
        &self.payload
    }

    pub fn into_value(self) -> JsonValue {
        JsonValue::Object(self.payload)
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(JsonValue::as_str)
    }

    // Numeric ids may also arrive stringified.
    fn i64_field(&self, key: &str) -> Option<i64> {
        match self.payload.get(key)? {
            JsonValue::Number(n) => n.as_i64(),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
