use std::fmt;

use serde::{Deserialize, Serialize};

/// A path-like address identifying one notification queue or topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Destination(String);

impl Destination {
    /// Wrap an arbitrary destination path.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Per-user notification queue: `/user/{user_id}/queue/notifications`.
    pub fn user_queue(user_id: &str) -> Self {
        Self(format!("/user/{}/queue/notifications", user_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Destination {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
