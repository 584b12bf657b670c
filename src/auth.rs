//! Authentication provider for the notification channel and inbox.
//!
//! The storefront backend authenticates with a bearer JWT. The token is
//! supplied by the caller; refreshing it is the caller's job.

use std::fmt;

/// Credentials attached to outbound requests.
///
/// - STOMP sessions carry it as an `Authorization` header on `CONNECT`.
/// - Inbox HTTP requests carry it as `Authorization: Bearer <token>`.
///
/// # Examples
///
/// ```rust
/// use notification_link::AuthProvider;
///
/// let auth = AuthProvider::jwt_token("eyJhbGc...");
/// assert!(auth.is_authenticated());
///
/// let anonymous = AuthProvider::none();
/// assert!(anonymous.authorization_header().is_none());
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub enum AuthProvider {
    /// Bearer JWT token.
    JwtToken(String),

    /// No authentication.
    #[default]
    None,
}

impl AuthProvider {
    /// Create JWT token authentication.
    pub fn jwt_token(token: impl Into<String>) -> Self {
        Self::JwtToken(token.into())
    }

    /// No authentication.
    pub fn none() -> Self {
        Self::None
    }

    /// Value for an `Authorization` header, if any.
    pub fn authorization_header(&self) -> Option<String> {
        match self {
            Self::JwtToken(token) => Some(format!("Bearer {}", token)),
            Self::None => None,
        }
    }

    /// Attach the authorization header to an HTTP request builder.
    pub fn apply_to_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::JwtToken(token) => request.bearer_auth(token),
            Self::None => request,
        }
    }

    /// Check if authentication is configured.
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::None)
    }
}

// Tokens must never end up in logs through `{:?}`.
impl fmt::Debug for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JwtToken(_) => f.write_str("JwtToken(<redacted>)"),
            Self::None => f.write_str("None"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_provider_creation() {
        let jwt = AuthProvider::jwt_token("test_token");
        assert!(jwt.is_authenticated());

        let none = AuthProvider::none();
        assert!(!none.is_authenticated());
        assert_eq!(AuthProvider::default(), AuthProvider::None);
    }

    #[test]
    fn test_authorization_header_format() {
        let jwt = AuthProvider::jwt_token("abc.def.ghi");
        assert_eq!(jwt.authorization_header().as_deref(), Some("Bearer abc.def.ghi"));
        assert_eq!(AuthProvider::none().authorization_header(), None);
    }

    #[test]
    fn test_debug_redacts_token() {
        let jwt = AuthProvider::jwt_token("super-secret");
        let rendered = format!("{:?}", jwt);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("redacted"));
    }

    #[test]
    fn test_apply_to_request_sets_bearer() {
        let client = reqwest::Client::new();
        let request = AuthProvider::jwt_token("tok")
            .apply_to_request(client.get("http://localhost:8080"))
            .build()
            .unwrap();
        assert_eq!(request.headers().get("authorization").unwrap(), "Bearer tok");

        let request = AuthProvider::none()
            .apply_to_request(client.get("http://localhost:8080"))
            .build()
            .unwrap();
        assert!(request.headers().get("authorization").is_none());
    }
}
