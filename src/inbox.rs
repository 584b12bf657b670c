//! REST client for the persisted notification inbox.
//!
//! Complements the real-time channel: lists stored notifications, reads the
//! unread badge count and marks or deletes entries.

use crate::{
    auth::AuthProvider,
    error::{LinkError, Result},
    models::{ActionResponse, NotificationEvent, NotificationListResponse, UnreadCountResponse},
    models::InboxEnvelope,
    timeouts::LinkTimeouts,
};
use log::{debug, warn};
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::time::Instant;

const MAX_RETRIES: u32 = 3;

/// HTTP client for `{base_url}/api/notifications`.
#[derive(Clone)]
pub struct NotificationInbox {
    base_url: String,
    http_client: reqwest::Client,
    auth: AuthProvider,
}

impl std::fmt::Debug for NotificationInbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationInbox")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth)
            .finish()
    }
}

impl NotificationInbox {
    /// Inbox client with default timeouts.
    pub fn new(base_url: impl Into<String>, auth: AuthProvider) -> Result<Self> {
        Self::with_timeouts(base_url, auth, &LinkTimeouts::default())
    }

    pub fn with_timeouts(
        base_url: impl Into<String>,
        auth: AuthProvider,
        timeouts: &LinkTimeouts,
    ) -> Result<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        url::Url::parse(&base_url).map_err(|e| {
            LinkError::ConfigurationError(format!("Invalid base_url '{}': {}", base_url, e))
        })?;

        let mut builder = reqwest::Client::builder();
        if !LinkTimeouts::is_no_timeout(timeouts.connection_timeout) {
            builder = builder.connect_timeout(timeouts.connection_timeout);
        }
        if !LinkTimeouts::is_no_timeout(timeouts.send_timeout) {
            builder = builder.timeout(timeouts.send_timeout);
        }
        let http_client = builder.build()?;

        Ok(Self {
            base_url,
            http_client,
            auth,
        })
    }

    /// All notifications of the signed-in user.
    pub async fn list(&self) -> Result<Vec<NotificationEvent>> {
        let response: NotificationListResponse = self.request(Method::GET, "").await?;
        Ok(response.notifications)
    }

    pub async fn unread_count(&self) -> Result<u64> {
        let response: UnreadCountResponse = self.request(Method::GET, "/unread-count").await?;
        Ok(response.count)
    }

    pub async fn mark_as_read(&self, notification_id: i64) -> Result<()> {
        let path = format!("/{}/read", notification_id);
        self.request::<ActionResponse>(Method::PUT, &path).await.map(|_| ())
    }

    pub async fn mark_all_as_read(&self) -> Result<()> {
        self.request::<ActionResponse>(Method::PUT, "/read-all").await.map(|_| ())
    }

    pub async fn delete(&self, notification_id: i64) -> Result<()> {
        let path = format!("/{}", notification_id);
        self.request::<ActionResponse>(Method::DELETE, &path).await.map(|_| ())
    }

    async fn request<T>(&self, method: Method, path: &str) -> Result<T>
    where
        T: DeserializeOwned + InboxEnvelope,
    {
        let url = format!("{}/api/notifications{}", self.base_url, path);
        let mut retries = 0;
        let overall_start = Instant::now();

        loop {
            let request = self.auth.apply_to_request(self.http_client.request(method.clone(), &url));
            debug!(
                "[notification-link] {} {} (attempt {}/{})",
                method,
                url,
                retries + 1,
                MAX_RETRIES + 1
            );

            match request.send().await.map_err(LinkError::from) {
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await?;
                    debug!(
                        "[notification-link] Inbox response: status={} total_ms={}",
                        status,
                        overall_start.elapsed().as_millis()
                    );

                    if !status.is_success() {
                        let message = serde_json::from_str::<ActionResponse>(&text)
                            .ok()
                            .and_then(|body| body.message)
                            .unwrap_or_else(|| {
                                if text.trim().is_empty() { "Unknown error".to_string() } else { text }
                            });
                        warn!(
                            "[notification-link] Inbox server error: status={} message=\"{}\"",
                            status, message
                        );
                        return Err(LinkError::ServerError {
                            status_code: status.as_u16(),
                            message,
                        });
                    }

                    let body: T = serde_json::from_str(&text)?;
                    if !body.success() {
                        let message =
                            body.message().unwrap_or("Request was not successful").to_string();
                        warn!("[notification-link] Inbox request rejected: {}", message);
                        return Err(LinkError::ServerError {
                            status_code: status.as_u16(),
                            message,
                        });
                    }
                    return Ok(body);
                },
                Err(e) if retries < MAX_RETRIES && e.is_transient() => {
                    warn!(
                        "[notification-link] Retriable inbox error (attempt {}/{}): {}",
                        retries + 1,
                        MAX_RETRIES + 1,
                        e
                    );
                    retries += 1;
                    tokio::time::sleep(std::time::Duration::from_millis(100 * retries as u64)).await;
                },
                Err(e) => {
                    warn!(
                        "[notification-link] Inbox request failed: {} total_ms={}",
                        e,
                        overall_start.elapsed().as_millis()
                    );
                    return Err(e);
                },
            }
        }
    }
}
