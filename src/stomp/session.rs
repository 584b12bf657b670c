//! STOMP-over-WebSocket implementation of [`Transport`].

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{sleep_until, Instant};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{error::Error as WsError, protocol::Message},
    MaybeTlsStream, WebSocketStream,
};
use url::Url;

use super::frame::{Command, Frame, FrameDecoder, Incoming};
use super::heartbeat::{negotiate, HeartBeat};
use crate::{
    error::{LinkError, Result},
    event_handlers::DisconnectReason,
    models::Destination,
    transport::{Session, SessionEvent, SessionRequest, SubscriptionId, Transport},
};

type WebSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const ACCEPT_VERSION: &str = "1.2,1.1,1.0";

/// Path segment a SockJS server exposes its raw WebSocket transport on.
const SOCKJS_WEBSOCKET_SUFFIX: &str = "/websocket";

/// Opens STOMP 1.2 sessions over a plain WebSocket.
#[derive(Debug, Clone, Copy, Default)]
pub struct StompTransport;

impl StompTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for StompTransport {
    async fn open_session(&self, request: SessionRequest) -> Result<Box<dyn Session>> {
        let url = resolve_ws_url(&request.endpoint_url, request.sockjs_endpoint)?;
        let host = Url::parse(&url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();

        log::debug!("[notification-link] Opening STOMP session to {}", url);

        let mut ws = match connect_async(url.as_str()).await {
            Ok((stream, _)) => stream,
            Err(WsError::Http(response)) => {
                let status = response.status();
                let body_text = response
                    .into_body()
                    .as_ref()
                    .and_then(|b| {
                        if b.is_empty() { None } else { Some(String::from_utf8_lossy(b).into_owned()) }
                    })
                    .unwrap_or_default();
                let message = match status.as_u16() {
                    401 => "Unauthorized: WebSocket requires valid credentials".to_string(),
                    403 => "Forbidden: Access to WebSocket denied".to_string(),
                    code if body_text.is_empty() => format!("WebSocket HTTP error: {}", code),
                    code => format!("WebSocket HTTP error {}: {}", code, body_text),
                };
                return Err(LinkError::WebSocketError(message));
            },
            Err(e) => return Err(LinkError::WebSocketError(format!("Connection failed: {}", e))),
        };

        let client_heartbeat =
            HeartBeat::new(request.heartbeat_outgoing_ms, request.heartbeat_incoming_ms);
        let mut connect = Frame::new(Command::Connect)
            .header("accept-version", ACCEPT_VERSION)
            .header("host", host)
            .header("heart-beat", client_heartbeat.header_value());
        if let Some(authorization) = request.auth.authorization_header() {
            connect = connect.header("Authorization", authorization);
        }

        match tokio::time::timeout(request.send_timeout, ws.send(Message::Text(connect.encode().into())))
            .await
        {
            Ok(Ok(())) => {},
            Ok(Err(e)) => {
                return Err(LinkError::WebSocketError(format!("Failed to send CONNECT: {}", e)))
            },
            Err(_) => {
                return Err(LinkError::TimeoutError(format!(
                    "CONNECT not sent within {:?}",
                    request.send_timeout
                )))
            },
        }

        Ok(Box::new(StompSession::new(ws, client_heartbeat, request.send_timeout)))
    }
}

/// One STOMP session on an open WebSocket.
pub struct StompSession {
    ws: WebSocket,
    decoder: FrameDecoder,
    pending: VecDeque<SessionEvent>,
    client_heartbeat: HeartBeat,
    send_every: Option<Duration>,
    receive_timeout: Option<Duration>,
    last_sent: Instant,
    last_received: Instant,
    next_subscription: u64,
    send_timeout: Duration,
    finished: bool,
}

impl StompSession {
    fn new(ws: WebSocket, client_heartbeat: HeartBeat, send_timeout: Duration) -> Self {
        let now = Instant::now();
        Self {
            ws,
            decoder: FrameDecoder::new(),
            pending: VecDeque::new(),
            client_heartbeat,
            send_every: None,
            receive_timeout: None,
            last_sent: now,
            last_received: now,
            next_subscription: 0,
            send_timeout,
            finished: false,
        }
    }

    fn finish(&mut self, reason: DisconnectReason) {
        if !self.finished {
            self.finished = true;
            self.pending.push_back(SessionEvent::Closed(reason));
        }
    }

    async fn send_frame(&mut self, frame: Frame) -> Result<()> {
        if self.finished {
            return Err(LinkError::WebSocketError("Session is closed".to_string()));
        }
        let command = frame.command;
        match tokio::time::timeout(self.send_timeout, self.ws.send(Message::Text(frame.encode().into())))
            .await
        {
            Ok(Ok(())) => {
                self.last_sent = Instant::now();
                Ok(())
            },
            Ok(Err(e)) => Err(LinkError::WebSocketError(format!("Failed to send {}: {}", command, e))),
            Err(_) => Err(LinkError::TimeoutError(format!(
                "{} not sent within {:?}",
                command, self.send_timeout
            ))),
        }
    }

    async fn handle_message(&mut self, message: Option<std::result::Result<Message, WsError>>) {
        match message {
            Some(Ok(Message::Text(text))) => self.ingest(text.as_str()),
            Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                Ok(text) => {
                    let text = text.to_string();
                    self.ingest(&text);
                },
                Err(_) => {
                    log::warn!("[notification-link] Dropping non UTF-8 binary message ({} bytes)", data.len());
                },
            },
            Some(Ok(Message::Close(frame))) => {
                let reason = match frame {
                    Some(frame) => {
                        let text = frame.reason.to_string();
                        let message =
                            if text.is_empty() { "Server closed connection".to_string() } else { text };
                        DisconnectReason::with_code(message, u16::from(frame.code))
                    },
                    None => DisconnectReason::new("Server closed connection"),
                };
                log::info!("[notification-link] WebSocket closed by server: {}", reason);
                self.finish(reason);
            },
            Some(Ok(Message::Ping(payload))) => {
                let _ = self.ws.send(Message::Pong(payload)).await;
            },
            Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {},
            Some(Err(e)) => {
                log::warn!("[notification-link] WebSocket error: {}", e);
                self.finish(DisconnectReason::new(format!("WebSocket error: {}", e)));
            },
            None => self.finish(DisconnectReason::new("WebSocket stream ended")),
        }
    }

    fn ingest(&mut self, text: &str) {
        let items = match self.decoder.push(text) {
            Ok(items) => items,
            Err(e) => {
                log::error!("[notification-link] Unreadable STOMP stream: {}", e);
                self.pending.push_back(SessionEvent::ProtocolError(e.to_string()));
                self.finish(DisconnectReason::new("Malformed STOMP frame"));
                return;
            },
        };

        for item in items {
            match item {
                Incoming::Heartbeat => log::trace!("[notification-link] heart-beat received"),
                Incoming::Frame(frame) => self.on_frame(frame),
            }
        }
    }

    fn on_frame(&mut self, frame: Frame) {
        match frame.command {
            Command::Connected => {
                let server = match frame.get("heart-beat").map(HeartBeat::parse) {
                    Some(Ok(hb)) => hb,
                    Some(Err(e)) => {
                        log::warn!("[notification-link] {}; heart-beats disabled", e);
                        HeartBeat::default()
                    },
                    None => HeartBeat::default(),
                };
                let negotiated = negotiate(self.client_heartbeat, server);
                self.send_every = negotiated.send_every;
                self.receive_timeout = negotiated.receive_timeout();
                log::debug!(
                    "[notification-link] STOMP CONNECTED (version={}, send_every={:?}, receive_timeout={:?})",
                    frame.get("version").unwrap_or("1.0"),
                    self.send_every,
                    self.receive_timeout
                );
                self.pending.push_back(SessionEvent::Ready);
            },
            Command::Message => match frame.get("subscription") {
                Some(id) => {
                    let subscription = SubscriptionId::new(id);
                    self.pending.push_back(SessionEvent::Frame {
                        subscription,
                        body: frame.body,
                    });
                },
                None => log::warn!("[notification-link] MESSAGE frame without subscription header dropped"),
            },
            Command::Error => {
                let summary = frame.get("message").unwrap_or("STOMP error").to_string();
                let message = if frame.body.trim().is_empty() {
                    summary
                } else {
                    format!("{}: {}", summary, frame.body.trim())
                };
                log::error!("[notification-link] Server ERROR frame: {}", message);
                self.pending.push_back(SessionEvent::ProtocolError(message));
            },
            Command::Receipt => {
                log::debug!("[notification-link] RECEIPT {}", frame.get("receipt-id").unwrap_or("?"));
            },
            other => log::debug!("[notification-link] Ignoring unexpected {} frame", other),
        }
    }
}

#[async_trait]
impl Session for StompSession {
    async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if self.finished {
                return None;
            }

            let far_future = Instant::now() + Duration::from_secs(86_400);
            let send_at = self.send_every.map(|every| self.last_sent + every);
            let dead_at = self.receive_timeout.map(|timeout| self.last_received + timeout);
            let send_sleep = sleep_until(send_at.unwrap_or(far_future));
            let dead_sleep = sleep_until(dead_at.unwrap_or(far_future));
            tokio::pin!(send_sleep, dead_sleep);

            tokio::select! {
                biased;

                _ = &mut dead_sleep, if dead_at.is_some() => {
                    let silence = self.receive_timeout.unwrap_or_default();
                    log::warn!("[notification-link] No data from server for {:?}, closing", silence);
                    let _ = self.ws.close(None).await;
                    self.finish(DisconnectReason::new(format!("Heart-beat timeout after {:?}", silence)));
                }

                message = self.ws.next() => {
                    self.last_received = Instant::now();
                    self.handle_message(message).await;
                }

                _ = &mut send_sleep, if send_at.is_some() => {
                    match self.ws.send(Message::Text("\n".into())).await {
                        Ok(()) => self.last_sent = Instant::now(),
                        Err(e) => {
                            log::warn!("[notification-link] Failed to send heart-beat: {}", e);
                            self.finish(DisconnectReason::new(format!("Heart-beat send failed: {}", e)));
                        },
                    }
                }
            }
        }
    }

    async fn subscribe(&mut self, destination: &Destination) -> Result<SubscriptionId> {
        let id = SubscriptionId::new(format!("sub-{}", self.next_subscription));
        self.next_subscription += 1;
        let frame = Frame::new(Command::Subscribe)
            .header("id", id.as_str())
            .header("destination", destination.as_str())
            .header("ack", "auto");
        self.send_frame(frame).await?;
        log::debug!("[notification-link] SUBSCRIBE {} -> {}", id, destination);
        Ok(id)
    }

    async fn unsubscribe(&mut self, id: &SubscriptionId) -> Result<()> {
        self.send_frame(Frame::new(Command::Unsubscribe).header("id", id.as_str())).await
    }

    async fn close(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        if let Err(e) = self.send_frame(Frame::new(Command::Disconnect)).await {
            log::debug!("[notification-link] DISCONNECT not delivered: {}", e);
        }
        let _ = self.ws.close(None).await;
        self.finished = true;
        self.pending.clear();
        Ok(())
    }
}

/// Turn the configured endpoint into the WebSocket URL to dial.
///
/// `http`/`https` map to `ws`/`wss`. A SockJS endpoint is reached through
/// its raw WebSocket transport at `<endpoint>/websocket`.
pub fn resolve_ws_url(endpoint_url: &str, sockjs_endpoint: bool) -> Result<String> {
    let mut url = Url::parse(endpoint_url.trim()).map_err(|e| {
        LinkError::ConfigurationError(format!("Invalid endpoint_url '{}': {}", endpoint_url, e))
    })?;

    validate_ws_url(&url)?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(LinkError::ConfigurationError(format!(
                "Unsupported endpoint_url scheme '{}'; expected http(s) or ws(s)",
                other
            )));
        },
    };
    url.set_scheme(scheme).map_err(|_| {
        LinkError::ConfigurationError("Failed to set WebSocket URL scheme".to_string())
    })?;

    let base_path = url.path().trim_end_matches('/').to_string();
    if sockjs_endpoint {
        url.set_path(&format!("{}{}", base_path, SOCKJS_WEBSOCKET_SUFFIX));
    } else if !base_path.is_empty() {
        url.set_path(&base_path);
    }

    Ok(url.to_string())
}

fn validate_ws_url(url: &Url) -> Result<()> {
    if url.host_str().is_none() {
        return Err(LinkError::ConfigurationError("endpoint_url must include a host".to_string()));
    }

    if !url.username().is_empty() || url.password().is_some() {
        return Err(LinkError::ConfigurationError(
            "endpoint_url must not include username/password credentials".to_string(),
        ));
    }

    if url.query().is_some() || url.fragment().is_some() {
        return Err(LinkError::ConfigurationError(
            "endpoint_url must not include query parameters or fragments".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_ws_url_http_sockjs() {
        assert_eq!(
            resolve_ws_url("http://localhost:8080/ws", true).unwrap(),
            "ws://localhost:8080/ws/websocket"
        );
        assert_eq!(
            resolve_ws_url("https://api.example.com/ws/", true).unwrap(),
            "wss://api.example.com/ws/websocket"
        );
    }

    #[test]
    fn test_resolve_ws_url_plain() {
        assert_eq!(
            resolve_ws_url("http://localhost:8080/ws/", false).unwrap(),
            "ws://localhost:8080/ws"
        );
        assert_eq!(resolve_ws_url("wss://example.com/stomp", false).unwrap(), "wss://example.com/stomp");
        assert_eq!(resolve_ws_url("  ws://127.0.0.1:9000  ", false).unwrap(), "ws://127.0.0.1:9000/");
    }

    #[test]
    fn test_resolve_ws_url_rejects_bad_input() {
        assert!(resolve_ws_url("not a url", false).is_err());
        assert!(resolve_ws_url("ftp://example.com/ws", false).is_err());
        assert!(resolve_ws_url("http://user:pw@example.com/ws", false).is_err());
        assert!(resolve_ws_url("http://example.com/ws?token=x", false).is_err());
        assert!(resolve_ws_url("http://example.com/ws#frag", false).is_err());
    }

    #[test]
    fn test_resolve_ws_url_error_kind() {
        match resolve_ws_url("ftp://example.com", true) {
            Err(LinkError::ConfigurationError(msg)) => assert!(msg.contains("ftp")),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
