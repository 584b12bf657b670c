//! Scripted transport and helpers shared by the channel integration tests.
//!
//! [`fake_transport`] returns the transport to hand to the channel plus a
//! [`FakeControl`] the test keeps. Every session the channel opens shows up
//! on the control as a [`FakeSessionHandle`] that drives it.

#![allow(dead_code)]

use async_trait::async_trait;
use notification_link::{
    ConnectionError, Destination, DisconnectReason, LinkError, NotificationEvent, Result, Session,
    SessionEvent, SessionRequest, SubscriptionId, Transport,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Let spawned tasks run without advancing the paused clock.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

// ── Transport ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct TransportState {
    opens: Mutex<Vec<Instant>>,
    requests: Mutex<Vec<SessionRequest>>,
    refuse_next: AtomicU32,
    refuse_all: AtomicBool,
    hang_next: AtomicU32,
}

#[derive(Clone)]
pub struct FakeTransport {
    state: Arc<TransportState>,
    sessions_tx: mpsc::UnboundedSender<FakeSessionHandle>,
}

pub struct FakeControl {
    state: Arc<TransportState>,
    sessions_rx: mpsc::UnboundedReceiver<FakeSessionHandle>,
}

pub fn fake_transport() -> (FakeTransport, FakeControl) {
    let state = Arc::new(TransportState::default());
    let (sessions_tx, sessions_rx) = mpsc::unbounded_channel();
    (
        FakeTransport {
            state: Arc::clone(&state),
            sessions_tx,
        },
        FakeControl { state, sessions_rx },
    )
}

#[async_trait]
impl Transport for FakeTransport {
    async fn open_session(&self, request: SessionRequest) -> Result<Box<dyn Session>> {
        self.state.opens.lock().unwrap().push(Instant::now());
        self.state.requests.lock().unwrap().push(request);

        if self.state.hang_next.load(Ordering::SeqCst) > 0 {
            self.state.hang_next.fetch_sub(1, Ordering::SeqCst);
            std::future::pending::<()>().await;
        }
        if self.state.refuse_all.load(Ordering::SeqCst) {
            return Err(LinkError::WebSocketError("Connection refused".to_string()));
        }
        if self.state.refuse_next.load(Ordering::SeqCst) > 0 {
            self.state.refuse_next.fetch_sub(1, Ordering::SeqCst);
            return Err(LinkError::WebSocketError("Connection refused".to_string()));
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Mutex::new(SessionState::default()));
        let handle = FakeSessionHandle {
            events_tx: events_tx.clone(),
            shared: Arc::clone(&shared),
        };
        let _ = self.sessions_tx.send(handle);
        Ok(Box::new(FakeSession {
            events_rx,
            _events_tx: events_tx,
            shared,
        }))
    }
}

impl FakeControl {
    /// Wait for the channel to open its next session.
    pub async fn next_session(&mut self) -> FakeSessionHandle {
        self.sessions_rx.recv().await.expect("transport dropped")
    }

    /// Next session if one was already opened.
    pub fn try_next_session(&mut self) -> Option<FakeSessionHandle> {
        self.sessions_rx.try_recv().ok()
    }

    pub fn refuse_next(&self, count: u32) {
        self.state.refuse_next.store(count, Ordering::SeqCst);
    }

    pub fn refuse_all(&self, refuse: bool) {
        self.state.refuse_all.store(refuse, Ordering::SeqCst);
    }

    /// Make the next `count` opens never complete.
    pub fn hang_next(&self, count: u32) {
        self.state.hang_next.store(count, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> usize {
        self.state.opens.lock().unwrap().len()
    }

    pub fn open_times(&self) -> Vec<Instant> {
        self.state.opens.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<SessionRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

// ── Session ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct SessionState {
    next_id: u64,
    subscribed: Vec<(SubscriptionId, Destination)>,
    unsubscribe_calls: Vec<SubscriptionId>,
    fail_subscribe: bool,
    fail_unsubscribe: bool,
    crash: bool,
    closed: bool,
}

struct FakeSession {
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    _events_tx: mpsc::UnboundedSender<SessionEvent>,
    shared: Arc<Mutex<SessionState>>,
}

#[async_trait]
impl Session for FakeSession {
    async fn next_event(&mut self) -> Option<SessionEvent> {
        let event = self.events_rx.recv().await;
        if self.shared.lock().unwrap().crash {
            panic!("fake session crashed");
        }
        event
    }

    async fn subscribe(&mut self, destination: &Destination) -> Result<SubscriptionId> {
        let mut state = self.shared.lock().unwrap();
        if state.fail_subscribe {
            return Err(LinkError::WebSocketError("subscribe rejected".to_string()));
        }
        let id = SubscriptionId::new(format!("sub-{}", state.next_id));
        state.next_id += 1;
        state.subscribed.push((id.clone(), destination.clone()));
        Ok(id)
    }

    async fn unsubscribe(&mut self, id: &SubscriptionId) -> Result<()> {
        let mut state = self.shared.lock().unwrap();
        state.unsubscribe_calls.push(id.clone());
        if state.fail_unsubscribe {
            return Err(LinkError::WebSocketError("unsubscribe rejected".to_string()));
        }
        state.subscribed.retain(|(existing, _)| existing != id);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.shared.lock().unwrap().closed = true;
        Ok(())
    }
}

/// Test-side driver of one fake session.
#[derive(Clone)]
pub struct FakeSessionHandle {
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    shared: Arc<Mutex<SessionState>>,
}

impl FakeSessionHandle {
    pub fn ready(&self) {
        let _ = self.events_tx.send(SessionEvent::Ready);
    }

    pub fn frame(&self, subscription: &str, body: &str) {
        let _ = self.events_tx.send(SessionEvent::Frame {
            subscription: SubscriptionId::new(subscription),
            body: body.to_string(),
        });
    }

    pub fn protocol_error(&self, message: &str) {
        let _ = self.events_tx.send(SessionEvent::ProtocolError(message.to_string()));
    }

    pub fn drop_connection(&self, message: &str) {
        let _ = self
            .events_tx
            .send(SessionEvent::Closed(DisconnectReason::with_code(message, 1006)));
    }

    /// Make the session panic inside the channel task on its next event.
    pub fn crash(&self) {
        self.shared.lock().unwrap().crash = true;
        let _ = self.events_tx.send(SessionEvent::Ready);
    }

    pub fn fail_subscribe(&self) {
        self.shared.lock().unwrap().fail_subscribe = true;
    }

    pub fn fail_unsubscribe(&self) {
        self.shared.lock().unwrap().fail_unsubscribe = true;
    }

    /// Subscriptions currently bound on the session.
    pub fn subscribed(&self) -> Vec<(SubscriptionId, Destination)> {
        self.shared.lock().unwrap().subscribed.clone()
    }

    pub fn unsubscribe_calls(&self) -> Vec<SubscriptionId> {
        self.shared.lock().unwrap().unsubscribe_calls.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().unwrap().closed
    }
}

// ── Recorders ───────────────────────────────────────────────────────────────

/// Collects everything a channel reports.
#[derive(Clone, Default)]
pub struct Recorder {
    pub events: Arc<Mutex<Vec<NotificationEvent>>>,
    pub connects: Arc<AtomicU32>,
    pub disconnects: Arc<Mutex<Vec<DisconnectReason>>>,
    pub errors: Arc<Mutex<Vec<ConnectionError>>>,
    pub raw: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn handler(&self) -> impl Fn(NotificationEvent) + Send + Sync + 'static {
        let events = Arc::clone(&self.events);
        move |event| events.lock().unwrap().push(event)
    }

    pub fn on_connect(&self) -> Option<notification_link::OnConnectCallback> {
        let connects = Arc::clone(&self.connects);
        Some(Arc::new(move || {
            connects.fetch_add(1, Ordering::SeqCst);
        }))
    }

    pub fn event_handlers(&self) -> notification_link::EventHandlers {
        let disconnects = Arc::clone(&self.disconnects);
        let errors = Arc::clone(&self.errors);
        let raw = Arc::clone(&self.raw);
        notification_link::EventHandlers::new()
            .on_disconnect(move |reason| disconnects.lock().unwrap().push(reason))
            .on_error(move |error| errors.lock().unwrap().push(error))
            .on_receive(move |body| raw.lock().unwrap().push(body.to_string()))
    }

    pub fn event_ids(&self) -> Vec<i64> {
        self.events.lock().unwrap().iter().filter_map(|e| e.id()).collect()
    }

    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn errors(&self) -> Vec<ConnectionError> {
        self.errors.lock().unwrap().clone()
    }

    pub fn disconnects(&self) -> Vec<DisconnectReason> {
        self.disconnects.lock().unwrap().clone()
    }
}

pub fn notification_json(id: i64, title: &str) -> String {
    serde_json::json!({
        "id": id,
        "userId": 1,
        "type": "ORDER",
        "title": title,
        "content": format!("content {}", id),
        "isRead": false,
        "createdAt": "2024-01-01T10:00:00"
    })
    .to_string()
}

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}
