//! Per-user notification channel with bounded reconnection.
//!
//! [`NotificationChannel`] is the public handle. Each `connect` spawns one
//! background task that owns the transport session and:
//!
//! - Subscribes the user queue (and the optional broadcast topic) once the
//!   session is ready
//! - Decodes inbound frames and hands them to the caller's handler in order
//! - Retries lost sessions after a fixed delay, up to a bounded number of
//!   consecutive attempts
//! - Tears everything down on `disconnect` or when the handle is dropped
//!
//! Observable state lives in a small shared core guarded by a mutex that is
//! never held across an `.await`. Every write from a task carries that
//! task's generation, so updates from a superseded task are ignored.

use crate::{
    auth::AuthProvider,
    error::Result,
    event_handlers::{
        ConnectionError, DisconnectReason, EventHandlers, NotificationHandler, OnConnectCallback,
    },
    models::{ChannelOptions, ChannelState, Destination, NotificationEvent, SubscriptionInfo},
    stomp::StompTransport,
    timeouts::LinkTimeouts,
    transport::{Session, SessionEvent, SessionRequest, SubscriptionId, Transport},
};
use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant as TokioInstant};

/// Capacity of the command queue into the background task.
const COMMAND_CHANNEL_CAPACITY: usize = 8;

/// Far enough into the future to be effectively "never".
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ── Shared core ─────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct ChannelCore {
    state: ChannelState,
    attempts_used: u32,
    /// Bumped by every `connect` and `disconnect`; tasks only write while
    /// their own generation is current.
    generation: u64,
    subscriptions: Vec<SubscriptionInfo>,
}

type SharedCore = Arc<Mutex<ChannelCore>>;

fn lock_core(core: &Mutex<ChannelCore>) -> MutexGuard<'_, ChannelCore> {
    core.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ── Commands ────────────────────────────────────────────────────────────────

/// Commands sent from the public handle to the background task.
enum ChannelCommand {
    /// Unsubscribe everything, close the session and stop. `done_tx` fires
    /// once the session is closed.
    Shutdown { done_tx: oneshot::Sender<()> },
}

struct TaskHandle {
    cmd_tx: mpsc::Sender<ChannelCommand>,
    join: JoinHandle<()>,
}

// ── NotificationChannel (public handle) ─────────────────────────────────────

/// Real-time notification channel for one signed-in user.
///
/// All methods take `&self`; share the channel behind an `Arc`.
///
/// ```rust,no_run
/// use notification_link::{ChannelOptions, NotificationChannel, NotificationEvent};
///
/// # async fn run() {
/// let channel = NotificationChannel::stomp(ChannelOptions::default());
/// channel.connect(
///     "42",
///     |event: NotificationEvent| println!("{:?}", event.title()),
///     None,
/// );
/// // ...
/// channel.disconnect().await;
/// # }
/// ```
pub struct NotificationChannel {
    transport: Arc<dyn Transport>,
    options: ChannelOptions,
    timeouts: LinkTimeouts,
    auth: AuthProvider,
    event_handlers: EventHandlers,
    core: SharedCore,
    task: Mutex<Option<TaskHandle>>,
}

impl std::fmt::Debug for NotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = lock_core(&self.core);
        f.debug_struct("NotificationChannel")
            .field("endpoint_url", &self.options.endpoint_url)
            .field("state", &core.state)
            .field("attempts_used", &core.attempts_used)
            .field("subscriptions", &core.subscriptions.len())
            .finish()
    }
}

impl NotificationChannel {
    /// Channel over a custom transport with default timeouts and no auth.
    pub fn new(transport: impl Transport, options: ChannelOptions) -> Self {
        Self::builder().options(options).transport(transport).build()
    }

    /// Channel over STOMP/WebSocket.
    pub fn stomp(options: ChannelOptions) -> Self {
        Self::builder().options(options).build()
    }

    pub fn builder() -> NotificationChannelBuilder {
        NotificationChannelBuilder::default()
    }

    /// Begin a session for `user_id` and return immediately.
    ///
    /// Ignored when already connected or when `user_id` is blank. A
    /// connection attempt still in flight, a pending retry, or a channel
    /// that gave up after exhausting its retries is replaced by a fresh
    /// session. Must be called from within a tokio runtime.
    pub fn connect(
        &self,
        user_id: &str,
        handler: impl NotificationHandler,
        on_connect: Option<OnConnectCallback>,
    ) {
        if user_id.trim().is_empty() {
            log::debug!("[notification-link] connect() ignored: empty user id");
            return;
        }
        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                log::error!("[notification-link] connect() called outside a tokio runtime");
                return;
            },
        };

        let mut slot = self.task_slot();
        let generation = {
            let mut core = lock_core(&self.core);
            if core.state == ChannelState::Connected {
                log::debug!("[notification-link] connect() ignored: already connected");
                return;
            }
            core.generation += 1;
            core.state = ChannelState::Connecting;
            core.subscriptions.clear();
            core.generation
        };

        if let Some(previous) = slot.take() {
            log::debug!("[notification-link] Superseding previous channel task");
            let (done_tx, _done_rx) = oneshot::channel();
            let _ = previous.cmd_tx.try_send(ChannelCommand::Shutdown { done_tx });
        }

        log::info!("[notification-link] Connecting user {} to {}", user_id, self.options.endpoint_url);

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let ctx = TaskContext {
            generation,
            user_id: user_id.to_string(),
            transport: Arc::clone(&self.transport),
            options: self.options.clone(),
            timeouts: self.timeouts.clone(),
            auth: self.auth.clone(),
            handler: Arc::new(handler),
            on_connect,
            event_handlers: self.event_handlers.clone(),
            core: Arc::clone(&self.core),
        };
        let join = runtime.spawn(channel_task(ctx, cmd_rx));
        *slot = Some(TaskHandle { cmd_tx, join });
    }

    /// Tear the channel down.
    ///
    /// Unsubscribes every stored subscription (each one is attempted even if
    /// an earlier one fails), closes the session and returns to `Idle`. A
    /// pending retry or an in-flight connection attempt is cancelled. When
    /// nothing is running this makes no transport calls.
    pub async fn disconnect(&self) {
        let (handle, generation) = {
            let mut slot = self.task_slot();
            let mut core = lock_core(&self.core);
            core.generation += 1;
            (slot.take(), core.generation)
        };

        if let Some(handle) = handle {
            let (done_tx, done_rx) = oneshot::channel();
            let delivered = handle.cmd_tx.send(ChannelCommand::Shutdown { done_tx }).await.is_ok();
            if delivered {
                let shutdown_timeout = self.timeouts.shutdown_timeout;
                let finished = if LinkTimeouts::is_no_timeout(shutdown_timeout) {
                    let _ = done_rx.await;
                    true
                } else {
                    tokio::time::timeout(shutdown_timeout, done_rx).await.is_ok()
                };
                if !finished {
                    log::warn!(
                        "[notification-link] Channel task did not stop within {:?}; aborting",
                        shutdown_timeout
                    );
                    handle.join.abort();
                }
            }
        } else {
            log::debug!("[notification-link] disconnect() with no active session");
        }

        let mut core = lock_core(&self.core);
        if core.generation == generation {
            core.state = ChannelState::Idle;
            core.subscriptions.clear();
        }
        log::info!("[notification-link] Disconnected");
    }

    /// Whether a session is established and subscribed.
    pub fn is_connected(&self) -> bool {
        lock_core(&self.core).state.is_connected()
    }

    pub fn state(&self) -> ChannelState {
        lock_core(&self.core).state
    }

    /// Consecutive reconnection attempts used since the last successful session.
    pub fn reconnect_attempts(&self) -> u32 {
        lock_core(&self.core).attempts_used
    }

    /// Snapshot of the subscriptions held by the current session.
    pub fn subscriptions(&self) -> Vec<SubscriptionInfo> {
        lock_core(&self.core).subscriptions.clone()
    }

    pub fn options(&self) -> &ChannelOptions {
        &self.options
    }

    fn task_slot(&self) -> MutexGuard<'_, Option<TaskHandle>> {
        self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Builder for [`NotificationChannel`].
#[derive(Default)]
pub struct NotificationChannelBuilder {
    options: ChannelOptions,
    timeouts: LinkTimeouts,
    auth: AuthProvider,
    event_handlers: EventHandlers,
    transport: Option<Arc<dyn Transport>>,
}

impl NotificationChannelBuilder {
    pub fn options(mut self, options: ChannelOptions) -> Self {
        self.options = options;
        self
    }

    pub fn timeouts(mut self, timeouts: LinkTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn auth(mut self, auth: AuthProvider) -> Self {
        self.auth = auth;
        self
    }

    pub fn event_handlers(mut self, event_handlers: EventHandlers) -> Self {
        self.event_handlers = event_handlers;
        self
    }

    /// Use a custom transport instead of STOMP/WebSocket.
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn build(self) -> NotificationChannel {
        NotificationChannel {
            transport: self.transport.unwrap_or_else(|| Arc::new(StompTransport::new())),
            options: self.options,
            timeouts: self.timeouts,
            auth: self.auth,
            event_handlers: self.event_handlers,
            core: SharedCore::default(),
            task: Mutex::new(None),
        }
    }
}

// ── Background task ─────────────────────────────────────────────────────────

/// Everything one connect cycle needs, owned by its task.
struct TaskContext {
    generation: u64,
    user_id: String,
    transport: Arc<dyn Transport>,
    options: ChannelOptions,
    timeouts: LinkTimeouts,
    auth: AuthProvider,
    handler: Arc<dyn NotificationHandler>,
    on_connect: Option<OnConnectCallback>,
    event_handlers: EventHandlers,
    core: SharedCore,
}

impl TaskContext {
    /// Apply `f` if this task is still current. Returns `false` otherwise.
    fn update(&self, f: impl FnOnce(&mut ChannelCore)) -> bool {
        let mut core = lock_core(&self.core);
        if core.generation != self.generation {
            return false;
        }
        f(&mut core);
        true
    }

    fn is_current(&self) -> bool {
        lock_core(&self.core).generation == self.generation
    }

    fn session_request(&self) -> SessionRequest {
        SessionRequest {
            endpoint_url: self.options.endpoint_url.clone(),
            sockjs_endpoint: self.options.sockjs_endpoint,
            heartbeat_outgoing_ms: self.options.heartbeat_outgoing_ms,
            heartbeat_incoming_ms: self.options.heartbeat_incoming_ms,
            auth: self.auth.clone(),
            send_timeout: self.timeouts.send_timeout,
        }
    }

    fn destinations(&self) -> Vec<Destination> {
        let mut destinations = vec![Destination::user_queue(&self.user_id)];
        if let Some(topic) = &self.options.broadcast_topic {
            destinations.push(Destination::new(topic.clone()));
        }
        destinations
    }
}

/// How one session ended.
enum SessionOutcome {
    /// Shut down on request, or superseded by a newer task.
    Stop,
    /// Lost for `reason`; eligible for retry.
    Lost(DisconnectReason),
}

/// Marks the channel `Disconnected` if its task unwinds while still current.
struct UnwindGuard {
    core: SharedCore,
    generation: u64,
}

impl Drop for UnwindGuard {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            return;
        }
        let mut core = lock_core(&self.core);
        if core.generation == self.generation {
            log::error!("[notification-link] Channel task panicked; marking channel disconnected");
            core.state = ChannelState::Disconnected;
            core.subscriptions.clear();
        }
    }
}

async fn channel_task(ctx: TaskContext, mut cmd_rx: mpsc::Receiver<ChannelCommand>) {
    let _guard = UnwindGuard {
        core: Arc::clone(&ctx.core),
        generation: ctx.generation,
    };
    loop {
        if !ctx.update(|core| core.state = ChannelState::Connecting) {
            return;
        }

        let reason = match run_session(&ctx, &mut cmd_rx).await {
            SessionOutcome::Stop => return,
            SessionOutcome::Lost(reason) => reason,
        };

        let marked = ctx.update(|core| {
            core.state = ChannelState::Disconnected;
            core.subscriptions.clear();
        });
        if !marked {
            return;
        }
        log::warn!("[notification-link] Session lost: {}", reason);
        ctx.event_handlers.emit_disconnect(reason);

        if !wait_for_retry(&ctx, &mut cmd_rx).await {
            return;
        }
    }
}

/// Decide whether to retry and sleep out the delay. Returns `true` to
/// start another attempt.
async fn wait_for_retry(ctx: &TaskContext, cmd_rx: &mut mpsc::Receiver<ChannelCommand>) -> bool {
    let max_attempts = ctx.options.max_reconnect_attempts;
    let mut attempt = None;
    let current = ctx.update(|core| {
        if core.attempts_used < max_attempts {
            core.attempts_used += 1;
            attempt = Some(core.attempts_used);
        }
    });
    if !current {
        return false;
    }

    let Some(attempt) = attempt else {
        log::error!(
            "[notification-link] Giving up after {} reconnection attempts",
            max_attempts
        );
        ctx.event_handlers.emit_error(ConnectionError::new(
            format!("Reconnection failed after {} attempts", max_attempts),
            false,
        ));
        return false;
    };

    let delay = ctx.options.reconnect_delay();
    log::info!(
        "[notification-link] Reconnecting in {:?} (attempt {}/{})",
        delay,
        attempt,
        max_attempts
    );

    tokio::select! {
        biased;
        cmd = cmd_rx.recv() => {
            log::debug!("[notification-link] Pending reconnection cancelled");
            acknowledge(cmd);
            false
        }
        _ = sleep(delay) => true,
    }
}

fn acknowledge(cmd: Option<ChannelCommand>) {
    if let Some(ChannelCommand::Shutdown { done_tx }) = cmd {
        let _ = done_tx.send(());
    }
}

async fn run_session(ctx: &TaskContext, cmd_rx: &mut mpsc::Receiver<ChannelCommand>) -> SessionOutcome {
    let connection_timeout = ctx.timeouts.connection_timeout;
    let has_deadline = !LinkTimeouts::is_no_timeout(connection_timeout);
    let deadline = TokioInstant::now() + if has_deadline { connection_timeout } else { FAR_FUTURE };

    let opened = tokio::select! {
        biased;
        cmd = cmd_rx.recv() => {
            acknowledge(cmd);
            return SessionOutcome::Stop;
        }
        result = tokio::time::timeout_at(deadline, ctx.transport.open_session(ctx.session_request())) => result,
    };

    let mut session = match opened {
        Ok(Ok(session)) => session,
        Ok(Err(e)) => {
            return SessionOutcome::Lost(DisconnectReason::new(format!("Connection failed: {}", e)));
        },
        Err(_) => {
            return SessionOutcome::Lost(DisconnectReason::new(format!(
                "Connection timed out after {:?}",
                connection_timeout
            )));
        },
    };

    let handshake = sleep_until(deadline);
    tokio::pin!(handshake);
    let mut ready = false;
    let mut subscriptions: Vec<SubscriptionId> = Vec::new();

    loop {
        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                shutdown_session(session.as_mut(), &subscriptions).await;
                acknowledge(cmd);
                return SessionOutcome::Stop;
            }

            _ = &mut handshake, if has_deadline && !ready => {
                let _ = session.close().await;
                return SessionOutcome::Lost(DisconnectReason::new(format!(
                    "Handshake not completed within {:?}",
                    connection_timeout
                )));
            }

            event = session.next_event() => match event {
                Some(SessionEvent::Ready) => {
                    if ready {
                        log::debug!("[notification-link] Duplicate ready event ignored");
                        continue;
                    }
                    match establish(ctx, session.as_mut()).await {
                        Ok(Some(ids)) => {
                            ready = true;
                            subscriptions = ids;
                        },
                        Ok(None) => {
                            let _ = session.close().await;
                            return SessionOutcome::Stop;
                        },
                        Err(e) => {
                            log::warn!("[notification-link] Subscribe failed: {}", e);
                            let _ = session.close().await;
                            return SessionOutcome::Lost(DisconnectReason::new(format!(
                                "Subscribe failed: {}",
                                e
                            )));
                        },
                    }
                },
                Some(SessionEvent::Frame { subscription, body }) => {
                    if subscriptions.contains(&subscription) && ctx.is_current() {
                        dispatch(ctx, &subscription, &body);
                    } else {
                        log::debug!(
                            "[notification-link] Frame for unknown subscription {} dropped",
                            subscription
                        );
                    }
                },
                Some(SessionEvent::ProtocolError(message)) => {
                    log::error!("[notification-link] Protocol error: {}", message);
                    subscriptions.clear();
                    let current = ctx.update(|core| {
                        core.state = ChannelState::Disconnected;
                        core.subscriptions.clear();
                    });
                    if !current {
                        let _ = session.close().await;
                        return SessionOutcome::Stop;
                    }
                    ctx.event_handlers.emit_error(ConnectionError::new(message, true));
                },
                Some(SessionEvent::Closed(reason)) => return SessionOutcome::Lost(reason),
                None => return SessionOutcome::Lost(DisconnectReason::new("Session ended")),
            }
        }
    }
}

/// Subscribe every destination, publish the session as connected and fire
/// `on_connect`. `Ok(None)` means this task was superseded meanwhile.
async fn establish(ctx: &TaskContext, session: &mut dyn Session) -> Result<Option<Vec<SubscriptionId>>> {
    let mut ids = Vec::new();
    let mut records = Vec::new();
    for destination in ctx.destinations() {
        let id = session.subscribe(&destination).await?;
        log::info!("[notification-link] Subscribed {} as {}", destination, id);
        records.push(SubscriptionInfo {
            id: id.as_str().to_string(),
            destination,
            created_at_ms: now_ms(),
            last_event_time_ms: None,
            delivered: 0,
        });
        ids.push(id);
    }

    let current = ctx.update(|core| {
        core.attempts_used = 0;
        core.subscriptions = records;
        core.state = ChannelState::Connected;
    });
    if !current {
        return Ok(None);
    }

    if let Some(on_connect) = &ctx.on_connect {
        if catch_unwind(AssertUnwindSafe(|| on_connect())).is_err() {
            log::error!("[notification-link] on_connect callback panicked");
        }
    }
    Ok(Some(ids))
}

fn dispatch(ctx: &TaskContext, subscription: &SubscriptionId, body: &str) {
    ctx.event_handlers.emit_receive(body);

    let event = match NotificationEvent::from_json(body) {
        Ok(event) => event,
        Err(e) => {
            log::warn!(
                "[notification-link] Dropping undecodable notification on {}: {}",
                subscription,
                e
            );
            return;
        },
    };

    if catch_unwind(AssertUnwindSafe(|| ctx.handler.on_notification(event))).is_err() {
        log::error!(
            "[notification-link] Notification handler panicked on {}; event dropped",
            subscription
        );
        return;
    }
    ctx.update(|core| {
        if let Some(info) = core.subscriptions.iter_mut().find(|s| s.id == subscription.as_str()) {
            info.delivered += 1;
            info.last_event_time_ms = Some(now_ms());
        }
    });
}

/// Unsubscribe everything (continuing past failures) and close the session.
async fn shutdown_session(session: &mut dyn Session, subscriptions: &[SubscriptionId]) {
    for id in subscriptions {
        if let Err(e) = session.unsubscribe(id).await {
            log::warn!("[notification-link] Unsubscribe {} failed: {}", id, e);
        }
    }
    if let Err(e) = session.close().await {
        log::warn!("[notification-link] Session close failed: {}", e);
    }
}

