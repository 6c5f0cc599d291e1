//! Session controller for one room participation.
//!
//! [`QuizSession`] is a thin handle over a background session loop. The loop
//! owns the connection and the [`SessionState`]; it multiplexes two ordered
//! sources with `tokio::select!`:
//!
//! - UI intents queued by the handle (answer edits, start, restart)
//! - inbound text frames from the [`Transport`]
//!
//! so no two events ever mutate the session concurrently. UI-facing updates
//! are emitted on a bounded channel ([`tokio::sync::mpsc::Receiver<SessionEvent>`])
//! returned from [`QuizSession::start`].
//!
//! # Example
//!
//! ```rust,ignore
//! let ticket = negotiator.join("Ann", "AB12CD")?;
//! let (session, mut events) = QuizSession::connect(ticket, &base, SessionConfig::default()).await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         SessionEvent::Problem { text } => println!("{text} = ?"),
//!         SessionEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, warn};

use crate::error::{QuizError, Result};
use crate::event::SessionEvent;
use crate::negotiator::RoomTicket;
use crate::protocol::ServerMessage;
use crate::session::{AnswerMode, Phase, Role, SessionState, SessionView};
use crate::transport::Transport;

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`QuizSession`].
///
/// ```
/// use arith_quiz_client::client::SessionConfig;
/// use arith_quiz_client::session::AnswerMode;
///
/// let config = SessionConfig::default()
///     .with_answer_mode(AnswerMode::OnSubmit)
///     .with_close_on_finish(false);
/// assert_eq!(config.answer_mode, AnswerMode::OnSubmit);
/// assert!(!config.close_on_finish);
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Whether answers go out on every edit or on explicit submit.
    /// Defaults to [`AnswerMode::OnEdit`].
    pub answer_mode: AnswerMode,
    /// Close the connection when `FINISH:` arrives. Defaults to **true**.
    ///
    /// With the connection closed, a later `restart` has nothing to send on;
    /// turn this off for servers that run another round on `RESTART`.
    pub close_on_finish: bool,
    /// Capacity of the bounded event channel.
    ///
    /// Events are never dropped. When the UI falls behind, the loop waits for
    /// room in the channel before reading the next frame.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// How long [`QuizSession::shutdown`] waits for the loop to close the
    /// connection before aborting it. Defaults to **1 second**.
    pub shutdown_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            answer_mode: AnswerMode::default(),
            close_on_finish: true,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl SessionConfig {
    /// Set the answer mode.
    #[must_use]
    pub fn with_answer_mode(mut self, mode: AnswerMode) -> Self {
        self.answer_mode = mode;
        self
    }

    /// Set whether `FINISH:` closes the connection.
    #[must_use]
    pub fn with_close_on_finish(mut self, close: bool) -> Self {
        self.close_on_finish = close;
        self
    }

    /// Set the event channel capacity. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the graceful shutdown timeout. Zero aborts immediately.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

// ── Commands ────────────────────────────────────────────────────────

/// UI intents queued to the session loop.
#[derive(Debug)]
enum Command {
    EditAnswer(String),
    SubmitAnswer,
    Start,
    Restart,
}

// ── Shared state ────────────────────────────────────────────────────

/// State shared between the handle (reads) and the session loop (writes).
struct Shared {
    connected: AtomicBool,
    state: Mutex<SessionState>,
}

// ── Session handle ──────────────────────────────────────────────────

/// Handle to one room participation.
///
/// Created by [`QuizSession::start`] (any [`Transport`]) or
/// [`QuizSession::connect`] (WebSocket). Display name, room id and role are
/// fixed for the life of the session.
///
/// Intent methods queue a command and return immediately; gating that depends
/// on the phase happens inside the loop, in order with inbound frames.
pub struct QuizSession {
    ticket: RoomTicket,
    cmd_tx: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl QuizSession {
    /// Start the session loop on an already-connected transport.
    ///
    /// # Returns
    ///
    /// The handle and the event receiver. The receiver yields
    /// [`SessionEvent::Connected`] first and [`SessionEvent::Disconnected`]
    /// last.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        transport: impl Transport,
        ticket: RoomTicket,
        config: SessionConfig,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();
        let (event_tx, event_rx) = mpsc::channel::<SessionEvent>(config.event_channel_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let shared = Arc::new(Shared {
            connected: AtomicBool::new(true),
            state: Mutex::new(SessionState::new(ticket.role.clone(), config.close_on_finish)),
        });

        let task = tokio::spawn(session_loop(
            transport,
            cmd_rx,
            event_tx,
            Arc::clone(&shared),
            shutdown_rx,
            config.answer_mode,
        ));

        let session = Self {
            ticket,
            cmd_tx,
            shared,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };
        (session, event_rx)
    }

    /// Open the session connection for `ticket` against `base` and start the loop.
    ///
    /// # Errors
    ///
    /// Returns the handshake error; it is also logged. No retry is attempted.
    #[cfg(feature = "transport-websocket")]
    pub async fn connect(
        ticket: RoomTicket,
        base: &url::Url,
        config: SessionConfig,
    ) -> Result<(Self, mpsc::Receiver<SessionEvent>)> {
        let transport = crate::transports::WebSocketTransport::connect_session(
            base,
            &ticket.room_id,
            &ticket.display_name,
        )
        .await?;
        Ok(Self::start(transport, ticket, config))
    }

    // ── Intents ─────────────────────────────────────────────────────

    /// The answer field changed to `value`.
    ///
    /// In [`AnswerMode::OnEdit`] a value that is numeric after trimming is
    /// sent at once; otherwise only the field is updated.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::NotConnected`] if the session loop has exited.
    pub fn edit_answer(&self, value: impl Into<String>) -> Result<()> {
        self.queue(Command::EditAnswer(value.into()))
    }

    /// Send the current answer field value if it is numeric.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::NotConnected`] if the session loop has exited.
    pub fn submit_answer(&self) -> Result<()> {
        self.queue(Command::SubmitAnswer)
    }

    /// Send `START` and hide the start button.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::NotOwner`] for participants and
    /// [`QuizError::NotConnected`] if the session loop has exited.
    pub fn start_round(&self) -> Result<()> {
        self.require_owner()?;
        self.queue(Command::Start)
    }

    /// Send `RESTART` and hide the restart button. Ignored by the loop unless
    /// the round has finished.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::NotOwner`] for participants and
    /// [`QuizError::NotConnected`] if the session loop has exited.
    pub fn restart(&self) -> Result<()> {
        self.require_owner()?;
        self.queue(Command::Restart)
    }

    /// Close the connection and stop the session loop.
    ///
    /// After this the event receiver yields `None` once drained.
    pub async fn shutdown(&mut self) {
        debug!("QuizSession: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("session loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("session loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("session loop aborted: {join_err}");
                    }
                }
            }
        }

        self.shared.connected.store(false, Ordering::Release);
    }

    // ── Accessors ───────────────────────────────────────────────────

    /// Display name sent on connect.
    pub fn display_name(&self) -> &str {
        &self.ticket.display_name
    }

    /// Room this session belongs to.
    pub fn room_id(&self) -> &str {
        &self.ticket.room_id
    }

    /// Role decided at negotiation.
    pub fn role(&self) -> &Role {
        &self.ticket.role
    }

    /// Returns `true` if this session created the room.
    pub fn is_owner(&self) -> bool {
        self.ticket.is_owner()
    }

    /// Returns `true` while the session loop is running on a live connection.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Current phase.
    pub async fn phase(&self) -> Phase {
        self.shared.state.lock().await.phase()
    }

    /// Snapshot of every display region.
    pub async fn view(&self) -> SessionView {
        self.shared.state.lock().await.view().clone()
    }

    /// Text of the most recent problem, if any.
    pub async fn last_problem(&self) -> Option<String> {
        self.shared.state.lock().await.last_problem().map(str::to_string)
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn require_owner(&self) -> Result<()> {
        if self.ticket.is_owner() {
            Ok(())
        } else {
            warn!("owner command refused for participant");
            Err(QuizError::NotOwner)
        }
    }

    fn queue(&self, cmd: Command) -> Result<()> {
        if !self.shared.connected.load(Ordering::Acquire) {
            return Err(QuizError::NotConnected);
        }
        self.cmd_tx.send(cmd).map_err(|_| QuizError::NotConnected)
    }
}

impl std::fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuizSession")
            .field("room_id", &self.ticket.room_id)
            .field("owner", &self.ticket.is_owner())
            .field("connected", &self.is_connected())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for QuizSession {
    fn drop(&mut self) {
        // No executor here to drive a graceful close; abort instead.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Session loop ────────────────────────────────────────────────────

/// Background loop owning the connection and the session state.
///
/// Exits when:
/// - `FINISH:` arrives and the session closes on finish
/// - the shutdown signal fires or the handle is dropped
/// - the transport closes or fails
async fn session_loop(
    mut transport: impl Transport,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: mpsc::Sender<SessionEvent>,
    shared: Arc<Shared>,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
    answer_mode: AnswerMode,
) {
    debug!("session loop started");

    emit_event(&event_tx, SessionEvent::Connected).await;
    let opened = shared.state.lock().await.connection_opened();
    for event in opened {
        emit_event(&event_tx, event).await;
    }

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    debug!("command channel closed, shutting down session loop");
                    let _ = transport.close().await;
                    emit_disconnected(&event_tx, &shared, Some("session shut down".into())).await;
                    break;
                };

                let outbound = {
                    let mut state = shared.state.lock().await;
                    match cmd {
                        Command::EditAnswer(value) => state.edit_answer(value, answer_mode),
                        Command::SubmitAnswer => state.submit_answer(),
                        Command::Start => state.start(),
                        Command::Restart => state.restart(),
                    }
                };

                if let Some(msg) = outbound {
                    let frame = msg.to_wire();
                    debug!(frame = %frame, "sending");
                    if let Err(e) = transport.send(frame).await {
                        error!("transport send error: {e}");
                        emit_disconnected(
                            &event_tx,
                            &shared,
                            Some(format!("transport send error: {e}")),
                        ).await;
                        break;
                    }
                }
            }

            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                let _ = transport.close().await;
                emit_disconnected(&event_tx, &shared, Some("session shut down".into())).await;
                break;
            }

            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => {
                        let msg = ServerMessage::parse(&text);
                        debug!(tag = msg.tag().unwrap_or("feedback"), "received");
                        let dispatch = shared.state.lock().await.apply(msg);
                        for event in dispatch.events {
                            emit_event(&event_tx, event).await;
                        }
                        if dispatch.close {
                            debug!("round finished, closing connection");
                            if let Err(e) = transport.close().await {
                                warn!("close after finish failed: {e}");
                            }
                            emit_disconnected(&event_tx, &shared, Some("round finished".into())).await;
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        emit_disconnected(
                            &event_tx,
                            &shared,
                            Some(format!("transport receive error: {e}")),
                        ).await;
                        break;
                    }
                    None => {
                        debug!("connection closed by server");
                        emit_disconnected(&event_tx, &shared, None).await;
                        break;
                    }
                }
            }
        }
    }

    debug!("session loop exited");
}

/// Emit an event, waiting for channel capacity so frames reach the UI in
/// arrival order.
async fn emit_event(event_tx: &mpsc::Sender<SessionEvent>, event: SessionEvent) {
    if event_tx.send(event).await.is_err() {
        debug!("event channel closed, receiver dropped");
    }
}

/// Mark the session disconnected and emit the final event.
///
async fn emit_disconnected(
    event_tx: &mpsc::Sender<SessionEvent>,
    shared: &Shared,
    reason: Option<String>,
) {
    shared.connected.store(false, Ordering::Release);
    if event_tx
        .send(SessionEvent::Disconnected { reason })
        .await
        .is_err()
    {
        debug!("event channel closed, receiver dropped");
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    /// Records sent frames and replays scripted inbound frames.
    struct MockTransport {
        incoming: VecDeque<Option<std::result::Result<String, QuizError>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    impl MockTransport {
        fn new(
            incoming: Vec<Option<std::result::Result<String, QuizError>>>,
        ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            let transport = Self {
                incoming: VecDeque::from(incoming),
                sent: Arc::clone(&sent),
                closed: Arc::clone(&closed),
            };
            (transport, sent, closed)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), QuizError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, QuizError>> {
            match self.incoming.pop_front() {
                Some(item) => item,
                // Script exhausted: stay open until shutdown.
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> std::result::Result<(), QuizError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    fn frames(raw: &[&str]) -> Vec<Option<std::result::Result<String, QuizError>>> {
        raw.iter().map(|f| Some(Ok((*f).to_string()))).collect()
    }

    fn participant() -> RoomTicket {
        RoomTicket {
            display_name: "Bo".into(),
            room_id: "R1".into(),
            role: Role::Participant,
        }
    }

    fn owner() -> RoomTicket {
        RoomTicket {
            display_name: "Ann".into(),
            room_id: "R1".into(),
            role: Role::Owner {
                invitation_link: "https://x/?r=R1".into(),
            },
        }
    }

    #[tokio::test]
    async fn connected_then_awaiting_start() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (mut session, mut events) =
            QuizSession::start(transport, owner(), SessionConfig::default());

        assert_eq!(events.recv().await.unwrap(), SessionEvent::Connected);
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::PhaseChanged {
                from: Phase::Idle,
                to: Phase::AwaitingStart
            }
        );
        assert_eq!(session.phase().await, Phase::AwaitingStart);
        assert!(session.view().await.start_visible);

        session.shutdown().await;
    }

    #[tokio::test]
    async fn participant_start_is_refused() {
        let (transport, sent, _closed) = MockTransport::new(vec![]);
        let (mut session, _events) =
            QuizSession::start(transport, participant(), SessionConfig::default());

        assert!(matches!(session.start_round(), Err(QuizError::NotOwner)));
        assert!(matches!(session.restart(), Err(QuizError::NotOwner)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sent.lock().unwrap().is_empty());

        session.shutdown().await;
    }

    #[tokio::test]
    async fn finish_closes_connection() {
        let (transport, _sent, closed) = MockTransport::new(frames(&["FINISH: Player A wins"]));
        let (mut session, mut events) =
            QuizSession::start(transport, owner(), SessionConfig::default());

        let mut saw_finished = false;
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::Finished {
                    results,
                    restart_available,
                } => {
                    assert_eq!(results, "Player A wins");
                    assert!(restart_available);
                    saw_finished = true;
                }
                SessionEvent::Disconnected { .. } => break,
                _ => {}
            }
        }
        assert!(saw_finished);
        assert!(closed.load(Ordering::Relaxed));
        assert!(!session.is_connected());
        assert_eq!(session.phase().await, Phase::Finished);
        assert!(matches!(session.edit_answer("1"), Err(QuizError::NotConnected)));

        session.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_closes_transport() {
        let (transport, _sent, closed) = MockTransport::new(vec![]);
        let (mut session, mut events) =
            QuizSession::start(transport, participant(), SessionConfig::default());
        let _ = events.recv().await;

        session.shutdown().await;

        assert!(closed.load(Ordering::Relaxed));
        assert!(!session.is_connected());
        assert!(matches!(session.submit_answer(), Err(QuizError::NotConnected)));
    }

    #[tokio::test]
    async fn config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.answer_mode, AnswerMode::OnEdit);
        assert!(config.close_on_finish);
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(
            SessionConfig::default()
                .with_event_channel_capacity(0)
                .event_channel_capacity,
            1
        );
    }
}
