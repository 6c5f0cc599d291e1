#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for the quiz client integration tests.
//!
//! Provides a channel-backed [`MockTransport`] whose inbound frames are pushed
//! by the test through a [`MockPeer`], so frames and UI intents can be
//! interleaved in a controlled order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use arith_quiz_client::{QuizError, RoomTicket, Role, SessionEvent, Transport};
use async_trait::async_trait;
use tokio::sync::mpsc;

// ── MockTransport ───────────────────────────────────────────────────

/// Transport end handed to the session.
pub struct MockTransport {
    incoming: mpsc::UnboundedReceiver<Option<Result<String, QuizError>>>,
    sent: Arc<StdMutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

/// Test end: pushes inbound frames and inspects what the session sent.
#[derive(Clone)]
pub struct MockPeer {
    tx: mpsc::UnboundedSender<Option<Result<String, QuizError>>>,
    sent: Arc<StdMutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl MockTransport {
    /// Create a connected transport/peer pair.
    pub fn pair() -> (Self, MockPeer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let transport = Self {
            incoming: rx,
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        let peer = MockPeer { tx, sent, closed };
        (transport, peer)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), QuizError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(QuizError::TransportClosed);
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, QuizError>> {
        match self.incoming.recv().await {
            Some(item) => item,
            // Peer dropped: stay open until the session shuts down.
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), QuizError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

impl MockPeer {
    /// Deliver one inbound text frame.
    pub fn push(&self, frame: &str) {
        self.tx.send(Some(Ok(frame.to_string()))).unwrap();
    }

    /// Deliver a transport error.
    pub fn fail(&self, detail: &str) {
        self.tx
            .send(Some(Err(QuizError::TransportReceive(detail.to_string()))))
            .unwrap();
    }

    /// Close the connection from the server side.
    pub fn hang_up(&self) {
        self.tx.send(None).unwrap();
    }

    /// Frames the session has sent so far.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Whether the session closed the transport.
    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

// ── Tickets ─────────────────────────────────────────────────────────

/// An owner ticket for room `R1`.
pub fn owner_ticket() -> RoomTicket {
    RoomTicket {
        display_name: "Ann".into(),
        room_id: "R1".into(),
        role: Role::Owner {
            invitation_link: "https://x/?r=R1".into(),
        },
    }
}

/// A participant ticket for room `R1`.
pub fn participant_ticket() -> RoomTicket {
    RoomTicket {
        display_name: "Bo".into(),
        room_id: "R1".into(),
        role: Role::Participant,
    }
}

// ── Event helpers ───────────────────────────────────────────────────

/// Receive the next event, failing the test after one second.
pub async fn next_event(rx: &mut mpsc::Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Consume `Connected` and the `Idle → AwaitingStart` phase change.
pub async fn drain_until_ready(rx: &mut mpsc::Receiver<SessionEvent>) {
    let ev = next_event(rx).await;
    assert_eq!(ev, SessionEvent::Connected, "first event should be Connected");
    let ev = next_event(rx).await;
    assert!(
        matches!(ev, SessionEvent::PhaseChanged { .. }),
        "second event should be PhaseChanged, got {ev:?}"
    );
}

/// Consume events until one matches `pred`, returning it.
pub async fn wait_for<F>(rx: &mut mpsc::Receiver<SessionEvent>, pred: F) -> SessionEvent
where
    F: Fn(&SessionEvent) -> bool,
{
    loop {
        let ev = next_event(rx).await;
        if pred(&ev) {
            return ev;
        }
    }
}

/// Give the session loop a moment to process queued intents.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
