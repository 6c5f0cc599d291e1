//! Events delivered to the UI by the session loop.

use crate::protocol::ServerMessage;
use crate::session::Phase;

/// A UI-facing event, emitted in the order the underlying frames arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Synthetic: the session loop is running on a live connection.
    Connected,
    /// Pre-start countdown text (problem region).
    Countdown {
        /// Countdown text.
        text: String,
    },
    /// Informational status (problem region).
    Info {
        /// Status text.
        text: String,
    },
    /// The round began (problem region).
    RoundStarted {
        /// Announcement text.
        text: String,
    },
    /// A new problem; the answer field was cleared.
    Problem {
        /// Problem text.
        text: String,
    },
    /// Scoreboard snapshot.
    Scoreboard {
        /// Scoreboard text.
        text: String,
    },
    /// Remaining time.
    Timer {
        /// Raw remaining-time payload.
        remaining: String,
    },
    /// Final results (feedback region).
    Finished {
        /// Results text.
        results: String,
        /// `true` for owners, who may now send `RESTART`.
        ///
        /// The connection is already closed when the session closes on finish
        /// (the default), so `restart` then fails with `NotConnected`.
        restart_available: bool,
    },
    /// Untagged server text, shown verbatim in the feedback region.
    Feedback {
        /// Text exactly as received.
        text: String,
    },
    /// The phase moved.
    PhaseChanged {
        /// Previous phase.
        from: Phase,
        /// New phase.
        to: Phase,
    },
    /// The connection is gone. Always the last event.
    Disconnected {
        /// Why, if known. `None` for a clean close by the server.
        reason: Option<String>,
    },
}

impl From<ServerMessage> for SessionEvent {
    fn from(msg: ServerMessage) -> Self {
        match msg {
            ServerMessage::Countdown(text) => SessionEvent::Countdown { text },
            ServerMessage::Info(text) => SessionEvent::Info { text },
            ServerMessage::Start(text) => SessionEvent::RoundStarted { text },
            ServerMessage::Problem(text) => SessionEvent::Problem { text },
            ServerMessage::Progress(text) => SessionEvent::Scoreboard { text },
            ServerMessage::Timer(remaining) => SessionEvent::Timer { remaining },
            ServerMessage::Finish(results) => SessionEvent::Finished {
                results,
                restart_available: false,
            },
            ServerMessage::Feedback(text) => SessionEvent::Feedback { text },
        }
    }
}
