//! Wire types for the quiz protocol.
//!
//! Inbound frames are plain text with a literal tag prefix followed by one
//! space and a payload. [`ServerMessage::parse`] turns a frame into a tagged
//! value exactly once, so the session loop can match exhaustively instead of
//! probing string prefixes. Text with no recognized tag is kept verbatim as
//! [`ServerMessage::Feedback`]; nothing is ever rejected.
//!
//! Outbound frames are a numeric answer or one of the owner tokens `START`
//! and `RESTART`. Owner tokens can only be built through
//! [`Role::owner_command`](crate::session::Role::owner_command).
//!
//! The JSON bodies of the room-creation call live here too.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Inbound ─────────────────────────────────────────────────────────

const COUNTDOWN: &str = "COUNTDOWN: ";
const INFO: &str = "INFO: ";
const START: &str = "START: ";
const PROBLEM: &str = "PROBLEM: ";
const PROGRESS: &str = "PROGRESS: ";
const TIMER: &str = "TIMER: ";
const FINISH: &str = "FINISH: ";

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Pre-start countdown text.
    Countdown(String),
    /// Informational status text.
    Info(String),
    /// Round-start announcement.
    Start(String),
    /// Next arithmetic problem.
    Problem(String),
    /// Scoreboard snapshot.
    Progress(String),
    /// Remaining-time text.
    Timer(String),
    /// Final results. Terminal for the round.
    Finish(String),
    /// Any frame without a recognized tag, kept exactly as received.
    Feedback(String),
}

impl ServerMessage {
    /// Classify one inbound text frame.
    ///
    /// Total: every input produces a value. Tagged payloads are trimmed;
    /// untagged text is returned unchanged.
    ///
    /// ```
    /// use arith_quiz_client::protocol::ServerMessage;
    ///
    /// assert_eq!(
    ///     ServerMessage::parse("PROBLEM:  2 + 2 "),
    ///     ServerMessage::Problem("2 + 2".into())
    /// );
    /// assert_eq!(
    ///     ServerMessage::parse("Correct!"),
    ///     ServerMessage::Feedback("Correct!".into())
    /// );
    /// ```
    pub fn parse(text: &str) -> Self {
        let tags: [(&str, fn(String) -> Self); 7] = [
            (COUNTDOWN, Self::Countdown),
            (INFO, Self::Info),
            (START, Self::Start),
            (PROBLEM, Self::Problem),
            (PROGRESS, Self::Progress),
            (TIMER, Self::Timer),
            (FINISH, Self::Finish),
        ];

        for (tag, build) in tags {
            if let Some(payload) = text.strip_prefix(tag) {
                return build(payload.trim().to_string());
            }
        }

        Self::Feedback(text.to_string())
    }

    /// The tag literal (including the trailing space), or `None` for feedback.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            Self::Countdown(_) => Some(COUNTDOWN),
            Self::Info(_) => Some(INFO),
            Self::Start(_) => Some(START),
            Self::Problem(_) => Some(PROBLEM),
            Self::Progress(_) => Some(PROGRESS),
            Self::Timer(_) => Some(TIMER),
            Self::Finish(_) => Some(FINISH),
            Self::Feedback(_) => None,
        }
    }

    /// The payload (or the whole text, for feedback).
    pub fn payload(&self) -> &str {
        match self {
            Self::Countdown(text)
            | Self::Info(text)
            | Self::Start(text)
            | Self::Problem(text)
            | Self::Progress(text)
            | Self::Timer(text)
            | Self::Finish(text)
            | Self::Feedback(text) => text,
        }
    }
}

/// Renders the wire form of the frame.
impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag() {
            Some(tag) => write!(f, "{tag}{}", self.payload()),
            None => f.write_str(self.payload()),
        }
    }
}

// ── Outbound ────────────────────────────────────────────────────────

/// Which owner-only command to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerCommandKind {
    /// Begin the round.
    Start,
    /// Ask the server for another round after `FINISH`.
    Restart,
}

/// An owner-only command. Has no public constructor; obtain one from
/// [`Role::owner_command`](crate::session::Role::owner_command).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerCommand {
    kind: OwnerCommandKind,
}

impl OwnerCommand {
    pub(crate) fn new(kind: OwnerCommandKind) -> Self {
        Self { kind }
    }

    /// The command this value carries.
    pub fn kind(&self) -> OwnerCommandKind {
        self.kind
    }
}

/// A frame the client sends to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// A numeric answer, already trimmed and validated.
    Answer(String),
    /// `START` or `RESTART`.
    Owner(OwnerCommand),
}

impl ClientMessage {
    /// Build an answer frame from a raw field value.
    ///
    /// Returns `None` unless the trimmed value is non-empty and parses as a
    /// finite number.
    ///
    /// ```
    /// use arith_quiz_client::protocol::ClientMessage;
    ///
    /// assert_eq!(ClientMessage::answer("  7 "), Some(ClientMessage::Answer("7".into())));
    /// assert_eq!(ClientMessage::answer("12a"), None);
    /// assert_eq!(ClientMessage::answer(""), None);
    /// ```
    pub fn answer(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => Some(Self::Answer(trimmed.to_string())),
            _ => None,
        }
    }

    /// The text frame to put on the wire.
    pub fn to_wire(&self) -> String {
        match self {
            Self::Answer(text) => text.clone(),
            Self::Owner(cmd) => match cmd.kind() {
                OwnerCommandKind::Start => "START".to_string(),
                OwnerCommandKind::Restart => "RESTART".to_string(),
            },
        }
    }
}

// ── Room creation ───────────────────────────────────────────────────

/// JSON body of the room-creation request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateRoomRequest {
    /// Round length in seconds. Always positive.
    pub duration: u64,
}

/// JSON body of the room-creation response.
///
/// Extra fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateRoomResponse {
    /// Identifier of the new room.
    pub room_id: String,
    /// Shareable link other participants use to join.
    pub invitation_link: String,
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

    #[test]
    fn parse_recognizes_every_tag() {
        let cases = [
            ("COUNTDOWN: 3", ServerMessage::Countdown("3".into())),
            ("INFO: Waiting for host", ServerMessage::Info("Waiting for host".into())),
            ("START: GO", ServerMessage::Start("GO".into())),
            ("PROBLEM: 4 X 2", ServerMessage::Problem("4 X 2".into())),
            ("PROGRESS: Ann: 2, Bo: 1", ServerMessage::Progress("Ann: 2, Bo: 1".into())),
            ("TIMER: 42", ServerMessage::Timer("42".into())),
            ("FINISH: Time's up!", ServerMessage::Finish("Time's up!".into())),
        ];
        for (raw, expected) in cases {
            assert_eq!(ServerMessage::parse(raw), expected, "input {raw:?}");
        }
    }

    #[test]
    fn parse_trims_payload() {
        assert_eq!(
            ServerMessage::parse("TIMER:    5  \n"),
            ServerMessage::Timer("5".into())
        );
    }

    #[test]
    fn parse_keeps_unknown_text_verbatim() {
        for raw in ["Correct!", "  Wrong answer ", "HELLO: x", "", "PROBLEM:no-space"] {
            assert_eq!(ServerMessage::parse(raw), ServerMessage::Feedback(raw.into()));
        }
    }

    #[test]
    fn parse_is_case_sensitive() {
        assert!(matches!(
            ServerMessage::parse("problem: 1 + 1"),
            ServerMessage::Feedback(_)
        ));
    }

    #[test]
    fn tag_with_empty_payload() {
        assert_eq!(ServerMessage::parse("INFO: "), ServerMessage::Info(String::new()));
    }

    #[test]
    fn display_renders_wire_form() {
        assert_eq!(ServerMessage::Problem("1 + 2".into()).to_string(), "PROBLEM: 1 + 2");
        assert_eq!(ServerMessage::Feedback("Correct!".into()).to_string(), "Correct!");
    }

    #[test]
    fn answer_gating() {
        assert_eq!(ClientMessage::answer("12").map(|m| m.to_wire()), Some("12".into()));
        assert_eq!(ClientMessage::answer("  7 ").map(|m| m.to_wire()), Some("7".into()));
        assert_eq!(ClientMessage::answer("-3.5").map(|m| m.to_wire()), Some("-3.5".into()));
        assert!(ClientMessage::answer("12a").is_none());
        assert!(ClientMessage::answer("").is_none());
        assert!(ClientMessage::answer("   ").is_none());
        assert!(ClientMessage::answer("NaN").is_none());
        assert!(ClientMessage::answer("inf").is_none());
    }

    #[test]
    fn owner_commands_render_tokens() {
        let start = ClientMessage::Owner(OwnerCommand::new(OwnerCommandKind::Start));
        let restart = ClientMessage::Owner(OwnerCommand::new(OwnerCommandKind::Restart));
        assert_eq!(start.to_wire(), "START");
        assert_eq!(restart.to_wire(), "RESTART");
    }

    #[test]
    fn create_room_request_json() {
        let json = serde_json::to_string(&CreateRoomRequest { duration: 60 }).unwrap();
        assert_eq!(json, r#"{"duration":60}"#);
    }

    #[test]
    fn create_room_response_ignores_extra_fields() {
        let resp: CreateRoomResponse = serde_json::from_str(
            r#"{"room_id":"R1","invitation_link":"https://x/?r=R1","extra":true}"#,
        )
        .unwrap();
        assert_eq!(resp.room_id, "R1");
        assert_eq!(resp.invitation_link, "https://x/?r=R1");
    }

    #[test]
    fn create_room_response_requires_link() {
        let result = serde_json::from_str::<CreateRoomResponse>(r#"{"room_id":"R1"}"#);
        assert!(result.is_err());
    }
}
