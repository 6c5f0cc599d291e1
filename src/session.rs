//! Session state machine.
//!
//! [`SessionState`] is the mutable context of one room participation minus
//! the connection itself: the phase, the display regions, and the last
//! problem. It is a plain synchronous value; the session loop in
//! [`client`](crate::client) owns the only writer and feeds it inbound
//! frames and UI intents in arrival order.

use std::fmt;

use tracing::{debug, warn};

use crate::event::SessionEvent;
use crate::protocol::{ClientMessage, OwnerCommand, OwnerCommandKind, ServerMessage};

// ── Role ────────────────────────────────────────────────────────────

/// The participant's role in the room. Decided at negotiation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Created the room and holds the invitation link.
    Owner {
        /// Shareable link returned by the room service.
        invitation_link: String,
    },
    /// Joined an existing room.
    Participant,
}

impl Role {
    /// Returns `true` for [`Role::Owner`].
    pub fn is_owner(&self) -> bool {
        matches!(self, Role::Owner { .. })
    }

    /// The invitation link, if this role holds one.
    pub fn invitation_link(&self) -> Option<&str> {
        match self {
            Role::Owner { invitation_link } => Some(invitation_link),
            Role::Participant => None,
        }
    }

    /// Build an owner-only command. `None` for participants.
    pub fn owner_command(&self, kind: OwnerCommandKind) -> Option<OwnerCommand> {
        self.is_owner().then(|| OwnerCommand::new(kind))
    }
}

// ── Phase ───────────────────────────────────────────────────────────

/// Position in the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Connection not yet live.
    #[default]
    Idle,
    /// Connected, waiting for the owner to start.
    AwaitingStart,
    /// A round is running.
    InProgress,
    /// Final results received.
    Finished,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::AwaitingStart => "awaiting-start",
            Phase::InProgress => "in-progress",
            Phase::Finished => "finished",
        };
        f.write_str(name)
    }
}

// ── Answer mode ─────────────────────────────────────────────────────

/// When answers are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnswerMode {
    /// Every edit whose value is numeric is sent immediately, without debouncing.
    #[default]
    OnEdit,
    /// Edits only update the field; the answer is sent on explicit submit.
    OnSubmit,
}

// ── View ────────────────────────────────────────────────────────────

/// Text and visibility of every display region the controller writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionView {
    /// Problem or status line.
    pub problem: String,
    /// Feedback line (results, legacy free text).
    pub feedback: String,
    /// Scoreboard line.
    pub scoreboard: String,
    /// Timer line, rendered as `Time: <payload>`.
    pub timer: String,
    /// Invitation text; empty for participants.
    pub invitation: String,
    /// Current value of the answer field.
    pub answer: String,
    /// Whether the start button is shown.
    pub start_visible: bool,
    /// Whether the restart button is shown.
    pub restart_visible: bool,
}

// ── State ───────────────────────────────────────────────────────────

/// What the session loop must do after applying an inbound frame.
#[derive(Debug, Default)]
pub struct Dispatch {
    /// Events for the UI, in order.
    pub events: Vec<SessionEvent>,
    /// Close the connection after emitting the events.
    pub close: bool,
}

/// Phase, view and last problem of one session.
#[derive(Debug, Clone)]
pub struct SessionState {
    role: Role,
    phase: Phase,
    view: SessionView,
    last_problem: Option<String>,
    restart_pending: bool,
    close_on_finish: bool,
}

impl SessionState {
    /// Fresh state in [`Phase::Idle`].
    pub fn new(role: Role, close_on_finish: bool) -> Self {
        let invitation = role
            .invitation_link()
            .map(|link| format!("Invite others with: {link}"))
            .unwrap_or_default();
        Self {
            role,
            phase: Phase::Idle,
            view: SessionView {
                invitation,
                ..SessionView::default()
            },
            last_problem: None,
            restart_pending: false,
            close_on_finish,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current display regions.
    pub fn view(&self) -> &SessionView {
        &self.view
    }

    /// Text of the most recent `PROBLEM:` frame.
    pub fn last_problem(&self) -> Option<&str> {
        self.last_problem.as_deref()
    }

    /// The connection is live: `Idle → AwaitingStart`, and owners see the
    /// start button.
    pub fn connection_opened(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if self.phase == Phase::Idle {
            self.view.start_visible = self.role.is_owner();
            self.transition(Phase::AwaitingStart, &mut events);
        }
        events
    }

    /// Apply one inbound frame. Each tag writes exactly one display region.
    pub fn apply(&mut self, msg: ServerMessage) -> Dispatch {
        let mut dispatch = Dispatch::default();

        match &msg {
            ServerMessage::Countdown(text) | ServerMessage::Info(text) => {
                self.view.problem.clone_from(text);
            }
            ServerMessage::Start(text) => {
                self.view.problem.clone_from(text);
                self.enter_round(&mut dispatch.events);
            }
            ServerMessage::Problem(text) => {
                self.view.problem.clone_from(text);
                self.view.answer.clear();
                self.last_problem = Some(text.clone());
                self.enter_round(&mut dispatch.events);
            }
            ServerMessage::Progress(text) => {
                self.view.scoreboard.clone_from(text);
            }
            ServerMessage::Timer(text) => {
                self.view.timer = format!("Time: {text}");
            }
            ServerMessage::Finish(text) => {
                self.view.feedback.clone_from(text);
                self.view.restart_visible = self.role.is_owner();
                self.restart_pending = false;
                self.transition(Phase::Finished, &mut dispatch.events);
                dispatch.close = self.close_on_finish;
            }
            ServerMessage::Feedback(text) => {
                self.view.feedback.clone_from(text);
            }
        }

        let restart_available = self.view.restart_visible;
        let event = match msg {
            ServerMessage::Finish(results) => SessionEvent::Finished {
                results,
                restart_available,
            },
            other => SessionEvent::from(other),
        };
        dispatch.events.insert(0, event);
        dispatch
    }

    /// Record an edit of the answer field and return the frame to send, if any.
    pub fn edit_answer(&mut self, value: String, mode: AnswerMode) -> Option<ClientMessage> {
        self.view.answer = value;
        match mode {
            AnswerMode::OnEdit => ClientMessage::answer(&self.view.answer),
            AnswerMode::OnSubmit => None,
        }
    }

    /// The frame for an explicit submit of the current field value, if numeric.
    pub fn submit_answer(&self) -> Option<ClientMessage> {
        ClientMessage::answer(&self.view.answer)
    }

    /// Build `START` and hide the start button. Optimistic: the button stays
    /// hidden whether or not the server acknowledges.
    pub fn start(&mut self) -> Option<ClientMessage> {
        let cmd = self.role.owner_command(OwnerCommandKind::Start)?;
        self.view.start_visible = false;
        Some(ClientMessage::Owner(cmd))
    }

    /// Build `RESTART` and hide the restart button. Only valid once finished.
    /// Phase is left alone; the server drives the next round.
    pub fn restart(&mut self) -> Option<ClientMessage> {
        if self.phase != Phase::Finished {
            warn!(phase = %self.phase, "restart ignored: round not finished");
            return None;
        }
        let cmd = self.role.owner_command(OwnerCommandKind::Restart)?;
        self.view.restart_visible = false;
        self.restart_pending = true;
        Some(ClientMessage::Owner(cmd))
    }

    fn enter_round(&mut self, events: &mut Vec<SessionEvent>) {
        match self.phase {
            Phase::Finished if !self.restart_pending => {
                warn!("round frame after finish without restart; phase unchanged");
            }
            Phase::InProgress => {}
            _ => {
                self.restart_pending = false;
                self.transition(Phase::InProgress, events);
            }
        }
    }

    fn transition(&mut self, to: Phase, events: &mut Vec<SessionEvent>) {
        let from = self.phase;
        if from == to {
            return;
        }
        self.phase = to;
        debug!(%from, %to, "phase changed");
        events.push(SessionEvent::PhaseChanged { from, to });
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

    fn owner() -> Role {
        Role::Owner {
            invitation_link: "https://x/?r=R1".into(),
        }
    }

    fn live(role: Role) -> SessionState {
        let mut state = SessionState::new(role, true);
        state.connection_opened();
        state
    }

    /// Returns the names of the view fields that differ.
    fn changed(before: &SessionView, after: &SessionView) -> Vec<&'static str> {
        let mut out = Vec::new();
        if before.problem != after.problem {
            out.push("problem");
        }
        if before.feedback != after.feedback {
            out.push("feedback");
        }
        if before.scoreboard != after.scoreboard {
            out.push("scoreboard");
        }
        if before.timer != after.timer {
            out.push("timer");
        }
        if before.invitation != after.invitation {
            out.push("invitation");
        }
        if before.answer != after.answer {
            out.push("answer");
        }
        if before.start_visible != after.start_visible {
            out.push("start_visible");
        }
        if before.restart_visible != after.restart_visible {
            out.push("restart_visible");
        }
        out
    }

    #[test]
    fn connection_open_moves_to_awaiting_start() {
        let mut state = SessionState::new(owner(), true);
        assert_eq!(state.phase(), Phase::Idle);
        let events = state.connection_opened();
        assert_eq!(state.phase(), Phase::AwaitingStart);
        assert!(state.view().start_visible);
        assert!(matches!(
            events.as_slice(),
            [SessionEvent::PhaseChanged {
                from: Phase::Idle,
                to: Phase::AwaitingStart
            }]
        ));
    }

    #[test]
    fn participant_never_sees_start_button() {
        let state = live(Role::Participant);
        assert!(!state.view().start_visible);
        assert!(state.view().invitation.is_empty());
    }

    #[test]
    fn owner_sees_invitation() {
        let state = live(owner());
        assert_eq!(state.view().invitation, "Invite others with: https://x/?r=R1");
    }

    #[test]
    fn each_tag_touches_only_its_region() {
        let mut state = live(owner());
        state.edit_answer("9".into(), AnswerMode::OnEdit);

        let cases: [(&str, &[&str]); 7] = [
            ("COUNTDOWN: 3", &["problem"]),
            ("INFO: Waiting for host", &["problem"]),
            ("PROGRESS: Ann: 1", &["scoreboard"]),
            ("TIMER: 30", &["timer"]),
            ("Correct!", &["feedback"]),
            ("START: GO", &["problem"]),
            ("PROBLEM: 2 + 2", &["problem", "answer"]),
        ];
        for (raw, expected) in cases {
            let before = state.view().clone();
            state.apply(ServerMessage::parse(raw));
            assert_eq!(changed(&before, state.view()), expected, "frame {raw:?}");
        }
    }

    #[test]
    fn finish_touches_feedback_and_restart_only() {
        let mut state = live(owner());
        state.start();
        let before = state.view().clone();
        let dispatch = state.apply(ServerMessage::parse("FINISH: Player A wins"));
        assert_eq!(
            changed(&before, state.view()),
            ["feedback", "restart_visible"]
        );
        assert!(dispatch.close);
        assert_eq!(state.phase(), Phase::Finished);
    }

    #[test]
    fn unknown_text_shown_verbatim() {
        let mut state = live(Role::Participant);
        state.apply(ServerMessage::parse("  Wrong, try again  "));
        assert_eq!(state.view().feedback, "  Wrong, try again  ");
    }

    #[test]
    fn repeated_timer_is_idempotent() {
        let mut state = live(Role::Participant);
        state.apply(ServerMessage::parse("TIMER: 5"));
        state.apply(ServerMessage::parse("TIMER: 5"));
        assert_eq!(state.view().timer, "Time: 5");
    }

    #[test]
    fn progress_keeps_latest_only() {
        let mut state = live(Role::Participant);
        state.apply(ServerMessage::parse("PROGRESS: Ann: 1"));
        state.apply(ServerMessage::parse("PROGRESS: Ann: 2, Bo: 1"));
        assert_eq!(state.view().scoreboard, "Ann: 2, Bo: 1");
    }

    #[test]
    fn countdown_keeps_awaiting_start() {
        let mut state = live(Role::Participant);
        let dispatch = state.apply(ServerMessage::parse("COUNTDOWN: 2"));
        assert_eq!(state.phase(), Phase::AwaitingStart);
        assert_eq!(dispatch.events.len(), 1);
    }

    #[test]
    fn start_and_problem_enter_round_once() {
        let mut state = live(Role::Participant);
        let first = state.apply(ServerMessage::parse("START: GO"));
        assert_eq!(state.phase(), Phase::InProgress);
        assert!(matches!(
            first.events.as_slice(),
            [
                SessionEvent::RoundStarted { .. },
                SessionEvent::PhaseChanged {
                    to: Phase::InProgress,
                    ..
                }
            ]
        ));

        let second = state.apply(ServerMessage::parse("PROBLEM: 1 + 1"));
        assert_eq!(state.phase(), Phase::InProgress);
        assert_eq!(second.events.len(), 1);
        assert_eq!(state.last_problem(), Some("1 + 1"));
    }

    #[test]
    fn problem_supersedes_last_problem_and_clears_answer() {
        let mut state = live(Role::Participant);
        state.apply(ServerMessage::parse("PROBLEM: 2+2"));
        let sent = state.edit_answer("4".into(), AnswerMode::OnEdit);
        assert_eq!(sent.map(|m| m.to_wire()), Some("4".into()));

        state.apply(ServerMessage::parse("PROBLEM: 3+3"));
        assert_eq!(state.view().answer, "");
        assert_eq!(state.view().problem, "3+3");
        assert_eq!(state.last_problem(), Some("3+3"));
    }

    #[test]
    fn answer_gating_on_edit() {
        let mut state = live(Role::Participant);
        let sent: Vec<String> = ["12", "12a", "", "  7 "]
            .into_iter()
            .filter_map(|v| state.edit_answer(v.into(), AnswerMode::OnEdit))
            .map(|m| m.to_wire())
            .collect();
        assert_eq!(sent, ["12", "7"]);
    }

    #[test]
    fn on_submit_mode_defers_send() {
        let mut state = live(Role::Participant);
        assert!(state.edit_answer("42".into(), AnswerMode::OnSubmit).is_none());
        assert_eq!(state.view().answer, "42");
        assert_eq!(state.submit_answer().map(|m| m.to_wire()), Some("42".into()));
    }

    #[test]
    fn participant_cannot_start_or_restart() {
        let mut state = live(Role::Participant);
        assert!(state.start().is_none());
        state.apply(ServerMessage::parse("FINISH: done"));
        assert!(state.restart().is_none());
        assert!(!state.view().restart_visible);
    }

    #[test]
    fn owner_start_hides_button() {
        let mut state = live(owner());
        let msg = state.start().unwrap();
        assert_eq!(msg.to_wire(), "START");
        assert!(!state.view().start_visible);
    }

    #[test]
    fn restart_requires_finished() {
        let mut state = live(owner());
        assert!(state.restart().is_none());
        state.apply(ServerMessage::parse("FINISH: Player A wins"));
        assert!(state.view().restart_visible);
        let msg = state.restart().unwrap();
        assert_eq!(msg.to_wire(), "RESTART");
        assert!(!state.view().restart_visible);
        assert_eq!(state.phase(), Phase::Finished);
    }

    #[test]
    fn finished_is_sticky_without_restart() {
        let mut state = live(owner());
        state.apply(ServerMessage::parse("FINISH: over"));
        state.apply(ServerMessage::parse("PROBLEM: 5 - 1"));
        assert_eq!(state.phase(), Phase::Finished);
        assert_eq!(state.view().problem, "5 - 1");
    }

    #[test]
    fn restart_lets_server_reopen_round() {
        let mut state = live(owner());
        state.apply(ServerMessage::parse("FINISH: over"));
        state.restart().unwrap();
        state.apply(ServerMessage::parse("START: GO"));
        assert_eq!(state.phase(), Phase::InProgress);
    }

    #[test]
    fn close_on_finish_can_be_disabled() {
        let mut state = SessionState::new(owner(), false);
        state.connection_opened();
        let dispatch = state.apply(ServerMessage::parse("FINISH: over"));
        assert!(!dispatch.close);
    }
}
