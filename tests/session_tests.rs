//! Integration tests for the session controller.
//!
//! Uses the channel-backed `MockTransport` from `tests/common` to interleave
//! inbound frames with UI intents and check display regions, phase changes
//! and outbound frames.

mod common;

use arith_quiz_client::{
    AnswerMode, Phase, QuizError, QuizSession, SessionConfig, SessionEvent,
};
use tokio_test::{assert_err, assert_ok};

use common::{
    drain_until_ready, next_event, owner_ticket, participant_ticket, settle, wait_for,
    MockPeer, MockTransport,
};

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

fn start(
    ticket: arith_quiz_client::RoomTicket,
    config: SessionConfig,
) -> (
    QuizSession,
    tokio::sync::mpsc::Receiver<SessionEvent>,
    MockPeer,
) {
    let (transport, peer) = MockTransport::pair();
    let (session, events) = QuizSession::start(transport, ticket, config);
    (session, events, peer)
}

// ════════════════════════════════════════════════════════════════════
// Lobby
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn lobby_info_then_countdown_then_round() {
    let (mut session, mut events, peer) = start(participant_ticket(), SessionConfig::default());
    drain_until_ready(&mut events).await;

    peer.push("INFO: Waiting for host to start the game.");
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::Info {
            text: "Waiting for host to start the game.".into()
        }
    );

    for n in ["3", "2", "1"] {
        peer.push(&format!("COUNTDOWN: {n}"));
        assert_eq!(
            next_event(&mut events).await,
            SessionEvent::Countdown { text: n.into() }
        );
        assert_eq!(session.phase().await, Phase::AwaitingStart);
    }

    peer.push("START: GO");
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::RoundStarted { text: "GO".into() }
    );
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::PhaseChanged {
            from: Phase::AwaitingStart,
            to: Phase::InProgress
        }
    );
    assert_eq!(session.view().await.problem, "GO");

    session.shutdown().await;
}

#[tokio::test]
async fn owner_start_sends_token_and_hides_button() {
    let (mut session, mut events, peer) = start(owner_ticket(), SessionConfig::default());
    drain_until_ready(&mut events).await;

    let view = session.view().await;
    assert!(view.start_visible);
    assert_eq!(view.invitation, "Invite others with: https://x/?r=R1");

    assert_ok!(session.start_round());
    settle().await;

    assert_eq!(peer.sent(), ["START"]);
    assert!(!session.view().await.start_visible);
    // Optimistic: phase waits for the server.
    assert_eq!(session.phase().await, Phase::AwaitingStart);

    session.shutdown().await;
}

#[tokio::test]
async fn participant_never_sends_owner_tokens() {
    let (mut session, mut events, peer) = start(participant_ticket(), SessionConfig::default());
    drain_until_ready(&mut events).await;

    assert!(!session.view().await.start_visible);
    assert!(matches!(session.start_round(), Err(QuizError::NotOwner)));

    peer.push("FINISH: Player A wins");
    wait_for(&mut events, |e| matches!(e, SessionEvent::Finished { .. })).await;
    assert!(matches!(session.restart(), Err(QuizError::NotOwner)));

    settle().await;
    assert!(peer.sent().is_empty());
    assert!(!session.view().await.restart_visible);

    session.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Answers
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn answer_gating_sends_only_numeric_values() {
    let (mut session, mut events, peer) = start(participant_ticket(), SessionConfig::default());
    drain_until_ready(&mut events).await;

    for value in ["12", "12a", "", "  7 "] {
        assert_ok!(session.edit_answer(value));
    }
    settle().await;

    assert_eq!(peer.sent(), ["12", "7"]);
    assert_eq!(session.view().await.answer, "  7 ");

    session.shutdown().await;
}

#[tokio::test]
async fn every_numeric_keystroke_is_sent() {
    let (mut session, mut events, peer) = start(participant_ticket(), SessionConfig::default());
    drain_until_ready(&mut events).await;

    for value in ["1", "12", "12.", "12.5"] {
        session.edit_answer(value).unwrap();
    }
    settle().await;

    assert_eq!(peer.sent(), ["1", "12", "12.", "12.5"]);

    session.shutdown().await;
}

#[tokio::test]
async fn problem_answer_problem_scenario() {
    let (mut session, mut events, peer) = start(participant_ticket(), SessionConfig::default());
    drain_until_ready(&mut events).await;

    peer.push("PROBLEM: 2+2");
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::Problem { text: "2+2".into() }
    );

    session.edit_answer("4").unwrap();
    settle().await;
    assert_eq!(peer.sent(), ["4"]);
    assert_eq!(session.view().await.answer, "4");

    peer.push("PROBLEM: 3+3");
    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::Problem { text } if text == "3+3")
    })
    .await;

    let view = session.view().await;
    assert_eq!(view.answer, "");
    assert_eq!(view.problem, "3+3");
    assert_eq!(session.last_problem().await.as_deref(), Some("3+3"));
    assert_eq!(session.phase().await, Phase::InProgress);

    session.shutdown().await;
}

#[tokio::test]
async fn on_submit_mode_waits_for_submit() {
    let config = SessionConfig::default().with_answer_mode(AnswerMode::OnSubmit);
    let (mut session, mut events, peer) = start(participant_ticket(), config);
    drain_until_ready(&mut events).await;

    session.edit_answer("1").unwrap();
    session.edit_answer("15").unwrap();
    settle().await;
    assert!(peer.sent().is_empty());

    session.submit_answer().unwrap();
    settle().await;
    assert_eq!(peer.sent(), ["15"]);

    session.edit_answer("abc").unwrap();
    session.submit_answer().unwrap();
    settle().await;
    assert_eq!(peer.sent(), ["15"]);

    session.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Scoreboard and timer
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn timer_and_progress_are_last_write_wins() {
    let (mut session, mut events, peer) = start(participant_ticket(), SessionConfig::default());
    drain_until_ready(&mut events).await;

    peer.push("PROBLEM: 1 + 1");
    peer.push("TIMER: 5");
    peer.push("TIMER: 5");
    peer.push("PROGRESS: Ann: 0, Bo: 0");
    peer.push("PROGRESS: Ann: 1, Bo: 0");
    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::Scoreboard { text } if text == "Ann: 1, Bo: 0")
    })
    .await;

    let view = session.view().await;
    assert_eq!(view.timer, "Time: 5");
    assert_eq!(view.scoreboard, "Ann: 1, Bo: 0");
    assert_eq!(view.problem, "1 + 1");
    assert_eq!(view.feedback, "");

    session.shutdown().await;
}

#[tokio::test]
async fn untagged_text_becomes_feedback() {
    let (mut session, mut events, peer) = start(participant_ticket(), SessionConfig::default());
    drain_until_ready(&mut events).await;

    peer.push("Correct!");
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::Feedback {
            text: "Correct!".into()
        }
    );
    peer.push(" SCORE: 3 ");
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::Feedback {
            text: " SCORE: 3 ".into()
        }
    );
    assert_eq!(session.view().await.feedback, " SCORE: 3 ");

    session.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Finish and restart
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn owner_finish_closes_and_offers_restart() {
    let (session, mut events, peer) = start(owner_ticket(), SessionConfig::default());
    drain_until_ready(&mut events).await;

    peer.push("START: GO");
    peer.push("FINISH: Player A wins");

    let ev = wait_for(&mut events, |e| matches!(e, SessionEvent::Finished { .. })).await;
    assert_eq!(
        ev,
        SessionEvent::Finished {
            results: "Player A wins".into(),
            restart_available: true
        }
    );
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::PhaseChanged {
            from: Phase::InProgress,
            to: Phase::Finished
        }
    );
    assert!(matches!(
        next_event(&mut events).await,
        SessionEvent::Disconnected { .. }
    ));

    assert!(peer.closed());
    assert!(!session.is_connected());
    let view = session.view().await;
    assert_eq!(view.feedback, "Player A wins");
    assert!(view.restart_visible);

    // The connection is gone; further intents are no-ops.
    assert!(matches!(session.restart(), Err(QuizError::NotConnected)));
    assert_err!(session.edit_answer("3"));
}

#[tokio::test]
async fn participant_finish_keeps_restart_hidden() {
    let (session, mut events, peer) = start(participant_ticket(), SessionConfig::default());
    drain_until_ready(&mut events).await;

    peer.push("FINISH: Player A wins");
    let ev = wait_for(&mut events, |e| matches!(e, SessionEvent::Finished { .. })).await;
    assert_eq!(
        ev,
        SessionEvent::Finished {
            results: "Player A wins".into(),
            restart_available: false
        }
    );
    wait_for(&mut events, |e| matches!(e, SessionEvent::Disconnected { .. })).await;

    assert!(peer.closed());
    let view = session.view().await;
    assert_eq!(view.feedback, "Player A wins");
    assert!(!view.restart_visible);
}

#[tokio::test]
async fn restart_on_open_connection() {
    let config = SessionConfig::default().with_close_on_finish(false);
    let (mut session, mut events, peer) = start(owner_ticket(), config);
    drain_until_ready(&mut events).await;

    // Too early: ignored by the loop.
    session.restart().unwrap();
    settle().await;
    assert!(peer.sent().is_empty());

    peer.push("PROBLEM: 2 X 3");
    peer.push("FINISH: Time's up!");
    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::PhaseChanged { to: Phase::Finished, .. })
    })
    .await;
    assert!(!peer.closed());
    assert!(session.is_connected());

    session.restart().unwrap();
    settle().await;
    assert_eq!(peer.sent(), ["RESTART"]);
    assert!(!session.view().await.restart_visible);
    assert_eq!(session.phase().await, Phase::Finished);

    peer.push("START: GO");
    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::PhaseChanged { to: Phase::InProgress, .. })
    })
    .await;
    assert_eq!(session.phase().await, Phase::InProgress);

    session.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Connection failures
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn receive_error_leaves_phase_unchanged() {
    let (mut session, mut events, peer) = start(participant_ticket(), SessionConfig::default());
    drain_until_ready(&mut events).await;

    peer.push("PROBLEM: 4 - 1");
    peer.fail("connection reset");

    let ev = wait_for(&mut events, |e| matches!(e, SessionEvent::Disconnected { .. })).await;
    if let SessionEvent::Disconnected { reason } = ev {
        assert!(reason.unwrap().contains("connection reset"));
    }
    assert!(!session.is_connected());
    assert_eq!(session.phase().await, Phase::InProgress);
    assert!(matches!(session.edit_answer("3"), Err(QuizError::NotConnected)));

    session.shutdown().await;
}

#[tokio::test]
async fn server_hang_up_is_clean_disconnect() {
    let (mut session, mut events, peer) = start(participant_ticket(), SessionConfig::default());
    drain_until_ready(&mut events).await;

    peer.hang_up();
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::Disconnected { reason: None }
    );
    assert_eq!(session.phase().await, Phase::AwaitingStart);

    session.shutdown().await;
}

#[tokio::test]
async fn shutdown_emits_disconnected_and_closes() {
    let (mut session, mut events, peer) = start(owner_ticket(), SessionConfig::default());
    drain_until_ready(&mut events).await;

    session.shutdown().await;

    assert!(peer.closed());
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::Disconnected {
            reason: Some("session shut down".into())
        }
    );
    assert!(events.recv().await.is_none());
}

#[tokio::test]
async fn accessors_reflect_ticket() {
    let (mut session, _events, _peer) = start(owner_ticket(), SessionConfig::default());
    assert_eq!(session.display_name(), "Ann");
    assert_eq!(session.room_id(), "R1");
    assert!(session.is_owner());
    assert_eq!(session.role().invitation_link(), Some("https://x/?r=R1"));
    session.shutdown().await;
}

#[tokio::test]
async fn slow_reader_still_gets_every_frame_in_order() {
    let (mut session, mut events, peer) = start(
        participant_ticket(),
        SessionConfig::default().with_event_channel_capacity(2),
    );

    for frame in ["START: GO", "PROBLEM: 2+2", "PROGRESS: Ann: 1", "PROBLEM: 3+3"] {
        peer.push(frame);
    }
    settle().await;

    let mut received = Vec::new();
    for _ in 0..7 {
        received.push(next_event(&mut events).await);
    }
    assert_eq!(
        received,
        [
            SessionEvent::Connected,
            SessionEvent::PhaseChanged {
                from: Phase::Idle,
                to: Phase::AwaitingStart
            },
            SessionEvent::RoundStarted { text: "GO".into() },
            SessionEvent::PhaseChanged {
                from: Phase::AwaitingStart,
                to: Phase::InProgress
            },
            SessionEvent::Problem { text: "2+2".into() },
            SessionEvent::Scoreboard {
                text: "Ann: 1".into()
            },
            SessionEvent::Problem { text: "3+3".into() },
        ]
    );
    assert_eq!(session.view().await.problem, "3+3");
    session.shutdown().await;
}
