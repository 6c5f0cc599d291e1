#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Wire-format tests for inbound classification and outbound frames.

use arith_quiz_client::protocol::{CreateRoomRequest, CreateRoomResponse, OwnerCommandKind};
use arith_quiz_client::{ClientMessage, Role, ServerMessage, SessionEvent};

const TAGS: [&str; 7] = [
    "COUNTDOWN: ",
    "INFO: ",
    "START: ",
    "PROBLEM: ",
    "PROGRESS: ",
    "TIMER: ",
    "FINISH: ",
];

// ════════════════════════════════════════════════════════════════════
// Inbound
// ════════════════════════════════════════════════════════════════════

#[test]
fn every_tag_is_recognized_and_payload_trimmed() {
    for tag in TAGS {
        let msg = ServerMessage::parse(&format!("{tag}  payload text \t"));
        assert_eq!(msg.tag(), Some(tag), "tag {tag:?}");
        assert_eq!(msg.payload(), "payload text", "tag {tag:?}");
    }
}

#[test]
fn frames_from_a_full_round() {
    let round = [
        "INFO: Waiting for host to start the game.",
        "COUNTDOWN: 3",
        "COUNTDOWN: 2",
        "COUNTDOWN: 1",
        "START: GO",
        "TIMER: 60",
        "PROBLEM: 3 X 4",
        "PROGRESS: Ann: 0, Bo: 0",
        "PROBLEM: 4 - 2",
        "PROGRESS: Ann: 1, Bo: 0",
        "TIMER: 0",
        "FINISH: Time's up!",
    ];
    let kinds: Vec<&str> = round
        .iter()
        .map(|raw| match ServerMessage::parse(raw) {
            ServerMessage::Countdown(_) => "countdown",
            ServerMessage::Info(_) => "info",
            ServerMessage::Start(_) => "start",
            ServerMessage::Problem(_) => "problem",
            ServerMessage::Progress(_) => "progress",
            ServerMessage::Timer(_) => "timer",
            ServerMessage::Finish(_) => "finish",
            ServerMessage::Feedback(_) => "feedback",
        })
        .collect();
    assert_eq!(
        kinds,
        [
            "info", "countdown", "countdown", "countdown", "start", "timer", "problem",
            "progress", "problem", "progress", "timer", "finish"
        ]
    );
}

#[test]
fn unrecognized_text_is_untouched() {
    let inputs = [
        "Correct!",
        "CORRECT! New PROBLEM: 1 + 1",
        "Wrong answer, try again",
        "  padded  ",
        "TIMER:5",
        "timer: 5",
        "SCORE: 10",
        " PROBLEM: leading space",
        "",
        "émoji 🎉",
    ];
    for raw in inputs {
        let msg = ServerMessage::parse(raw);
        assert_eq!(msg, ServerMessage::Feedback(raw.to_string()), "input {raw:?}");
        assert_eq!(msg.to_string(), raw);
    }
}

#[test]
fn tag_inside_text_does_not_match() {
    assert!(matches!(
        ServerMessage::parse("Next PROBLEM: 2 + 2"),
        ServerMessage::Feedback(_)
    ));
}

#[test]
fn display_reproduces_trimmed_frame() {
    let msg = ServerMessage::parse("PROGRESS:   Ann: 3  ");
    assert_eq!(msg.to_string(), "PROGRESS: Ann: 3");
    assert_eq!(ServerMessage::parse(&msg.to_string()), msg);
}

#[test]
fn events_mirror_messages() {
    assert_eq!(
        SessionEvent::from(ServerMessage::parse("TIMER: 7")),
        SessionEvent::Timer {
            remaining: "7".into()
        }
    );
    assert_eq!(
        SessionEvent::from(ServerMessage::parse("PROGRESS: Ann: 1")),
        SessionEvent::Scoreboard {
            text: "Ann: 1".into()
        }
    );
    assert_eq!(
        SessionEvent::from(ServerMessage::parse("hello")),
        SessionEvent::Feedback {
            text: "hello".into()
        }
    );
}

// ════════════════════════════════════════════════════════════════════
// Outbound
// ════════════════════════════════════════════════════════════════════

#[test]
fn answers_are_sent_trimmed() {
    let sent: Vec<String> = ["12", "12a", "", "  7 ", "0", "-4", "1e2", "0x10", "4 2"]
        .into_iter()
        .filter_map(ClientMessage::answer)
        .map(|m| m.to_wire())
        .collect();
    assert_eq!(sent, ["12", "7", "0", "-4", "1e2"]);
}

#[test]
fn owner_tokens_need_owner_role() {
    let owner = Role::Owner {
        invitation_link: "http://localhost:3030/?room_id=AB12CD".into(),
    };
    let start = owner.owner_command(OwnerCommandKind::Start).unwrap();
    let restart = owner.owner_command(OwnerCommandKind::Restart).unwrap();
    assert_eq!(ClientMessage::Owner(start).to_wire(), "START");
    assert_eq!(ClientMessage::Owner(restart).to_wire(), "RESTART");

    assert!(Role::Participant
        .owner_command(OwnerCommandKind::Start)
        .is_none());
    assert!(Role::Participant
        .owner_command(OwnerCommandKind::Restart)
        .is_none());
}

// ════════════════════════════════════════════════════════════════════
// Room creation bodies
// ════════════════════════════════════════════════════════════════════

#[test]
fn create_room_bodies_match_server_shape() {
    let request = serde_json::to_value(CreateRoomRequest { duration: 90 }).unwrap();
    assert_eq!(request, serde_json::json!({ "duration": 90 }));

    let response: CreateRoomResponse = serde_json::from_value(serde_json::json!({
        "room_id": "AB12CD",
        "invitation_link": "http://localhost:3030/?room_id=AB12CD"
    }))
    .unwrap();
    assert_eq!(response.room_id, "AB12CD");
}

#[test]
fn create_room_response_rejects_wrong_types() {
    let result = serde_json::from_str::<CreateRoomResponse>(
        r#"{"room_id": 7, "invitation_link": "x"}"#,
    );
    assert!(result.is_err());
}
