//! # Terminal Quiz
//!
//! A line-based front end for the quiz session controller:
//!
//! 1. Create a room (owner) or join one (participant)
//! 2. Open the session connection
//! 3. Print problems, scores, timer and results as they arrive
//! 4. Read answers and commands from stdin
//!
//! ## Running
//!
//! ```sh
//! # Create a 60 second room:
//! QUIZ_NAME=Ann QUIZ_DURATION=60 cargo run --example terminal_quiz
//!
//! # Join it from another terminal (room id or invitation link):
//! QUIZ_NAME=Bo QUIZ_ROOM=AB12CD cargo run --example terminal_quiz
//!
//! # Point at another server:
//! QUIZ_SERVER_URL=https://quiz.example.com cargo run --example terminal_quiz
//! ```
//!
//! Type a number to answer, `/start` or `/restart` as the owner, `/quit` to leave.

use arith_quiz_client::{
    NegotiatorConfig, QuizSession, RoomNegotiator, SessionConfig, SessionEvent,
};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Default server URL when `QUIZ_SERVER_URL` is not set.
const DEFAULT_URL: &str = "http://localhost:3030";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("QUIZ_SERVER_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let name = std::env::var("QUIZ_NAME").unwrap_or_default();
    let config = NegotiatorConfig::new(&url)?;
    let negotiator = RoomNegotiator::http(&config)?;

    // ── Negotiate ───────────────────────────────────────────────────
    let ticket = match std::env::var("QUIZ_ROOM") {
        Ok(room) => negotiator.join(&name, &room)?,
        Err(_) => {
            let duration = std::env::var("QUIZ_DURATION").unwrap_or_else(|_| "60".into());
            negotiator.create(&name, &duration).await?
        }
    };
    if let Some(link) = ticket.role.invitation_link() {
        println!("Room {} created. Invite others with: {link}", ticket.room_id);
    }

    // ── Connect ─────────────────────────────────────────────────────
    let (mut session, mut events) =
        QuizSession::connect(ticket, &config.base_url, SessionConfig::default()).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    break;
                };
                match event {
                    SessionEvent::Connected => {
                        if session.is_owner() {
                            println!("Connected. Type /start when everyone has joined.");
                        } else {
                            println!("Connected to room {}.", session.room_id());
                        }
                    }
                    SessionEvent::Countdown { text }
                    | SessionEvent::Info { text }
                    | SessionEvent::RoundStarted { text } => println!("{text}"),
                    SessionEvent::Problem { text } => println!("\n  {text} = ?"),
                    SessionEvent::Scoreboard { text } => println!("  [{text}]"),
                    SessionEvent::Timer { remaining } => {
                        tracing::debug!("Time: {remaining}");
                    }
                    SessionEvent::Feedback { text } => println!("{text}"),
                    SessionEvent::Finished { results, restart_available } => {
                        println!("\n{results}");
                        if restart_available {
                            println!("Type /restart to play again.");
                        }
                    }
                    SessionEvent::PhaseChanged { from, to } => {
                        tracing::debug!("Phase {from} → {to}");
                    }
                    SessionEvent::Disconnected { reason } => {
                        tracing::info!("Disconnected: {}", reason.as_deref().unwrap_or("server closed"));
                        break;
                    }
                }
            }

            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let result = match line.trim() {
                    "/quit" => break,
                    "/start" => session.start_round(),
                    "/restart" => session.restart(),
                    _ => session.edit_answer(line),
                };
                if let Err(e) = result {
                    tracing::warn!("{e}");
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down…");
                break;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    session.shutdown().await;
    Ok(())
}
