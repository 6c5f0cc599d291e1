//! # Arith Quiz Client
//!
//! Client-side session controller for a real-time multiplayer arithmetic quiz.
//!
//! A participant either creates a timed room (becoming its owner) or joins an
//! existing one. A persistent connection then delivers tagged text frames that
//! drive the problem, scoreboard, timer and results shown to the player.
//!
//! ## Features
//!
//! - **Room negotiation**: [`RoomNegotiator`] validates entry-form input and
//!   creates rooms over HTTP (`http-negotiator` feature, default)
//! - **Typed frames**: inbound text is parsed once into a [`ServerMessage`];
//!   untagged text is kept as feedback, so nothing is dropped
//! - **Role gating**: `START`/`RESTART` can only be built for the room owner
//! - **Transport-agnostic**: implement [`Transport`] for any text channel;
//!   `WebSocketTransport` ships with the `transport-websocket` feature (default)
//! - **Event-driven**: [`QuizSession`] emits [`SessionEvent`]s on a channel
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), arith_quiz_client::QuizError> {
//! use arith_quiz_client::{NegotiatorConfig, QuizSession, RoomNegotiator, SessionConfig, SessionEvent};
//!
//! let config = NegotiatorConfig::new("http://localhost:3030")?;
//! let negotiator = RoomNegotiator::http(&config)?;
//! let ticket = negotiator.create("Ann", "60").await?;
//!
//! let (session, mut events) =
//!     QuizSession::connect(ticket, &config.base_url, SessionConfig::default()).await?;
//! session.start_round()?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         SessionEvent::Problem { text } => println!("{text} = ?"),
//!         SessionEvent::Finished { results, .. } => println!("{results}"),
//!         SessionEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod endpoint;
pub mod error;
pub mod event;
pub mod negotiator;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use client::{QuizSession, SessionConfig};
pub use error::QuizError;
pub use event::SessionEvent;
pub use negotiator::{NegotiatorConfig, RoomApi, RoomNegotiator, RoomTicket};
pub use protocol::{ClientMessage, ServerMessage};
pub use session::{AnswerMode, Phase, Role, SessionView};
pub use transport::Transport;

#[cfg(feature = "http-negotiator")]
pub use negotiator::HttpRoomApi;

#[cfg(feature = "transport-websocket")]
pub use transports::WebSocketTransport;
