//! Transport abstraction for the quiz session connection.
//!
//! The [`Transport`] trait is a bidirectional channel of plain UTF-8 text
//! frames. Inbound frames are tagged lines such as `PROBLEM: 2 + 3`; outbound
//! frames are a bare numeric answer, `START`, or `RESTART`.
//!
//! Connection setup is not part of this trait. Build a connected transport
//! externally (or use `QuizSession::connect` with the WebSocket feature) and
//! hand it to `QuizSession::start`.
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use arith_quiz_client::error::QuizError;
//! use arith_quiz_client::transport::Transport;
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), QuizError> {
//!         todo!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, QuizError>> {
//!         todo!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), QuizError> {
//!         todo!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::QuizError;

/// A bidirectional text frame transport.
///
/// Each call to [`send`](Transport::send) transmits one complete frame and each
/// call to [`recv`](Transport::recv) yields one. Frames must be delivered in
/// the order the peer sent them.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) **MUST** be cancel-safe because the session loop
/// polls it inside `tokio::select!`.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one text frame to the server.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::TransportSend`] or [`QuizError::TransportClosed`]
    /// if the frame could not be sent.
    async fn send(&mut self, message: String) -> Result<(), QuizError>;

    /// Receive the next text frame from the server.
    ///
    /// Returns:
    /// - `Some(Ok(text))`: a complete frame was received
    /// - `Some(Err(e))`: a transport error occurred
    /// - `None`: the connection was closed cleanly
    async fn recv(&mut self) -> Option<Result<String, QuizError>>;

    /// Close the connection gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails. Implementations should
    /// still release resources in that case.
    async fn close(&mut self) -> Result<(), QuizError>;
}
