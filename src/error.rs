//! Error types for the quiz client.

use thiserror::Error;

/// Errors that can occur while negotiating a room or driving a session.
#[derive(Debug, Error)]
pub enum QuizError {
    /// Failed to send a frame through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a frame from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed.
    #[error("transport connection closed")]
    TransportClosed,

    /// The session loop has exited, so no further intents can be delivered.
    #[error("not connected to server")]
    NotConnected,

    /// START and RESTART are reserved for the room owner.
    #[error("only the room owner may send this command")]
    NotOwner,

    /// User-entered input was rejected before any network activity.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The room service answered with a non-success status.
    #[error("room service returned HTTP {status} for {url}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Request URL.
        url: String,
    },

    /// The room-creation request could not be completed.
    #[error("request failed: {0}")]
    Request(String),

    /// The room service answered, but the body lacked the expected fields.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A server or invitation URL could not be parsed or derived.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<url::ParseError> for QuizError {
    fn from(err: url::ParseError) -> Self {
        QuizError::InvalidUrl(err.to_string())
    }
}

/// A specialized [`Result`] type for quiz client operations.
pub type Result<T> = std::result::Result<T, QuizError>;
